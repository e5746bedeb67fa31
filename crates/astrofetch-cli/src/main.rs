//! `astrofetch` binary entrypoint.

use std::process;

#[tokio::main]
async fn main() {
    process::exit(astrofetch_cli::run().await);
}
