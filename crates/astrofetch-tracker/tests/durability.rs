use std::sync::Arc;
use std::thread;

use astrofetch_test_support::fixtures::catalog_item;
use astrofetch_tracker::{TrackerOptions, TrackerRecord, TrackerStore};
use tempfile::TempDir;

#[test]
fn concurrent_record_and_save_never_corrupt_the_document() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tracker.json");
    let store = Arc::new(TrackerStore::open(
        &path,
        TrackerOptions {
            backup_on_save: true,
            backup_retention: 3,
        },
    )?);

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            let base = dir.path().to_path_buf();
            thread::spawn(move || -> anyhow::Result<()> {
                for index in 0..25 {
                    let id = format!("{worker}-{index}");
                    let item = catalog_item(&id);
                    store.record(TrackerRecord::for_item(
                        &item,
                        base.join(format!("{id}.png")),
                        1,
                        None,
                    ));
                    if index % 5 == 0 {
                        store.save()?;
                    }
                }
                Ok(())
            })
        })
        .collect();
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker panicked"))??;
    }
    store.save()?;

    let reopened = TrackerStore::open(&path, TrackerOptions::default())?;
    assert_eq!(reopened.len(), 200);
    let mut sequences: Vec<_> = reopened.records().iter().map(|r| r.sequence).collect();
    sequences.dedup();
    assert_eq!(sequences.len(), 200);
    Ok(())
}
