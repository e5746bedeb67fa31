//! Detection of a silently expired catalog session.

use std::fmt::Debug;

use astrofetch_core::CatalogPage;

/// Decides whether a page that arrived without an explicit error actually
/// signals an expired session.
///
/// The catalog may answer an expired session with an empty result instead of
/// an error; implementations encode whatever heuristic the catalog needs.
pub trait ExpiryDetector: Debug + Send + Sync {
    /// `previous_total` is the total-count signal of the last page fetched in
    /// this run, if any.
    fn is_expired(&self, previous_total: Option<u64>, page: &CatalogPage) -> bool;
}

/// Fires when the total count drops to zero after a non-zero total was seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalCountDrop;

impl ExpiryDetector for TotalCountDrop {
    fn is_expired(&self, previous_total: Option<u64>, page: &CatalogPage) -> bool {
        page.total_count == 0 && previous_total.is_some_and(|total| total > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_only_counts_after_a_nonzero_one() {
        let empty = CatalogPage::default();
        assert!(!TotalCountDrop.is_expired(None, &empty));
        assert!(!TotalCountDrop.is_expired(Some(0), &empty));
        assert!(TotalCountDrop.is_expired(Some(120), &empty));

        let full = CatalogPage {
            total_count: 120,
            ..CatalogPage::default()
        };
        assert!(!TotalCountDrop.is_expired(Some(120), &full));
    }
}
