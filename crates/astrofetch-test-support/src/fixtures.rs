//! Sample catalog items.

use astrofetch_core::CatalogItem;
use chrono::{Duration, TimeZone, Utc};

/// Capture time of the newest fixture item.
#[must_use]
pub fn newest_capture() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 22, 15, 0)
        .single()
        .unwrap_or_default()
}

/// A single PNG item with a parenthesised object title.
#[must_use]
pub fn catalog_item(id: &str) -> CatalogItem {
    CatalogItem {
        item_id: id.to_string(),
        secondary_id: Some(format!("c{id}")),
        title: "Orion Nebula (M42)".to_string(),
        source_url: format!("https://images.example.invalid/{id}/image_{id}.png"),
        media_kind: "png".to_string(),
        group_id: 0,
        captured_at: Some(newest_capture()),
        device_name: "Canary Four".to_string(),
        instrument: None,
        position: 0,
    }
}

/// `count` items in newest-first order, one capture per day going back.
///
/// Titles alternate between a nebula and a galaxy so object filters have
/// something to split on.
#[must_use]
pub fn catalog_items(count: usize) -> Vec<CatalogItem> {
    (0..count)
        .map(|index| {
            let mut item = catalog_item(&format!("{}", 1_000 + index));
            item.position = index as u64;
            item.captured_at =
                Some(newest_capture() - Duration::days(i64::try_from(index).unwrap_or(i64::MAX)));
            if index % 2 == 1 {
                item.title = "Andromeda Galaxy (M31)".to_string();
            }
            item
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_are_newest_first_with_unique_ids() {
        let items = catalog_items(4);
        assert!(items.windows(2).all(|pair| pair[0].captured_at > pair[1].captured_at));
        let mut ids: Vec<_> = items.iter().map(|item| item.item_id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert_eq!(items[1].title, "Andromeda Galaxy (M31)");
    }
}
