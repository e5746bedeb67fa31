//! Per-run filter snapshot.
//!
//! # Design
//! - Immutable once the run starts; validated up front so a bad date range or
//!   empty pattern is rejected before any transfer is attempted.
//! - String matching is case-insensitive; needles are lowered once at
//!   validation time rather than per item.
//! - `evaluate` checks the date window before anything else and reports
//!   "older than the start date" distinctly, so a newest-first scan can stop
//!   at the first old item whatever else it would fail.
//! - Items without a capture timestamp skip the date window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::model::CatalogItem;

/// Filter applied to every catalog item before a transfer task is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Device (telescope) name substrings; an item passes when any matches.
    pub device_substrings: Vec<String>,
    /// Object name substring matched against the title.
    pub object_substring: Option<String>,
    /// Accepted media kinds; empty accepts all.
    pub media_kinds: Vec<String>,
    /// Inclusive lower bound on the capture date.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on the capture date.
    pub end_date: Option<NaiveDate>,
    /// Mission/group scope; 0 means all.
    pub group_id: u64,
}

/// Result of evaluating one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// The item passes every constraint.
    Accept,
    /// The item fails a constraint.
    Reject(FilterReason),
}

/// Constraint an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// No device substring matched.
    Device,
    /// The object substring did not match the title.
    Object,
    /// The media kind is not accepted.
    MediaKind,
    /// Captured before the start date.
    BeforeStart,
    /// Captured after the end date.
    AfterEnd,
}

impl FilterSpec {
    /// Check the filter for internal consistency and normalise its needles.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidFilter` when the date range is inverted or a
    /// pattern is blank.
    pub fn validate(mut self) -> CoreResult<Self> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && start > end
        {
            return Err(CoreError::InvalidFilter {
                field: "end_date",
                reason: "end date precedes start date",
                value: Some(end.to_string()),
            });
        }

        self.device_substrings = normalise_needles("device_substrings", self.device_substrings)?;
        self.media_kinds = normalise_needles("media_kinds", self.media_kinds)?;
        self.object_substring = match self.object_substring.take() {
            Some(needle) if needle.trim().is_empty() => {
                return Err(CoreError::InvalidFilter {
                    field: "object_substring",
                    reason: "pattern must not be blank",
                    value: None,
                });
            }
            Some(needle) => Some(needle.trim().to_lowercase()),
            None => None,
        };
        Ok(self)
    }

    /// Whether any date bound is configured.
    #[must_use]
    pub const fn has_date_range(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }

    /// Evaluate one item against the filter.
    ///
    /// Expects a filter returned by [`FilterSpec::validate`].
    #[must_use]
    pub fn evaluate(&self, item: &CatalogItem) -> FilterDecision {
        if let Some(day) = item.captured_at.map(|captured| captured.date_naive()) {
            if self.start_date.is_some_and(|start| day < start) {
                return FilterDecision::Reject(FilterReason::BeforeStart);
            }
            if self.end_date.is_some_and(|end| day > end) {
                return FilterDecision::Reject(FilterReason::AfterEnd);
            }
        }

        if !self.device_substrings.is_empty() {
            let device = item.device_name.to_lowercase();
            if !self
                .device_substrings
                .iter()
                .any(|needle| device.contains(needle.as_str()))
            {
                return FilterDecision::Reject(FilterReason::Device);
            }
        }

        if let Some(needle) = &self.object_substring
            && !item.title.to_lowercase().contains(needle.as_str())
        {
            return FilterDecision::Reject(FilterReason::Object);
        }

        if !self.media_kinds.is_empty() {
            let kind = item.media_kind.to_lowercase();
            if !self.media_kinds.iter().any(|accepted| *accepted == kind) {
                return FilterDecision::Reject(FilterReason::MediaKind);
            }
        }

        FilterDecision::Accept
    }
}

fn normalise_needles(field: &'static str, needles: Vec<String>) -> CoreResult<Vec<String>> {
    needles
        .into_iter()
        .map(|needle| {
            let trimmed = needle.trim();
            if trimmed.is_empty() {
                Err(CoreError::InvalidFilter {
                    field,
                    reason: "pattern must not be blank",
                    value: None,
                })
            } else {
                Ok(trimmed.to_lowercase())
            }
        })
        .collect()
}
