//! Deterministic destination paths and collision handling.
//!
//! # Design
//! - `destination_for` is pure: it reads only the item and the templates
//!   compiled at construction, so workers may share one organizer.
//! - Every placeholder value is sanitised as a single segment before it is
//!   substituted, so a `/` inside a title never adds a directory level.
//! - Collision checks take the occupancy test as a closure; callers combine
//!   the filesystem with destinations already planned in the run.

use std::path::{Path, PathBuf};

use astrofetch_config::FolderConfig;
use astrofetch_core::{CatalogItem, CollisionPolicy};
use tracing::{debug, warn};

use crate::error::FsOpsResult;
use crate::naming::{Sanitizer, format_label, object_name, url_filename};
use crate::template::{Placeholder, Template};

/// What to do with an item whose destination is considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionResolution {
    /// Nothing occupies the destination.
    Vacant,
    /// The destination is occupied; leave it and skip the item.
    Skip,
    /// The destination is occupied; replace it.
    Overwrite,
    /// The destination is occupied; write to this free sibling instead.
    Rename(PathBuf),
}

/// Maps catalog items to filesystem-safe destination paths.
#[derive(Debug, Clone)]
pub struct PathOrganizer {
    base: PathBuf,
    folder: Template,
    file: Template,
    sanitizer: Sanitizer,
}

impl PathOrganizer {
    /// Compile the templates and sanitiser.
    ///
    /// # Errors
    ///
    /// Returns an error when a template is malformed, names an unknown
    /// placeholder, or the sentinel or segment cap is unusable.
    pub fn new(
        base: impl Into<PathBuf>,
        folder_template: &str,
        filename_template: &str,
        unknown: &str,
        max_segment_len: usize,
    ) -> FsOpsResult<Self> {
        Ok(Self {
            base: base.into(),
            folder: Template::parse("template", folder_template)?,
            file: Template::parse("filename_template", filename_template)?,
            sanitizer: Sanitizer::new(max_segment_len, unknown)?,
        })
    }

    /// Build from the `folders` configuration section.
    ///
    /// # Errors
    ///
    /// Same as [`PathOrganizer::new`].
    pub fn from_config(config: &FolderConfig) -> FsOpsResult<Self> {
        Self::new(
            config.base_path.clone(),
            &config.template,
            &config.filename_template,
            &config.unknown,
            config.max_segment_len,
        )
    }

    /// Root all destinations live under.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Sanitised object name extracted from the item's title.
    #[must_use]
    pub fn object_for(&self, item: &CatalogItem) -> Option<String> {
        object_name(&item.title).map(|name| self.sanitizer.segment(&name))
    }

    /// Destination path for `item`.
    #[must_use]
    pub fn destination_for(&self, item: &CatalogItem) -> PathBuf {
        let resolve = |placeholder| self.sanitizer.segment(&self.raw_value(item, placeholder));

        let mut path = self.base.clone();
        let folders = self.folder.render(resolve);
        for segment in folders.split(['/', '\\']) {
            if segment.trim().is_empty() {
                continue;
            }
            path.push(self.sanitizer.segment(segment));
        }
        path.push(self.sanitizer.file_name(&self.file.render(resolve)));
        debug!(item_id = %item.item_id, destination = %path.display(), "destination resolved");
        path
    }

    /// Apply `policy` to `path`, treating any path for which `is_taken`
    /// returns true as occupied.
    ///
    /// `Rename` picks the lowest free `name (n).ext`, so the same occupancy
    /// always yields the same result.
    pub fn resolve_collision(
        &self,
        path: &Path,
        policy: CollisionPolicy,
        is_taken: impl Fn(&Path) -> bool,
    ) -> CollisionResolution {
        if !is_taken(path) {
            return CollisionResolution::Vacant;
        }
        match policy {
            CollisionPolicy::Skip => CollisionResolution::Skip,
            CollisionPolicy::Overwrite => CollisionResolution::Overwrite,
            CollisionPolicy::Rename => {
                let stem = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let extension = path
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default();
                (1..=u32::MAX)
                    .map(|counter| path.with_file_name(format!("{stem} ({counter}){extension}")))
                    .find(|candidate| !is_taken(candidate))
                    .map_or_else(
                        || {
                            warn!(path = %path.display(), "no free rename candidate; skipping");
                            CollisionResolution::Skip
                        },
                        CollisionResolution::Rename,
                    )
            }
        }
    }

    fn raw_value(&self, item: &CatalogItem, placeholder: Placeholder) -> String {
        let unknown = || self.sanitizer.unknown().to_string();
        let date = |pattern: &str| {
            item.captured_at
                .map_or_else(unknown, |captured| captured.format(pattern).to_string())
        };
        match placeholder {
            Placeholder::Object => object_name(&item.title).unwrap_or_else(unknown),
            Placeholder::Telescope => non_blank(&item.device_name).unwrap_or_else(unknown),
            Placeholder::Instrument => item
                .instrument
                .as_deref()
                .and_then(non_blank)
                .unwrap_or_else(unknown),
            Placeholder::Format => format_label(&self.source_file_name(item)).to_string(),
            Placeholder::Kind => non_blank(&item.media_kind)
                .map_or_else(unknown, |kind| kind.to_lowercase()),
            Placeholder::Filename => self.source_file_name(item),
            Placeholder::Title => non_blank(&item.title).unwrap_or_else(unknown),
            Placeholder::Mission if item.group_id != 0 => item.group_id.to_string(),
            Placeholder::Mission => unknown(),
            Placeholder::Date => date("%Y-%m-%d"),
            Placeholder::Year => date("%Y"),
            Placeholder::Month => date("%m"),
            Placeholder::Day => date("%d"),
            Placeholder::Id => item.item_id.clone(),
        }
    }

    fn source_file_name(&self, item: &CatalogItem) -> String {
        url_filename(&item.source_url).map_or_else(
            || {
                let kind = non_blank(&item.media_kind).unwrap_or_else(|| "jpg".to_string());
                self.sanitizer
                    .file_name(&format!("{}.{}", item.item_id, kind.to_lowercase()))
            },
            ToString::to_string,
        )
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
