//! Object names, URL filenames, and filesystem-safe segments.

use regex::Regex;

use crate::error::{FsOpsError, FsOpsResult};

const ILLEGAL_PATTERN: &str = r#"[<>:"/\\|?*\x00-\x1f]"#;
const WHITESPACE_PATTERN: &str = r"\s+";
const OBJECT_MAX_CHARS: usize = 50;
/// Common filesystem limit on one name, in bytes.
const NAME_MAX_BYTES: usize = 255;
/// Headroom for a ` (N)` rename counter and the `.part` staging suffix.
const NAME_RESERVED_BYTES: usize = 24;
const NAME_BYTE_BUDGET: usize = NAME_MAX_BYTES - NAME_RESERVED_BYTES;

/// Object name derived from a free-text title.
///
/// Titles carrying a catalogue designation (`Trifid Nebula (M20)`,
/// `M31 - Andromeda Galaxy`) are kept whole; otherwise the text before the
/// first comma wins, and long titles are cut to 50 characters.
pub(crate) fn object_name(title: &str) -> Option<String> {
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    if (title.contains('(') && title.contains(')')) || title.contains('-') {
        return Some(title.to_string());
    }
    if let Some((head, _)) = title.split_once(',') {
        let head = head.trim();
        if head.chars().count() > 2 {
            return Some(head.to_string());
        }
    }
    Some(title.chars().take(OBJECT_MAX_CHARS).collect())
}

/// Last path segment of `url`, without query or fragment.
pub(crate) fn url_filename(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Folder label for a file name's extension; unknown extensions are JPEG.
pub(crate) fn format_label(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".fits") || lower.ends_with(".fit") || lower.ends_with(".fts") {
        "FITS"
    } else if lower.ends_with(".png") {
        "PNG"
    } else {
        "JPEG"
    }
}

/// Replaces characters illegal on common filesystems and caps segment length.
///
/// Names are capped at `max_chars` characters and at a UTF-8 byte budget,
/// whichever is hit first.
#[derive(Debug, Clone)]
pub(crate) struct Sanitizer {
    illegal: Regex,
    whitespace: Regex,
    max_chars: usize,
    unknown: String,
}

impl Sanitizer {
    pub(crate) fn new(max_chars: usize, unknown: &str) -> FsOpsResult<Self> {
        if max_chars == 0 {
            return Err(FsOpsError::InvalidInput {
                field: "max_segment_len",
                reason: "must be positive",
                value: Some(max_chars.to_string()),
            });
        }
        let compile = |pattern: &'static str| {
            Regex::new(pattern).map_err(|source| FsOpsError::RegexCompile { pattern, source })
        };
        let sanitizer = Self {
            illegal: compile(ILLEGAL_PATTERN)?,
            whitespace: compile(WHITESPACE_PATTERN)?,
            max_chars,
            unknown: String::new(),
        };
        let unknown = sanitizer.clean(unknown);
        if unknown.is_empty() {
            return Err(FsOpsError::InvalidInput {
                field: "unknown",
                reason: "sentinel must survive sanitising",
                value: Some(unknown),
            });
        }
        Ok(Self {
            unknown,
            ..sanitizer
        })
    }

    /// Sentinel used for unresolved values.
    pub(crate) fn unknown(&self) -> &str {
        &self.unknown
    }

    /// One directory segment; never empty and never a relative component.
    pub(crate) fn segment(&self, raw: &str) -> String {
        let cleaned = self.clean(raw);
        let capped = trim_edges(truncate(&cleaned, self.max_chars, NAME_BYTE_BUDGET)).to_string();
        if capped.is_empty() {
            self.unknown.clone()
        } else {
            capped
        }
    }

    /// A file name; the extension survives length capping.
    pub(crate) fn file_name(&self, raw: &str) -> String {
        let cleaned = self.clean(raw);
        if cleaned.chars().count() <= self.max_chars && cleaned.len() <= NAME_BYTE_BUDGET {
            return if cleaned.is_empty() {
                self.unknown.clone()
            } else {
                cleaned
            };
        }
        match cleaned.rsplit_once('.') {
            Some((stem, ext))
                if !stem.is_empty()
                    && ext.chars().count() < self.max_chars
                    && ext.len() < NAME_BYTE_BUDGET =>
            {
                let chars = self.max_chars - ext.chars().count() - 1;
                let bytes = NAME_BYTE_BUDGET - ext.len() - 1;
                let stem = trim_edges(truncate(stem, chars, bytes)).to_string();
                let stem = if stem.is_empty() {
                    self.unknown.clone()
                } else {
                    stem
                };
                format!("{stem}.{ext}")
            }
            _ => self.segment(&cleaned),
        }
    }

    fn clean(&self, raw: &str) -> String {
        let replaced = self.illegal.replace_all(raw, "_");
        let collapsed = self.whitespace.replace_all(&replaced, " ");
        trim_edges(&collapsed).to_string()
    }
}

fn trim_edges(value: &str) -> &str {
    value.trim_matches(|c: char| c == '.' || c == ' ')
}

/// Longest prefix within both limits, cut on a character boundary.
fn truncate(value: &str, max_chars: usize, max_bytes: usize) -> &str {
    let end = value
        .char_indices()
        .take(max_chars)
        .map(|(index, c)| index + c.len_utf8())
        .take_while(|end| *end <= max_bytes)
        .last()
        .unwrap_or(0);
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_names_follow_title_shapes() {
        assert_eq!(object_name("Trifid Nebula (M20)").as_deref(), Some("Trifid Nebula (M20)"));
        assert_eq!(
            object_name("NGC 7000 - North America Nebula").as_deref(),
            Some("NGC 7000 - North America Nebula")
        );
        assert_eq!(object_name("Jupiter, with moons").as_deref(), Some("Jupiter"));
        assert_eq!(object_name("M1, crab").as_deref(), Some("M1, crab"));
        assert_eq!(object_name("   ").as_deref(), None);
        let long = "x".repeat(80);
        assert_eq!(object_name(&long).map(|name| name.len()), Some(50));
    }

    #[test]
    fn url_filenames_drop_query_and_fragment() {
        assert_eq!(
            url_filename("https://cdn.invalid/a/b/M42_001.fits?sig=1#frag"),
            Some("M42_001.fits")
        );
        assert_eq!(url_filename("https://cdn.invalid/a/"), None);
    }

    #[test]
    fn format_labels_default_to_jpeg() {
        assert_eq!(format_label("a.FIT"), "FITS");
        assert_eq!(format_label("a.png"), "PNG");
        assert_eq!(format_label("a.jpeg"), "JPEG");
        assert_eq!(format_label("a.webp"), "JPEG");
    }

    #[test]
    fn segments_are_cleaned_and_capped() -> FsOpsResult<()> {
        let sanitizer = Sanitizer::new(10, "Unknown")?;
        assert_eq!(sanitizer.segment("  a<b>:c  "), "a_b__c");
        assert_eq!(sanitizer.segment("tab\tand   space"), "tab and sp");
        assert_eq!(sanitizer.segment("..."), "Unknown");
        assert_eq!(sanitizer.segment("../../etc"), "_.._etc");
        assert_eq!(sanitizer.file_name("averyveryverylongname.fits"), "avery.fits");
        Ok(())
    }

    #[test]
    fn multibyte_names_fit_the_byte_budget() -> anyhow::Result<()> {
        let sanitizer = Sanitizer::new(120, "Unknown")?;
        let title = "オリオン大星雲".repeat(30);

        let segment = sanitizer.segment(&title);
        assert!(segment.len() <= NAME_BYTE_BUDGET);
        assert!(segment.len() + ".part".len() <= NAME_MAX_BYTES);
        assert!(title.starts_with(&segment));
        assert_eq!(segment.chars().count(), NAME_BYTE_BUDGET / 3);

        let name = sanitizer.file_name(&format!("{title}.png"));
        assert!(name.ends_with(".png"));
        assert!(name.len() <= NAME_BYTE_BUDGET);

        let dir = tempfile::TempDir::new()?;
        let nested = dir.path().join(&segment);
        std::fs::create_dir(&nested)?;
        std::fs::write(nested.join(format!("{name}.part")), b"x")?;
        Ok(())
    }

    #[test]
    fn ascii_names_keep_the_character_cap() -> FsOpsResult<()> {
        let sanitizer = Sanitizer::new(400, "Unknown")?;
        assert_eq!(sanitizer.segment(&"a".repeat(300)).len(), NAME_BYTE_BUDGET);
        assert_eq!(sanitizer.segment("short"), "short");
        Ok(())
    }

    #[test]
    fn unusable_settings_are_rejected() {
        assert!(matches!(
            Sanitizer::new(0, "Unknown"),
            Err(FsOpsError::InvalidInput {
                field: "max_segment_len",
                ..
            })
        ));
        assert!(matches!(
            Sanitizer::new(10, " .. "),
            Err(FsOpsError::InvalidInput { field: "unknown", .. })
        ));
    }
}
