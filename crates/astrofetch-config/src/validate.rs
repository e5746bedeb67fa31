//! Field validation for configuration documents.

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;

const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

impl AppConfig {
    /// Reject documents that cannot drive a run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidField` naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_url("catalog", "base_url", &self.catalog.base_url)?;
        ensure_positive("catalog", "page_size", u64::from(self.catalog.page_size))?;
        ensure_positive(
            "catalog",
            "request_timeout_secs",
            self.catalog.request_timeout_secs,
        )?;

        if self.folders.base_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                "folders",
                "base_path",
                None,
                "must not be empty",
            ));
        }
        validate_template("folders", "template", &self.folders.template)?;
        validate_template(
            "folders",
            "filename_template",
            &self.folders.filename_template,
        )?;
        if self.folders.filename_template.contains(['/', '\\']) {
            return Err(ConfigError::invalid(
                "folders",
                "filename_template",
                Some(self.folders.filename_template.clone()),
                "must not contain path separators",
            ));
        }
        if self.folders.unknown.trim().is_empty() {
            return Err(ConfigError::invalid(
                "folders",
                "unknown",
                None,
                "must not be blank",
            ));
        }
        ensure_positive("folders", "max_segment_len", self.folders.max_segment_len as u64)?;

        let download = &self.download;
        ensure_positive("download", "batch_size", download.batch_size as u64)?;
        ensure_positive("download", "workers", download.workers as u64)?;
        ensure_positive("download", "max_retries", u64::from(download.max_retries))?;
        ensure_positive("download", "timeout_secs", download.timeout_secs)?;
        if download.rate_limit > 0 {
            ensure_positive("download", "rate_window_secs", download.rate_window_secs)?;
        }

        if self.tracking.tracker_file.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                "tracking",
                "tracker_file",
                None,
                "must not be empty",
            ));
        }

        if let Some(format) = &self.logging.format
            && !LOG_FORMATS.contains(&format.as_str())
        {
            return Err(ConfigError::invalid(
                "logging",
                "format",
                Some(format.clone()),
                "must be pretty or json",
            ));
        }

        Ok(())
    }
}

fn ensure_positive(section: &'static str, field: &'static str, value: u64) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "must be positive",
        ));
    }
    Ok(())
}

fn validate_url(section: &'static str, field: &'static str, value: &str) -> ConfigResult<()> {
    let parsed = Url::parse(value).map_err(|_| {
        ConfigError::invalid(section, field, Some(value.to_string()), "must be a URL")
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            section,
            field,
            Some(value.to_string()),
            "scheme must be http or https",
        ));
    }
    Ok(())
}

/// Check placeholder syntax: braces balanced and names non-empty.
pub(crate) fn validate_template(
    section: &'static str,
    field: &'static str,
    template: &str,
) -> ConfigResult<()> {
    let invalid = |reason| ConfigError::invalid(section, field, Some(template.to_string()), reason);

    if template.trim().is_empty() {
        return Err(invalid("must not be blank"));
    }

    let mut open: Option<usize> = None;
    for (index, ch) in template.char_indices() {
        match (ch, open) {
            ('{', None) => open = Some(index),
            ('{', Some(_)) => return Err(invalid("nested placeholder")),
            ('}', None) => return Err(invalid("unbalanced braces")),
            ('}', Some(start)) => {
                let name = &template[start + 1..index];
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(invalid("malformed placeholder"));
                }
                open = None;
            }
            _ => {}
        }
    }
    if open.is_some() {
        return Err(invalid("unbalanced braces"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() -> ConfigResult<()> {
        AppConfig::default().validate()
    }

    #[test]
    fn zero_workers_are_rejected() {
        let mut config = AppConfig::default();
        config.download.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                section: "download",
                field: "workers",
                ..
            })
        ));
    }

    #[test]
    fn rate_limit_zero_allows_zero_window() -> ConfigResult<()> {
        let mut config = AppConfig::default();
        config.download.rate_limit = 0;
        config.download.rate_window_secs = 0;
        config.validate()
    }

    #[test]
    fn templates_must_be_balanced() {
        assert!(validate_template("folders", "template", "{object}/{telescope").is_err());
        assert!(validate_template("folders", "template", "object}/x").is_err());
        assert!(validate_template("folders", "template", "{}/x").is_err());
        assert!(validate_template("folders", "template", "{a{b}}").is_err());
        assert!(validate_template("folders", "template", "{object}/{year}-{month}").is_ok());
    }

    #[test]
    fn filename_template_rejects_separators() {
        let mut config = AppConfig::default();
        config.folders.filename_template = "{object}/{filename}".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn base_url_requires_http_scheme() {
        let mut config = AppConfig::default();
        config.catalog.base_url = "ftp://example.invalid".into();
        assert!(config.validate().is_err());
        config.catalog.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut config = AppConfig::default();
        config.logging.format = Some("xml".into());
        assert!(config.validate().is_err());
    }
}
