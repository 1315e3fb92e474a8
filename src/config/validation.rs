use crate::config::types::{Settings, SourceEntry, SourcesConfig};
use crate::ConfigError;
use url::Url;

/// Validates runtime settings
pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.max_concurrent < 1 || settings.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "MAX_CONCURRENT_REQUESTS must be between 1 and 100, got {}",
            settings.max_concurrent
        )));
    }

    if !settings.delay_min.is_finite() || settings.delay_min < 0.0 {
        return Err(ConfigError::Validation(format!(
            "REQUEST_DELAY_MIN must be >= 0, got {}",
            settings.delay_min
        )));
    }

    if !settings.delay_max.is_finite() || settings.delay_max < settings.delay_min {
        return Err(ConfigError::Validation(format!(
            "REQUEST_DELAY_MAX must be >= REQUEST_DELAY_MIN ({}), got {}",
            settings.delay_min, settings.delay_max
        )));
    }

    if settings.rate_limit_rpm < 1 || settings.rate_limit_rpm > 600 {
        return Err(ConfigError::Validation(format!(
            "RATE_LIMIT_RPM must be between 1 and 600, got {}",
            settings.rate_limit_rpm
        )));
    }

    if settings.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "REQUEST_TIMEOUT must be at least 1 second".to_string(),
        ));
    }

    if settings.checkpoint_batch < 1 {
        return Err(ConfigError::Validation(
            "CHECKPOINT_BATCH_SIZE must be >= 1".to_string(),
        ));
    }

    if settings.min_review_length > settings.max_review_length {
        return Err(ConfigError::Validation(format!(
            "MIN_REVIEW_LENGTH ({}) cannot exceed MAX_REVIEW_LENGTH ({})",
            settings.min_review_length, settings.max_review_length
        )));
    }

    if settings.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "USER_AGENT cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the source catalogue
pub fn validate_sources(sources: &SourcesConfig) -> Result<(), ConfigError> {
    for (name, entry) in &sources.sources {
        validate_source_entry(name, entry)?;
    }
    Ok(())
}

fn validate_source_entry(name: &str, entry: &SourceEntry) -> Result<(), ConfigError> {
    if let Some(rpm) = entry.rate_limit_rpm {
        if !(1..=100).contains(&rpm) {
            return Err(ConfigError::Validation(format!(
                "Source '{}': rate-limit-rpm must be between 1 and 100, got {}",
                name, rpm
            )));
        }
    }

    for category in &entry.categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Source '{}' has a category with an empty name",
                name
            )));
        }

        for raw in &category.urls {
            let url = Url::parse(raw).map_err(|e| {
                ConfigError::InvalidUrl(format!("Source '{}': '{}': {}", name, raw, e))
            })?;

            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(ConfigError::Validation(format!(
                    "Source '{}': URL '{}' must use http or https",
                    name, raw
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::SourceCategory;
    use std::collections::BTreeMap;

    fn create_test_entry(urls: Vec<&str>) -> SourceEntry {
        SourceEntry {
            enabled: true,
            rate_limit_rpm: Some(15),
            requires_browser: false,
            categories: vec![SourceCategory {
                name: "general".to_string(),
                urls: urls.into_iter().map(String::from).collect(),
            }],
        }
    }

    fn catalogue(entry: SourceEntry) -> SourcesConfig {
        let mut sources = BTreeMap::new();
        sources.insert("trustpilot".to_string(), entry);
        SourcesConfig { sources }
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(validate_settings(&Settings::default()).is_ok());
    }

    #[test]
    fn test_zero_concurrency() {
        let settings = Settings {
            max_concurrent: 0,
            ..Settings::default()
        };
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rpm_out_of_range() {
        let settings = Settings {
            rate_limit_rpm: 0,
            ..Settings::default()
        };
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_equal_delays_allowed() {
        let settings = Settings {
            delay_min: 0.0,
            delay_max: 0.0,
            ..Settings::default()
        };
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_length_bounds_inverted() {
        let settings = Settings {
            min_review_length: 500,
            max_review_length: 100,
            ..Settings::default()
        };
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_valid_source_entry() {
        let sources = catalogue(create_test_entry(vec![
            "https://www.trustpilot.com/review/example.com",
        ]));
        assert!(validate_sources(&sources).is_ok());
    }

    #[test]
    fn test_source_rpm_out_of_range() {
        let mut entry = create_test_entry(vec![]);
        entry.rate_limit_rpm = Some(500);
        assert!(validate_sources(&catalogue(entry)).is_err());
    }

    #[test]
    fn test_source_bad_url() {
        let sources = catalogue(create_test_entry(vec!["not a url"]));
        assert!(matches!(
            validate_sources(&sources),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_source_non_http_scheme() {
        let sources = catalogue(create_test_entry(vec!["ftp://example.com/reviews"]));
        assert!(matches!(
            validate_sources(&sources),
            Err(ConfigError::Validation(_))
        ));
    }
}
