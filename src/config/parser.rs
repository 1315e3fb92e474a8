use crate::config::types::{Settings, SourcesConfig};
use crate::config::validation::{validate_settings, validate_sources};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::str::FromStr;

impl Settings {
    /// Loads settings from the process environment
    ///
    /// Variables that are unset or empty fall back to their defaults. A `.env`
    /// file should be loaded (see [`dotenvy::dotenv`]) before calling this.
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - Parsed and validated settings
    /// * `Err(ConfigError)` - A variable failed to parse or validate
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary key lookup
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the raw value for an environment key, if any
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let settings = Settings {
            max_concurrent: parse_var(&lookup, "MAX_CONCURRENT_REQUESTS", defaults.max_concurrent)?,
            delay_min: parse_var(&lookup, "REQUEST_DELAY_MIN", defaults.delay_min)?,
            delay_max: parse_var(&lookup, "REQUEST_DELAY_MAX", defaults.delay_max)?,
            rate_limit_rpm: parse_var(&lookup, "RATE_LIMIT_RPM", defaults.rate_limit_rpm)?,
            output_dir: parse_var(&lookup, "OUTPUT_DIR", defaults.output_dir)?,
            request_timeout: parse_var(&lookup, "REQUEST_TIMEOUT", defaults.request_timeout)?,
            max_retries: parse_var(&lookup, "MAX_RETRIES", defaults.max_retries)?,
            checkpoint_dir: parse_var(&lookup, "CHECKPOINT_DIR", defaults.checkpoint_dir)?,
            checkpoint_batch: parse_var(
                &lookup,
                "CHECKPOINT_BATCH_SIZE",
                defaults.checkpoint_batch,
            )?,
            min_review_length: parse_var(
                &lookup,
                "MIN_REVIEW_LENGTH",
                defaults.min_review_length,
            )?,
            max_review_length: parse_var(
                &lookup,
                "MAX_REVIEW_LENGTH",
                defaults.max_review_length,
            )?,
            user_agent: parse_var(&lookup, "USER_AGENT", defaults.user_agent)?,
            sources_config: parse_var::<_, PathBuf>(
                &lookup,
                "SOURCES_CONFIG",
                defaults.sources_config,
            )?,
        };

        validate_settings(&settings)?;

        Ok(settings)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw.clone(),
                })
        }
        _ => Ok(default),
    }
}

/// Loads and validates the source catalogue from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML source catalogue
///
/// # Returns
///
/// * `Ok(SourcesConfig)` - Successfully loaded and validated catalogue
/// * `Err(ConfigError)` - Failed to read, parse, or validate the catalogue
pub fn load_sources(path: &Path) -> Result<SourcesConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let sources: SourcesConfig = toml::from_str(&content)?;
    validate_sources(&sources)?;
    Ok(sources)
}

/// Loads the source catalogue, or an empty one when the file does not exist
pub fn load_sources_or_default(path: &Path) -> Result<SourcesConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No source catalogue at {}, using built-in defaults", path.display());
        return Ok(SourcesConfig::default());
    }
    load_sources(path)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_concurrent, 5);
        assert_eq!(settings.rate_limit_rpm, 20);
        assert_eq!(settings.checkpoint_batch, 100);
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("MAX_CONCURRENT_REQUESTS", "8"),
            ("REQUEST_DELAY_MIN", "0.5"),
            ("REQUEST_DELAY_MAX", "1.5"),
            ("RATE_LIMIT_RPM", "30"),
            ("OUTPUT_DIR", "/tmp/reviews"),
        ]))
        .unwrap();

        assert_eq!(settings.max_concurrent, 8);
        assert_eq!(settings.delay_min, 0.5);
        assert_eq!(settings.delay_max, 1.5);
        assert_eq!(settings.rate_limit_rpm, 30);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/reviews"));
    }

    #[test]
    fn test_blank_value_uses_default() {
        let settings = Settings::from_lookup(lookup_from(&[("RATE_LIMIT_RPM", "  ")])).unwrap();
        assert_eq!(settings.rate_limit_rpm, 20);
    }

    #[test]
    fn test_unparsable_value() {
        let result = Settings::from_lookup(lookup_from(&[("MAX_CONCURRENT_REQUESTS", "lots")]));
        match result {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "MAX_CONCURRENT_REQUESTS");
                assert_eq!(value, "lots");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_inverted_delays_rejected() {
        let result = Settings::from_lookup(lookup_from(&[
            ("REQUEST_DELAY_MIN", "5"),
            ("REQUEST_DELAY_MAX", "1"),
        ]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_valid_sources() {
        let file = create_temp_config(
            r#"
[sources.trustpilot]
enabled = true
rate-limit-rpm = 12

[[sources.trustpilot.categories]]
name = "retail"
urls = ["https://www.trustpilot.com/review/www.amazon.com"]

[[sources.trustpilot.categories]]
name = "travel"
urls = ["https://www.trustpilot.com/review/www.booking.com"]

[sources.steam]
enabled = false
"#,
        );

        let sources = load_sources(file.path()).unwrap();
        let trustpilot = sources.get("trustpilot").unwrap();
        assert_eq!(trustpilot.rate_limit_rpm, Some(12));
        assert_eq!(trustpilot.all_urls().len(), 2);
        assert!(!trustpilot.requires_browser);

        let enabled: Vec<_> = sources.enabled().map(|(name, _)| name).collect();
        assert_eq!(enabled, vec!["trustpilot"]);
    }

    #[test]
    fn test_load_sources_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(matches!(
            load_sources(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_sources_file_is_empty() {
        let sources = load_sources_or_default(Path::new("/nonexistent/sources.toml")).unwrap();
        assert!(sources.sources.is_empty());
    }

    #[test]
    fn test_shipped_catalogue_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/sources.toml");
        let sources = load_sources(&path).unwrap();

        for name in ["trustpilot", "sitejabber", "imdb", "steam"] {
            let entry = sources.get(name).unwrap();
            assert!(entry.enabled);
            assert!(!entry.all_urls().is_empty(), "{} has no URLs", name);
        }
        assert_eq!(sources.get("trustpilot").unwrap().rate_limit_rpm, Some(15));
    }

    #[test]
    fn test_compute_config_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        assert_eq!(hash1, compute_config_hash(file1.path()).unwrap());
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, compute_config_hash(file2.path()).unwrap());
    }
}
