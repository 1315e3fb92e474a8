//! Configuration module for Review-Harvest
//!
//! Runtime settings come from the environment (optionally seeded from a `.env`
//! file). The catalogue of sources and their target URLs is a TOML file.
//!
//! # Example
//!
//! ```no_run
//! use review_harvest::config::{load_sources_or_default, Settings};
//!
//! let settings = Settings::from_env().unwrap();
//! let sources = load_sources_or_default(&settings.sources_config).unwrap();
//! println!("{} sources configured", sources.sources.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Settings, SourceCategory, SourceEntry, SourcesConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_sources, load_sources_or_default};
pub use validation::{validate_settings, validate_sources};
