//! Shared types, error model, and configuration for paperscout.
//!
//! This crate is the foundation depended on by all other paperscout crates.
//! It provides:
//! - [`PaperScoutError`] — the unified error type
//! - Domain types ([`PaperRecord`], [`PaperIdentity`], [`Venue`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ModelConfig, SourcesConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_api_key, resolve_data_dir,
};
pub use error::{PaperScoutError, Result};
pub use types::{
    DEFAULT_YEARS, PaperIdentity, PaperRecord, Venue, normalize_title, parse_years,
};
