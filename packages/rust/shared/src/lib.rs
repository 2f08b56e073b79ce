//! Shared types, error model, and configuration for mdharvest.
//!
//! This crate is the foundation depended on by all other mdharvest crates.
//! It provides:
//! - [`HarvestError`] — the unified error type
//! - Domain types ([`Document`], [`FetchStatus`], [`MetadataRecord`], [`LedgerStatus`])
//! - URL helpers ([`parse_article_url`], [`domain_slug`])
//! - Configuration ([`AppConfig`], [`HarvestConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod domain;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_USER_AGENT, DefaultsConfig, FetchConfig, HarvestConfig, HttpConfig,
    MarkdownConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use domain::{domain_slug, parse_article_url};
pub use error::{HarvestError, Result};
pub use types::{Document, FetchStatus, LEDGER_FIELDS, LedgerStatus, MetadataRecord};
