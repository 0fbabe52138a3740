//! Configuration module for LeadScope
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Secrets may also be supplied through the environment (`GOOGLE_API_KEY`,
//! `GOOGLE_CX`, `RESEND_API_KEY`), which wins over the file.
//!
//! # Example
//!
//! ```no_run
//! use leadscope::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("leadscope.toml")).unwrap();
//! println!("Fetch timeout: {}s", config.scanner.fetch_timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, MailConfig, ScannerConfig, SchedulerConfig, SearchConfig, ServerConfig, StorageConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, config_from_env, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;
