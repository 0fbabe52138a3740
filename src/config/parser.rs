use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variables that override secrets from the file
const ENV_SEARCH_API_KEY: &str = "GOOGLE_API_KEY";
const ENV_SEARCH_ENGINE_ID: &str = "GOOGLE_CX";
const ENV_MAIL_API_KEY: &str = "RESEND_API_KEY";

/// Loads and parses a configuration file from the given path
///
/// Secrets present in the environment replace the file values before
/// validation runs.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    validate(&config)?;

    Ok(config)
}

/// Parses and validates configuration from a TOML string
///
/// Unlike [`load_config`], the environment is not consulted.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Builds the default configuration with environment secrets applied
///
/// Used when no configuration file is given.
pub fn config_from_env() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate(&config)?;
    Ok(config)
}

/// Replaces secrets with values looked up through `lookup`
fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty(ENV_SEARCH_API_KEY) {
        config.search.api_key = Some(key);
    }
    if let Some(cx) = non_empty(ENV_SEARCH_ENGINE_ID) {
        config.search.engine_id = Some(cx);
    }
    if let Some(key) = non_empty(ENV_MAIL_API_KEY) {
        config.mail.api_key = Some(key);
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so operators can tell which configuration a running
/// instance was started with.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
