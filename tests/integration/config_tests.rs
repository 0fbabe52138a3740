//! Configuration loading from files

use leadscope::config::{load_config, load_config_with_hash};
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_full_config_file() {
    let file = config_file(
        r#"
[scanner]
fetch-timeout-secs = 5
user-agent = "LeadScopeTest/1.0"

[mail]
sender-name = "Jan Dvořák"
sender-company = "Weby Dvořák"
sender-email = "jan@weby.cz"
tracking-base-url = "https://crm.weby.cz"

[scheduler]
email-batch-size = 5
sequence-interval-secs = 120

[storage]
database-path = "/var/lib/leadscope/leads.db"

[server]
bind = "0.0.0.0:8080"
"#,
    );

    let (config, hash) = load_config_with_hash(file.path()).unwrap();

    assert_eq!(config.scanner.fetch_timeout_secs, 5);
    assert_eq!(config.mail.sender_company, "Weby Dvořák");
    assert_eq!(config.scheduler.email_batch_size, 5);
    assert_eq!(config.scheduler.sequence_interval_secs, 120);
    assert_eq!(config.scheduler.email_queue_interval_secs, 30);
    assert_eq!(config.storage.database_path, "/var/lib/leadscope/leads.db");
    assert_eq!(config.server.bind, "0.0.0.0:8080");
    assert_eq!(hash.len(), 64);
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = config_file("");
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.scanner.fetch_timeout_secs, 8);
    assert_eq!(config.scheduler.email_batch_size, 3);
    assert_eq!(config.scheduler.sequence_interval_secs, 300);
}

#[test]
fn test_invalid_values_rejected() {
    let file = config_file("[scheduler]\nemail-batch-size = 0\n");
    assert!(load_config(file.path()).is_err());
}

#[test]
fn test_missing_file() {
    assert!(load_config(std::path::Path::new("/nonexistent/leadscope.toml")).is_err());
}
