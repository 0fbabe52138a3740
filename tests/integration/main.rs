//! Integration tests for LeadScope
//!
//! HTTP collaborators (scanned sites, the search provider, the email
//! provider) are mocked with wiremock; storage is in-memory SQLite.

mod api_tests;
mod config_tests;
mod mail_tests;
mod scanner_tests;
mod sequence_tests;
