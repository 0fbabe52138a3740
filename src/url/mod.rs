//! URL handling module for LeadScope
//!
//! Scan targets arrive as loosely typed strings ("example.cz",
//! "www.example.cz/kontakt", "http://example.cz"). This module turns them
//! into absolute URLs, switches schemes for the HTTPS-first fetch policy and
//! derives the bare domain used to key contacts.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{domain_of, extract_domain};
pub use normalize::{normalize_target, with_scheme};
