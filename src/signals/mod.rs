//! Signal extraction from raw page markup
//!
//! Every extractor here is a pure function over the fetched HTML string:
//! - `contact`: email addresses and Czech phone numbers
//! - `meta`: `<title>` and named `<meta>` content
//! - `tech`: CMS fingerprint, copyright year, outdated-technology markers,
//!   mobile-friendliness
//!
//! Malformed or partial markup never produces an error. A missing signal is
//! an empty list or `None`.

mod contact;
mod meta;
mod tech;

pub use contact::{extract_emails, extract_phones};
pub use meta::{extract_meta, extract_title};
pub use tech::{
    detect_cms, detect_copyright_year, detect_outdated_tech, is_mobile_friendly, CmsMatch,
    TechIssue,
};

/// All signals extracted from one page body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSignals {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_name: Option<String>,
    pub cms: Option<CmsMatch>,
    pub copyright_year: Option<i32>,
    pub outdated_tech: Vec<TechIssue>,
    pub mobile_friendly: bool,
}

/// Runs every extractor against one page body
pub fn extract_signals(html: &str) -> PageSignals {
    PageSignals {
        emails: extract_emails(html),
        phones: extract_phones(html),
        title: extract_title(html),
        description: extract_meta(html, "description"),
        site_name: extract_meta(html, "og:site_name"),
        cms: detect_cms(html),
        copyright_year: detect_copyright_year(html),
        outdated_tech: detect_outdated_tech(html),
        mobile_friendly: is_mobile_friendly(html),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_signals_on_empty_input() {
        let signals = extract_signals("");
        assert!(signals.emails.is_empty());
        assert!(signals.phones.is_empty());
        assert_eq!(signals.title, None);
        assert_eq!(signals.cms, None);
        assert_eq!(signals.copyright_year, None);
        assert!(!signals.mobile_friendly);
        assert_eq!(signals.outdated_tech, vec![TechIssue::MissingViewport]);
    }

    #[test]
    fn test_extract_signals_on_truncated_markup() {
        let html = r#"<html><head><title>Truhlářství Novák | Úvod</title><meta name="viewport" content="width=device-width"><body><p>info@truhlarstvi-novak.cz, tel. 603 123 456 <div"#;
        let signals = extract_signals(html);

        assert_eq!(signals.title.as_deref(), Some("Truhlářství Novák | Úvod"));
        assert_eq!(signals.emails, vec!["info@truhlarstvi-novak.cz"]);
        assert_eq!(signals.phones, vec!["+420603123456"]);
        assert!(signals.mobile_friendly);
        assert!(signals.outdated_tech.is_empty());
    }
}
