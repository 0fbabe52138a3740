use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

static WORDPRESS_VERSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ver=(\d+\.\d+[.\d]*)").unwrap());

static COPYRIGHT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:©|&copy;|copyright)\s*(\d{4})").unwrap());

const MIN_COPYRIGHT_YEAR: i32 = 2000;
const MAX_COPYRIGHT_YEAR: i32 = 2030;

/// More `<table` tags than this (without a data-table widget) reads as a table layout
const TABLE_LAYOUT_THRESHOLD: usize = 5;

/// Platform signatures checked in order; the first hit wins
const CMS_SIGNATURES: &[(&str, &[&str])] = &[
    ("WordPress", &["wp-content", "wordpress"]),
    ("Joomla", &["joomla"]),
    ("Drupal", &["drupal"]),
    ("Shoptet", &["shoptet"]),
    ("Shopify", &["shopify"]),
    ("Wix", &["wix.com", "wixsite"]),
    ("Squarespace", &["squarespace"]),
    ("Webnode", &["webnode"]),
    ("Eshop-rychle", &["eshop-rychle"]),
    ("PrestaShop", &["prestashop"]),
    ("Magento", &["magento"]),
    ("OpenCart", &["opencart"]),
    ("WebAreal", &["webareal"]),
    ("SolidPixels", &["solid-pixels", "solidpixels"]),
];

/// A detected site platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmsMatch {
    pub name: &'static str,

    /// Only WordPress exposes a version, through asset `ver=` query strings
    pub version: Option<String>,
}

/// An outdated-technology finding
///
/// Each variant is an independent check; a page may trigger several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechIssue {
    JQuery1,
    Bootstrap3,
    Bootstrap2,
    FontAwesome4,
    MissingViewport,
    Flash,
    TableLayout,
}

impl TechIssue {
    /// User-facing label, as shown to sales operators and in email templates
    pub fn label(&self) -> &'static str {
        match self {
            Self::JQuery1 => "jQuery 1.x",
            Self::Bootstrap3 => "Bootstrap 3",
            Self::Bootstrap2 => "Bootstrap 2",
            Self::FontAwesome4 => "FontAwesome 4",
            Self::MissingViewport => "Chybí viewport meta",
            Self::Flash => "Flash",
            Self::TableLayout => "Tabulkový layout",
        }
    }
}

impl fmt::Display for TechIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for TechIssue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Fingerprints the site platform from markup substrings
pub fn detect_cms(html: &str) -> Option<CmsMatch> {
    let lower = html.to_lowercase();

    let &(name, _) = CMS_SIGNATURES
        .iter()
        .find(|(_, markers)| markers.iter().any(|marker| lower.contains(marker)))?;

    let version = if name == "WordPress" {
        WORDPRESS_VERSION_REGEX
            .captures(html)
            .map(|caps| caps[1].to_string())
    } else {
        None
    };

    Some(CmsMatch { name, version })
}

/// Returns the latest plausible year following a copyright marker
///
/// Accepts `©`, `&copy;` and `copyright` (any case). Years outside
/// 2000..=2030 are ignored.
pub fn detect_copyright_year(html: &str) -> Option<i32> {
    COPYRIGHT_REGEX
        .captures_iter(html)
        .filter_map(|caps| caps[1].parse::<i32>().ok())
        .filter(|year| (MIN_COPYRIGHT_YEAR..=MAX_COPYRIGHT_YEAR).contains(year))
        .max()
}

/// Runs every outdated-technology check and returns all hits in check order
pub fn detect_outdated_tech(html: &str) -> Vec<TechIssue> {
    let lower = html.to_lowercase();
    let has = |needle: &str| lower.contains(needle);
    let mut issues = Vec::new();

    if has("jquery/1.") || has("jquery-1.") || has("jquery.min.js?v=1") {
        issues.push(TechIssue::JQuery1);
    }
    if has("bootstrap/3.") || has("bootstrap-3.") {
        issues.push(TechIssue::Bootstrap3);
    }
    if has("bootstrap/2.") {
        issues.push(TechIssue::Bootstrap2);
    }
    if has("font-awesome/4.") {
        issues.push(TechIssue::FontAwesome4);
    }
    if !has("viewport") {
        issues.push(TechIssue::MissingViewport);
    }
    if has("swfobject") || has(".swf") || has("shockwave-flash") {
        issues.push(TechIssue::Flash);
    }
    if lower.matches("<table").count() > TABLE_LAYOUT_THRESHOLD && !has("datatable") {
        issues.push(TechIssue::TableLayout);
    }

    issues
}

/// A page counts as mobile-friendly when it declares a viewport
pub fn is_mobile_friendly(html: &str) -> bool {
    html.to_lowercase().contains("viewport")
}
