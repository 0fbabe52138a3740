use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}").unwrap());

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

static PREFIXED_PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+420|00420)[\s\-.]*(\d{3})[\s\-.]*(\d{3})[\s\-.]*(\d{3})").unwrap()
});

/// Bare nine-digit number; the leading digit covers Czech landline (2-5) and mobile (6-7) ranges
static BARE_PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([2-7]\d{2})[\s\-.]+(\d{3})[\s\-.]+(\d{3})").unwrap());

/// Substrings that mark an address as a script, bundler or placeholder artifact
const BLOCKED_EMAIL_PARTS: &[&str] = &[
    "wixpress",
    "sentry",
    "webpack",
    "example",
    "email.com",
    "domain.com",
];

/// Asset names like `logo@2x.png` match the email shape
const BLOCKED_EMAIL_SUFFIXES: &[&str] = &[".png", ".jpg"];

/// Harvests email addresses from raw markup
///
/// Results keep first-seen order and contain no duplicates.
pub fn extract_emails(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    EMAIL_REGEX
        .find_iter(html)
        .map(|m| m.as_str())
        .filter(|email| {
            let lower = email.to_ascii_lowercase();
            !BLOCKED_EMAIL_PARTS.iter().any(|part| lower.contains(part))
                && !BLOCKED_EMAIL_SUFFIXES
                    .iter()
                    .any(|suffix| lower.ends_with(suffix))
        })
        .filter(|email| seen.insert(email.to_string()))
        .map(str::to_string)
        .collect()
}

/// Harvests Czech phone numbers from markup
///
/// Tags are replaced with spaces first so numeric attribute values never
/// match. Numbers with an explicit `+420`/`00420` prefix are collected
/// before bare nine-digit groups. Every result is canonicalized to
/// `+420XXXXXXXXX` and duplicates are dropped.
pub fn extract_phones(html: &str) -> Vec<String> {
    let text = TAG_REGEX.replace_all(html, " ");
    let mut seen = HashSet::new();
    let mut phones = Vec::new();

    let mut push = |a: &str, b: &str, c: &str| {
        let phone = format!("+420{}{}{}", a, b, c);
        if seen.insert(phone.clone()) {
            phones.push(phone);
        }
    };

    for caps in PREFIXED_PHONE_REGEX.captures_iter(&text) {
        push(&caps[1], &caps[2], &caps[3]);
    }

    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(caps) = BARE_PHONE_REGEX.captures_at(&text, start) {
        let Some(whole) = caps.get(0) else { break };

        let digit_before = whole.start() > 0 && bytes[whole.start() - 1].is_ascii_digit();
        let digit_after = bytes.get(whole.end()).is_some_and(|b| b.is_ascii_digit());

        if digit_before || digit_after {
            // Retry one byte later; the matched span starts with an ASCII digit
            start = whole.start() + 1;
            continue;
        }

        push(&caps[1], &caps[2], &caps[3]);
        start = whole.end();
    }

    phones
}
