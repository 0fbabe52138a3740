use scraper::{Html, Selector};

/// Extracts the first `<title>` text with runs of whitespace collapsed
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Extracts the `content` of the first `<meta>` whose `name` or `property` is `name`
///
/// Attribute order and the case of the attribute value don't matter, so
/// `<meta content="x" property="og:site_name">` is found as well.
pub fn extract_meta(html: &str, name: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let meta_selector = Selector::parse("meta[content]").ok()?;

    document
        .select(&meta_selector)
        .find(|element| {
            let el = element.value();
            [el.attr("name"), el.attr("property")]
                .into_iter()
                .flatten()
                .any(|value| value.trim().eq_ignore_ascii_case(name))
        })
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
