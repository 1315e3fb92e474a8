//! Small helpers shared by the HTML parsers

use crate::sources::ParseError;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Selector};
use url::Url;

/// Parses a CSS selector, mapping failures into [`ParseError`]
pub fn parse_selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

/// Text content of an element with whitespace collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first descendant matching any of `selectors`, tried in order
///
/// Empty matches are skipped, so a fallback selector still gets a chance when
/// the primary one matches an empty placeholder element.
pub fn first_text(element: ElementRef<'_>, selectors: &[&Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        element
            .select(selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// Attribute value of the first descendant matching `selector`
pub fn first_attr(element: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .find_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses a leading number out of strings like `"4"`, `"8/10"` or `"4.5 stars"`
pub fn parse_leading_number(raw: &str) -> Option<f32> {
    let number: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    number.parse::<f32>().ok()
}

/// Parses an RFC 3339 timestamp (as found in `<time datetime>`)
pub fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses a calendar date in any of `formats`, at midnight UTC
pub fn parse_date(raw: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    formats.iter().find_map(|format| {
        NaiveDate::parse_from_str(raw, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Returns `url` with query parameter `key` set to `value`, replacing any previous value
pub fn with_query_param(url: &Url, key: &str, value: &str) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut updated = url.clone();
    {
        let mut pairs = updated.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(key, value);
    }
    updated
}

/// Interprets `input` as an absolute http(s) URL, if it is one
pub fn as_http_url(input: &str) -> Option<Url> {
    Url::parse(input.trim())
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use scraper::Html;

    #[test]
    fn test_first_text_falls_back() {
        let html = Html::parse_fragment(
            r#"<div><p class="primary">  </p><p class="fallback">Hello
            world</p></div>"#,
        );
        let primary = parse_selector("p.primary").unwrap();
        let fallback = parse_selector("p.fallback").unwrap();
        let root = html.root_element();
        assert_eq!(
            first_text(root, &[&primary, &fallback]),
            Some("Hello world".to_string())
        );
    }

    #[test]
    fn test_first_attr() {
        let html = Html::parse_fragment(r#"<div><time datetime="2024-01-02T03:04:05Z">x</time></div>"#);
        let selector = parse_selector("time[datetime]").unwrap();
        assert_eq!(
            first_attr(html.root_element(), &selector, "datetime"),
            Some("2024-01-02T03:04:05Z".to_string())
        );
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(
            parse_selector("div[["),
            Err(ParseError::Selector { .. })
        ));
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("8/10"), Some(8.0));
        assert_eq!(parse_leading_number(" 4,5 stars"), Some(4.5));
        assert_eq!(parse_leading_number("n/a"), None);
    }

    #[test]
    fn test_parse_dates() {
        let dt = parse_rfc3339("2024-02-29T10:15:00.000Z").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2024, 2, 29, 10));

        let formats = ["%d %B %Y", "%B %d, %Y"];
        let a = parse_date("5 March 2021", &formats).unwrap();
        let b = parse_date("March 5, 2021", &formats).unwrap();
        assert_eq!(a, b);
        assert!(parse_date("yesterday", &formats).is_none());
    }

    #[test]
    fn test_with_query_param_replaces() {
        let url = Url::parse("https://example.com/review/x?page=2&sort=recent").unwrap();
        let next = with_query_param(&url, "page", "3");
        assert_eq!(next.as_str(), "https://example.com/review/x?sort=recent&page=3");
    }

    #[test]
    fn test_as_http_url() {
        assert!(as_http_url("https://example.com/a").is_some());
        assert!(as_http_url("example.com").is_none());
        assert!(as_http_url("mailto:someone@example.com").is_none());
    }
}
