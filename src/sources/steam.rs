use crate::review::RawReview;
use crate::sources::html::{as_http_url, with_query_param};
use crate::sources::{invalid_target, PageRequest, ParseError, ScrapedPage, Scraper, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

const BASE_URL: &str = "https://store.steampowered.com/";

const MIN_TEXT_CHARS: usize = 10;

/// Fixed query parameters of the review API, `cursor` excluded
const API_PARAMS: [(&str, &str); 6] = [
    ("json", "1"),
    ("language", "english"),
    ("filter", "recent"),
    ("review_type", "all"),
    ("purchase_type", "all"),
    ("num_per_page", "100"),
];

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: serde_json::Value,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    reviews: Vec<ApiReview>,
}

#[derive(Debug, Deserialize)]
struct ApiReview {
    #[serde(default)]
    recommendationid: Option<String>,
    #[serde(default)]
    author: ApiAuthor,
    #[serde(default)]
    review: String,
    #[serde(default)]
    timestamp_created: Option<i64>,
    #[serde(default = "default_voted_up")]
    voted_up: bool,
    #[serde(default)]
    votes_up: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiAuthor {
    #[serde(default)]
    steamid: Option<String>,
    /// Lifetime playtime in minutes
    #[serde(default)]
    playtime_forever: u64,
}

fn default_voted_up() -> bool {
    true
}

fn is_success(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// Scraper for game reviews from the Steam store review API
///
/// Targets are `appreviews/<app id>` URLs; pages are addressed by the
/// opaque `cursor` the API returns with each batch.
pub struct SteamScraper {
    base_url: Url,
}

impl SteamScraper {
    pub fn new() -> crate::Result<Self> {
        Self::with_base_url(Url::parse(BASE_URL)?)
    }

    pub fn with_base_url(base_url: Url) -> crate::Result<Self> {
        Ok(Self { base_url })
    }

    fn api_url(target: &Url, cursor: &str) -> Url {
        let mut url = target.clone();
        url.set_query(None);
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in API_PARAMS {
                pairs.append_pair(key, value);
            }
        }
        with_query_param(&url, "cursor", cursor)
    }

    fn convert(review: ApiReview) -> Option<RawReview> {
        let text = review.review.trim();
        if text.chars().count() < MIN_TEXT_CHARS {
            return None;
        }

        let hours = review.author.playtime_forever as f64 / 60.0;
        let text = if hours > 1.0 {
            format!("[{:.1} hours played]\n\n{}", hours, text)
        } else {
            text.to_string()
        };

        let rating = if review.voted_up { 5.0 } else { 1.0 };
        let date = review
            .timestamp_created
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

        Some(
            RawReview::new(text)
                .with_rating(Some(rating))
                .with_date(date)
                .with_author(review.author.steamid)
                .with_source_id(review.recommendationid)
                .with_helpful_count(review.votes_up),
        )
    }
}

/// Extracts the app id from a bare number or a `/app/<id>` / `/appreviews/<id>` URL
fn extract_app_id(input: &str) -> Option<String> {
    let input = input.trim();
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        return Some(input.to_string());
    }

    let url = as_http_url(input)?;
    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "app" || segment == "appreviews" {
            return segments
                .next()
                .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
                .map(str::to_string);
        }
    }
    None
}

#[async_trait]
impl Scraper for SteamScraper {
    fn kind(&self) -> SourceKind {
        SourceKind::Steam
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve_target(&self, input: &str) -> crate::Result<Url> {
        let app_id = extract_app_id(input).ok_or_else(|| {
            invalid_target(self.kind(), input, "expected an app id or a store URL with /app/<id>")
        })?;
        Ok(self.base_url.join(&format!("appreviews/{}", app_id))?)
    }

    fn first_page(&self, target: &Url) -> Url {
        Self::api_url(target, "*")
    }

    fn parse_page(&self, body: &str, page: &PageRequest) -> Result<ScrapedPage, ParseError> {
        let response: ApiResponse = serde_json::from_str(body).map_err(|e| ParseError::Json {
            url: page.url.to_string(),
            message: e.to_string(),
        })?;

        if !is_success(&response.success) {
            return Err(ParseError::Unexpected {
                url: page.url.to_string(),
                message: "review API reported success = false".to_string(),
            });
        }

        let batch_size = response.reviews.len();
        let reviews: Vec<RawReview> = response
            .reviews
            .into_iter()
            .filter_map(Self::convert)
            .collect();

        let current_cursor = page
            .url
            .query_pairs()
            .find(|(k, _)| k == "cursor")
            .map(|(_, v)| v.into_owned());

        let next = response
            .cursor
            .filter(|cursor| !cursor.is_empty() && batch_size > 0)
            .filter(|cursor| current_cursor.as_deref() != Some(cursor.as_str()))
            .map(|cursor| Self::api_url(&page.target, &cursor));

        Ok(ScrapedPage { reviews, next })
    }
}
