//! Review sources
//!
//! Every supported site implements the [`Scraper`] trait: it knows how to turn
//! a user-supplied identifier into a target URL, how to parse one page of
//! reviews, and how to find the next page. Fetching is delegated to a
//! [`Fetch`] implementation so the same parser works behind the rate-limited
//! HTTP client or an external renderer.

pub mod html;
mod imdb;
mod sitejabber;
mod steam;
mod trustpilot;

pub use imdb::ImdbScraper;
pub use sitejabber::SitejabberScraper;
pub use steam::SteamScraper;
pub use trustpilot::TrustpilotScraper;

use crate::http::Fetch;
use crate::review::RawReview;
use crate::HarvestError;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Errors raised while parsing a fetched page
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Invalid JSON from {url}: {message}")]
    Json { url: String, message: String },

    #[error("Unexpected response from {url}: {message}")]
    Unexpected { url: String, message: String },
}

/// The sites Review-Harvest can scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Trustpilot,
    Sitejabber,
    Imdb,
    Steam,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Trustpilot,
        SourceKind::Sitejabber,
        SourceKind::Imdb,
        SourceKind::Steam,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Trustpilot => "trustpilot",
            Self::Sitejabber => "sitejabber",
            Self::Imdb => "imdb",
            Self::Steam => "steam",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Trustpilot => "Company reviews (trustpilot.com)",
            Self::Sitejabber => "Online business reviews (sitejabber.com)",
            Self::Imdb => "Movie and TV user reviews (imdb.com)",
            Self::Steam => "Game reviews via the Steam store API",
        }
    }

    /// Requests per minute the site tolerates by default
    pub fn default_rate_limit_rpm(&self) -> u32 {
        match self {
            Self::Trustpilot | Self::Sitejabber => 15,
            Self::Imdb | Self::Steam => 20,
        }
    }

    /// Whether pages only carry reviews after client-side rendering
    pub fn requires_browser(&self) -> bool {
        false
    }

    /// Example of the short identifier `resolve_target` accepts
    pub fn target_hint(&self) -> &'static str {
        match self {
            Self::Trustpilot => "company domain, e.g. www.amazon.com",
            Self::Sitejabber => "business domain, e.g. ebay.com",
            Self::Imdb => "title id, e.g. tt0111161",
            Self::Steam => "app id, e.g. 730",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == needle)
            .ok_or_else(|| HarvestError::UnknownSource(s.to_string()))
    }
}

/// One page to scrape within a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// The target this page belongs to
    pub target: Url,

    /// The URL to fetch for this page
    pub url: Url,

    /// 1-based page number within the target
    pub number: u32,
}

impl PageRequest {
    pub fn new(target: Url, url: Url, number: u32) -> Self {
        Self {
            target,
            url,
            number,
        }
    }

    /// The page following this one, at `url`
    pub fn next(&self, url: Url) -> Self {
        Self {
            target: self.target.clone(),
            url,
            number: self.number + 1,
        }
    }
}

/// The reviews found on one page and where to go next
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub reviews: Vec<RawReview>,
    pub next: Option<Url>,
}

/// A site-specific review scraper
#[async_trait]
pub trait Scraper: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Root URL of the site (or API) this scraper talks to
    fn base_url(&self) -> &Url;

    fn rate_limit_rpm(&self) -> u32 {
        self.kind().default_rate_limit_rpm()
    }

    fn requires_browser(&self) -> bool {
        self.kind().requires_browser()
    }

    /// Turns a full URL or a site-specific short identifier into a target URL
    fn resolve_target(&self, input: &str) -> crate::Result<Url>;

    /// URL of the first page of `target`
    fn first_page(&self, target: &Url) -> Url {
        target.clone()
    }

    /// Parses one fetched page
    ///
    /// Malformed review fragments are skipped; an error means the page as a
    /// whole could not be understood.
    fn parse_page(&self, body: &str, page: &PageRequest) -> Result<ScrapedPage, ParseError>;

    /// Next page to try when `page` could not be fetched or parsed
    ///
    /// Only sources with index-addressable pagination can answer this.
    fn fallback_next(&self, _page: &PageRequest) -> Option<Url> {
        None
    }

    /// Fetches and parses one page
    async fn scrape_page(
        &self,
        fetcher: &dyn Fetch,
        page: &PageRequest,
    ) -> crate::Result<ScrapedPage> {
        let body = fetcher.get_text(&page.url).await?;
        let scraped = self.parse_page(&body, page)?;
        tracing::debug!(
            "[{}] page {} of {}: {} reviews, next: {}",
            self.name(),
            page.number,
            page.target,
            scraped.reviews.len(),
            scraped
                .next
                .as_ref()
                .map(Url::as_str)
                .unwrap_or("none")
        );
        Ok(scraped)
    }
}

/// Builds the scraper for a source
pub fn build_scraper(kind: SourceKind) -> crate::Result<Box<dyn Scraper>> {
    let scraper: Box<dyn Scraper> = match kind {
        SourceKind::Trustpilot => Box::new(TrustpilotScraper::new()?),
        SourceKind::Sitejabber => Box::new(SitejabberScraper::new()?),
        SourceKind::Imdb => Box::new(ImdbScraper::new()?),
        SourceKind::Steam => Box::new(SteamScraper::new()?),
    };
    Ok(scraper)
}

fn invalid_target(kind: SourceKind, input: &str, reason: &str) -> HarvestError {
    HarvestError::InvalidTarget {
        site: kind.name().to_string(),
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_from_str() {
        assert_eq!("trustpilot".parse::<SourceKind>().unwrap(), SourceKind::Trustpilot);
        assert_eq!(" Steam ".parse::<SourceKind>().unwrap(), SourceKind::Steam);
        assert!(matches!(
            "yelp".parse::<SourceKind>(),
            Err(HarvestError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_name_roundtrip() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.name().parse::<SourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_registry_builds_every_source() {
        for kind in SourceKind::ALL {
            let scraper = build_scraper(kind).unwrap();
            assert_eq!(scraper.kind(), kind);
            assert_eq!(scraper.rate_limit_rpm(), kind.default_rate_limit_rpm());
            assert!(!scraper.requires_browser());
        }
    }

    #[test]
    fn test_page_request_next() {
        let target = Url::parse("https://example.com/reviews").unwrap();
        let first = PageRequest::new(target.clone(), target.clone(), 1);
        let second = first.next(Url::parse("https://example.com/reviews?page=2").unwrap());
        assert_eq!(second.number, 2);
        assert_eq!(second.target, target);
    }
}
