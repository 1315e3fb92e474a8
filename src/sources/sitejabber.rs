use crate::review::RawReview;
use crate::sources::html::{
    as_http_url, element_text, first_attr, first_text, parse_rfc3339, parse_selector,
};
use crate::sources::{invalid_target, PageRequest, ParseError, ScrapedPage, Scraper, SourceKind};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const BASE_URL: &str = "https://www.sitejabber.com/";

struct Selectors {
    card: Selector,
    body: Selector,
    body_fallback: Selector,
    title: Selector,
    rating: Selector,
    star: Selector,
    date: Selector,
    author: Selector,
    next: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ParseError> {
        Ok(Self {
            card: parse_selector("div.review")?,
            body: parse_selector("div.review__body")?,
            body_fallback: parse_selector("p.review__text")?,
            title: parse_selector("h3.review__title")?,
            rating: parse_selector("div.review__rating")?,
            star: parse_selector("i.star--filled, i.icon-star")?,
            date: parse_selector("time.review__date[datetime]")?,
            author: parse_selector("span.review__author-name")?,
            next: parse_selector("a.pagination__next[href]")?,
        })
    }
}

/// Scraper for business reviews on Sitejabber
pub struct SitejabberScraper {
    base_url: Url,
    selectors: Selectors,
}

impl SitejabberScraper {
    pub fn new() -> crate::Result<Self> {
        Self::with_base_url(Url::parse(BASE_URL)?)
    }

    pub fn with_base_url(base_url: Url) -> crate::Result<Self> {
        Ok(Self {
            base_url,
            selectors: Selectors::new()?,
        })
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Option<RawReview> {
        let s = &self.selectors;

        let text = first_text(card, &[&s.body, &s.body_fallback])?;
        let title = first_text(card, &[&s.title]);

        // Ratings are drawn as a row of filled star icons.
        let rating = card.select(&s.rating).next().and_then(|rating| {
            let stars = rating.select(&s.star).count();
            (stars > 0).then_some(stars as f32)
        });

        let date = first_attr(card, &s.date, "datetime").and_then(|d| parse_rfc3339(&d));
        let author = card.select(&s.author).next().map(element_text);
        let source_id = card
            .value()
            .attr("data-review-id")
            .or_else(|| card.value().attr("id"))
            .map(str::to_string);

        Some(
            RawReview::new(text)
                .with_title(title)
                .with_rating(rating)
                .with_date(date)
                .with_author(author)
                .with_source_id(source_id),
        )
    }
}

#[async_trait]
impl Scraper for SitejabberScraper {
    fn kind(&self) -> SourceKind {
        SourceKind::Sitejabber
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve_target(&self, input: &str) -> crate::Result<Url> {
        if let Some(url) = as_http_url(input) {
            return Ok(url);
        }

        let domain = input.trim().trim_matches('/');
        if domain.is_empty() || domain.contains(char::is_whitespace) || domain.contains('/') {
            return Err(invalid_target(
                self.kind(),
                input,
                "expected a review URL or a business domain",
            ));
        }

        Ok(self.base_url.join(&format!("reviews/{}", domain))?)
    }

    fn parse_page(&self, body: &str, page: &PageRequest) -> Result<ScrapedPage, ParseError> {
        let document = Html::parse_document(body);
        let s = &self.selectors;

        let reviews: Vec<RawReview> = document
            .select(&s.card)
            .filter_map(|card| self.parse_card(card))
            .collect();

        let next = first_attr(document.root_element(), &s.next, "href")
            .and_then(|href| page.url.join(&href).ok())
            .filter(|next| next != &page.url);

        Ok(ScrapedPage { reviews, next })
    }
}
