use crate::review::RawReview;
use crate::sources::html::{
    as_http_url, element_text, first_attr, first_text, parse_leading_number, parse_rfc3339,
    parse_selector, with_query_param,
};
use crate::sources::{invalid_target, PageRequest, ParseError, ScrapedPage, Scraper, SourceKind};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const BASE_URL: &str = "https://www.trustpilot.com/";

/// Upper bound on `?page=N` when the page does not say how many exist
const MAX_PAGES: u32 = 100;

struct Selectors {
    card: Selector,
    card_fallback: Selector,
    body: Selector,
    body_fallback: Selector,
    title: Selector,
    title_fallback: Selector,
    rating: Selector,
    date: Selector,
    author: Selector,
    review_link: Selector,
    next_button: Selector,
    page_button: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ParseError> {
        Ok(Self {
            card: parse_selector("article.paper_paper__1PY90")?,
            card_fallback: parse_selector("[data-service-review-card-paper]")?,
            body: parse_selector("p.typography_body-l__KUYFJ")?,
            body_fallback: parse_selector("[data-service-review-text-typography]")?,
            title: parse_selector("h2.typography_heading-s__f7029")?,
            title_fallback: parse_selector("[data-service-review-title-typography]")?,
            rating: parse_selector("[data-service-review-rating]")?,
            date: parse_selector("time[datetime]")?,
            author: parse_selector("[data-consumer-name-typography]")?,
            review_link: parse_selector("a[href^='/reviews/']")?,
            next_button: parse_selector("a[name='pagination-button-next']")?,
            page_button: parse_selector("a[name^='pagination-button-']")?,
        })
    }
}

/// Scraper for company reviews on Trustpilot
pub struct TrustpilotScraper {
    base_url: Url,
    selectors: Selectors,
}

impl TrustpilotScraper {
    pub fn new() -> crate::Result<Self> {
        Self::with_base_url(Url::parse(BASE_URL)?)
    }

    pub fn with_base_url(base_url: Url) -> crate::Result<Self> {
        Ok(Self {
            base_url,
            selectors: Selectors::new()?,
        })
    }

    fn page_url(target: &Url, number: u32) -> Url {
        if number <= 1 {
            target.clone()
        } else {
            with_query_param(target, "page", &number.to_string())
        }
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Option<RawReview> {
        let s = &self.selectors;

        let body = first_text(card, &[&s.body, &s.body_fallback])?;
        let title = first_text(card, &[&s.title, &s.title_fallback]);
        let text = match &title {
            Some(title) => format!("{}\n\n{}", title, body),
            None => body,
        };

        let rating = first_attr(card, &s.rating, "data-service-review-rating")
            .and_then(|r| parse_leading_number(&r));
        let date = first_attr(card, &s.date, "datetime").and_then(|d| parse_rfc3339(&d));
        let author = card.select(&s.author).next().map(element_text);
        let source_id = first_attr(card, &s.review_link, "href").and_then(|href| {
            href.trim_start_matches("/reviews/")
                .split(['/', '?'])
                .next()
                .map(str::to_string)
        });

        Some(
            RawReview::new(text)
                .with_title(title)
                .with_rating(rating)
                .with_date(date)
                .with_author(author)
                .with_source_id(source_id),
        )
    }

    /// Whether the pagination bar shows a page after `current`
    fn has_next_page(&self, document: &Html, current: u32) -> bool {
        let s = &self.selectors;

        if let Some(next) = document.select(&s.next_button).next() {
            let disabled = next.value().attr("aria-disabled") == Some("true");
            if !disabled && next.value().attr("href").is_some() {
                return true;
            }
        }

        document
            .select(&s.page_button)
            .filter_map(|button| parse_leading_number(&element_text(button)))
            .any(|n| n as u32 > current)
    }
}

#[async_trait]
impl Scraper for TrustpilotScraper {
    fn kind(&self) -> SourceKind {
        SourceKind::Trustpilot
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve_target(&self, input: &str) -> crate::Result<Url> {
        if let Some(url) = as_http_url(input) {
            return Ok(url);
        }

        let company = input.trim().trim_matches('/');
        if company.is_empty() || company.contains(char::is_whitespace) || company.contains('/') {
            return Err(invalid_target(
                self.kind(),
                input,
                "expected a review URL or a company domain",
            ));
        }

        Ok(self.base_url.join(&format!("review/{}", company))?)
    }

    fn parse_page(&self, body: &str, page: &PageRequest) -> Result<ScrapedPage, ParseError> {
        let document = Html::parse_document(body);
        let s = &self.selectors;

        let mut cards: Vec<ElementRef<'_>> = document.select(&s.card).collect();
        if cards.is_empty() {
            cards = document.select(&s.card_fallback).collect();
        }

        let reviews: Vec<RawReview> = cards
            .into_iter()
            .filter_map(|card| self.parse_card(card))
            .collect();

        let next = if !reviews.is_empty()
            && page.number < MAX_PAGES
            && self.has_next_page(&document, page.number)
        {
            Some(Self::page_url(&page.target, page.number + 1))
        } else {
            None
        };

        Ok(ScrapedPage { reviews, next })
    }

    fn fallback_next(&self, page: &PageRequest) -> Option<Url> {
        (page.number < MAX_PAGES).then(|| Self::page_url(&page.target, page.number + 1))
    }
}
