use crate::review::RawReview;
use crate::sources::html::{
    as_http_url, element_text, first_attr, first_text, parse_date, parse_leading_number,
    parse_selector,
};
use crate::sources::{invalid_target, PageRequest, ParseError, ScrapedPage, Scraper, SourceKind};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

const BASE_URL: &str = "https://www.imdb.com/";

/// Reviews shorter than this are fragments of collapsed spoilers
const MIN_TEXT_CHARS: usize = 10;

const DATE_FORMATS: [&str; 2] = ["%d %B %Y", "%B %d, %Y"];

static RE_HELPFUL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d,]*) out of [\d,]+ found this helpful").expect("helpful pattern is valid")
});

struct Selectors {
    card: Selector,
    text: Selector,
    text_fallback: Selector,
    title: Selector,
    rating: Selector,
    date: Selector,
    author: Selector,
    actions: Selector,
    product: Selector,
    load_more: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ParseError> {
        Ok(Self {
            card: parse_selector("div.review-container")?,
            text: parse_selector("div.text.show-more__control")?,
            text_fallback: parse_selector("div.content div.text")?,
            title: parse_selector("a.title")?,
            rating: parse_selector("span.rating-other-user-rating span")?,
            date: parse_selector("span.review-date")?,
            author: parse_selector("span.display-name-link a")?,
            actions: parse_selector("div.actions")?,
            product: parse_selector("h3[itemprop='name'] a, div.parent h3 a")?,
            load_more: parse_selector("div.load-more-data[data-key]")?,
        })
    }
}

/// Scraper for IMDB user reviews
pub struct ImdbScraper {
    base_url: Url,
    selectors: Selectors,
}

impl ImdbScraper {
    pub fn new() -> crate::Result<Self> {
        Self::with_base_url(Url::parse(BASE_URL)?)
    }

    pub fn with_base_url(base_url: Url) -> crate::Result<Self> {
        Ok(Self {
            base_url,
            selectors: Selectors::new()?,
        })
    }

    fn parse_card(&self, card: ElementRef<'_>, product: Option<&str>) -> Option<RawReview> {
        let s = &self.selectors;

        let text = first_text(card, &[&s.text, &s.text_fallback])?;
        if text.chars().count() < MIN_TEXT_CHARS {
            return None;
        }

        let title_link = card.select(&s.title).next();
        let title = title_link.map(element_text).filter(|t| !t.is_empty());
        // Permalinks look like /review/rw1234567/
        let source_id = title_link
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| {
                href.split('/')
                    .find(|segment| segment.starts_with("rw"))
                    .map(str::to_string)
            });

        // User ratings are out of ten.
        let rating = card
            .select(&s.rating)
            .next()
            .and_then(|span| parse_leading_number(&element_text(span)))
            .map(|r| r / 2.0);

        let date = card
            .select(&s.date)
            .next()
            .and_then(|span| parse_date(&element_text(span), &DATE_FORMATS));
        let author = card.select(&s.author).next().map(element_text);

        let helpful_source = card
            .select(&s.actions)
            .next()
            .map(element_text)
            .unwrap_or_else(|| element_text(card));
        let helpful_count = RE_HELPFUL
            .captures(&helpful_source)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().replace(',', "").parse::<u32>().ok());

        Some(
            RawReview::new(text)
                .with_title(title)
                .with_rating(rating)
                .with_date(date)
                .with_author(author)
                .with_source_id(source_id)
                .with_helpful_count(helpful_count)
                .with_product_name(product.map(str::to_string)),
        )
    }

    /// URL of the AJAX fragment that continues `target` after `key`
    fn load_more_url(target: &Url, key: &str) -> Url {
        let mut next = target.clone();
        let path = format!("{}/_ajax", target.path().trim_end_matches('/'));
        next.set_path(&path);
        next.set_query(None);
        next.query_pairs_mut().append_pair("paginationKey", key);
        next
    }
}

fn is_title_id(id: &str) -> bool {
    id.len() > 2 && id.starts_with("tt") && id[2..].chars().all(|c| c.is_ascii_digit())
}

#[async_trait]
impl Scraper for ImdbScraper {
    fn kind(&self) -> SourceKind {
        SourceKind::Imdb
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve_target(&self, input: &str) -> crate::Result<Url> {
        let title_id = match as_http_url(input) {
            Some(url) => url
                .path_segments()
                .and_then(|mut segments| segments.find(|s| is_title_id(s)))
                .map(str::to_string),
            None => Some(input.trim().to_string()).filter(|id| is_title_id(id)),
        };

        let title_id = title_id.ok_or_else(|| {
            invalid_target(self.kind(), input, "expected a title URL or an id like tt0111161")
        })?;

        Ok(self.base_url.join(&format!("title/{}/reviews", title_id))?)
    }

    fn parse_page(&self, body: &str, page: &PageRequest) -> Result<ScrapedPage, ParseError> {
        let document = Html::parse_document(body);
        let s = &self.selectors;

        let product = document
            .select(&s.product)
            .next()
            .map(element_text)
            .filter(|p| !p.is_empty());

        let reviews: Vec<RawReview> = document
            .select(&s.card)
            .filter_map(|card| self.parse_card(card, product.as_deref()))
            .collect();

        let next = first_attr(document.root_element(), &s.load_more, "data-key")
            .map(|key| Self::load_more_url(&page.target, &key));

        Ok(ScrapedPage { reviews, next })
    }
}
