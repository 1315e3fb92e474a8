use crate::pipeline::clean_text;
use crate::review::{RawReview, Review, MAX_RATING};
use chrono::Utc;

/// Builds [`Review`] records with sequential identifiers
///
/// The factory is the only place reviews are created during a scrape, so it
/// owns both invariants: text is non-empty after cleaning, and ids never repeat
/// within a run. On resume the counter is moved past the highest stored id.
#[derive(Debug, Clone)]
pub struct ReviewFactory {
    source: String,
    next_id: u64,
}

impl ReviewFactory {
    pub fn new(source: impl Into<String>, start_id: u64) -> Self {
        Self {
            source: source.into(),
            next_id: start_id,
        }
    }

    /// The id the next created review will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn set_next_id(&mut self, next_id: u64) {
        self.next_id = next_id;
    }

    /// Normalizes a raw review
    ///
    /// # Returns
    ///
    /// * `Some(Review)` - The review with a freshly assigned id
    /// * `None` - The text was empty after cleaning; no id is consumed
    pub fn create(&mut self, raw: RawReview, source_url: Option<&str>) -> Option<Review> {
        let text = clean_text(&raw.text);
        if text.is_empty() {
            tracing::debug!("Dropping {} review with empty text", self.source);
            return None;
        }

        let rating = raw.rating.and_then(|r| {
            if r.is_finite() && (0.0..=MAX_RATING).contains(&r) {
                Some(r)
            } else {
                tracing::debug!("Discarding out-of-range rating {}", r);
                None
            }
        });

        let review = Review {
            id: self.next_id,
            text,
            source: self.source.clone(),
            source_url: source_url.map(str::to_string),
            source_id: raw.source_id,
            rating,
            title: non_empty(raw.title),
            author: non_empty(raw.author),
            date: raw.date,
            product_name: non_empty(raw.product_name),
            helpful_count: raw.helpful_count,
            scraped_at: Some(Utc::now()),
        };

        self.next_id += 1;
        Some(review)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
