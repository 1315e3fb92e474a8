//! Review post-processing
//!
//! Scraped reviews pass through three stages before they are exported:
//! text cleaning, quality validation, and duplicate removal.

mod cleaner;
mod dedup;
mod validator;

pub use cleaner::clean_text;
pub use dedup::{content_key, Deduplicator};
pub use validator::{ReviewValidator, ValidationIssue, ValidationOutcome, ValidationWarning};

use crate::config::Settings;
use crate::review::Review;

/// Counters describing one pipeline pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub input: usize,
    pub emptied: usize,
    pub invalid: usize,
    pub off_rating: usize,
    pub duplicates: usize,
    pub warned: usize,
    pub output: usize,
}

/// Clean → validate → rating filter → dedupe
#[derive(Debug, Clone)]
pub struct ReviewPipeline {
    validator: ReviewValidator,
    min_rating: Option<f32>,
    max_rating: Option<f32>,
    dedupe: bool,
}

impl ReviewPipeline {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            validator: ReviewValidator::new(min_length, max_length),
            min_rating: None,
            max_rating: None,
            dedupe: true,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.min_review_length, settings.max_review_length)
    }

    /// Disables duplicate removal
    pub fn keep_duplicates(mut self) -> Self {
        self.dedupe = false;
        self
    }

    /// Keeps only rated reviews within `min..=max`
    ///
    /// Either bound may be open. Reviews without a rating always pass.
    pub fn with_rating_range(mut self, min: Option<f32>, max: Option<f32>) -> Self {
        self.min_rating = min;
        self.max_rating = max;
        self
    }

    fn rating_allowed(&self, rating: Option<f32>) -> bool {
        let Some(rating) = rating else {
            return true;
        };
        self.min_rating.map_or(true, |min| rating >= min)
            && self.max_rating.map_or(true, |max| rating <= max)
    }

    /// Runs every review through the pipeline, preserving input order
    pub fn process(&self, reviews: Vec<Review>) -> (Vec<Review>, PipelineStats) {
        let mut stats = PipelineStats {
            input: reviews.len(),
            ..PipelineStats::default()
        };
        let mut dedup = Deduplicator::new();
        let mut kept = Vec::with_capacity(reviews.len());

        for mut review in reviews {
            review.text = clean_text(&review.text);
            if review.text.is_empty() {
                stats.emptied += 1;
                continue;
            }

            let outcome = self.validator.validate(&review);
            if !outcome.is_valid() {
                tracing::debug!("Review {} rejected: {:?}", review.id, outcome.issues);
                stats.invalid += 1;
                continue;
            }
            if !outcome.warnings.is_empty() {
                tracing::debug!("Review {} flagged: {:?}", review.id, outcome.warnings);
                stats.warned += 1;
            }

            if !self.rating_allowed(review.rating) {
                stats.off_rating += 1;
                continue;
            }

            if self.dedupe && !dedup.insert(&review.text) {
                stats.duplicates += 1;
                continue;
            }

            kept.push(review);
        }

        stats.output = kept.len();
        tracing::info!(
            "Pipeline: {} in, {} out ({} empty, {} invalid, {} off rating, {} duplicates)",
            stats.input,
            stats.output,
            stats.emptied,
            stats.invalid,
            stats.off_rating,
            stats.duplicates
        );

        (kept, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{RawReview, ReviewFactory};

    fn reviews(texts: &[&str]) -> Vec<Review> {
        let mut factory = ReviewFactory::new("test", 1);
        texts
            .iter()
            .filter_map(|t| factory.create(RawReview::new(*t), None))
            .collect()
    }

    #[test]
    fn test_pipeline_filters_and_dedupes() {
        let input = reviews(&[
            "The hinge broke after a week of light use.",
            "short",
            "The hinge broke after a week of light use.",
            "Customer support replaced it without questions.",
        ]);

        let (kept, stats) = ReviewPipeline::new(20, 10_000).process(input);

        assert_eq!(kept.len(), 2);
        assert_eq!(stats.input, 4);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.output, 2);
        assert_eq!(kept[0].id, 1);
        assert_eq!(kept[1].id, 4);
    }

    #[test]
    fn test_keep_duplicates() {
        let input = reviews(&[
            "Exactly the same words here.",
            "Exactly the same words here.",
        ]);
        let (kept, stats) = ReviewPipeline::new(5, 100).keep_duplicates().process(input);
        assert_eq!(kept.len(), 2);
        assert_eq!(stats.duplicates, 0);
    }

    fn rated(entries: &[(&str, Option<f32>)]) -> Vec<Review> {
        let mut factory = ReviewFactory::new("test", 1);
        entries
            .iter()
            .filter_map(|(text, rating)| {
                factory.create(RawReview::new(*text).with_rating(*rating), None)
            })
            .collect()
    }

    #[test]
    fn test_rating_range_keeps_unrated() {
        let input = rated(&[
            ("Arrived broken and nobody answered my emails.", Some(1.0)),
            ("Decent value for the price, nothing special.", Some(3.0)),
            ("Best purchase I made all year, highly recommend.", Some(5.0)),
            ("No stars given but the story was detailed.", None),
        ]);

        let (kept, stats) = ReviewPipeline::new(5, 1000)
            .with_rating_range(None, Some(2.0))
            .process(input);

        let ids: Vec<u64> = kept.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(stats.off_rating, 2);
        assert_eq!(stats.invalid, 0);
        assert_eq!(stats.output, 2);
    }

    #[test]
    fn test_rating_range_bounds_inclusive() {
        let input = rated(&[
            ("Four stars, would buy from them again.", Some(4.0)),
            ("Three and a half, slow but honest seller.", Some(3.5)),
            ("Five stars, the whole process was smooth.", Some(5.0)),
        ]);

        let (kept, stats) = ReviewPipeline::new(5, 1000)
            .with_rating_range(Some(4.0), Some(5.0))
            .process(input);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].rating, Some(4.0));
        assert_eq!(kept[1].rating, Some(5.0));
        assert_eq!(stats.off_rating, 1);
    }
}
