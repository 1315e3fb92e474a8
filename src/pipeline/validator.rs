//! Quality checks applied to reviews before export

use crate::review::{Review, MAX_RATING};
use regex::Regex;
use std::sync::LazyLock;

static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(lorem ipsum\b.*|test review|this is a test\b.*|n/?a|none|null|no comment|\.+|-+)$")
        .expect("placeholder pattern is valid")
});

static RE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(https?://|www\.)\S+").expect("url pattern is valid")
});

/// A problem that disqualifies a review
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    EmptyText,
    TooShort { length: usize, min: usize },
    TooLong { length: usize, max: usize },
    Placeholder,
    RatingOutOfRange(f32),
}

/// A suspicious trait that is logged but does not drop the review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationWarning {
    ContainsUrl,
    ExcessiveCaps,
    RepeatedCharacters,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validates review text length, content and rating range
#[derive(Debug, Clone)]
pub struct ReviewValidator {
    min_length: usize,
    max_length: usize,
}

impl ReviewValidator {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
        }
    }

    pub fn validate(&self, review: &Review) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        let text = review.text.trim();
        let length = text.chars().count();

        if length == 0 {
            outcome.issues.push(ValidationIssue::EmptyText);
            return outcome;
        }

        if length < self.min_length {
            outcome.issues.push(ValidationIssue::TooShort {
                length,
                min: self.min_length,
            });
        }

        if length > self.max_length {
            outcome.issues.push(ValidationIssue::TooLong {
                length,
                max: self.max_length,
            });
        }

        if RE_PLACEHOLDER.is_match(text) {
            outcome.issues.push(ValidationIssue::Placeholder);
        }

        if let Some(rating) = review.rating {
            if !(0.0..=MAX_RATING).contains(&rating) {
                outcome.issues.push(ValidationIssue::RatingOutOfRange(rating));
            }
        }

        if RE_URL.is_match(text) {
            outcome.warnings.push(ValidationWarning::ContainsUrl);
        }

        if has_excessive_caps(text) {
            outcome.warnings.push(ValidationWarning::ExcessiveCaps);
        }

        if has_repeated_characters(text, 6) {
            outcome.warnings.push(ValidationWarning::RepeatedCharacters);
        }

        outcome
    }
}

/// More than 70% of at least 20 letters are uppercase
fn has_excessive_caps(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < 20 {
        return false;
    }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    upper * 10 > letters.len() * 7
}

fn has_repeated_characters(text: &str, threshold: usize) -> bool {
    let mut previous = None;
    let mut run = 0usize;
    for c in text.chars() {
        if Some(c) == previous && !c.is_whitespace() {
            run += 1;
            if run >= threshold {
                return true;
            }
        } else {
            previous = Some(c);
            run = 1;
        }
    }
    false
}
