//! Review records
//!
//! Site parsers produce [`RawReview`] values straight from markup. The
//! [`ReviewFactory`] turns them into [`Review`] records, cleaning the text and
//! assigning identifiers, so every `Review` that exists has non-empty text.

mod factory;

pub use factory::ReviewFactory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest rating on the normalized scale
pub const MAX_RATING: f32 = 5.0;

/// A normalized review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,

    pub text: String,

    #[serde(default)]
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    /// Rating on a 0-5 scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helpful_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Minimal export record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub id: u64,
    pub text: String,
}

/// Export record carrying the commonly used metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRecord {
    pub id: u64,
    pub text: String,
    pub source: String,
    pub rating: Option<f32>,
    pub date: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

impl Review {
    pub fn to_training_record(&self) -> TrainingRecord {
        TrainingRecord {
            id: self.id,
            text: self.text.clone(),
        }
    }

    pub fn to_metadata_record(&self) -> MetadataRecord {
        MetadataRecord {
            id: self.id,
            text: self.text.clone(),
            source: self.source.clone(),
            rating: self.rating,
            date: self.date,
            author: self.author.clone(),
        }
    }
}

/// A review as extracted from one HTML/JSON fragment, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReview {
    pub text: String,
    pub rating: Option<f32>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub source_id: Option<String>,
    pub product_name: Option<String>,
    pub helpful_count: Option<u32>,
}

impl RawReview {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_rating(mut self, rating: Option<f32>) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn with_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.date = date;
        self
    }

    pub fn with_source_id(mut self, source_id: Option<String>) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn with_product_name(mut self, product_name: Option<String>) -> Self {
        self.product_name = product_name;
        self
    }

    pub fn with_helpful_count(mut self, helpful_count: Option<u32>) -> Self {
        self.helpful_count = helpful_count;
        self
    }
}
