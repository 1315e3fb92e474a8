//! Integration tests for cleaning and exporting review files

use review_harvest::output::{export_reviews, load_reviews, ExportFormat};
use review_harvest::pipeline::ReviewPipeline;
use review_harvest::{RawReview, ReviewFactory};
use std::fs;

fn scraped(texts: &[&str]) -> Vec<review_harvest::Review> {
    let mut factory = ReviewFactory::new("sitejabber", 1);
    texts
        .iter()
        .filter_map(|text| {
            factory.create(
                RawReview::new(*text).with_rating(Some(4.0)),
                Some("https://www.sitejabber.com/reviews/example.com"),
            )
        })
        .collect()
}

#[test]
fn test_pipeline_then_export_renumbers() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = dir.path().join("sitejabber_reviews.json");

    let reviews = scraped(&[
        "Shipping took three weeks but the product was exactly as described.",
        "ok",
        "Shipping  took three weeks but the product was EXACTLY as described.",
        "The seller refunded me after I reported a damaged box.",
    ]);
    assert_eq!(reviews.len(), 4);

    let (kept, stats) = ReviewPipeline::new(20, 5000).process(reviews);
    assert_eq!(stats.invalid, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[1].id, 4);

    let written = export_reviews(&kept, &output, ExportFormat::Training, 1).unwrap();
    assert_eq!(written, 2);

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        value,
        serde_json::json!([
            {"id": 1, "text": "Shipping took three weeks but the product was exactly as described."},
            {"id": 2, "text": "The seller refunded me after I reported a damaged box."}
        ])
    );
}

#[test]
fn test_reexport_full_file_as_jsonl() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let full = dir.path().join("full.json");
    let jsonl = dir.path().join("nested").join("reviews.jsonl");

    let reviews = scraped(&[
        "Great prices and the checkout was painless.",
        "Never again, the order was cancelled twice.",
    ]);
    export_reviews(&reviews, &full, ExportFormat::Full, 1).unwrap();

    let loaded = load_reviews(&full).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].source, "sitejabber");
    assert_eq!(
        loaded[0].source_url.as_deref(),
        Some("https://www.sitejabber.com/reviews/example.com")
    );
    assert_eq!(loaded[1].rating, Some(4.0));

    let written = export_reviews(&loaded, &jsonl, ExportFormat::Jsonl, 500).unwrap();
    assert_eq!(written, 2);

    let lines: Vec<serde_json::Value> = fs::read_to_string(&jsonl)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], 500);
    assert_eq!(lines[1]["id"], 501);
    assert_eq!(lines[1]["text"], "Never again, the order was cancelled twice.");
    assert!(lines[0].get("source").is_none());
}

#[test]
fn test_empty_export_writes_empty_array() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = dir.path().join("empty.json");

    let written = export_reviews(&[], &output, ExportFormat::Metadata, 1).unwrap();
    assert_eq!(written, 0);

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(value, serde_json::json!([]));
    assert!(load_reviews(&output).unwrap().is_empty());
}

#[test]
fn test_negative_only_export_keeps_duplicates() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = dir.path().join("negative.jsonl");

    let mut factory = ReviewFactory::new("trustpilot", 1);
    let reviews: Vec<_> = [
        ("Parcel lost and support never replied.", Some(1.0)),
        ("Parcel lost and support never replied.", Some(1.0)),
        ("Quick delivery and fair prices overall.", Some(5.0)),
        ("Imported from a source without star ratings.", None),
    ]
    .into_iter()
    .filter_map(|(text, rating)| factory.create(RawReview::new(text).with_rating(rating), None))
    .collect();

    let pipeline = ReviewPipeline::new(20, 5000)
        .with_rating_range(None, Some(2.0))
        .keep_duplicates();
    let (kept, stats) = pipeline.process(reviews);
    assert_eq!(stats.off_rating, 1);
    assert_eq!(stats.duplicates, 0);
    assert_eq!(kept.len(), 3);

    let written = export_reviews(&kept, &output, ExportFormat::Jsonl, 1).unwrap();
    assert_eq!(written, 3);
    let texts: Vec<String> = fs::read_to_string(&output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["text"]
            .as_str()
            .unwrap()
            .to_string())
        .collect();
    assert_eq!(
        texts,
        vec![
            "Parcel lost and support never replied.",
            "Parcel lost and support never replied.",
            "Imported from a source without star ratings.",
        ]
    );
}
