//! Integration tests for scraping
//!
//! These tests use wiremock to stand in for review sites and run the full
//! fetch → parse → checkpoint cycle end-to-end.

use review_harvest::checkpoint::{open_checkpoint, CheckpointStore, RunStatus};
use review_harvest::config::Settings;
use review_harvest::crawler::{scrape, Coordinator, ScrapeJob};
use review_harvest::http::{
    build_http_client, DelayManager, Fetch, HttpClient, RateLimiter, RetryPolicy,
};
use review_harvest::output::{export_reviews, ExportFormat};
use review_harvest::sources::{SteamScraper, TrustpilotScraper};
use review_harvest::Scraper;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a Trustpilot-style listing page
fn trustpilot_page(reviews: &[(&str, &str, u8)], has_next: bool) -> String {
    let cards: String = reviews
        .iter()
        .map(|(title, body, rating)| {
            format!(
                r#"<article data-service-review-card-paper="true">
                     <span data-consumer-name-typography="true">Reviewer</span>
                     <div data-service-review-rating="{rating}"></div>
                     <time datetime="2024-05-14T09:30:00.000Z">May 14, 2024</time>
                     <h2 data-service-review-title-typography="true">{title}</h2>
                     <p data-service-review-text-typography="true">{body}</p>
                   </article>"#
            )
        })
        .collect();
    let next = if has_next {
        r#"<a name="pagination-button-next" href="?page=next">Next page</a>"#
    } else {
        r#"<a name="pagination-button-next" aria-disabled="true">Next page</a>"#
    };
    format!("<html><body><section>{cards}</section><nav>{next}</nav></body></html>")
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// HTTP client without delays and with short backoff
fn fast_client() -> Arc<HttpClient> {
    let client = build_http_client("review-harvest/test", Duration::from_secs(5))
        .expect("Failed to build client");
    Arc::new(HttpClient::with_parts(
        client,
        Arc::new(RateLimiter::new(6000)),
        RetryPolicy::new(2).with_base_delay(Duration::from_millis(10)),
        DelayManager::none(),
        4,
    ))
}

fn test_settings(checkpoint_dir: &Path) -> Settings {
    Settings {
        max_concurrent: 2,
        delay_min: 0.0,
        delay_max: 0.0,
        rate_limit_rpm: 600,
        max_retries: 1,
        checkpoint_dir: checkpoint_dir.to_path_buf(),
        checkpoint_batch: 2,
        ..Settings::default()
    }
}

fn trustpilot(server: &MockServer) -> Arc<dyn Scraper> {
    let base = Url::parse(&format!("{}/", server.uri())).expect("Failed to parse base URL");
    Arc::new(TrustpilotScraper::with_base_url(base).expect("Failed to build scraper"))
}

fn coordinator(server: &MockServer, db: &Path) -> Coordinator {
    Coordinator::new(
        test_settings(db.parent().expect("db has a parent")),
        trustpilot(server),
        fast_client(),
        Box::new(open_checkpoint(db).expect("Failed to open checkpoint")),
    )
}

async fn requests_for(server: &MockServer, query: Option<&str>) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/review/example.com" && r.url.query() == query)
        .count()
}

async fn mount_two_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/review/example.com"))
        .and(query_param("page", "2"))
        .respond_with(html(trustpilot_page(
            &[("Third", "Refund arrived within a week.", 3)],
            false,
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/review/example.com"))
        .respond_with(html(trustpilot_page(
            &[
                ("First", "Ordered on Monday, arrived on Wednesday.", 5),
                ("Second", "Support answered within the hour.", 4),
            ],
            true,
        )))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_scrape_follows_pagination() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut coordinator = coordinator(&server, &dir.path().join("trustpilot.db"));

    let report = coordinator
        .run(
            ScrapeJob::new("trustpilot", vec!["example.com".to_string()]),
            CancellationToken::new(),
        )
        .await
        .expect("Scrape failed");

    assert_eq!(report.pages_scraped, 2);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(report.reviews, 3);
    assert_eq!(report.targets_completed, 1);

    let reviews = coordinator.store().load_reviews(report.run_id).unwrap();
    assert_eq!(reviews.len(), 3);
    assert_eq!(
        reviews[0].text,
        "First\n\nOrdered on Monday, arrived on Wednesday."
    );
    assert_eq!(reviews[0].rating, Some(5.0));
    assert_eq!(reviews[2].title.as_deref(), Some("Third"));
    assert_eq!(
        reviews.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(
        coordinator.store().get_run(report.run_id).unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;

    // The first request fails, the retry succeeds.
    Mock::given(method("GET"))
        .and(path("/review/example.com"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/review/example.com"))
        .respond_with(html(trustpilot_page(
            &[("Only", "A single page of reviews here.", 4)],
            false,
        )))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut coordinator = coordinator(&server, &dir.path().join("trustpilot.db"));

    let report = coordinator
        .run(
            ScrapeJob::new("trustpilot", vec!["example.com".to_string()]),
            CancellationToken::new(),
        )
        .await
        .expect("Scrape failed");

    assert_eq!(report.reviews, 1);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(requests_for(&server, None).await, 2);
}

#[tokio::test]
async fn test_failed_page_falls_back_to_next_index() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/review/example.com"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/review/example.com"))
        .and(query_param("page", "3"))
        .respond_with(html(trustpilot_page(
            &[("Third page", "Reached by skipping the broken page.", 2)],
            false,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/review/example.com"))
        .respond_with(html(trustpilot_page(
            &[("First page", "The very first review text.", 5)],
            true,
        )))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut coordinator = coordinator(&server, &dir.path().join("trustpilot.db"));

    let report = coordinator
        .run(
            ScrapeJob::new("trustpilot", vec!["example.com".to_string()]),
            CancellationToken::new(),
        )
        .await
        .expect("Scrape failed");

    assert_eq!(report.pages_scraped, 2);
    assert_eq!(report.pages_failed, 1);
    assert_eq!(report.reviews, 2);
    assert_eq!(coordinator.store().error_count(report.run_id).unwrap(), 1);

    // 404 is permanent, so page 2 is requested once.
    assert_eq!(requests_for(&server, Some("page=2")).await, 1);
}

#[tokio::test]
async fn test_resume_continues_after_cap() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = dir.path().join("trustpilot.db");
    let job = ScrapeJob::new("trustpilot", vec!["example.com".to_string()]);

    let first = {
        let mut coordinator = coordinator(&server, &db);
        coordinator
            .run(job.clone().with_max_reviews(Some(2)), CancellationToken::new())
            .await
            .expect("First scrape failed")
    };
    assert_eq!(first.reviews, 2);

    let mut coordinator = coordinator(&server, &db);
    let second = coordinator
        .run(job, CancellationToken::new())
        .await
        .expect("Second scrape failed");

    assert!(second.resumed);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.reviews, 1);
    assert_eq!(second.total_reviews, 3);

    let reviews = coordinator.store().load_reviews(second.run_id).unwrap();
    assert_eq!(
        reviews.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(reviews[2].text, "Third\n\nRefund arrived within a week.");

    // The first page was never fetched again.
    assert_eq!(requests_for(&server, None).await, 1);
}

#[tokio::test]
async fn test_fresh_ignores_checkpoint() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = dir.path().join("trustpilot.db");
    let job = ScrapeJob::new("trustpilot", vec!["example.com".to_string()]);

    let first = coordinator(&server, &db)
        .run(job.clone().with_max_reviews(Some(1)), CancellationToken::new())
        .await
        .expect("First scrape failed");

    let second = coordinator(&server, &db)
        .run(job.fresh(true), CancellationToken::new())
        .await
        .expect("Fresh scrape failed");

    assert!(!second.resumed);
    assert_ne!(second.run_id, first.run_id);
    assert_eq!(second.reviews, 3);
}

#[tokio::test]
async fn test_steam_cursor_pagination_and_export() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/appreviews/730"))
        .and(query_param("cursor", "*"))
        .and(query_param("json", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"success": 1, "cursor": "AoJ4", "reviews": [
                {"recommendationid": "1", "review": "Great co-op with friends.",
                 "voted_up": true, "author": {"steamid": "7656", "playtime_forever": 600}},
                {"recommendationid": "2", "review": "Too many bugs at launch.",
                 "voted_up": false, "author": {"steamid": "7657", "playtime_forever": 20}}
            ]}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appreviews/730"))
        .and(query_param("cursor", "AoJ4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"success": 1, "cursor": "AoJ4", "reviews": []}"#),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let settings = test_settings(&dir.path().join("checkpoints"));
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let scraper: Arc<dyn Scraper> = Arc::new(SteamScraper::with_base_url(base).unwrap());

    let (report, reviews) = scrape(
        &settings,
        scraper,
        6000,
        ScrapeJob::new("steam", vec!["730".to_string()]),
        CancellationToken::new(),
    )
    .await
    .expect("Scrape failed");

    assert_eq!(report.pages_scraped, 2);
    assert_eq!(reviews.len(), 2);
    assert_eq!(
        reviews[0].text,
        "[10.0 hours played]\n\nGreat co-op with friends."
    );
    assert_eq!(reviews[1].rating, Some(1.0));
    assert!(settings.checkpoint_path("steam").exists());

    let output = dir.path().join("exports").join("steam_reviews.json");
    let written = export_reviews(&reviews, &output, ExportFormat::Metadata, 1).unwrap();
    assert_eq!(written, 2);

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(exported[0]["source"], "steam");
    assert_eq!(exported[1]["id"], 2);
    assert_eq!(exported[1]["author"], "7657");
}

#[tokio::test]
async fn test_throttled_domain_is_slowed_down() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/review/example.com"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/review/example.com"))
        .respond_with(html("<html><body>ok</body></html>".to_string()))
        .mount(&server)
        .await;

    let client = fast_client();
    let url = Url::parse(&format!("{}/review/example.com", server.uri())).unwrap();
    let host = url.host_str().unwrap().to_string();

    let body = client.get_text(&url).await.expect("Retry after 429 failed");
    assert!(body.contains("ok"));

    // 6000 rpm cut by 30% after one 429.
    let limiter = client.rate_limiter();
    assert_eq!(limiter.current_rpm(&host), 4200);

    let stats = limiter.stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].1.throttled, 1);
    assert_eq!(stats[0].1.requests, 2);
}
