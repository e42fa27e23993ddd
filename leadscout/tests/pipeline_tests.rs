//! End-to-end pipeline runs against in-memory services
//!
//! Base scenario (discovery order):
//! - Alpha/cafe: page 1 [a1, a2], page 2 [a3]
//! - Alpha/bakery: [a2 (duplicate), b1]
//! - Beta/cafe: [c1]
//! - Beta/bakery: [a1 (duplicate from another region)]
//!
//! Storefronts of a2 and c1 show awnings.

mod helpers;

use helpers::*;
use leadscout::models::RunSummary;
use leadscout::services::{LeadStore, ServiceError};
use leadscout::{PipelineContext, PipelineOrchestrator};
use leadscout_common::models::Lead;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn base_places() -> FakePlaces {
    FakePlaces::new()
        .with_search(
            &region_alpha(),
            "cafe",
            vec![vec![summary("a1", 1), summary("a2", 2)], vec![summary("a3", 3)]],
        )
        .with_search(&region_alpha(), "bakery", vec![vec![summary("a2", 2), summary("b1", 4)]])
        .with_search(&region_beta(), "cafe", vec![vec![summary("c1", 5)]])
        .with_search(&region_beta(), "bakery", vec![vec![summary("a1", 1)]])
}

fn base_streetview() -> FakeStreetView {
    FakeStreetView::new(PanoramaMode::Present)
        .with_positive(place_location(2))
        .with_positive(place_location(5))
}

async fn run_pipeline(root: &Path, context: PipelineContext, cancel: CancellationToken) -> RunSummary {
    let store = Arc::new(LeadStore::open(root, None).await.unwrap());
    PipelineOrchestrator::new(Arc::new(context), store, cancel)
        .run()
        .await
        .unwrap()
}

fn read_leads(root: &Path) -> Vec<Lead> {
    match std::fs::read_to_string(root.join("leads.json")) {
        Ok(content) => serde_json::from_str(&content).unwrap(),
        Err(_) => Vec::new(),
    }
}

fn read_ledger(root: &Path) -> Vec<String> {
    std::fs::read_to_string(root.join("processed_places.txt"))
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// A full run finds the positive storefronts, in discovery order, and ledgers everything
#[tokio::test]
async fn test_full_run_records_leads_and_ledger() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places());
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(3)),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.regions, 2);
    assert_eq!(summary.discovered, 5);
    assert_eq!(summary.previously_processed, 0);
    assert_eq!(summary.checked, 5);
    assert_eq!(summary.leads_found, 2);
    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.exit_code(), 0);
    assert!(!summary.breaker_tripped);

    let leads = read_leads(dir.path());
    let ids: Vec<&str> = leads.iter().map(|l| l.place_id.as_str()).collect();
    assert_eq!(ids, vec!["a2", "c1"]);
    assert_eq!(leads[0].region, "Alpha");
    assert_eq!(leads[1].region, "Beta");
    assert_eq!(leads[0].status, "New");
    assert_eq!(leads[0].phone, "N/A");

    // Camera aimed straight at the storefront, bracketed by ±25°
    assert_eq!(leads[0].image_paths.len(), 3);
    assert!(leads[0].image_paths.contains(&"images/a2_heading_0.jpg".to_string()));
    assert!(leads[0].image_paths.contains(&"images/a2_heading_335.jpg".to_string()));
    assert!(leads[0].image_paths.contains(&"images/a2_heading_25.jpg".to_string()));
    for path in &leads[0].image_paths {
        assert!(dir.path().join(path).exists(), "missing {}", path);
    }

    let mut ledger = read_ledger(dir.path());
    ledger.sort();
    assert_eq!(ledger, vec!["a1", "a2", "a3", "b1", "c1"]);
}

/// A second run over the same results touches nothing
#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places());
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        CancellationToken::new(),
    )
    .await;
    let leads_after_first = std::fs::read_to_string(dir.path().join("leads.json")).unwrap();
    let details_after_first = places.details_calls.load(Ordering::SeqCst);
    let vision_after_first = vision.call_count();

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.discovered, 5);
    assert_eq!(summary.previously_processed, 5);
    assert_eq!(summary.checked, 0);
    assert_eq!(summary.leads_found, 0);
    assert_eq!(places.details_calls.load(Ordering::SeqCst), details_after_first);
    assert_eq!(vision.call_count(), vision_after_first);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("leads.json")).unwrap(),
        leads_after_first
    );
    assert_eq!(read_ledger(dir.path()).len(), 5);
}

/// An interrupted run resumes with only the unprocessed places
#[tokio::test]
async fn test_resumes_after_partial_run() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("processed_places.txt"), "a1\na3\n").unwrap();

    let places = Arc::new(base_places());
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.previously_processed, 2);
    assert_eq!(summary.checked, 3);
    assert_eq!(places.details_calls.load(Ordering::SeqCst), 3);

    let ledger = read_ledger(dir.path());
    assert_eq!(&ledger[..2], &["a1".to_string(), "a3".to_string()]);
    assert_eq!(ledger.len(), 5);
}

/// Resumed and uninterrupted runs produce the same leads, apart from discovery timestamps
#[tokio::test]
async fn test_resumed_run_matches_uninterrupted_run() {
    let full_dir = TempDir::new().unwrap();
    let resumed_dir = TempDir::new().unwrap();
    // a1 and a3 were checked (negative) before the interruption
    std::fs::write(resumed_dir.path().join("processed_places.txt"), "a1\na3\n").unwrap();

    for dir in [&full_dir, &resumed_dir] {
        let places = Arc::new(base_places());
        let streetview = Arc::new(base_streetview());
        let vision = Arc::new(FakeVision::new(VisionMode::Healthy));
        run_pipeline(
            dir.path(),
            test_context(&places, &streetview, &vision, test_settings(2)),
            CancellationToken::new(),
        )
        .await;
    }

    let without_timestamps = |root: &Path| -> Vec<Lead> {
        read_leads(root)
            .into_iter()
            .map(|lead| {
                assert!(lead.discovered_at.is_some());
                Lead {
                    discovered_at: None,
                    ..lead
                }
            })
            .collect()
    };
    assert_eq!(without_timestamps(full_dir.path()), without_timestamps(resumed_dir.path()));

    let mut full_ledger = read_ledger(full_dir.path());
    let mut resumed_ledger = read_ledger(resumed_dir.path());
    full_ledger.sort();
    resumed_ledger.sort();
    assert_eq!(full_ledger, resumed_ledger);
}

/// A place listed under several categories and regions is processed once, under its first region
#[tokio::test]
async fn test_duplicates_across_categories_processed_once() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places());
    let streetview = Arc::new(FakeStreetView::new(PanoramaMode::Present).with_positive(place_location(1)));
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(4)),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.discovered, 5);
    assert_eq!(places.details_calls.load(Ordering::SeqCst), 5);

    let leads = read_leads(dir.path());
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].place_id, "a1");
    assert_eq!(leads[0].region, "Alpha");

    let ledger = read_ledger(dir.path());
    assert_eq!(ledger.iter().filter(|id| *id == "a1").count(), 1);
}

/// Unreachable vision server: one call, then every candidate is skipped and nothing is ledgered
#[tokio::test]
async fn test_breaker_short_circuits_when_vision_down() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places());
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Down));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(1)),
        CancellationToken::new(),
    )
    .await;

    assert!(summary.breaker_tripped);
    assert_eq!(vision.call_count(), 1);
    assert_eq!(summary.leads_found, 0);
    assert_eq!(summary.breaker_skipped, 5);
    assert_eq!(summary.checked, 0);
    assert_eq!(summary.exit_code(), 0);
    assert!(summary.display_string().contains("stopped early"));

    // Only the first candidate got as far as imagery
    assert_eq!(places.details_calls.load(Ordering::SeqCst), 1);
    assert!(read_ledger(dir.path()).is_empty());
    assert!(read_leads(dir.path()).is_empty());
}

/// Candidates already in flight see the trip at once; none of them reaches the ledger
#[tokio::test]
async fn test_breaker_trip_is_seen_by_in_flight_candidates() {
    let dir = TempDir::new().unwrap();
    let workers = 3;
    let places = Arc::new(base_places());
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Down).with_latency(Duration::from_millis(50)));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(workers)),
        CancellationToken::new(),
    )
    .await;

    assert!(summary.breaker_tripped);
    // At most one request per in-flight candidate; later samples short-circuit
    assert!(vision.call_count() > 1);
    assert!(vision.call_count() <= workers);
    assert_eq!(summary.breaker_skipped + summary.cancelled, 5);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.leads_found, 0);
    assert!(read_ledger(dir.path()).is_empty());
    assert!(read_leads(dir.path()).is_empty());
}

/// Vision timeouts leave candidates for the next run
#[tokio::test]
async fn test_vision_timeouts_are_transient() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places());
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Slow));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        CancellationToken::new(),
    )
    .await;

    assert!(!summary.breaker_tripped);
    assert_eq!(summary.transient_failures, 5);
    assert_eq!(summary.checked, 5);
    assert!(read_ledger(dir.path()).is_empty());
}

/// Without street-level coverage, place photos are classified and saved with synthetic headings
#[tokio::test]
async fn test_fallback_only_imagery() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places().with_photos("a2", &["pos-front", "neg-menu"]));
    let streetview = Arc::new(FakeStreetView::new(PanoramaMode::Absent));
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.leads_found, 1);
    assert_eq!(summary.rejected, 4);
    assert_eq!(streetview.image_calls.load(Ordering::SeqCst), 0);

    let leads = read_leads(dir.path());
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].place_id, "a2");
    assert_eq!(leads[0].image_paths, vec!["images/a2_heading_place_photo_0.jpg".to_string()]);
    assert!(dir.path().join("images/a2_heading_place_photo_0.jpg").exists());

    // No imagery at all is a definitive rejection
    assert_eq!(read_ledger(dir.path()).len(), 5);
}

/// Network failures during imagery keep the candidate off the ledger
#[tokio::test]
async fn test_imagery_network_failure_is_transient() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places().with_photo_lookup_error(ServiceError::Network("reset".to_string())));
    let streetview = Arc::new(FakeStreetView::new(PanoramaMode::Unreachable));
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.transient_failures, 5);
    assert_eq!(vision.call_count(), 0);
    assert!(read_ledger(dir.path()).is_empty());
}

/// Losing the image aimed straight at the storefront keeps a negative candidate off the ledger
#[tokio::test]
async fn test_timed_out_heading_is_retried_next_run() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places());
    // Bracketing headings of a2 still show its awning
    let streetview = Arc::new(base_streetview().with_timeout_heading(0));
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.leads_found, 2);
    assert_eq!(summary.transient_failures, 3);
    assert_eq!(summary.rejected, 0);

    let leads = read_leads(dir.path());
    assert_eq!(leads[0].place_id, "a2");
    assert_eq!(leads[0].image_paths.len(), 2);
    assert!(!leads[0].image_paths.contains(&"images/a2_heading_0.jpg".to_string()));

    let mut ledger = read_ledger(dir.path());
    ledger.sort();
    assert_eq!(ledger, vec!["a2", "c1"]);
}

/// Vanished places are rejected for good; detail timeouts are retried
#[tokio::test]
async fn test_detail_errors_classified() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(
        base_places()
            .with_detail_error("a2", ServiceError::NotFound("a2".to_string()))
            .with_detail_error("c1", ServiceError::Timeout("15s".to_string())),
    );
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.leads_found, 0);
    assert_eq!(summary.rejected, 4);
    assert_eq!(summary.transient_failures, 1);

    let ledger = read_ledger(dir.path());
    assert!(ledger.contains(&"a2".to_string()));
    assert!(!ledger.contains(&"c1".to_string()));
}

/// A failed search abandons only its own (region, category) pair
#[tokio::test]
async fn test_failed_search_does_not_stop_other_pairs() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places().with_failing_search(&region_alpha(), "cafe"));
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        CancellationToken::new(),
    )
    .await;

    // a2, b1 from Alpha/bakery; c1 and a1 from Beta
    assert_eq!(summary.discovered, 4);
    assert_eq!(summary.leads_found, 2);

    let leads = read_leads(dir.path());
    assert_eq!(leads[0].place_id, "a2");
    assert_eq!(leads[0].region, "Alpha");
    assert!(!read_ledger(dir.path()).contains(&"a3".to_string()));
}

/// A failed lead write is reported and the candidate stays off the ledger
#[tokio::test]
async fn test_persistence_failure_sets_exit_code() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places());
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let store = Arc::new(LeadStore::open(dir.path(), None).await.unwrap());
    // Leads file can no longer be read or replaced
    std::fs::create_dir(dir.path().join("leads.json")).unwrap();

    let context = test_context(&places, &streetview, &vision, test_settings(2));
    let summary = PipelineOrchestrator::new(Arc::new(context), store, CancellationToken::new())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.persistence_failures, 2);
    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.exit_code(), 1);

    let ledger = read_ledger(dir.path());
    assert!(!ledger.contains(&"a2".to_string()));
    assert!(!ledger.contains(&"c1".to_string()));
    assert!(!dir.path().join("leads.json.tmp").exists());
}

/// Shutdown before processing starts leaves durable state untouched
#[tokio::test]
async fn test_cancelled_run_processes_nothing() {
    let dir = TempDir::new().unwrap();
    let places = Arc::new(base_places());
    let streetview = Arc::new(base_streetview());
    let vision = Arc::new(FakeVision::new(VisionMode::Healthy));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = run_pipeline(
        dir.path(),
        test_context(&places, &streetview, &vision, test_settings(2)),
        cancel,
    )
    .await;

    assert!(summary.shutdown_requested);
    assert_eq!(summary.checked, 0);
    assert_eq!(summary.leads_found, 0);
    assert_eq!(places.details_calls.load(Ordering::SeqCst), 0);
    assert!(read_ledger(dir.path()).is_empty());
}
