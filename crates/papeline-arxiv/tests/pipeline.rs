//! End-to-end runs against a scripted transport

mod common;

use std::time::Duration;

use common::*;
use papeline_arxiv::signer::{self, Signer};
use papeline_arxiv::{Config, DedupPolicy, Delivery, PipelineError, RemoteConfig, run};
use papeline_core::{ProgressContext, RetryPolicy};
use papeline_store::{DedupStore, JsonFileStore, MemoryStore, SeenVersions};
use tempfile::TempDir;

fn output_file(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("2024-03-02.jsonl")
}

fn remote_config(signer: Option<Signer>, batch_size: usize) -> Config {
    let mut config = local_config(std::path::Path::new("unused"));
    config.delivery = Delivery::Remote(RemoteConfig {
        url: "https://collector.test/papers".to_string(),
        batch_size,
        api_key: Some("secret-key".to_string()),
        signer,
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
    });
    config
}

#[test]
fn three_pages_with_five_known_deliver_the_rest() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path());
    let transport = ScriptedTransport::new().paged(237, 100);
    let known: SeenVersions = [0, 50, 120, 199, 236]
        .into_iter()
        .map(|n| (paper_id(n), 1))
        .collect();
    let mut store = MemoryStore::with_entries(known);

    let summary = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();

    assert_eq!(transport.get_count(), 3);
    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(summary.total_results, Some(237));
    assert_eq!(summary.entries, 237);
    assert_eq!(summary.duplicates, 5);
    assert_eq!(summary.delivered, 232);
    assert!(summary.warnings().is_empty());

    let lines = read_jsonl(&output_file(&dir));
    assert_eq!(lines.len(), 232);
    assert!(lines.iter().all(|l| l["id"] != paper_id(50).as_str()));
    assert_eq!(store.snapshot().len(), 237);
}

#[test]
fn second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path());
    let transport = ScriptedTransport::new().paged(150, 100);
    let mut store = MemoryStore::new();

    let first = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(first.delivered, 150);

    let second = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(second.delivered, 0);
    assert_eq!(second.duplicates, 150);
    assert_eq!(read_jsonl(&output_file(&dir)).len(), 150);
    assert_eq!(store.commit_count(), 1);
}

#[test]
fn json_file_store_carries_state_across_runs() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state").join("seen.json");
    let config = local_config(&dir.path().join("out"));
    let transport = ScriptedTransport::new().paged(30, 100);

    let mut store = JsonFileStore::new(&state);
    let first = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(first.delivered, 30);

    let mut reopened = JsonFileStore::new(&state);
    assert_eq!(reopened.load().unwrap().len(), 30);
    let second = run(&config, &transport, &mut reopened, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(second.delivered, 0);
}

#[test]
fn failed_page_is_skipped_and_retried_next_run() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path());
    let broken = ScriptedTransport::new()
        .page(0, feed(500, &entries(0..100)))
        .page(100, feed(500, &entries(100..200)))
        .respond(200, 503, "Service Unavailable".to_string())
        .page(300, feed(500, &entries(300..400)))
        .page(400, feed(500, &entries(400..500)));
    let mut store = MemoryStore::new();

    let summary = run(&config, &broken, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.pages_fetched, 4);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.delivered, 400);
    assert_eq!(summary.warnings().len(), 1);
    // Retried up to the attempt limit
    assert_eq!(broken.gets_for(200), 2);
    assert!(!store.snapshot().contains(&paper_id(250)));

    let healed = ScriptedTransport::new().paged(500, 100);
    let summary = run(&config, &healed, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.delivered, 100);
    assert_eq!(summary.duplicates, 400);
    assert_eq!(read_jsonl(&output_file(&dir)).len(), 500);
}

#[test]
fn permanently_failing_page_is_dropped_without_retry() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path());
    let transport = ScriptedTransport::new()
        .page(0, feed(500, &entries(0..100)))
        .page(100, feed(500, &entries(100..200)))
        .respond(200, 400, "Bad Request".to_string())
        .page(300, feed(500, &entries(300..400)))
        .page(400, feed(500, &entries(400..500)));
    let mut store = MemoryStore::new();

    let summary = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.delivered, 400);
    assert_eq!(summary.pages_fetched, 4);
    assert_eq!(summary.pages_failed, 1);
    assert!(!summary.warnings().is_empty());
    assert_eq!(transport.gets_for(200), 1);
    assert_eq!(read_jsonl(&output_file(&dir)).len(), 400);
}

#[test]
fn first_page_failure_stops_pagination() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path());
    let transport = ScriptedTransport::new().respond(0, 502, "bad gateway".to_string());
    let mut store = MemoryStore::new();

    let summary = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.pages_fetched, 0);
    assert_eq!(summary.delivered, 0);
    assert!(!output_file(&dir).exists());
}

#[test]
fn window_and_category_filters_apply() {
    let dir = TempDir::new().unwrap();
    let mut config = local_config(dir.path());
    config.categories = vec!["cs.*".to_string()];
    let page = vec![
        entry("2403.00001", 1, IN_WINDOW, &["cs.AI"]),
        entry("2403.00002", 1, "2024-02-28T12:00:00Z", &["cs.AI"]),
        entry("2403.00003", 1, IN_WINDOW, &["math.OC", "stat.ML"]),
        entry("2403.00004", 1, IN_WINDOW, &["math.OC", "cs.LG"]),
        entry("2403.00005", 1, "2024-03-02T00:00:00Z", &["cs.CL"]),
    ];
    let transport = ScriptedTransport::new().page(0, feed(5, &page));
    let mut store = MemoryStore::new();

    let summary = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.out_of_window, 1);
    assert_eq!(summary.off_category, 1);
    assert_eq!(summary.delivered, 3);

    let ids: Vec<String> = read_jsonl(&output_file(&dir))
        .iter()
        .map(|l| l["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["2403.00001", "2403.00004", "2403.00005"]);
    // Dropped records are not remembered
    assert!(!store.snapshot().contains("2403.00002"));
}

#[test]
fn malformed_entries_are_counted_and_skipped() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path());
    let mut page = entries(0..3);
    page.push("<entry><title>No id here</title></entry>".to_string());
    page.push(entry("2403.09999", 1, "not-a-date", &["cs.AI"]));
    let transport = ScriptedTransport::new().page(0, feed(5, &page));
    let mut store = MemoryStore::new();

    let summary = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.malformed, 2);
    assert_eq!(summary.delivered, 3);
    assert_eq!(summary.warnings().len(), 1);
}

#[test]
fn dedup_policies_differ_on_new_versions() {
    let page = vec![entry("2403.00001", 2, IN_WINDOW, &["cs.AI"])];
    let known: SeenVersions = [("2403.00001", 1)].into_iter().collect();

    for (policy, expected) in [(DedupPolicy::NewerVersion, 1), (DedupPolicy::Presence, 0)] {
        let dir = TempDir::new().unwrap();
        let mut config = local_config(dir.path());
        config.dedup_policy = policy;
        let transport = ScriptedTransport::new().page(0, feed(1, &page));
        let mut store = MemoryStore::with_entries(known.clone());

        let summary = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
        assert_eq!(summary.delivered, expected, "{policy:?}");
    }
}

#[test]
fn request_starts_respect_minimum_interval() {
    let dir = TempDir::new().unwrap();
    let mut config = local_config(dir.path());
    config.page_size = 10;
    config.min_request_interval = Duration::from_millis(30);
    let transport = ScriptedTransport::new().paged(30, 10);
    let mut store = MemoryStore::new();

    run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();

    let gets = transport.gets.borrow();
    assert_eq!(gets.len(), 3);
    for pair in gets.windows(2) {
        assert!(pair[1].0.duration_since(pair[0].0) >= Duration::from_millis(30));
    }
}

#[test]
fn empty_window_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path());
    let transport = ScriptedTransport::new().page(0, feed(0, &[]));
    let mut store = MemoryStore::new();

    let summary = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.delivered, 0);
    assert_eq!(transport.get_count(), 1);
    assert!(!output_file(&dir).exists());
    assert_eq!(store.commit_count(), 0);
}

#[test]
fn remote_batches_are_signed_and_verifiable() {
    let signer = Signer::generate();
    let verifying_key = signer.verifying_key();
    let config = remote_config(Some(signer.clone()), 50);
    let transport = ScriptedTransport::new().paged(120, 100);
    let mut store = MemoryStore::new();

    let summary = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.delivered, 120);

    let posts = transport.posts.borrow();
    assert_eq!(posts.len(), 3);
    let mut delivered = 0;
    for post in posts.iter() {
        assert_eq!(post.url, "https://collector.test/papers");
        assert_eq!(post.header("Content-Type"), Some("application/json"));
        assert_eq!(post.header("X-API-Key"), Some("secret-key"));
        assert_eq!(post.header("X-Signature-Algorithm"), Some("ed25519"));
        assert_eq!(post.header("X-Key-Id"), Some(signer.key_id()));

        let signature = post.header("X-Signature").unwrap();
        assert!(signer::verify(&verifying_key, &post.body, signature));

        let mut altered = post.body.clone();
        altered[1] ^= 0x20;
        assert!(!signer::verify(&verifying_key, &altered, signature));

        let batch: Vec<serde_json::Value> = serde_json::from_slice(&post.body).unwrap();
        delivered += batch.len();
    }
    assert_eq!(delivered, 120);
    assert_eq!(store.snapshot().len(), 120);
}

#[test]
fn unsigned_remote_has_no_signature_headers() {
    let config = remote_config(None, 100);
    let transport = ScriptedTransport::new().paged(3, 100);
    let mut store = MemoryStore::new();

    run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    let posts = transport.posts.borrow();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].header("X-Signature").is_none());
}

#[test]
fn remote_rejection_is_fatal_and_uncommitted() {
    let config = remote_config(Some(Signer::generate()), 100);
    let transport = ScriptedTransport::new().paged(10, 100).post_statuses(&[401]);
    let mut store = MemoryStore::new();

    let err = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap_err();
    assert!(matches!(err, PipelineError::DeliveryAuth { status: 401, .. }));
    assert_eq!(err.exit_code(), 1);
    // 4xx is never retried
    assert_eq!(transport.posts.borrow().len(), 1);
    assert!(store.snapshot().is_empty());
}

#[test]
fn remote_server_errors_are_retried() {
    let config = remote_config(None, 100);
    let transport = ScriptedTransport::new().paged(10, 100).post_statuses(&[503, 500]);
    let mut store = MemoryStore::new();

    let summary = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap();
    assert_eq!(summary.delivered, 10);
    assert_eq!(transport.posts.borrow().len(), 3);
}

#[test]
fn remote_retries_exhausted_is_fatal() {
    let config = remote_config(None, 100);
    let transport = ScriptedTransport::new()
        .paged(10, 100)
        .post_statuses(&[503, 503, 503]);
    let mut store = MemoryStore::new();

    let err = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap_err();
    assert!(matches!(err, PipelineError::Delivery(_)));
    assert_eq!(transport.posts.borrow().len(), 3);
    assert!(store.snapshot().is_empty());
}

#[test]
fn invalid_config_fails_before_any_request() {
    let mut config = remote_config(None, 100);
    if let Delivery::Remote(remote) = &mut config.delivery {
        remote.url = String::new();
    }
    let transport = ScriptedTransport::new().paged(10, 100);
    let mut store = MemoryStore::new();

    let err = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(transport.get_count(), 0);
}

#[test]
fn out_of_range_fetch_hours_fails_before_any_request() {
    let dir = TempDir::new().unwrap();
    let mut config = local_config(dir.path());
    config.fetch_hours = u32::MAX;
    let transport = ScriptedTransport::new().paged(10, 100);
    let mut store = MemoryStore::new();

    let err = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(transport.get_count(), 0);
    assert_eq!(store.commit_count(), 0);
}

#[test]
fn unwritable_output_is_fatal_and_uncommitted() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();
    let config = local_config(&blocker.join("out"));
    let transport = ScriptedTransport::new().paged(5, 100);
    let mut store = MemoryStore::new();

    let err = run(&config, &transport, &mut store, now(), &ProgressContext::hidden()).unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
    assert!(store.snapshot().is_empty());
}
