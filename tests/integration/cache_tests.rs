//! Render cache integration tests.
//!
//! Tests verify:
//! - Documents are fetched once and pages rendered once
//! - The decoded document is released once every page is rendered
//! - Purge and staleness eviction
//! - Concurrent requests share one fetch and one render
//! - A purge during a render never leaks old pages into the new entry
//! - Failures never leave partial state behind

use std::sync::Arc;
use std::time::Duration;

use manual_renderer::{CacheError, PageImage};
use tokio::task::JoinHandle;

use super::test_utils::{
    create_cache, create_cache_with_clock, is_valid_png, MockFetcher, MockRasterizer, TestCache,
};

// =============================================================================
// End-to-end Scenario
// =============================================================================

#[tokio::test]
async fn test_three_page_document_lifecycle() {
    let cache = create_cache(
        MockFetcher::new().with_document("X17", 3),
        MockRasterizer::new(),
    );

    // Count triggers fetch and decode
    assert_eq!(cache.resolve_page_count("X17").await.unwrap(), 3);
    assert_eq!(cache.fetcher().fetch_count("X17"), 1);
    assert_eq!(cache.rasterizer().decode_count(), 1);

    // First page renders, handle stays
    let p0 = cache.resolve_page("X17", 0).await.unwrap();
    assert!(is_valid_png(&p0.data));
    assert_eq!(p0.content_type, "image/png");
    let state = cache.dump_debug_state().await;
    assert!(state.get("X17").unwrap().handle_present);

    // Out of range
    let err = cache.resolve_page("X17", 5).await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::OutOfRange {
            page: 5,
            page_count: 3,
            ..
        }
    ));

    // Remaining pages render, handle goes away after the last one
    cache.resolve_page("X17", 1).await.unwrap();
    assert!(cache.dump_debug_state().await.get("X17").unwrap().handle_present);
    cache.resolve_page("X17", 2).await.unwrap();
    assert!(!cache.dump_debug_state().await.get("X17").unwrap().handle_present);

    // Page 0 again: same bytes, no new render
    let again = cache.resolve_page("X17", 0).await.unwrap();
    assert!(again.cache_hit);
    assert_eq!(again.data, p0.data);

    let rasterizer = cache.rasterizer();
    assert_eq!(rasterizer.render_count(0), 1);
    assert_eq!(rasterizer.render_count(1), 1);
    assert_eq!(rasterizer.render_count(2), 1);
    assert_eq!(cache.fetcher().fetch_count("X17"), 1);
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_page_count_is_cached() {
    let cache = create_cache(
        MockFetcher::new().with_document("Wires", 4),
        MockRasterizer::new(),
    );

    for _ in 0..5 {
        assert_eq!(cache.resolve_page_count("Wires").await.unwrap(), 4);
    }
    assert_eq!(cache.fetcher().fetch_count("Wires"), 1);
}

#[tokio::test]
async fn test_page_request_on_unseen_document_fetches_once() {
    let cache = create_cache(
        MockFetcher::new().with_document("Wires", 2),
        MockRasterizer::new(),
    );

    cache.resolve_page("Wires", 1).await.unwrap();
    assert_eq!(cache.resolve_page_count("Wires").await.unwrap(), 2);
    assert_eq!(cache.fetcher().fetch_count("Wires"), 1);
}

#[tokio::test]
async fn test_different_pages_render_different_bytes() {
    let cache = create_cache(
        MockFetcher::new().with_document("Wires", 2),
        MockRasterizer::new(),
    );

    let p0 = cache.resolve_page("Wires", 0).await.unwrap();
    let p1 = cache.resolve_page("Wires", 1).await.unwrap();
    assert_ne!(p0.data, p1.data);
}

#[tokio::test]
async fn test_documents_are_independent() {
    let cache = create_cache(
        MockFetcher::new()
            .with_document("A", 1)
            .with_document("B", 2),
        MockRasterizer::new(),
    );

    cache.resolve_page("A", 0).await.unwrap();
    cache.resolve_page("B", 0).await.unwrap();

    let state = cache.dump_debug_state().await;
    assert!(!state.get("A").unwrap().handle_present);
    assert!(state.get("B").unwrap().handle_present);

    let stats = cache.stats().await;
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.open_handles, 1);
    assert_eq!(stats.rendered_pages, 2);
}

#[tokio::test]
async fn test_single_page_document_released_immediately() {
    let cache = create_cache(
        MockFetcher::new().with_document("Button", 1),
        MockRasterizer::new(),
    );

    cache.resolve_page("Button", 0).await.unwrap();
    let state = cache.dump_debug_state().await;
    let entry = state.get("Button").unwrap();
    assert!(!entry.handle_present);
    assert_eq!(entry.pages.len(), 1);
    assert!(entry.pages[0].is_some());
}

#[tokio::test]
async fn test_empty_document() {
    let cache = create_cache(
        MockFetcher::new().with_document("Blank", 0),
        MockRasterizer::new(),
    );

    assert_eq!(cache.resolve_page_count("Blank").await.unwrap(), 0);
    assert!(matches!(
        cache.resolve_page("Blank", 0).await,
        Err(CacheError::OutOfRange { page_count: 0, .. })
    ));
    assert!(!cache.dump_debug_state().await.get("Blank").unwrap().handle_present);
}

// =============================================================================
// Purge and Eviction
// =============================================================================

#[tokio::test]
async fn test_purge_then_count_refetches() {
    let (cache, clock) = create_cache_with_clock(
        MockFetcher::new().with_document("X17", 3),
        MockRasterizer::new(),
    );

    cache.resolve_page("X17", 0).await.unwrap();
    let before = cache.dump_debug_state().await.get("X17").unwrap().last_access;

    assert_eq!(cache.purge_all().await, 1);
    clock.advance(Duration::from_secs(30));

    assert_eq!(cache.resolve_page_count("X17").await.unwrap(), 3);
    assert_eq!(cache.fetcher().fetch_count("X17"), 2);

    let state = cache.dump_debug_state().await;
    let entry = state.get("X17").unwrap();
    assert!(entry.handle_present);
    assert_eq!(entry.pages, vec![None, None, None]);
    assert!(entry.last_access > before);

    // Rendered pages were dropped with the entry
    let page = cache.resolve_page("X17", 0).await.unwrap();
    assert!(!page.cache_hit);
    assert_eq!(cache.rasterizer().render_count(0), 2);
}

#[tokio::test]
async fn test_stale_entry_evicted_on_unrelated_miss() {
    let (cache, clock) = create_cache_with_clock(
        MockFetcher::new()
            .with_document("Old", 2)
            .with_document("Fresh", 2)
            .with_document("New", 2),
        MockRasterizer::new(),
    );

    cache.resolve_page("Old", 0).await.unwrap();
    clock.advance(Duration::from_secs(23 * 3600));
    cache.resolve_page_count("Fresh").await.unwrap();
    clock.advance(Duration::from_secs(2 * 3600));

    // Nothing is swept until a new document is loaded
    assert_eq!(cache.entry_count().await, 2);

    cache.resolve_page_count("New").await.unwrap();
    let state = cache.dump_debug_state().await;
    assert!(state.get("Old").is_none());
    assert!(state.get("Fresh").is_some());
    assert!(state.get("New").is_some());

    // An evicted document is fetched again on demand
    cache.resolve_page_count("Old").await.unwrap();
    assert_eq!(cache.fetcher().fetch_count("Old"), 2);
}

#[tokio::test]
async fn test_access_keeps_entry_fresh() {
    let (cache, clock) = create_cache_with_clock(
        MockFetcher::new()
            .with_document("Busy", 2)
            .with_document("Other", 1),
        MockRasterizer::new(),
    );

    cache.resolve_page_count("Busy").await.unwrap();
    for _ in 0..3 {
        clock.advance(Duration::from_secs(20 * 3600));
        cache.resolve_page("Busy", 0).await.unwrap();
    }

    cache.resolve_page_count("Other").await.unwrap();
    assert!(cache.dump_debug_state().await.get("Busy").is_some());
}

#[tokio::test]
async fn test_out_of_range_does_not_refresh_entry() {
    let (cache, clock) = create_cache_with_clock(
        MockFetcher::new().with_document("Wires", 2),
        MockRasterizer::new(),
    );

    cache.resolve_page_count("Wires").await.unwrap();
    let before = cache.dump_debug_state().await;

    clock.advance(Duration::from_secs(60));
    assert!(cache.resolve_page("Wires", 2).await.is_err());
    assert!(cache.resolve_page("Wires", -3).await.is_err());

    assert_eq!(cache.dump_debug_state().await, before);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_fetch_leaves_no_entry() {
    let cache = create_cache(
        MockFetcher::new().with_broken("Flaky"),
        MockRasterizer::new(),
    );

    let err = cache.resolve_page_count("Flaky").await.unwrap_err();
    assert!(matches!(err, CacheError::FetchFailed { .. }));
    assert_eq!(cache.entry_count().await, 0);

    let err = cache.resolve_page_count("Missing").await.unwrap_err();
    assert!(matches!(err, CacheError::NotFound { .. }));
    assert!(err.is_client_error());
    assert_eq!(cache.entry_count().await, 0);
}

#[tokio::test]
async fn test_failed_decode_leaves_no_entry() {
    let cache = create_cache(
        MockFetcher::new().with_garbage("Junk"),
        MockRasterizer::new(),
    );

    let err = cache.resolve_page("Junk", 0).await.unwrap_err();
    assert!(matches!(err, CacheError::DecodeFailed { .. }));
    assert_eq!(cache.entry_count().await, 0);
}

#[tokio::test]
async fn test_failed_render_is_retried() {
    let cache = create_cache(
        MockFetcher::new().with_document("Wires", 3),
        MockRasterizer::new().with_failing_page(1),
    );

    for _ in 0..2 {
        let err = cache.resolve_page("Wires", 1).await.unwrap_err();
        assert!(matches!(err, CacheError::RenderFailed { page: 1, .. }));
    }
    // Failures are not cached; each request tries again
    assert_eq!(cache.rasterizer().render_count(1), 2);

    let state = cache.dump_debug_state().await;
    let entry = state.get("Wires").unwrap();
    assert!(entry.handle_present);
    assert_eq!(entry.pages, vec![None, None, None]);
}

#[tokio::test]
async fn test_render_timeout_commits_nothing() {
    let fetcher = MockFetcher::new().with_document("Slow", 1);
    let rasterizer = MockRasterizer::new().with_delay(Duration::from_millis(400));
    let config = super::test_utils::test_cache_config()
        .with_render_timeout(Duration::from_millis(50));
    let cache = manual_renderer::RenderCache::new(fetcher, rasterizer, config);

    let err = cache.resolve_page("Slow", 0).await.unwrap_err();
    match err {
        CacheError::RenderFailed { message, .. } => assert!(message.contains("timed out")),
        other => panic!("Expected RenderFailed, got {:?}", other),
    }

    let state = cache.dump_debug_state().await;
    assert_eq!(state.get("Slow").unwrap().pages, vec![None]);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_share_one_fetch() {
    let cache = create_cache(
        MockFetcher::new()
            .with_document("Popular", 5)
            .with_delay(Duration::from_millis(100)),
        MockRasterizer::new(),
    );

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache.resolve_page_count("Popular").await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 5);
    }

    assert_eq!(cache.fetcher().fetch_count("Popular"), 1);
    assert_eq!(cache.rasterizer().decode_count(), 1);
    assert_eq!(cache.entry_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_page_requests_share_one_render() {
    let cache = create_cache(
        MockFetcher::new().with_document("Popular", 3),
        MockRasterizer::new().with_delay(Duration::from_millis(100)),
    );
    cache.resolve_page_count("Popular").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(
            async move { cache.resolve_page("Popular", 2).await },
        ));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        bodies.push(handle.await.unwrap().unwrap().data);
    }

    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(cache.rasterizer().render_count(2), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_requests_stay_consistent() {
    let cache = create_cache(
        MockFetcher::new()
            .with_document("A", 4)
            .with_document("B", 4)
            .with_delay(Duration::from_millis(20)),
        MockRasterizer::new().with_delay(Duration::from_millis(5)),
    );

    let mut handles = Vec::new();
    for i in 0..32i64 {
        let cache = Arc::clone(&cache);
        let id = if i % 2 == 0 { "A" } else { "B" };
        handles.push(tokio::spawn(async move {
            cache.resolve_page(id, i % 4).await.map(|page| page.data)
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(cache.fetcher().total_fetches(), 2);
    assert_eq!(cache.rasterizer().total_renders(), 8);

    let state = cache.dump_debug_state().await;
    assert_eq!(state.entries.len(), 2);
    for entry in &state.entries {
        assert!(!entry.handle_present);
        assert!(entry.pages.iter().all(Option::is_some));
    }
}

// =============================================================================
// Purge While Busy
// =============================================================================

/// Spawn a render of `page` and wait until the rasterizer has started it.
async fn start_render(
    cache: &Arc<TestCache>,
    id: &'static str,
    page: usize,
) -> JoinHandle<Result<PageImage, CacheError>> {
    let handle = {
        let cache = Arc::clone(cache);
        tokio::spawn(async move { cache.resolve_page(id, page as i64).await })
    };
    while cache.rasterizer().render_count(page) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    handle
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_render_finishing_after_purge_is_not_stored() {
    let cache = create_cache(
        MockFetcher::new().with_revisions("Wires", 2),
        MockRasterizer::new().with_delay(Duration::from_millis(300)),
    );

    let in_flight = start_render(&cache, "Wires", 0).await;

    assert_eq!(cache.purge_all().await, 1);
    assert_eq!(cache.resolve_page_count("Wires").await.unwrap(), 2);
    assert_eq!(cache.fetcher().fetch_count("Wires"), 2);

    // The caller that started before the purge still gets its page
    let old = in_flight.await.unwrap().unwrap();
    assert!(!old.cache_hit);
    assert!(is_valid_png(&old.data));

    // but the re-fetched entry does not adopt it
    let state = cache.dump_debug_state().await;
    let entry = state.get("Wires").unwrap();
    assert!(entry.handle_present);
    assert_eq!(entry.pages, vec![None, None]);

    let fresh = cache.resolve_page("Wires", 0).await.unwrap();
    assert!(!fresh.cache_hit);
    assert_ne!(fresh.data, old.data);
    assert_eq!(cache.rasterizer().render_count(0), 2);

    let again = cache.resolve_page("Wires", 0).await.unwrap();
    assert!(again.cache_hit);
    assert_eq!(again.data, fresh.data);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_after_purge_does_not_join_old_render() {
    let cache = create_cache(
        MockFetcher::new().with_revisions("Wires", 2),
        MockRasterizer::new().with_delay(Duration::from_millis(300)),
    );

    let in_flight = start_render(&cache, "Wires", 0).await;
    cache.purge_all().await;

    // Re-fetches and renders from the new revision while the old render runs
    let fresh = cache.resolve_page("Wires", 0).await.unwrap();
    let old = in_flight.await.unwrap().unwrap();

    assert!(!fresh.cache_hit);
    assert_ne!(fresh.data, old.data);
    assert_eq!(cache.fetcher().fetch_count("Wires"), 2);
    assert_eq!(cache.rasterizer().render_count(0), 2);

    let stored = cache.resolve_page("Wires", 0).await.unwrap();
    assert!(stored.cache_hit);
    assert_eq!(stored.data, fresh.data);
}
