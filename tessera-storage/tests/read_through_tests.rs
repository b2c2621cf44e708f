//! Integration tests for the read-through cache.
//!
//! Tests run on the default current-thread runtime, so a background write
//! does not run until the test awaits `flush_writes` (or otherwise yields).

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tessera_storage::{
    CacheSettings, CapacityConfig, FetchResponse, IdShape, NormalizedCache, RequestOptions,
    ResponseMetadata, TypeConfig,
};
use tessera_test_utils::assertions::*;
use tessera_test_utils::fixtures::*;
use tessera_test_utils::{FailingFetcher, MockFetcher};

async fn prime(cache: &NormalizedCache, fetcher: &MockFetcher, params: &[Value]) {
    let first = cache.get(fetcher, params, &RequestOptions::new()).await;
    assert_miss(&first);
    cache.flush_writes().await;
}

// ============================================================================
// HITS AND MISSES
// ============================================================================

#[tokio::test]
async fn test_list_is_served_from_cache_on_second_call() {
    let cache = default_cache();
    let fetcher = list_fetcher();

    prime(&cache, &fetcher, &[]).await;
    let second = cache.get(&fetcher, &[], &RequestOptions::new()).await;

    assert_hit(&second);
    let read = second.unwrap();
    assert_eq!(read.body(), &two_items());
    assert_eq!(read.metadata(), &ResponseMetadata::Present(json_headers()));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    prime(&cache, &fetcher, &[json!({"page": 1})]).await;

    let a = cache.get(&fetcher, &[json!({"page": 1})], &RequestOptions::new()).await.unwrap();
    let b = cache.get(&fetcher, &[json!({"page": 1})], &RequestOptions::new()).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.body(), &users_and_team());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_distinct_params_are_cached_separately() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    prime(&cache, &fetcher, &[json!(1)]).await;

    let other = cache.get(&fetcher, &[json!(2)], &RequestOptions::new()).await;
    assert_miss(&other);
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(fetcher.seen_params(), vec![vec![json!(1)], vec![json!(2)]]);
}

#[tokio::test]
async fn test_param_key_order_does_not_matter() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    prime(&cache, &fetcher, &[json!({"a": 1, "b": 2})]).await;

    let reordered = cache
        .get(&fetcher, &[json!({"b": 2, "a": 1})], &RequestOptions::new())
        .await;
    assert_hit(&reordered);
}

#[tokio::test]
async fn test_missing_metadata_is_served_as_empty() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    prime(&cache, &fetcher, &[]).await;

    assert_eq!(
        cache.head("listUsers", &[]).unwrap(),
        Some(ResponseMetadata::Empty)
    );
    let read = cache.get(&fetcher, &[], &RequestOptions::new()).await.unwrap();
    assert_eq!(read.metadata(), &ResponseMetadata::Empty);
}

#[tokio::test]
async fn test_immediate_second_call_may_fetch_again() {
    let cache = default_cache();
    let fetcher = list_fetcher();

    let first = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    let second = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    assert_miss(&first);
    assert_miss(&second);
    assert_eq!(fetcher.calls(), 2);

    cache.flush_writes().await;
    assert_hit(&cache.get(&fetcher, &[], &RequestOptions::new()).await);
}

// ============================================================================
// REFERENTIAL CONSISTENCY
// ============================================================================

#[tokio::test]
async fn test_deleted_entity_forces_refetch() {
    let cache = default_cache();
    let fetcher = list_fetcher();
    prime(&cache, &fetcher, &[]).await;

    assert_eq!(cache.delete_data(LIST_KEY, &json!(0)).unwrap(), 1);
    assert_eq!(cache.body(LIST_KEY, &[]).unwrap(), None);

    let after = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    assert_miss(&after);
    assert_eq!(after.unwrap().body(), &two_items());
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(cache.stats().unwrap().stale_references, 1);
}

#[tokio::test]
async fn test_inspection_helpers_do_not_count_reads() {
    let cache = default_cache();
    let fetcher = list_fetcher();
    prime(&cache, &fetcher, &[]).await;
    let before = cache.stats().unwrap();

    assert_eq!(cache.body(LIST_KEY, &[]).unwrap(), Some(two_items()));
    assert_eq!(cache.body(LIST_KEY, &[json!("other")]).unwrap(), None);
    cache.delete_data(LIST_KEY, &json!(1)).unwrap();
    assert_eq!(cache.body(LIST_KEY, &[]).unwrap(), None);

    let after = cache.stats().unwrap();
    assert_eq!(after.hits, before.hits);
    assert_eq!(after.misses, before.misses);
    assert_eq!(after.stale_references, before.stale_references);
}

#[tokio::test]
async fn test_delete_accepts_entities_and_arrays() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    prime(&cache, &fetcher, &[]).await;

    let removed = cache
        .delete_data("users", &json!([{ "id": 1 }, 2, 99]))
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(cache.entity("users", 1).unwrap(), None);
    assert_eq!(cache.entity("team", "core").unwrap(), Some(json!({"id": "core", "size": 2})));
}

#[tokio::test]
async fn test_upserted_entity_is_visible_through_cached_requests() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    prime(&cache, &fetcher, &[]).await;

    cache
        .reset_data(Some("users"), Some(&json!({"id": 1, "name": "ada lovelace"})))
        .unwrap();

    let read = cache.get(&fetcher, &[], &RequestOptions::new()).await.unwrap();
    assert!(read.was_cache_hit());
    assert_eq!(read.body()["users"][0], json!({"id": 1, "name": "ada lovelace"}));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_evicted_entity_invalidates_request() {
    let cache = small_cache(2);
    let fetcher = MockFetcher::new(
        "three",
        FetchResponse::new(json!([{ "id": 1 }, { "id": 2 }, { "id": 3 }])),
    );
    prime(&cache, &fetcher, &[]).await;

    // Only two of the three entities fit, so the record can never be rebuilt.
    let again = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    assert_miss(&again);
    let stats = cache.stats().unwrap();
    assert!(stats.evictions >= 1);
    assert_eq!(stats.stale_references, 1);
}

#[tokio::test]
async fn test_request_eviction_hook_reports_fingerprint() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    let options = RequestOptions::new().cache(
        CapacityConfig::new(1).with_on_evict(move |key| sink.lock().unwrap().push(key.to_string())),
    );

    cache.get(&fetcher, &[json!(1)], &options).await.unwrap();
    cache.flush_writes().await;
    cache.get(&fetcher, &[json!(2)], &options).await.unwrap();
    cache.flush_writes().await;

    let evicted = evicted.lock().unwrap();
    assert!(!evicted.is_empty());
    assert!(evicted.iter().all(|key| key.len() == 64));
    assert_eq!(cache.body("listUsers", &[json!(1)]).unwrap(), None);
    assert!(cache.body("listUsers", &[json!(2)]).unwrap().is_some());
}

// ============================================================================
// INVALIDATION
// ============================================================================

#[tokio::test]
async fn test_override_request_points_at_other_entities() {
    let cache = default_cache();
    let fetcher = list_fetcher();
    prime(&cache, &fetcher, &[]).await;

    cache
        .reset_requests(
            Some(LIST_KEY),
            Some(&[]),
            Some(IdShape::new().with_sequence(LIST_KEY, [1])),
        )
        .unwrap();

    let read = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    assert_hit(&read);
    let read = read.unwrap();
    assert_eq!(read.body(), &json!([{ "id": 1 }]));
    assert_eq!(read.metadata(), &ResponseMetadata::Present(json_headers()));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_override_of_list_with_another_type_serves_that_type() {
    let cache = default_cache();
    let fetcher = list_fetcher();
    prime(&cache, &fetcher, &[]).await;

    cache.reset_data(Some("users"), Some(&json!({ "id": 1 }))).unwrap();
    cache
        .reset_requests(
            Some(LIST_KEY),
            Some(&[]),
            Some(IdShape::new().with_sequence("users", [1])),
        )
        .unwrap();

    let read = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    assert_hit(&read);
    assert_eq!(read.unwrap().body(), &json!({ "users": [{ "id": 1 }] }));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_override_on_unknown_key_is_ignored() {
    let cache = default_cache();
    cache
        .reset_requests(Some("never"), Some(&[]), Some(IdShape::new().with_scalar("users", 1)))
        .unwrap();
    assert_eq!(cache.head("never", &[]).unwrap(), None);
}

#[tokio::test]
async fn test_reset_requests_levels() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    prime(&cache, &fetcher, &[json!(1)]).await;
    prime(&cache, &fetcher, &[json!(2)]).await;

    cache.reset_requests(Some("listUsers"), Some(&[json!(1)]), None).unwrap();
    assert_eq!(cache.body("listUsers", &[json!(1)]).unwrap(), None);
    assert!(cache.body("listUsers", &[json!(2)]).unwrap().is_some());

    cache.reset_requests(Some("listUsers"), None, None).unwrap();
    assert_eq!(cache.body("listUsers", &[json!(2)]).unwrap(), None);

    // Entities survive a request reset.
    assert!(cache.entity("users", 1).unwrap().is_some());

    cache.reset_requests(None, None, None).unwrap();
    assert_eq!(cache.stats().unwrap().request_count, 0);
}

#[tokio::test]
async fn test_reset_data_levels() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    prime(&cache, &fetcher, &[]).await;

    cache.reset_data(Some("team"), None).unwrap();
    assert_eq!(cache.entity("team", "core").unwrap(), None);
    assert!(cache.entity("users", 2).unwrap().is_some());
    assert_eq!(cache.body("listUsers", &[]).unwrap(), None);

    cache.reset_data(None, None).unwrap();
    assert_eq!(cache.stats().unwrap().entity_count, 0);
}

// ============================================================================
// OPTIONS
// ============================================================================

#[tokio::test]
async fn test_failed_rule_bypasses_cache() {
    let cache = default_cache();
    let fetcher = list_fetcher();
    prime(&cache, &fetcher, &[]).await;
    let before = cache.stats().unwrap();

    let options = RequestOptions::new().rule(|params| !params.is_empty());
    let read = cache.get(&fetcher, &[], &options).await;
    assert_miss(&read);
    cache.flush_writes().await;

    let after = cache.stats().unwrap();
    assert_eq!(after.hits, before.hits);
    assert_eq!(after.misses, before.misses);
    assert_eq!(after.bypasses, before.bypasses + 1);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_bypassed_call_is_not_written() {
    let cache = default_cache();
    let fetcher = list_fetcher();
    let options = RequestOptions::new().rule(|_| false);

    cache.get(&fetcher, &[], &options).await.unwrap();
    cache.flush_writes().await;
    assert_eq!(cache.head(LIST_KEY, &[]).unwrap(), None);
}

#[tokio::test]
async fn test_format_and_unformat_wrap_the_tiers() {
    let cache = default_cache();
    let fetcher = list_fetcher();
    let options = RequestOptions::new()
        .format(|body| json!({ "items": body }))
        .unformat(|body| body["items"].clone());

    let first = cache.get(&fetcher, &[], &options).await.unwrap();
    assert_eq!(first.body(), &two_items());
    cache.flush_writes().await;

    // Stored keyed by the formatted root, returned unformatted.
    assert_eq!(
        cache.body(LIST_KEY, &[]).unwrap(),
        Some(json!({ "items": two_items() }))
    );
    assert_eq!(cache.entity("items", 1).unwrap(), Some(json!({ "id": 1 })));
    let second = cache.get(&fetcher, &[], &options).await.unwrap();
    assert!(second.was_cache_hit());
    assert_eq!(second.body(), &two_items());
}

#[tokio::test]
async fn test_options_name_overrides_fetcher_name() {
    let cache = default_cache();
    let fetcher = list_fetcher();
    let options = RequestOptions::new().named("renamed");

    cache.get(&fetcher, &[], &options).await.unwrap();
    cache.flush_writes().await;
    assert!(cache.head("renamed", &[]).unwrap().is_some());
    assert_eq!(cache.head(LIST_KEY, &[]).unwrap(), None);
}

#[tokio::test]
async fn test_custom_id_property() {
    let settings = CacheSettings::default()
        .with_type("people", TypeConfig::new().with_id_property("uuid"));
    let cache = NormalizedCache::new(settings);
    let fetcher = MockFetcher::new(
        "people",
        FetchResponse::new(json!({ "people": [{ "uuid": "a1" }, { "uuid": "b2" }] })),
    );
    prime(&cache, &fetcher, &[]).await;

    assert_eq!(cache.entity("people", "b2").unwrap(), Some(json!({ "uuid": "b2" })));
    assert_hit(&cache.get(&fetcher, &[], &RequestOptions::new()).await);
}

// ============================================================================
// GET BY ID
// ============================================================================

#[tokio::test]
async fn test_get_by_id_short_circuits() {
    let cache = default_cache();
    let fetcher = users_fetcher();
    prime(&cache, &fetcher, &[]).await;

    let read = cache
        .get_by_id("users", 2, &fetcher, &[json!("unused")], &RequestOptions::new())
        .await;
    assert_hit(&read);
    assert_eq!(
        read.unwrap().body(),
        &json!({ "users": { "id": 2, "name": "grace" } })
    );
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_get_by_id_falls_back_to_get() {
    let cache = default_cache();
    let fetcher = users_fetcher();

    let read = cache
        .get_by_id("users", 7, &fetcher, &[], &RequestOptions::new())
        .await;
    assert_miss(&read);
    assert_eq!(fetcher.calls(), 1);
}

// ============================================================================
// ERRORS
// ============================================================================

#[tokio::test]
async fn test_anonymous_fetcher_without_name_fails() {
    let cache = default_cache();
    let fetcher = MockFetcher::anonymous(FetchResponse::new(two_items()));

    let result = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    assert_missing_key(&result);
    assert_eq!(fetcher.calls(), 0);

    let named = cache
        .get(&fetcher, &[], &RequestOptions::new().named("anon"))
        .await;
    assert_miss(&named);
}

#[tokio::test]
async fn test_missing_request_capacity_fails_before_fetch() {
    let cache = NormalizedCache::new(CacheSettings::without_capacity_defaults());
    let fetcher = list_fetcher();

    let result = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    assert_missing_request_capacity(&result, LIST_KEY);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_capacity_check_precedes_body_shape() {
    let cache = NormalizedCache::new(CacheSettings::without_capacity_defaults());
    let fetcher = MockFetcher::new("count", FetchResponse::new(json!(42)));

    let result = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    assert_missing_request_capacity(&result, "count");
    assert_eq!(fetcher.calls(), 0);
}

#[test]
fn test_upsert_into_unconfigured_type_is_a_config_error() {
    let cache = NormalizedCache::new(CacheSettings::without_capacity_defaults());

    assert_config_error(&cache.reset_data(Some("users"), Some(&json!({ "id": 1 }))));
    assert_eq!(cache.entity("users", 1).unwrap(), None);
}

#[tokio::test]
async fn test_missing_data_capacity_leaves_tiers_untouched() {
    let cache = NormalizedCache::new(CacheSettings::without_capacity_defaults());
    let fetcher = users_fetcher();
    let options = RequestOptions::new().cache(CapacityConfig::new(10));

    let read = cache.get(&fetcher, &[], &options).await;
    assert_miss(&read);
    cache.flush_writes().await;

    assert_eq!(cache.head("listUsers", &[]).unwrap(), None);
    assert_eq!(cache.entity("users", 1).unwrap(), None);
}

#[tokio::test]
async fn test_fetch_error_propagates_unchanged() {
    let cache = default_cache();
    let fetcher = FailingFetcher::new("broken", "upstream 503");

    let result = cache.get(&fetcher, &[], &RequestOptions::new()).await;
    assert_remote_error(&result, "upstream 503");
    assert_eq!(fetcher.calls(), 1);
    cache.flush_writes().await;

    assert_eq!(cache.head("broken", &[]).unwrap(), None);
    assert_eq!(cache.stats().unwrap().request_count, 0);
}

#[tokio::test]
async fn test_scalar_body_is_returned_but_not_cached() {
    let cache = default_cache();
    let fetcher = MockFetcher::new("count", FetchResponse::new(json!(42)));

    prime(&cache, &fetcher, &[]).await;
    assert_eq!(cache.head("count", &[]).unwrap(), None);
    assert_miss(&cache.get(&fetcher, &[], &RequestOptions::new()).await);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clones_share_tiers_across_tasks() {
    let cache = default_cache();
    let fetcher = Arc::new(list_fetcher());

    let mut tasks = Vec::new();
    for page in 0..8 {
        let cache = cache.clone();
        let fetcher = Arc::clone(&fetcher);
        tasks.push(tokio::spawn(async move {
            cache
                .get(fetcher.as_ref(), &[json!(page)], &RequestOptions::new())
                .await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    cache.flush_writes().await;

    for page in 0..8 {
        assert_hit(&cache.get(fetcher.as_ref(), &[json!(page)], &RequestOptions::new()).await);
    }
    assert_eq!(fetcher.calls(), 8);
}

#[test]
fn test_writes_complete_inline_outside_a_runtime() {
    let cache = default_cache();
    let response = FetchResponse::new(two_items());
    cache
        .set_caches(
            LIST_KEY,
            &tessera_storage::Fingerprint::of(&[]),
            &response,
            &RequestOptions::new(),
        )
        .unwrap();
    assert_eq!(cache.body(LIST_KEY, &[]).unwrap(), Some(two_items()));
}
