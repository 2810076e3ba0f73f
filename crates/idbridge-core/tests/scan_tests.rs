//! Paginated scan tests

use idbridge_core::{DatabaseConfig, MemoryBackend, Page, StorageClient, StoreConfig, StoreError};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// Helper to create a client whose "items" collection holds keys 1..=n
async fn client_with_items(n: i64) -> StorageClient<MemoryBackend> {
    let client = StorageClient::new(MemoryBackend::new());
    client
        .initialize(
            DatabaseConfig::new("scan", 1),
            vec![StoreConfig::new("items", "id")],
        )
        .await
        .unwrap();
    for id in 1..=n {
        client
            .insert("items", &json!({"id": id, "label": format!("item-{}", id)}))
            .await
            .unwrap();
    }
    client
}

fn ids(records: &[Value]) -> Vec<i64> {
    records.iter().filter_map(|r| r["id"].as_i64()).collect()
}

#[tokio::test(flavor = "current_thread")]
async fn test_scan_length_law() {
    let n = 12i64;
    let client = client_with_items(n).await;

    for skip in [0u32, 1, 5, 11, 12, 20] {
        for limit in [1u32, 3, 12, 50] {
            let page = client
                .find_paginated("items", Page { skip, limit })
                .await
                .unwrap();
            let expected = (limit as i64).min(n - skip as i64).max(0) as usize;
            assert_eq!(page.len(), expected, "skip={} limit={}", skip, limit);
        }
    }
}

#[tokio::test(flavor = "current_thread")]
async fn test_full_scan_is_natural_order() {
    let client = client_with_items(8).await;
    let page = client.find_paginated("items", Page::first(8)).await.unwrap();
    assert_eq!(ids(&page), (1..=8).collect::<Vec<_>>());
}

#[tokio::test(flavor = "current_thread")]
async fn test_adjacent_windows_cover_larger_window() {
    let client = client_with_items(20).await;

    let first = client.find_paginated("items", Page::new(5, 3)).await.unwrap();
    let second = client
        .find_paginated("items", Page::new(5, 3).next())
        .await
        .unwrap();
    let combined = client.find_paginated("items", Page::new(5, 6)).await.unwrap();

    let mut joined = ids(&first);
    joined.extend(ids(&second));
    assert_eq!(joined, ids(&combined));
    assert_eq!(joined, vec![6, 7, 8, 9, 10, 11]);
}

#[tokio::test(flavor = "current_thread")]
async fn test_negative_skip_starts_at_first_record() {
    let client = client_with_items(4).await;
    let page = client.find_paginated("items", Page::new(-3, 2)).await.unwrap();
    assert_eq!(ids(&page), vec![1, 2]);
}

#[tokio::test(flavor = "current_thread")]
async fn test_scan_empty_collection() {
    let client = client_with_items(0).await;
    let page = client
        .find_paginated("items", Page::new(3, 10))
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn test_skip_past_end_is_empty_not_error() {
    let client = client_with_items(3).await;
    let page = client
        .find_paginated("items", Page::new(3, 10))
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn test_zero_limit_touches_nothing() {
    let client = client_with_items(3).await;
    let before = client.backend().request_count();

    let page = client
        .find_paginated("items", Page::new(0, 0))
        .await
        .unwrap();

    assert!(page.is_empty());
    assert_eq!(client.backend().request_count(), before);
}

#[tokio::test(flavor = "current_thread")]
async fn test_scan_follows_key_order_not_insertion_order() {
    let client = client_with_items(0).await;
    for id in [30, 10, 20] {
        client.insert("items", &json!({"id": id})).await.unwrap();
    }
    let page = client.find_paginated("items", Page::first(3)).await.unwrap();
    assert_eq!(ids(&page), vec![10, 20, 30]);
}

#[tokio::test(flavor = "current_thread")]
async fn test_string_keys_scan_in_utf16_order() {
    let client = client_with_items(0).await;
    for id in ["\u{FFFF}", "\u{10000}", "z"] {
        client.insert("items", &json!({"id": id})).await.unwrap();
    }

    let page = client.find_paginated("items", Page::first(3)).await.unwrap();
    let order: Vec<&str> = page.iter().filter_map(|r| r["id"].as_str()).collect();
    assert_eq!(order, vec!["z", "\u{10000}", "\u{FFFF}"]);
}

#[tokio::test(flavor = "current_thread")]
async fn test_cursor_failure_aborts_scan() {
    let client = client_with_items(10).await;
    client.backend().fail_cursor_after(2);

    let result = client.find_paginated("items", Page::first(10)).await;
    assert!(matches!(result, Err(StoreError::Cursor(_))));

    // The fault is spent; the next scan completes
    let page = client.find_paginated("items", Page::first(10)).await.unwrap();
    assert_eq!(page.len(), 10);
}

#[tokio::test(flavor = "current_thread")]
async fn test_failure_during_skip_aborts_scan() {
    let client = client_with_items(10).await;
    client.backend().fail_cursor_after(0);

    let result = client.find_paginated("items", Page::new(4, 2)).await;
    assert!(matches!(result, Err(StoreError::Cursor(_))));
}
