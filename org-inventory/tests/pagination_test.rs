mod common;

use common::{ScriptedOrganization, account, config};
use org_inventory::client::ListAccounts;
use org_inventory::collector::collect_account_list;
use org_inventory::fetcher::{CursorChain, PaginatedFetcher};
use org_inventory::{EntityStore, InventoryError, InventoryService, Page};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn three_page_listing() -> ScriptedOrganization {
    ScriptedOrganization::new()
        .with_account_page(None, Page::ok(vec![account("A1", "one")], Some("abc".into())))
        .with_account_page(Some("abc"), Page::ok(vec![account("A2", "two")], Some("def".into())))
        .with_account_page(Some("def"), Page::ok(vec![account("A3", "three")], None))
}

#[tokio::test(start_paused = true)]
async fn test_cursor_chain_issues_one_call_per_page() {
    let client = Arc::new(three_page_listing());
    let mut fetcher = PaginatedFetcher::new(client.clone(), &config(20));
    let mut store = EntityStore::new();

    let count = collect_account_list(&mut fetcher, &mut store).await.unwrap();

    assert_eq!(count, 3);
    let tokens: Vec<_> = client
        .calls_to("ListAccounts")
        .into_iter()
        .map(|c| c.next_token)
        .collect();
    assert_eq!(tokens, vec![None, Some("abc".to_string()), Some("def".to_string())]);
    assert_eq!(fetcher.stats().api_calls, 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_chain_makes_no_further_calls() {
    let client = Arc::new(three_page_listing());
    let mut fetcher = PaginatedFetcher::new(client.clone(), &config(20));
    let mut chain = CursorChain::new();

    while fetcher.next_page(&ListAccounts, &mut chain).await.unwrap().is_some() {}
    assert!(chain.is_exhausted());
    assert_eq!(chain.pages(), 3);

    assert!(fetcher.next_page(&ListAccounts, &mut chain).await.unwrap().is_none());
    assert_eq!(client.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_follow_up_pages_are_spaced() {
    let client = Arc::new(three_page_listing());
    let mut fetcher = PaginatedFetcher::new(client.clone(), &config(20));
    let mut store = EntityStore::new();
    let started = Instant::now();

    collect_account_list(&mut fetcher, &mut store).await.unwrap();

    let calls = client.calls_to("ListAccounts");
    for pair in calls.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= Duration::from_secs(1));
    }
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_first_page_is_not_delayed() {
    let client = Arc::new(
        ScriptedOrganization::new()
            .with_account(account("A1", "one"))
            .with_account(account("A2", "two"))
    );
    let mut fetcher = PaginatedFetcher::new(client.clone(), &config(20));
    let started = Instant::now();

    let accounts = fetcher.fetch_all(&ListAccounts).await.unwrap();

    assert_eq!(accounts.len(), 2);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_throttled_call_is_retried_with_same_token() {
    let client = Arc::new(three_page_listing());
    client.throttle("ListAccounts", 2);
    let mut fetcher = PaginatedFetcher::new(client.clone(), &config(20));
    let mut store = EntityStore::new();

    let count = collect_account_list(&mut fetcher, &mut store).await.unwrap();

    assert_eq!(count, 3);
    let tokens: Vec<_> = client
        .calls_to("ListAccounts")
        .into_iter()
        .map(|c| c.next_token)
        .collect();
    assert_eq!(
        tokens,
        vec![None, None, None, Some("abc".to_string()), Some("def".to_string())]
    );
    assert_eq!(fetcher.stats().throttled_retries, 2);
    assert_eq!(fetcher.backoff().current(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_not_reset_between_listings() {
    let client = Arc::new(
        ScriptedOrganization::new()
            .with_account(account("A1", "one"))
            .with_root(common::unit("r-root", "Root"))
    );
    client.throttle("ListAccounts", 1);
    client.throttle("ListRoots", 1);
    let mut fetcher = PaginatedFetcher::new(client.clone(), &config(20));

    fetcher.fetch_all(&ListAccounts).await.unwrap();
    assert_eq!(fetcher.backoff().current(), Duration::from_secs(2));

    let started = Instant::now();
    fetcher
        .fetch_all(&org_inventory::client::ListRoots)
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(fetcher.backoff().current(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_non_success_status_keeps_payload() {
    let client = Arc::new(
        ScriptedOrganization::new()
            .with_account(account("A1", "one"))
            .with_account(account("A2", "two"))
    );
    client.soft_status("ListAccounts", 500);
    let mut fetcher = PaginatedFetcher::new(client.clone(), &config(20));

    let accounts = fetcher.fetch_all(&ListAccounts).await.unwrap();

    assert_eq!(accounts.len(), 2);
    assert_eq!(fetcher.stats().soft_errors, 1);
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_error_is_not_retried() {
    let client = Arc::new(three_page_listing());
    client.fail("ListAccounts", "AccessDeniedException: not a management account");
    let service = InventoryService::new(config(20), client.clone());

    let err = service.collect().await.unwrap_err();

    assert!(matches!(
        err,
        InventoryError::Api {
            operation: "ListAccounts",
            ..
        }
    ));
    assert_eq!(client.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_page_size_fails_before_any_call() {
    let client = Arc::new(three_page_listing());
    let service = InventoryService::new(config(21), client.clone());

    let err = service.collect().await.unwrap_err();

    assert!(matches!(err, InventoryError::Config(_)));
    assert!(client.calls().is_empty());
}
