use crate::client::{ListPoliciesForTarget, PolicyCategory};
use crate::error::InventoryResult;
use crate::fetcher::{CursorChain, PaginatedFetcher};
use crate::store::EntityStore;
use tracing::debug;

/// Pulls every page of `category` policies attached to `ou_id` into the
/// unit's `policy_detail`. Returns the number of policies seen.
///
/// Re-running for the same unit and category overwrites entries by policy id
/// and leaves the unit's other categories untouched.
pub async fn aggregate_policies(
    fetcher: &mut PaginatedFetcher,
    store: &mut EntityStore,
    ou_id: &str,
    category: PolicyCategory
) -> InventoryResult<usize> {
    let operation = ListPoliciesForTarget {
        target_id: ou_id.to_string(),
        category
    };
    let mut chain = CursorChain::new();
    let mut count = 0;

    while let Some(policies) = fetcher.next_page(&operation, &mut chain).await? {
        count += policies.len();
        store.merge_policies(ou_id, category, policies)?;
    }

    debug!(ou_id, category = %category, count, pages = chain.pages(), "Aggregated policies");
    Ok(count)
}

/// Runs [`aggregate_policies`] for every known category.
pub async fn aggregate_all_policies(
    fetcher: &mut PaginatedFetcher,
    store: &mut EntityStore,
    ou_id: &str
) -> InventoryResult<usize> {
    let mut total = 0;
    for category in PolicyCategory::ALL {
        total += aggregate_policies(fetcher, store, ou_id, category).await?;
    }
    Ok(total)
}
