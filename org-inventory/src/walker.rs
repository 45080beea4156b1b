//! Depth-first traversal of one organization root.
//!
//! The walk keeps an explicit stack of pending units instead of recursing, so
//! deep hierarchies do not grow the call stack. Every unit is recorded and has
//! its policies aggregated before its accounts are linked and before any of its
//! children are visited.

use crate::client::{ListAccountsForParent, ListOrganizationalUnitsForParent, RawOrganizationalUnit};
use crate::error::InventoryResult;
use crate::fetcher::{CursorChain, PaginatedFetcher};
use crate::policy::aggregate_all_policies;
use crate::report::WarningKind;
use crate::store::EntityStore;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub units_visited: usize,
    pub accounts_linked: usize,
    pub missing_accounts: usize,
    pub policies: usize,
    pub max_depth: usize
}

struct PendingUnit {
    unit: RawOrganizationalUnit,
    parent_id: Option<String>,
    depth: usize
}

pub struct TreeWalker<'a> {
    fetcher: &'a mut PaginatedFetcher,
    store: &'a mut EntityStore,
    visit_pause: Duration,
    stats: WalkStats
}

impl<'a> TreeWalker<'a> {
    pub fn new(
        fetcher: &'a mut PaginatedFetcher,
        store: &'a mut EntityStore,
        visit_pause: Duration
    ) -> Self {
        Self {
            fetcher,
            store,
            visit_pause,
            stats: WalkStats::default()
        }
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    /// Visits `root` and everything below it.
    pub async fn walk(&mut self, root: RawOrganizationalUnit) -> InventoryResult<WalkStats> {
        let mut pending = vec![PendingUnit {
            unit: root,
            parent_id: None,
            depth: 0
        }];

        while let Some(PendingUnit {
            unit,
            parent_id,
            depth
        }) = pending.pop()
        {
            info!(ou_id = %unit.id, parent_id = ?parent_id, depth, "Tracking OU details");
            self.visit(&unit, parent_id.as_deref()).await?;
            self.collect_accounts(&unit.id).await?;

            let children = self.collect_children(&unit.id).await?;
            // Reversed so the first listed child is visited first.
            for child in children.into_iter().rev() {
                pending.push(PendingUnit {
                    unit: child,
                    parent_id: Some(unit.id.clone()),
                    depth: depth + 1
                });
            }
            self.stats.max_depth = self.stats.max_depth.max(depth);
        }

        Ok(self.stats)
    }

    /// Records the unit, aggregates its policies, then pauses.
    pub async fn visit(
        &mut self,
        unit: &RawOrganizationalUnit,
        parent_id: Option<&str>
    ) -> InventoryResult<()> {
        self.store.upsert_organizational_unit(unit, parent_id);
        self.stats.policies += aggregate_all_policies(self.fetcher, self.store, &unit.id).await?;
        self.stats.units_visited += 1;

        sleep(self.visit_pause).await;
        Ok(())
    }

    /// Links every account listed directly under `ou_id`. Accounts under a
    /// root, or under a unit that was never recorded, are marked unassociated.
    pub async fn collect_accounts(&mut self, ou_id: &str) -> InventoryResult<usize> {
        let link_target = self
            .store
            .unit(ou_id)
            .is_some_and(|unit| unit.kind.is_linkable())
            .then_some(ou_id);
        let operation = ListAccountsForParent {
            parent_id: ou_id.to_string()
        };
        let mut chain = CursorChain::new();
        let mut total = 0;

        while let Some(accounts) = self.fetcher.next_page(&operation, &mut chain).await? {
            for account in &accounts {
                if !self.store.contains_account(&account.id) {
                    self.store.warn(
                        WarningKind::MissingFromAccountList,
                        &account.id,
                        format!(
                            "account is missing from original list: aws_account_id={} aws_account_name={}",
                            account.id,
                            account.name.as_deref().unwrap_or("")
                        )
                    );
                    self.store.upsert_account(account);
                    self.stats.missing_accounts += 1;
                }
                self.store.link_account_to_ou(&account.id, link_target)?;
            }

            total += accounts.len();
            info!(ou_id, count = accounts.len(), total, "Processed accounts for OU");
        }

        self.stats.accounts_linked += total;
        Ok(total)
    }

    /// Lists the immediate child units of `ou_id` across all pages.
    pub async fn collect_children(
        &mut self,
        ou_id: &str
    ) -> InventoryResult<Vec<RawOrganizationalUnit>> {
        let operation = ListOrganizationalUnitsForParent {
            parent_id: ou_id.to_string()
        };
        let children = self.fetcher.fetch_all(&operation).await?;
        debug!(ou_id, count = children.len(), "Listed child OUs");
        Ok(children)
    }
}
