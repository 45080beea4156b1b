use crate::client::{ListAccounts, ListRoots, OrganizationsClient};
use crate::config::InventoryConfig;
use crate::error::InventoryResult;
use crate::export;
use crate::fetcher::{CursorChain, PaginatedFetcher};
use crate::report::InventoryReport;
use crate::store::EntityStore;
use crate::walker::TreeWalker;
use std::sync::Arc;
use tracing::{error, info};

/// A finished crawl: the populated stores and what happened while building them.
#[derive(Debug)]
pub struct Inventory {
    pub store: EntityStore,
    pub report: InventoryReport
}

pub struct InventoryService {
    config: InventoryConfig,
    client: Arc<dyn OrganizationsClient>
}

impl InventoryService {
    pub fn new(config: InventoryConfig, client: Arc<dyn OrganizationsClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Crawls the organization and writes the three output files.
    pub async fn run(&self) -> InventoryResult<InventoryReport> {
        let inventory = self.collect().await?;
        export::write_all(&inventory.store, &self.config.output)?;
        info!(
            account_list = %self.config.output.account_list.display(),
            account_detail = %self.config.output.account_detail.display(),
            orgs_detail = %self.config.output.orgs_detail.display(),
            "Wrote inventory files"
        );
        Ok(inventory.report)
    }

    /// Full traversal: flat account list first, then every root's tree.
    pub async fn collect(&self) -> InventoryResult<Inventory> {
        self.config.validate()?;

        let mut report = InventoryReport::new();
        let mut store = EntityStore::new();
        let mut fetcher = PaginatedFetcher::new(self.client.clone(), &self.config);

        info!("Begin collecting AWS accounts from root");
        let accounts = collect_account_list(&mut fetcher, &mut store).await?;
        info!(count = accounts, "Completed collecting AWS accounts from root");

        info!("Begin collecting org units from root");
        let roots = fetcher.fetch_all(&ListRoots).await?;
        report.roots = roots.len();

        for root in roots {
            let root_id = root.id.clone();
            let mut walker =
                TreeWalker::new(&mut fetcher, &mut store, self.config.pacing.ou_visit_pause());
            let stats = walker.walk(root).await?;
            info!(
                root_id = %root_id,
                units = stats.units_visited,
                accounts = stats.accounts_linked,
                max_depth = stats.max_depth,
                "Completed walking root"
            );
        }

        store.mark_unlinked_unassociated();
        if !store.is_consistent() {
            error!("Inventory cross-references are inconsistent after traversal");
        }

        report.accounts = store.account_count();
        report.organizational_units = store.unit_count();
        report.record_fetch_stats(fetcher.stats(), fetcher.backoff().current());
        report.warnings = store.warnings().to_vec();
        report.complete();

        info!(
            accounts = report.accounts,
            organizational_units = report.organizational_units,
            roots = report.roots,
            api_calls = report.api_calls,
            throttled_retries = report.throttled_retries,
            warnings = report.warnings.len(),
            "Completed collecting org units from root"
        );

        Ok(Inventory { store, report })
    }
}

/// Seeds the store with every account in the organization, unlinked.
pub async fn collect_account_list(
    fetcher: &mut PaginatedFetcher,
    store: &mut EntityStore
) -> InventoryResult<usize> {
    let mut chain = CursorChain::new();

    while let Some(accounts) = fetcher.next_page(&ListAccounts, &mut chain).await? {
        info!(idx = chain.pages(), count = accounts.len(), "Processing list pull");
        for account in &accounts {
            store.upsert_account(account);
        }
    }

    Ok(store.account_count())
}
