#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use org_inventory::client::{RawAccount, RawOrganizationalUnit, RawPolicy};
use org_inventory::{
    InventoryConfig, InventoryError, InventoryResult, OrganizationsClient, OutputPaths, Page,
    PageRequest, PolicyCategory
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: &'static str,
    pub target: Option<String>,
    pub next_token: Option<String>,
    pub at: Instant
}

/// In-memory organization that pages its answers the way the real API does.
#[derive(Default)]
pub struct ScriptedOrganization {
    accounts: Vec<RawAccount>,
    roots: Vec<RawOrganizationalUnit>,
    children: HashMap<String, Vec<RawOrganizationalUnit>>,
    accounts_for_parent: HashMap<String, Vec<RawAccount>>,
    policies: HashMap<(String, PolicyCategory), Vec<RawPolicy>>,
    account_pages: HashMap<Option<String>, Page<RawAccount>>,
    throttles: Mutex<HashMap<&'static str, u32>>,
    failures: Mutex<HashMap<&'static str, String>>,
    soft_statuses: Mutex<HashMap<&'static str, u16>>,
    calls: Mutex<Vec<Call>>
}

impl ScriptedOrganization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: RawAccount) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn with_root(mut self, root: RawOrganizationalUnit) -> Self {
        self.roots.push(root);
        self
    }

    pub fn with_child(mut self, parent_id: &str, unit: RawOrganizationalUnit) -> Self {
        self.children
            .entry(parent_id.to_string())
            .or_default()
            .push(unit);
        self
    }

    pub fn with_account_under(mut self, parent_id: &str, account: RawAccount) -> Self {
        self.accounts_for_parent
            .entry(parent_id.to_string())
            .or_default()
            .push(account);
        self
    }

    pub fn with_policy(
        mut self,
        target_id: &str,
        category: PolicyCategory,
        policy: RawPolicy
    ) -> Self {
        self.policies
            .entry((target_id.to_string(), category))
            .or_default()
            .push(policy);
        self
    }

    /// Explicit ListAccounts pages keyed by the token that requests them.
    pub fn with_account_page(mut self, token: Option<&str>, page: Page<RawAccount>) -> Self {
        self.account_pages.insert(token.map(str::to_string), page);
        self
    }

    pub fn throttle(&self, operation: &'static str, times: u32) {
        self.throttles.lock().unwrap().insert(operation, times);
    }

    pub fn fail(&self, operation: &'static str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, message.to_string());
    }

    pub fn soft_status(&self, operation: &'static str, status: u16) {
        self.soft_statuses.lock().unwrap().insert(operation, status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    fn record(
        &self,
        operation: &'static str,
        target: Option<&str>,
        request: PageRequest<'_>
    ) -> InventoryResult<Option<u16>> {
        self.calls.lock().unwrap().push(Call {
            operation,
            target: target.map(str::to_string),
            next_token: request.next_token.map(str::to_string),
            at: Instant::now()
        });

        if let Some(remaining) = self.throttles.lock().unwrap().get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(InventoryError::Throttled { operation });
            }
        }

        if let Some(message) = self.failures.lock().unwrap().get(operation) {
            return Err(InventoryError::Api {
                operation,
                message: message.clone()
            });
        }

        Ok(self.soft_statuses.lock().unwrap().remove(operation))
    }
}

fn paginate<T: Clone>(items: &[T], request: PageRequest<'_>, status: Option<u16>) -> Page<T> {
    let offset: usize = request
        .next_token
        .and_then(|t| t.strip_prefix("offset-"))
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);
    let size = request.max_results.max(1) as usize;
    let end = (offset + size).min(items.len());
    let next_token = (end < items.len()).then(|| format!("offset-{end}"));

    Page {
        items: items[offset.min(end)..end].to_vec(),
        next_token,
        status_code: status.unwrap_or(200)
    }
}

#[async_trait]
impl OrganizationsClient for ScriptedOrganization {
    async fn list_accounts(&self, request: PageRequest<'_>) -> InventoryResult<Page<RawAccount>> {
        let status = self.record("ListAccounts", None, request)?;
        if !self.account_pages.is_empty() {
            let key = request.next_token.map(str::to_string);
            return self.account_pages.get(&key).cloned().ok_or_else(|| {
                InventoryError::Api {
                    operation: "ListAccounts",
                    message: format!("unexpected token {key:?}")
                }
            });
        }
        Ok(paginate(&self.accounts, request, status))
    }

    async fn list_roots(
        &self,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawOrganizationalUnit>> {
        let status = self.record("ListRoots", None, request)?;
        Ok(paginate(&self.roots, request, status))
    }

    async fn list_accounts_for_parent(
        &self,
        parent_id: &str,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawAccount>> {
        let status = self.record("ListAccountsForParent", Some(parent_id), request)?;
        let accounts = self
            .accounts_for_parent
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(paginate(accounts, request, status))
    }

    async fn list_organizational_units_for_parent(
        &self,
        parent_id: &str,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawOrganizationalUnit>> {
        let status = self.record("ListOrganizationalUnitsForParent", Some(parent_id), request)?;
        let units = self
            .children
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(paginate(units, request, status))
    }

    async fn list_policies_for_target(
        &self,
        target_id: &str,
        category: PolicyCategory,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawPolicy>> {
        let status = self.record("ListPoliciesForTarget", Some(target_id), request)?;
        let policies = self
            .policies
            .get(&(target_id.to_string(), category))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(paginate(policies, request, status))
    }
}

pub fn account(id: &str, name: &str) -> RawAccount {
    RawAccount {
        id: id.to_string(),
        arn: Some(format!(
            "arn:aws:organizations::999999999999:account/o-exampleorg/{id}"
        )),
        email: Some(format!("{}@example.com", id.to_lowercase())),
        name: Some(name.to_string()),
        status: Some("ACTIVE".to_string()),
        joined_method: Some("INVITED".to_string()),
        joined_timestamp: Some(Utc.with_ymd_and_hms(2022, 6, 1, 12, 0, 0).unwrap())
    }
}

pub fn unit(id: &str, name: &str) -> RawOrganizationalUnit {
    RawOrganizationalUnit {
        id: id.to_string(),
        arn: Some(format!("arn:aws:organizations::999999999999:ou/o-exampleorg/{id}")),
        name: Some(name.to_string()),
        policy_types: Vec::new()
    }
}

pub fn policy(id: &str, category: PolicyCategory) -> RawPolicy {
    RawPolicy {
        id: id.to_string(),
        arn: Some(format!("arn:aws:organizations::aws:policy/{id}")),
        name: Some(format!("{id} name")),
        description: None,
        policy_type: Some(category.as_str().to_string()),
        aws_managed: id.starts_with("p-FullAWSAccess")
    }
}

pub fn config(page_size: i32) -> InventoryConfig {
    InventoryConfig {
        page_size,
        ..Default::default()
    }
}

pub fn config_in(dir: &Path, page_size: i32) -> InventoryConfig {
    InventoryConfig {
        page_size,
        output: OutputPaths::in_dir(dir),
        ..Default::default()
    }
}

/// root r-root
/// ├── ou-core (Core): A1, A2
/// │   └── ou-core-sec (Security): A3
/// └── ou-sandbox (Sandbox): A4
/// plus M1 directly under the root.
pub fn sample_organization() -> ScriptedOrganization {
    ScriptedOrganization::new()
        .with_account(account("M1", "Management"))
        .with_account(account("A1", "Prod Team"))
        .with_account(account("A2", "Dev,Test"))
        .with_account(account("A3", "Security / Audit"))
        .with_account(account("A4", "Sandbox_One"))
        .with_root(unit("r-root", "Root"))
        .with_child("r-root", unit("ou-core", "Core"))
        .with_child("r-root", unit("ou-sandbox", "Sandbox"))
        .with_child("ou-core", unit("ou-core-sec", "Security"))
        .with_account_under("r-root", account("M1", "Management"))
        .with_account_under("ou-core", account("A1", "Prod Team"))
        .with_account_under("ou-core", account("A2", "Dev,Test"))
        .with_account_under("ou-core-sec", account("A3", "Security / Audit"))
        .with_account_under("ou-sandbox", account("A4", "Sandbox_One"))
        .with_policy(
            "r-root",
            PolicyCategory::ServiceControlPolicy,
            policy("p-FullAWSAccess", PolicyCategory::ServiceControlPolicy)
        )
        .with_policy(
            "ou-core",
            PolicyCategory::ServiceControlPolicy,
            policy("p-deny-leave", PolicyCategory::ServiceControlPolicy)
        )
        .with_policy(
            "ou-core",
            PolicyCategory::ServiceControlPolicy,
            policy("p-deny-regions", PolicyCategory::ServiceControlPolicy)
        )
        .with_policy(
            "ou-core",
            PolicyCategory::ServiceControlPolicy,
            policy("p-deny-root", PolicyCategory::ServiceControlPolicy)
        )
        .with_policy(
            "ou-core",
            PolicyCategory::TagPolicy,
            policy("p-cost-center", PolicyCategory::TagPolicy)
        )
}
