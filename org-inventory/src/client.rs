use crate::error::InventoryResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The slice of the Organizations API the crawler consumes.
///
/// Every call returns one page; pagination state lives with the caller.
#[async_trait]
pub trait OrganizationsClient: Send + Sync {
    async fn list_accounts(&self, request: PageRequest<'_>) -> InventoryResult<Page<RawAccount>>;

    async fn list_roots(
        &self,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawOrganizationalUnit>>;

    async fn list_accounts_for_parent(
        &self,
        parent_id: &str,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawAccount>>;

    async fn list_organizational_units_for_parent(
        &self,
        parent_id: &str,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawOrganizationalUnit>>;

    async fn list_policies_for_target(
        &self,
        target_id: &str,
        category: PolicyCategory,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawPolicy>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub next_token: Option<&'a str>,
    pub max_results: i32
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
    pub status_code: u16
}

impl<T> Page<T> {
    pub fn ok(items: Vec<T>, next_token: Option<String>) -> Self {
        Self {
            items,
            next_token,
            status_code: 200
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawAccount {
    pub id: String,
    pub arn: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub joined_method: Option<String>,
    pub joined_timestamp: Option<DateTime<Utc>>
}

/// Roots and organizational units share one shape on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawOrganizationalUnit {
    pub id: String,
    pub arn: Option<String>,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_types: Vec<PolicyTypeSummary>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyTypeSummary {
    #[serde(rename = "Type")]
    pub policy_type: String,
    pub status: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawPolicy {
    pub id: String,
    pub arn: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "Type")]
    pub policy_type: Option<String>,
    pub aws_managed: bool
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyCategory {
    ServiceControlPolicy,
    TagPolicy
}

impl PolicyCategory {
    pub const ALL: [Self; 2] = [Self::ServiceControlPolicy, Self::TagPolicy];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceControlPolicy => "SERVICE_CONTROL_POLICY",
            Self::TagPolicy => "TAG_POLICY"
        }
    }
}

impl fmt::Display for PolicyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of one paginated list call: the operation plus its fixed parameters.
#[async_trait]
pub trait ListOperation: Send + Sync {
    type Item: Send;

    fn name(&self) -> &'static str;

    async fn call(
        &self,
        client: &dyn OrganizationsClient,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<Self::Item>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListAccounts;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListRoots;

#[derive(Debug, Clone)]
pub struct ListAccountsForParent {
    pub parent_id: String
}

#[derive(Debug, Clone)]
pub struct ListOrganizationalUnitsForParent {
    pub parent_id: String
}

#[derive(Debug, Clone)]
pub struct ListPoliciesForTarget {
    pub target_id: String,
    pub category: PolicyCategory
}

#[async_trait]
impl ListOperation for ListAccounts {
    type Item = RawAccount;

    fn name(&self) -> &'static str {
        "ListAccounts"
    }

    async fn call(
        &self,
        client: &dyn OrganizationsClient,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawAccount>> {
        client.list_accounts(request).await
    }
}

#[async_trait]
impl ListOperation for ListRoots {
    type Item = RawOrganizationalUnit;

    fn name(&self) -> &'static str {
        "ListRoots"
    }

    async fn call(
        &self,
        client: &dyn OrganizationsClient,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawOrganizationalUnit>> {
        client.list_roots(request).await
    }
}

#[async_trait]
impl ListOperation for ListAccountsForParent {
    type Item = RawAccount;

    fn name(&self) -> &'static str {
        "ListAccountsForParent"
    }

    async fn call(
        &self,
        client: &dyn OrganizationsClient,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawAccount>> {
        client
            .list_accounts_for_parent(&self.parent_id, request)
            .await
    }
}

#[async_trait]
impl ListOperation for ListOrganizationalUnitsForParent {
    type Item = RawOrganizationalUnit;

    fn name(&self) -> &'static str {
        "ListOrganizationalUnitsForParent"
    }

    async fn call(
        &self,
        client: &dyn OrganizationsClient,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawOrganizationalUnit>> {
        client
            .list_organizational_units_for_parent(&self.parent_id, request)
            .await
    }
}

#[async_trait]
impl ListOperation for ListPoliciesForTarget {
    type Item = RawPolicy;

    fn name(&self) -> &'static str {
        "ListPoliciesForTarget"
    }

    async fn call(
        &self,
        client: &dyn OrganizationsClient,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawPolicy>> {
        client
            .list_policies_for_target(&self.target_id, self.category, request)
            .await
    }
}
