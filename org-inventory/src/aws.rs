//! AWS Organizations implementation of [`OrganizationsClient`].

use crate::client::{
    OrganizationsClient, Page, PageRequest, PolicyCategory, PolicyTypeSummary, RawAccount,
    RawOrganizationalUnit, RawPolicy
};
use crate::config::{CredentialSource, InventoryConfig};
use crate::error::{InventoryError, InventoryResult};
use async_trait::async_trait;
use aws_sdk_organizations::config::{Credentials, Region};
use aws_sdk_organizations::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_organizations::types::{Account, OrganizationalUnit, PolicySummary, PolicyType, Root};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

const THROTTLING_ERROR_CODE: &str = "TooManyRequestsException";

pub struct AwsOrganizationsClient {
    client: aws_sdk_organizations::Client
}

impl AwsOrganizationsClient {
    pub async fn new(config: &InventoryConfig) -> InventoryResult<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        loader = match &config.credentials {
            CredentialSource::Default => loader,
            CredentialSource::Profile { name } => loader.profile_name(name),
            CredentialSource::StaticKeys {
                access_key_id,
                secret_access_key
            } => loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "org-inventory-cli"
            ))
        };

        let sdk_config = loader.load().await;
        Ok(Self {
            client: aws_sdk_organizations::Client::new(&sdk_config)
        })
    }

    pub fn from_client(client: aws_sdk_organizations::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrganizationsClient for AwsOrganizationsClient {
    async fn list_accounts(&self, request: PageRequest<'_>) -> InventoryResult<Page<RawAccount>> {
        debug!(next_token = ?request.next_token, "ListAccounts");
        let output = self
            .client
            .list_accounts()
            .set_next_token(request.next_token.map(str::to_string))
            .max_results(request.max_results)
            .send()
            .await
            .map_err(|e| map_sdk_error("ListAccounts", e))?;

        Ok(Page::ok(
            output
                .accounts()
                .iter()
                .map(convert_account)
                .collect::<InventoryResult<_>>()?,
            output.next_token().map(str::to_string)
        ))
    }

    async fn list_roots(
        &self,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawOrganizationalUnit>> {
        debug!(next_token = ?request.next_token, "ListRoots");
        let output = self
            .client
            .list_roots()
            .set_next_token(request.next_token.map(str::to_string))
            .max_results(request.max_results)
            .send()
            .await
            .map_err(|e| map_sdk_error("ListRoots", e))?;

        Ok(Page::ok(
            output
                .roots()
                .iter()
                .map(convert_root)
                .collect::<InventoryResult<_>>()?,
            output.next_token().map(str::to_string)
        ))
    }

    async fn list_accounts_for_parent(
        &self,
        parent_id: &str,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawAccount>> {
        debug!(parent_id, next_token = ?request.next_token, "ListAccountsForParent");
        let output = self
            .client
            .list_accounts_for_parent()
            .parent_id(parent_id)
            .set_next_token(request.next_token.map(str::to_string))
            .max_results(request.max_results)
            .send()
            .await
            .map_err(|e| map_sdk_error("ListAccountsForParent", e))?;

        Ok(Page::ok(
            output
                .accounts()
                .iter()
                .map(convert_account)
                .collect::<InventoryResult<_>>()?,
            output.next_token().map(str::to_string)
        ))
    }

    async fn list_organizational_units_for_parent(
        &self,
        parent_id: &str,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawOrganizationalUnit>> {
        debug!(parent_id, next_token = ?request.next_token, "ListOrganizationalUnitsForParent");
        let output = self
            .client
            .list_organizational_units_for_parent()
            .parent_id(parent_id)
            .set_next_token(request.next_token.map(str::to_string))
            .max_results(request.max_results)
            .send()
            .await
            .map_err(|e| map_sdk_error("ListOrganizationalUnitsForParent", e))?;

        Ok(Page::ok(
            output
                .organizational_units()
                .iter()
                .map(convert_unit)
                .collect::<InventoryResult<_>>()?,
            output.next_token().map(str::to_string)
        ))
    }

    async fn list_policies_for_target(
        &self,
        target_id: &str,
        category: PolicyCategory,
        request: PageRequest<'_>
    ) -> InventoryResult<Page<RawPolicy>> {
        debug!(
            target_id,
            category = %category,
            next_token = ?request.next_token,
            "ListPoliciesForTarget"
        );
        let output = self
            .client
            .list_policies_for_target()
            .target_id(target_id)
            .filter(policy_type_filter(category))
            .set_next_token(request.next_token.map(str::to_string))
            .max_results(request.max_results)
            .send()
            .await
            .map_err(|e| map_sdk_error("ListPoliciesForTarget", e))?;

        Ok(Page::ok(
            output
                .policies()
                .iter()
                .map(convert_policy)
                .collect::<InventoryResult<_>>()?,
            output.next_token().map(str::to_string)
        ))
    }
}

fn map_sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> InventoryError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug
{
    if err.code() == Some(THROTTLING_ERROR_CODE) {
        InventoryError::Throttled { operation }
    } else {
        InventoryError::Api {
            operation,
            message: DisplayErrorContext(&err).to_string()
        }
    }
}

fn policy_type_filter(category: PolicyCategory) -> PolicyType {
    match category {
        PolicyCategory::ServiceControlPolicy => PolicyType::ServiceControlPolicy,
        PolicyCategory::TagPolicy => PolicyType::TagPolicy
    }
}

fn required_id(id: Option<&str>, entity: &'static str) -> InventoryResult<String> {
    id.map(str::to_string)
        .ok_or(InventoryError::MissingField { entity, field: "Id" })
}

fn convert_account(account: &Account) -> InventoryResult<RawAccount> {
    Ok(RawAccount {
        id: required_id(account.id(), "account")?,
        arn: account.arn().map(str::to_string),
        email: account.email().map(str::to_string),
        name: account.name().map(str::to_string),
        status: account.status().map(|s| s.as_str().to_string()),
        joined_method: account.joined_method().map(|m| m.as_str().to_string()),
        joined_timestamp: account
            .joined_timestamp()
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos()))
    })
}

fn convert_root(root: &Root) -> InventoryResult<RawOrganizationalUnit> {
    Ok(RawOrganizationalUnit {
        id: required_id(root.id(), "root")?,
        arn: root.arn().map(str::to_string),
        name: root.name().map(str::to_string),
        policy_types: root
            .policy_types()
            .iter()
            .map(|summary| PolicyTypeSummary {
                policy_type: summary
                    .r#type()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
                status: summary
                    .status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default()
            })
            .collect()
    })
}

fn convert_unit(unit: &OrganizationalUnit) -> InventoryResult<RawOrganizationalUnit> {
    Ok(RawOrganizationalUnit {
        id: required_id(unit.id(), "organizational unit")?,
        arn: unit.arn().map(str::to_string),
        name: unit.name().map(str::to_string),
        policy_types: Vec::new()
    })
}

fn convert_policy(policy: &PolicySummary) -> InventoryResult<RawPolicy> {
    Ok(RawPolicy {
        id: required_id(policy.id(), "policy")?,
        arn: policy.arn().map(str::to_string),
        name: policy.name().map(str::to_string),
        description: policy.description().map(str::to_string),
        policy_type: policy.r#type().map(|t| t.as_str().to_string()),
        aws_managed: policy.aws_managed()
    })
}

pub async fn create_aws_client(
    config: &InventoryConfig
) -> InventoryResult<Arc<dyn OrganizationsClient>> {
    Ok(Arc::new(AwsOrganizationsClient::new(config).await?))
}
