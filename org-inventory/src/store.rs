//! In-memory account and organizational-unit records for one crawl.
//!
//! Every write merges into the existing record so that facts learned from
//! different list calls accumulate. Parent/child links are kept symmetric:
//! whenever a unit points at a parent, that parent lists the unit as a child.

use crate::client::{
    PolicyCategory, PolicyTypeSummary, RawAccount, RawOrganizationalUnit, RawPolicy
};
use crate::error::{InventoryError, InventoryResult};
use crate::report::{ConsistencyWarning, WarningKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const UNASSOCIATED_MESSAGE: &str = "not associated to an ou";

/// Node type, decided from the identifier prefix when the record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Organization,
    Root,
    OrganizationalUnit
}

impl NodeKind {
    pub fn classify(id: &str) -> Self {
        if id.starts_with("o-") {
            Self::Organization
        } else if id.starts_with("r-") {
            Self::Root
        } else {
            Self::OrganizationalUnit
        }
    }

    /// Only regular units are recorded as an account's OU.
    pub fn is_linkable(self) -> bool {
        matches!(self, Self::OrganizationalUnit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OuDetail {
    Unit {
        ou_arn: Option<String>,
        ou_name: Option<String>
    },
    Unassociated {
        message: String
    }
}

impl OuDetail {
    pub fn unassociated() -> Self {
        Self::Unassociated {
            message: UNASSOCIATED_MESSAGE.to_string()
        }
    }

    pub fn ou_name(&self) -> Option<&str> {
        match self {
            Self::Unit { ou_name, .. } => ou_name.as_deref(),
            Self::Unassociated { .. } => None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Arn", skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(rename = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "JoinedMethod", skip_serializing_if = "Option::is_none")]
    pub joined_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_joined: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_joined_epoch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    pub ou: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ou_detail: Option<OuDetail>
}

impl AccountRecord {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            arn: None,
            email: None,
            name: None,
            status: None,
            joined_method: None,
            time_joined: None,
            time_joined_epoch: None,
            org_id: None,
            ou: None,
            ou_detail: None
        }
    }

    fn merge(&mut self, raw: &RawAccount) {
        merge_field(&mut self.arn, &raw.arn);
        merge_field(&mut self.email, &raw.email);
        merge_field(&mut self.name, &raw.name);
        merge_field(&mut self.status, &raw.status);
        merge_field(&mut self.joined_method, &raw.joined_method);

        if let Some(joined) = raw.joined_timestamp {
            self.time_joined = Some(format_joined(joined));
            self.time_joined_epoch = Some(epoch_seconds(joined));
        }

        if let Some(org_id) = raw.arn.as_deref().and_then(org_id_from_arn) {
            self.org_id = Some(org_id.to_string());
        }
    }

    /// True once the walker has recorded either an OU or the unassociated marker.
    pub fn is_linked(&self) -> bool {
        self.ou_detail.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationalUnitRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Arn", skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "PolicyTypes", skip_serializing_if = "Vec::is_empty")]
    pub policy_types: Vec<PolicyTypeSummary>,
    #[serde(rename = "Type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(rename = "child_id", skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub policy_detail: BTreeMap<PolicyCategory, BTreeMap<String, RawPolicy>>
}

impl OrganizationalUnitRecord {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            arn: None,
            name: None,
            policy_types: Vec::new(),
            kind: NodeKind::classify(id),
            parent_id: None,
            child_ids: Vec::new(),
            policy_detail: BTreeMap::new()
        }
    }

    fn merge(&mut self, raw: &RawOrganizationalUnit) {
        merge_field(&mut self.arn, &raw.arn);
        merge_field(&mut self.name, &raw.name);
        if !raw.policy_types.is_empty() {
            self.policy_types = raw.policy_types.clone();
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityStore {
    accounts: BTreeMap<String, AccountRecord>,
    units: BTreeMap<String, OrganizationalUnitRecord>,
    warnings: Vec<ConsistencyWarning>
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_account(&mut self, raw: &RawAccount) -> &AccountRecord {
        if self.accounts.contains_key(&raw.id) {
            self.warn(
                WarningKind::DuplicateAccount,
                &raw.id,
                format!("account {} already in account list", raw.id)
            );
        }

        let record = self
            .accounts
            .entry(raw.id.clone())
            .or_insert_with(|| AccountRecord::new(&raw.id));
        record.merge(raw);
        record
    }

    pub fn upsert_organizational_unit(
        &mut self,
        raw: &RawOrganizationalUnit,
        parent_id: Option<&str>
    ) -> &OrganizationalUnitRecord {
        if self.units.contains_key(&raw.id) {
            self.warn(
                WarningKind::DuplicateUnit,
                &raw.id,
                format!("ou {} already in ou list", raw.id)
            );
        }

        self.units
            .entry(raw.id.clone())
            .or_insert_with(|| OrganizationalUnitRecord::new(&raw.id))
            .merge(raw);

        if let Some(parent_id) = parent_id {
            self.attach_child(&raw.id, parent_id);
        }

        &self.units[&raw.id]
    }

    fn attach_child(&mut self, child_id: &str, parent_id: &str) {
        let previous = self
            .units
            .get_mut(child_id)
            .and_then(|child| child.parent_id.replace(parent_id.to_string()));

        if let Some(previous) = previous.filter(|p| p != parent_id) {
            if let Some(old_parent) = self.units.get_mut(&previous) {
                old_parent.child_ids.retain(|id| id != child_id);
            }
            self.warn(
                WarningKind::UnitReparented,
                child_id,
                format!("ou parent changed: orig parent={previous} new parent={parent_id}")
            );
        }

        if !self.units.contains_key(parent_id) {
            self.warn(
                WarningKind::UnknownParent,
                parent_id,
                format!("parent {parent_id} of ou {child_id} was not recorded before its child")
            );
        }

        let parent = self
            .units
            .entry(parent_id.to_string())
            .or_insert_with(|| OrganizationalUnitRecord::new(parent_id));
        if !parent.child_ids.iter().any(|id| id == child_id) {
            parent.child_ids.push(child_id.to_string());
        }
    }

    /// Merges one page of policies under `category`, keyed by policy id.
    /// Other categories already gathered for the unit are left untouched.
    pub fn merge_policies(
        &mut self,
        ou_id: &str,
        category: PolicyCategory,
        policies: Vec<RawPolicy>
    ) -> InventoryResult<()> {
        let unit = self
            .units
            .get_mut(ou_id)
            .ok_or_else(|| InventoryError::UnknownEntity {
                entity: "organizational unit",
                id: ou_id.to_string()
            })?;

        let detail = unit.policy_detail.entry(category).or_default();
        for policy in policies {
            detail.insert(policy.id.clone(), policy);
        }
        Ok(())
    }

    /// Records the account's OU, or marks it unassociated when `ou_id` is `None`.
    /// Changing an association already recorded, unassociated included, is a
    /// warning; the new value wins.
    pub fn link_account_to_ou(
        &mut self,
        account_id: &str,
        ou_id: Option<&str>
    ) -> InventoryResult<()> {
        let detail = ou_id.map(|ou_id| {
            let unit = self.units.get(ou_id);
            OuDetail::Unit {
                ou_arn: unit.and_then(|u| u.arn.clone()),
                ou_name: unit.and_then(|u| u.name.clone())
            }
        });

        let account =
            self.accounts
                .get_mut(account_id)
                .ok_or_else(|| InventoryError::UnknownEntity {
                    entity: "account",
                    id: account_id.to_string()
                })?;

        let reassigned = account.is_linked() && account.ou.as_deref() != ou_id;
        let previous = std::mem::replace(&mut account.ou, ou_id.map(str::to_string));
        account.ou_detail = Some(detail.unwrap_or_else(OuDetail::unassociated));

        if reassigned {
            self.warn(
                WarningKind::OuReassigned,
                account_id,
                format!(
                    "account ou validation check: orig ou={} new ou={}",
                    previous.as_deref().unwrap_or("none"),
                    ou_id.unwrap_or("none")
                )
            );
        }
        Ok(())
    }

    /// Marks every account the walk never reached as unassociated.
    pub fn mark_unlinked_unassociated(&mut self) -> usize {
        let unlinked: Vec<String> = self
            .accounts
            .values()
            .filter(|a| !a.is_linked())
            .map(|a| a.id.clone())
            .collect();

        for id in &unlinked {
            if let Some(account) = self.accounts.get_mut(id) {
                account.ou = None;
                account.ou_detail = Some(OuDetail::unassociated());
            }
            self.warn(
                WarningKind::UnlinkedAccount,
                id,
                "account was not found under any root or ou"
            );
        }
        unlinked.len()
    }

    /// Checks both cross-reference invariants: symmetric parent/child links,
    /// and every account linked to a recorded unit or explicitly unassociated.
    pub fn is_consistent(&self) -> bool {
        let links_symmetric = self.units.values().all(|unit| {
            let parent_ok = unit.parent_id.as_ref().is_none_or(|parent_id| {
                self.units
                    .get(parent_id)
                    .is_some_and(|p| p.child_ids.contains(&unit.id))
            });
            let children_ok = unit.child_ids.iter().all(|child_id| {
                self.units
                    .get(child_id)
                    .is_some_and(|c| c.parent_id.as_deref() == Some(unit.id.as_str()))
            });
            parent_ok && children_ok
        });

        let accounts_linked = self.accounts.values().all(|account| {
            match (&account.ou, &account.ou_detail) {
                (Some(ou), Some(OuDetail::Unit { .. })) => self.units.contains_key(ou),
                (None, Some(OuDetail::Unassociated { .. })) => true,
                _ => false
            }
        });

        links_symmetric && accounts_linked
    }

    pub fn account(&self, id: &str) -> Option<&AccountRecord> {
        self.accounts.get(id)
    }

    pub fn unit(&self, id: &str) -> Option<&OrganizationalUnitRecord> {
        self.units.get(id)
    }

    pub fn contains_account(&self, id: &str) -> bool {
        self.accounts.contains_key(id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountRecord> {
        self.accounts.values()
    }

    pub fn units(&self) -> impl Iterator<Item = &OrganizationalUnitRecord> {
        self.units.values()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn warnings(&self) -> &[ConsistencyWarning] {
        &self.warnings
    }

    pub(crate) fn warn(&mut self, kind: WarningKind, entity_id: &str, message: impl ToString) {
        let warning = ConsistencyWarning::new(kind, entity_id, message);
        warn!(
            kind = %warning.kind,
            entity_id = %warning.entity_id,
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }
}

fn merge_field(target: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

/// `arn:aws:organizations::<mgmt>:account/o-xxxx/<account>` yields `o-xxxx`.
pub fn org_id_from_arn(arn: &str) -> Option<&str> {
    arn.split('/').nth(1).filter(|segment| !segment.is_empty())
}

fn format_joined(joined: DateTime<Utc>) -> String {
    joined.format("%F %T%z").to_string()
}

fn epoch_seconds(joined: DateTime<Utc>) -> f64 {
    joined.timestamp() as f64 + f64::from(joined.timestamp_subsec_micros()) / 1_000_000.0
}
