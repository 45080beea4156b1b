use crate::fetcher::FetchStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    DuplicateAccount,
    DuplicateUnit,
    MissingFromAccountList,
    OuReassigned,
    UnitReparented,
    UnknownParent,
    UnlinkedAccount
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DuplicateAccount => "duplicate_account",
            Self::DuplicateUnit => "duplicate_unit",
            Self::MissingFromAccountList => "missing_from_account_list",
            Self::OuReassigned => "ou_reassigned",
            Self::UnitReparented => "unit_reparented",
            Self::UnknownParent => "unknown_parent",
            Self::UnlinkedAccount => "unlinked_account"
        };
        f.write_str(label)
    }
}

/// A data anomaly that was logged and tolerated (last write wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyWarning {
    pub kind: WarningKind,
    pub entity_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>
}

impl ConsistencyWarning {
    pub fn new(kind: WarningKind, entity_id: &str, message: impl ToString) -> Self {
        Self {
            kind,
            entity_id: entity_id.to_string(),
            message: message.to_string(),
            timestamp: Utc::now()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub accounts: usize,
    pub organizational_units: usize,
    pub roots: usize,
    pub api_calls: u64,
    pub throttled_retries: u64,
    pub soft_errors: u64,
    pub final_backoff_ms: u64,
    pub warnings: Vec<ConsistencyWarning>
}

impl InventoryReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &ConsistencyWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }

    pub fn record_fetch_stats(&mut self, stats: FetchStats, backoff: Duration) {
        self.api_calls = stats.api_calls;
        self.throttled_retries = stats.throttled_retries;
        self.soft_errors = stats.soft_errors;
        self.final_backoff_ms = backoff.as_millis() as u64;
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}
