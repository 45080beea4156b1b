pub mod aws;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod policy;
pub mod report;
pub mod scan_report;
pub mod store;
pub mod walker;

pub use client::{OrganizationsClient, Page, PageRequest, PolicyCategory};
pub use collector::{Inventory, InventoryService};
pub use config::{CredentialSource, InventoryConfig, OutputPaths};
pub use error::{InventoryError, InventoryResult};
pub use report::{ConsistencyWarning, InventoryReport, WarningKind};
pub use store::EntityStore;
