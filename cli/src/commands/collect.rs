//! Collect command - full organization inventory
//!
//! Crawls the organization with the configured credentials:
//! - lists every account
//! - walks every root and OU top-down, gathering attached policies
//! - writes the account list, account detail and OU detail files

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use org_inventory::aws::create_aws_client;
use org_inventory::config::MAX_PAGE_SIZE;
use org_inventory::{
    CredentialSource, InventoryConfig, InventoryReport, InventoryResult, InventoryService,
    OutputPaths
};
use tracing::{error, info};

use crate::{output, ux_error};

#[derive(Args)]
pub struct CollectArgs {
    /// Named profile from the shared AWS config
    #[arg(short = 'p', long, conflicts_with_all = ["access_key_id", "secret_access_key"])]
    pub profile: Option<String>,

    /// Static access key id (requires --secret-access-key)
    #[arg(long, requires = "secret_access_key")]
    pub access_key_id: Option<String>,

    /// Static secret access key (requires --access-key-id)
    #[arg(long, requires = "access_key_id")]
    pub secret_access_key: Option<String>,

    /// Region used for the Organizations endpoint
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Directory the three inventory files are written to
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Items requested per page
    #[arg(long, default_value_t = MAX_PAGE_SIZE)]
    pub page_size: i32,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// List every consistency warning
    #[arg(long, short)]
    pub verbose: bool
}

impl CollectArgs {
    pub fn credentials(&self) -> CredentialSource {
        match (&self.profile, &self.access_key_id, &self.secret_access_key) {
            (Some(name), _, _) => CredentialSource::Profile { name: name.clone() },
            (None, Some(access_key_id), Some(secret_access_key)) => CredentialSource::StaticKeys {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone()
            },
            _ => CredentialSource::Default
        }
    }

    pub fn to_config(&self) -> InventoryConfig {
        InventoryConfig {
            credentials: self.credentials(),
            region: self.region.clone(),
            page_size: self.page_size,
            output: OutputPaths::in_dir(&self.output_dir),
            ..Default::default()
        }
    }
}

pub async fn run(args: CollectArgs) -> Result<()> {
    let config = args.to_config();
    if let Err(err) = config.validate() {
        error!(error = %err, "Invalid collect configuration");
        ux_error::for_collect(&err).display();
        return Err(err.into());
    }

    let report = match collect(&config).await {
        Ok(report) => report,
        Err(err) => {
            error!(operation = ?err.operation(), error = %err, "Inventory collection failed");
            ux_error::for_collect(&err).display();
            return Err(err.into());
        }
    };
    info!(
        accounts = report.accounts,
        organizational_units = report.organizational_units,
        warnings = report.warnings.len(),
        "Inventory collected"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_summary(&report, &config.output, args.verbose);
    Ok(())
}

async fn collect(config: &InventoryConfig) -> InventoryResult<InventoryReport> {
    let client = create_aws_client(config).await?;
    InventoryService::new(config.clone(), client).run().await
}

fn print_summary(report: &InventoryReport, paths: &OutputPaths, verbose: bool) {
    output::header("Organization Inventory");
    println!();

    output::field("Accounts", report.accounts.to_string().cyan());
    output::field("Organizational units", report.organizational_units.to_string().cyan());
    output::field("Roots", report.roots);
    output::field("API calls", report.api_calls);
    output::field("Throttled retries", report.throttled_retries.to_string().yellow());
    output::field("Non-200 responses", report.soft_errors);
    output::field("Final backoff", format!("{}ms", report.final_backoff_ms));
    if let Some(duration) = report.duration() {
        output::field("Duration", format!("{}s", duration.num_seconds()));
    }
    println!();

    output::subheader("Files");
    output::success(&paths.account_list.display().to_string());
    output::success(&paths.account_detail.display().to_string());
    output::success(&paths.orgs_detail.display().to_string());
    println!();

    if !report.has_warnings() {
        return;
    }

    output::warn(&format!(
        "{} consistency warning(s) recorded during the crawl",
        report.warnings.len()
    ));
    if verbose {
        for warning in &report.warnings {
            println!(
                "  {} {} {}",
                warning.kind.to_string().yellow(),
                warning.entity_id,
                warning.message.dimmed()
            );
        }
    } else {
        output::hint("Use --verbose to list them");
    }
}
