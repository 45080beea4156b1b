use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use org_inventory::scan_report::flatten_file;
use tracing::error;

use crate::{output, ux_error};

#[derive(Args)]
pub struct FlattenArgs {
    /// ScoutSuite results file (scoutsuite_results_*.js)
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,

    /// Destination for the newline-delimited events
    #[arg(short = 'd', long = "destination")]
    pub destination: PathBuf
}

pub fn run(args: FlattenArgs) -> Result<()> {
    match flatten_file(&args.source, &args.destination) {
        Ok(events) => {
            output::success(&format!(
                "Wrote {events} events to {}",
                args.destination.display()
            ));
            Ok(())
        }
        Err(err) => {
            error!(source = %args.source.display(), error = %err, "Scan report flatten failed");
            ux_error::unreadable_scan_report(&args.source.display().to_string(), &err.to_string())
                .display();
            Err(err.into())
        }
    }
}
