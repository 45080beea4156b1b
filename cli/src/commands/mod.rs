pub mod collect;
pub mod completion;
pub mod flatten;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "org-inventory",
    author,
    version,
    about = "Org Inventory - AWS Organizations account and OU inventory",
    long_about = "Walks an AWS Organization from its roots and records every account, \
                  organizational unit and attached policy.\n\nRun `collect` with \
                  management-account credentials; results land in three files under the \
                  output directory."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Collect accounts, OUs and policies from the organization")]
    Collect(collect::CollectArgs),

    #[command(about = "Flatten a ScoutSuite results file into newline-delimited events")]
    Flatten(flatten::FlattenArgs),

    #[command(about = "Generate shell completions")]
    Completion(completion::CompletionArgs)
}
