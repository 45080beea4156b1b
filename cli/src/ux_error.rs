use colored::Colorize;
use org_inventory::InventoryError;

#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

pub fn config_error(message: &str) -> UxError {
    UxError::new(format!("Configuration error: {message}"))
        .why("The collect options do not form a usable configuration")
        .fix("Keep --page-size between 1 and 20")
        .fix("Pass both --access-key-id and --secret-access-key, or neither")
        .suggest("org-inventory collect --help")
}

pub fn access_denied(operation: &str) -> UxError {
    UxError::new(format!("Access denied calling {operation}"))
        .why(
            "Organizations list calls only succeed from the management account or a \
             delegated administrator"
        )
        .fix("Use credentials that belong to the management account")
        .fix("Check the IAM policy grants organizations:List* and organizations:Describe*")
        .suggest("aws sts get-caller-identity")
}

pub fn not_in_organization() -> UxError {
    UxError::new("The account is not a member of an organization")
        .why("AWS Organizations reported AWSOrganizationsNotInUseException")
        .fix("Run against the management account of an existing organization")
        .suggest("aws organizations describe-organization")
}

pub fn api_failure(operation: &str, message: &str) -> UxError {
    UxError::new(format!("{operation} failed"))
        .why(message.to_string())
        .fix("Check network connectivity and the selected region")
        .fix("Re-run with RUST_LOG=debug for request details")
}

pub fn missing_credentials() -> UxError {
    UxError::new("No AWS credentials were found")
        .why("No profile or static keys were given and the default chain found none")
        .fix("Pass --profile with a configured profile name")
        .fix("Or pass --access-key-id and --secret-access-key")
        .suggest("org-inventory collect --profile <name>")
}

pub fn unreadable_scan_report(path: &str, reason: &str) -> UxError {
    UxError::new(format!("Cannot flatten scan report: {path}"))
        .why(reason.to_string())
        .fix("Pass the scoutsuite_results_*.js file produced by a ScoutSuite AWS scan")
        .suggest("org-inventory flatten -s scoutsuite_results_aws.js -d events.txt")
}

/// Picks the most helpful explanation for a failed collection.
pub fn for_collect(err: &InventoryError) -> UxError {
    match err {
        InventoryError::Config(message) => config_error(message),
        InventoryError::Api { operation, message } if message.contains("AccessDenied") => {
            access_denied(operation)
        }
        InventoryError::Api { message, .. } if message.contains("AWSOrganizationsNotInUse") => {
            not_in_organization()
        }
        InventoryError::Api { message, .. }
            if message.contains("NoCredentialsError")
                || message.contains("no providers in chain provided credentials") =>
        {
            missing_credentials()
        }
        InventoryError::Api { operation, message } => api_failure(operation, message),
        other => UxError::new(other.to_string())
    }
}
