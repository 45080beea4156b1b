use thiserror::Error;

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Throttled by Organizations API during {operation}")]
    Throttled { operation: &'static str },

    #[error("Organizations API error during {operation}: {message}")]
    Api {
        operation: &'static str,
        message: String
    },

    #[error("{entity} record is missing required field {field}")]
    MissingField {
        entity: &'static str,
        field: &'static str
    },

    #[error("Unknown {entity}: {id}")]
    UnknownEntity { entity: &'static str, id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid scan report: {0}")]
    ScanReport(String)
}

impl InventoryError {
    /// Only throttling is retried; every other error ends the run.
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Throttled { operation } | Self::Api { operation, .. } => Some(operation),
            _ => None
        }
    }
}
