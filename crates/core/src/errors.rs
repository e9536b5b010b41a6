use thiserror::Error;

use crate::{catalog::CatalogError, config::ConfigError, report::ReportError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("product `{name}` was not found in the catalog")]
    ProductNotFound { name: String },
    #[error("time budget of {budget_ms}ms exhausted during {phase}")]
    BudgetExhausted { phase: &'static str, budget_ms: u64 },
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Dataset(#[from] CatalogError),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl ApplicationError {
    /// Stable machine-readable class used by the CLI outcome payloads.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::InvalidArgument(_)) => "invalid_argument",
            Self::Domain(DomainError::ProductNotFound { .. }) => "not_found",
            Self::Domain(DomainError::BudgetExhausted { .. }) => "budget_exhausted",
            Self::Dataset(_) => "dataset",
            Self::Configuration(_) => "config_validation",
            Self::Report(_) => "report",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Dataset(_) => 3,
            Self::Domain(DomainError::ProductNotFound { .. }) => 4,
            Self::Domain(_) | Self::Report(_) => 1,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::ProductNotFound { .. }) => {
                "No product with that name exists in the catalog. Check the spelling and try again."
            }
            Self::Domain(_) => "The request could not be processed. Check inputs and try again.",
            Self::Dataset(_) => "The dataset could not be loaded. Check the dataset path and format.",
            Self::Configuration(_) => "The configuration is invalid. Run `skinmatch config` to inspect it.",
            Self::Report(_) => "The report could not be written.",
        }
    }
}
