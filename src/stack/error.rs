//! Error types for the stack workflow.

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::ResourceRef;
use crate::resources::ValidationError;

/// Errors that abort a stack declaration.
///
/// Engine failures are carried as the source unchanged.
#[derive(Debug, Error)]
pub enum StackError<EngineError>
where
    EngineError: std::error::Error + 'static,
{
    /// Raised when a required configuration value is absent.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Raised when a declaration is malformed.
    #[error("invalid declaration: {0}")]
    Validation(#[from] ValidationError),
    /// Raised when the engine rejects a resource declaration.
    #[error("failed to declare {resource}: {source}")]
    Provisioning {
        /// Resource being declared.
        resource: ResourceRef,
        /// Engine-specific error.
        #[source]
        source: EngineError,
    },
    /// Raised when the engine cannot publish a stack output.
    #[error("failed to publish output {output}: {source}")]
    Export {
        /// Output name.
        output: String,
        /// Engine-specific error.
        #[source]
        source: EngineError,
    },
}

impl<EngineError> StackError<EngineError>
where
    EngineError: std::error::Error + 'static,
{
    /// Short label for the failure class, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Provisioning { .. } => "provisioning",
            Self::Export { .. } => "export",
        }
    }
}
