use crate::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TableError {
    /// Rejected locally, never sent to the server
    #[error("Validation error: {0}")]
    Validation(String),

    /// Target segment vanished between read and write
    #[error("Segment {0} not found")]
    NotFound(u32),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
