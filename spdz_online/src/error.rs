use thiserror::Error;

use crate::transport::TransportError;

/// Reason for aborting a secure computation.
///
/// Every variant is fatal: a computation that produced one of these errors must not be resumed.
#[derive(Debug, Error)]
pub enum MpcError {
    /// Commitment opening does not hash to the published digest.
    #[error("Commitment opening does not match digest")]
    CommitmentMismatch,

    /// Echoed broadcast values of a party differ from locally received ones.
    #[error("Inconsistent broadcast detected by echo of party {0}")]
    BroadcastInconsistency(usize),

    /// Party revealed an opening that does not verify against its earlier commitment.
    #[error("Opening of party {0} does not match its commitment")]
    OpenMismatch(usize),

    /// Authenticity check of opened values failed.
    #[error("MAC check failed")]
    MacCheckFailure,

    #[error(transparent)]
    Network(#[from] TransportError),

    /// Insufficient or malformed preprocessing material or configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Received field element is not a canonical representative.
    #[error("Received field element out of range")]
    InvalidElement,

    /// Encoded list length is not a multiple of its element width.
    #[error("Encoded length {len} is not a multiple of element width {width}")]
    LengthMismatch { len: usize, width: usize },
}

impl MpcError {
    /// Shorthand for configuration errors.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
