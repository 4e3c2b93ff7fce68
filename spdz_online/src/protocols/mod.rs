//! Native protocols: gates advanced one round at a time by the executor.

mod broadcast;
mod commit_open;

pub use broadcast::Broadcast;
pub use commit_open::{CommitAndOpen, CommitAndOpenPhase};

use crate::{error::MpcError, network::Network};

/// Outcome of a single evaluation step of a gate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EvaluationStatus {
    /// Gate queued messages for this round and expects replies on the next call.
    MoreRoundsNeeded,
    /// Gate finished and will not be evaluated again.
    Done,
}

/// Multi-round protocol instance driven by the executor.
///
/// `evaluate` is called once per round with increasing `round` numbers starting at zero,
/// until it returns [`EvaluationStatus::Done`]. Messages queued during round `r` are available
/// to the recipient during round `r + 1`.
pub trait NativeProtocol<R> {
    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut R,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus, MpcError>;

    /// Whether this gate reveals a value to the parties.
    fn is_output(&self) -> bool {
        false
    }
}
