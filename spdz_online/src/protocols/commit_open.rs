use rand::{CryptoRng, RngCore};
use tracing::warn;

use crate::{
    commitment::{self, Commitment},
    error::MpcError,
    network::Network,
    ResourcePool,
};

use super::{Broadcast, EvaluationStatus, NativeProtocol};

/// Progress of a [`CommitAndOpen`] instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommitAndOpenPhase {
    /// Commitments are being broadcast.
    Commit,
    /// All commitments collected, openings are being exchanged.
    Open,
    /// All openings verified.
    Done,
}

#[derive(Clone, Debug)]
enum Stage {
    Commit(Broadcast),
    Open {
        commitments: Vec<Commitment>,
        openings: Broadcast,
    },
    Done(Vec<Vec<u8>>),
}

/// Every party commits to a value and all values are revealed only after all commitments were
/// received, so no contribution can depend on the others.
#[derive(Clone, Debug)]
pub struct CommitAndOpen {
    opening: Vec<u8>,
    stage: Stage,
}

impl CommitAndOpen {
    /// Commit to `value` for a computation among `num_parties`.
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R, value: &[u8], num_parties: usize) -> Self {
        let (commitment, opening) = commitment::commit(rng, value);
        Self {
            opening,
            stage: Stage::Commit(Broadcast::new(commitment.as_bytes().to_vec(), num_parties)),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CommitAndOpenPhase {
        match self.stage {
            Stage::Commit(_) => CommitAndOpenPhase::Commit,
            Stage::Open { .. } => CommitAndOpenPhase::Open,
            Stage::Done(_) => CommitAndOpenPhase::Done,
        }
    }

    /// Revealed values indexed by party, once finished.
    pub fn output(&self) -> Option<&[Vec<u8>]> {
        match &self.stage {
            Stage::Done(values) => Some(values),
            _ => None,
        }
    }

    /// Advance by one round. Returns revealed values indexed by party once finished.
    pub fn step(&mut self, network: &mut dyn Network) -> Result<Option<Vec<Vec<u8>>>, MpcError> {
        match &mut self.stage {
            Stage::Commit(broadcast) => {
                if let Some(raw) = broadcast.step(network)? {
                    let commitments = raw
                        .iter()
                        .map(|bytes| Commitment::from_bytes(bytes))
                        .collect::<Result<_, _>>()?;
                    let mut openings = Broadcast::direct(self.opening.clone());
                    openings.step(network)?;
                    self.stage = Stage::Open {
                        commitments,
                        openings,
                    };
                }
                Ok(None)
            }
            Stage::Open {
                commitments,
                openings,
            } => match openings.step(network)? {
                Some(openings) => {
                    let values = open_all(commitments, &openings)?;
                    self.stage = Stage::Done(values.clone());
                    Ok(Some(values))
                }
                None => Ok(None),
            },
            Stage::Done(values) => Ok(Some(values.clone())),
        }
    }

    #[cfg(test)]
    pub(crate) fn replace_opening(&mut self, opening: Vec<u8>) {
        self.opening = opening;
    }
}

/// Verify every opening against the commitment of the same party.
fn open_all(commitments: &[Commitment], openings: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, MpcError> {
    commitments
        .iter()
        .zip(openings)
        .enumerate()
        .map(|(party, (commitment, opening))| {
            commitment::open(commitment, opening).map_err(|_| {
                warn!(party, "Opening does not match commitment");
                MpcError::OpenMismatch(party)
            })
        })
        .collect()
}

impl<R: ResourcePool> NativeProtocol<R> for CommitAndOpen {
    fn evaluate(
        &mut self,
        _round: usize,
        _pool: &mut R,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus, MpcError> {
        Ok(match self.step(network)? {
            Some(_) => EvaluationStatus::Done,
            None => EvaluationStatus::MoreRoundsNeeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use ff::Field;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        executor::{process_batch, Batch},
        fields::{Fp101, MpcField},
        network::mock_networks,
        testing::TestPool,
    };

    async fn run_commit_open(
        num_parties: usize,
        value: Fp101,
        tamper: Option<usize>,
    ) -> Vec<Result<(usize, Vec<Fp101>), MpcError>> {
        futures::future::join_all(mock_networks(num_parties).into_iter().map(
            |mut net| async move {
                let mut pool = TestPool::new(net.party_id(), num_parties);
                let mut gate = CommitAndOpen::new(pool.rng(), &value.to_bytes_be(), num_parties);
                if tamper == Some(net.party_id()) {
                    let mut rng = StdRng::seed_from_u64(99);
                    let (_, other) = commitment::commit(&mut rng, &Fp101::one().to_bytes_be());
                    gate.replace_opening(other);
                }

                let mut batch = Batch::new(vec![gate]);
                let rounds = process_batch(&mut batch, &mut pool, &mut net).await?;
                let values: Vec<Fp101> = batch.gates()[0]
                    .output()
                    .unwrap()
                    .iter()
                    .map(|bytes| Fp101::from_bytes_be(bytes))
                    .collect::<Result<_, _>>()?;
                Ok::<_, MpcError>((rounds, values))
            },
        ))
        .await
    }

    #[tokio::test]
    async fn test_two_parties_reveal() {
        let results = run_commit_open(2, Fp101::from(42), None).await;
        for result in results {
            let (rounds, values) = result.unwrap();
            assert_eq!(rounds, 3);
            assert_eq!(values, vec![Fp101::from(42); 2]);
        }
    }

    #[tokio::test]
    async fn test_three_parties_reveal() {
        let results = run_commit_open(3, Fp101::from(17), None).await;
        for result in results {
            let (rounds, values) = result.unwrap();
            assert_eq!(rounds, 4);
            assert_eq!(values, vec![Fp101::from(17); 3]);
        }
    }

    #[tokio::test]
    async fn test_substituted_opening() {
        let results = run_commit_open(2, Fp101::from(42), Some(1)).await;
        // Party 1 substituted its opening; the honest party catches it.
        assert!(matches!(results[0], Err(MpcError::OpenMismatch(1))));
    }

    #[test]
    fn test_phase_starts_in_commit() {
        let mut rng = StdRng::seed_from_u64(0);
        let gate = CommitAndOpen::new(&mut rng, b"v", 2);
        assert_eq!(gate.phase(), CommitAndOpenPhase::Commit);
        assert!(gate.output().is_none());
    }
}
