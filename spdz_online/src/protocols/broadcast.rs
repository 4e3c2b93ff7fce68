use digest::Digest;
use tracing::warn;

use crate::{commitment::CommitmentHash, error::MpcError, network::Network};

use super::{EvaluationStatus, NativeProtocol};

#[derive(Clone, Debug)]
enum Stage {
    Send { payload: Vec<u8> },
    AwaitValues { own: Vec<u8> },
    AwaitEcho { values: Vec<Vec<u8>>, digest: Vec<u8> },
    Done { values: Vec<Vec<u8>> },
}

/// Every party distributes one payload; all honest parties end up with the same vector.
///
/// With more than two parties, the received vector is echoed (as a digest) to every peer and
/// compared against the echoes of all peers, which detects a sender equivocating towards
/// different parties.
#[derive(Clone, Debug)]
pub struct Broadcast {
    echo: bool,
    stage: Stage,
}

impl Broadcast {
    /// Consistent broadcast of `payload`. Echoes only when there are more than two parties.
    pub fn new(payload: Vec<u8>, num_parties: usize) -> Self {
        Self {
            echo: num_parties > 2,
            stage: Stage::Send { payload },
        }
    }

    /// Plain exchange of `payload` without consistency checks.
    pub fn direct(payload: Vec<u8>) -> Self {
        Self {
            echo: false,
            stage: Stage::Send { payload },
        }
    }

    /// Advance by one round. Returns values indexed by party once finished.
    pub fn step(&mut self, network: &mut dyn Network) -> Result<Option<Vec<Vec<u8>>>, MpcError> {
        let stage = std::mem::replace(&mut self.stage, Stage::Done { values: Vec::new() });
        let (next, output) = match stage {
            Stage::Send { payload } => {
                network.send_to_all(&payload);
                (Stage::AwaitValues { own: payload }, None)
            }
            Stage::AwaitValues { own } => {
                let mut values = vec![Vec::new(); network.num_parties()];
                for (party, value) in network.receive_from_all()? {
                    values[party] = value;
                }
                values[network.party_id()] = own;

                if self.echo {
                    let digest = echo_digest(&values);
                    network.send_to_all(&digest);
                    (Stage::AwaitEcho { values, digest }, None)
                } else {
                    (Stage::Done { values: values.clone() }, Some(values))
                }
            }
            Stage::AwaitEcho { values, digest } => {
                for (party, echo) in network.receive_from_all()? {
                    if echo != digest {
                        warn!(party, "Broadcast echo mismatch");
                        return Err(MpcError::BroadcastInconsistency(party));
                    }
                }
                (Stage::Done { values: values.clone() }, Some(values))
            }
            Stage::Done { values } => (Stage::Done { values: values.clone() }, Some(values)),
        };
        self.stage = next;
        Ok(output)
    }

    /// Values indexed by party, available once the broadcast finished.
    pub fn values(&self) -> Option<&[Vec<u8>]> {
        match &self.stage {
            Stage::Done { values } => Some(values),
            _ => None,
        }
    }
}

impl<R> NativeProtocol<R> for Broadcast {
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

/// Digest of a vector of payloads; entries are length-prefixed so the encoding is unambiguous.
pub(crate) fn echo_digest(values: &[Vec<u8>]) -> Vec<u8> {
    let mut hasher = CommitmentHash::new();
    for value in values {
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value);
    }
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        executor::process_batch,
        executor::Batch,
        network::{mock_networks, BatchNetwork},
    };

    #[tokio::test]
    async fn test_three_party_broadcast() {
        let results = futures::future::join_all(mock_networks(3).into_iter().map(
            |mut net| async move {
                let mut batch = Batch::new(vec![Broadcast::new(b"test".to_vec(), 3)]);
                let rounds = process_batch(&mut batch, &mut (), &mut net).await.unwrap();
                let values = batch.gates()[0].values().unwrap().to_vec();
                (rounds, values)
            },
        ))
        .await;

        for (rounds, values) in results {
            assert_eq!(rounds, 3);
            assert_eq!(values, vec![b"test".to_vec(); 3]);
        }
    }

    #[tokio::test]
    async fn test_two_party_exchange() {
        let results = futures::future::join_all(mock_networks(2).into_iter().map(
            |mut net| async move {
                let payload = vec![net.party_id() as u8];
                let mut batch = Batch::new(vec![Broadcast::new(payload, 2)]);
                let rounds = process_batch(&mut batch, &mut (), &mut net).await.unwrap();
                (rounds, batch.gates()[0].values().unwrap().to_vec())
            },
        ))
        .await;

        for (rounds, values) in results {
            assert_eq!(rounds, 2);
            assert_eq!(values, vec![vec![0], vec![1]]);
        }
    }

    #[tokio::test]
    async fn test_equivocating_sender_detected() {
        let mut networks = mock_networks(3).into_iter();
        let mut cheater = networks.next().unwrap();

        let cheat = async move {
            cheater.send(1, b"left".to_vec());
            cheater.send(2, b"right".to_vec());
            cheater.flush().await.unwrap();
            cheater.receive_from_all().unwrap();
            cheater.send_to_all(&[0; 32]);
            cheater.flush().await.unwrap();
        };

        let honest = futures::future::join_all(networks.map(|mut net| async move {
            let mut batch = Batch::new(vec![Broadcast::new(b"x".to_vec(), 3)]);
            process_batch(&mut batch, &mut (), &mut net).await
        }));

        let (_, results) = futures::join!(cheat, honest);
        for result in results {
            assert!(matches!(result, Err(MpcError::BroadcastInconsistency(_))));
        }
    }
}
