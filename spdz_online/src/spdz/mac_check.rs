//! Batched verification of MACs on opened values.
//!
//! Parties agree on a random combinator `r` through commit-and-open, fold all opened values
//! with coefficients `1, r, r^2, ...` and commit-and-open their share `sigma_i` of
//! `sum(r^j mac_j) - alpha * sum(r^j v_j)`. The check passes iff all shares sum to zero.

use tracing::{debug, info, warn};

use crate::{
    error::MpcError,
    fields::MpcField,
    network::Network,
    protocols::{CommitAndOpen, CommitAndOpenPhase, EvaluationStatus, NativeProtocol},
    ResourcePool,
};

use super::OpenedValue;

/// Progress of the MAC check as observed by the round synchronization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MacCheckPhase {
    /// No check in progress.
    Idle,
    /// Commitments to the combinator seeds are being distributed.
    CommitSent,
    /// Seeds are being revealed, followed by commit-and-open of the check values.
    OpenSent,
    /// Check values opened and verified.
    CheckDone,
}

/// Local share of the check value for given combinator.
pub fn mac_check_share<T: MpcField>(opened: &[OpenedValue<T>], key_share: T, combinator: T) -> T {
    let (value, mac) = opened
        .iter()
        .rev()
        .fold((T::zero(), T::zero()), |(value, mac), x| {
            (value * combinator + x.value, mac * combinator + x.mac)
        });
    mac - key_share * value
}

enum Stage {
    AgreeCombinator(CommitAndOpen),
    CheckSigma(CommitAndOpen),
    Done,
}

/// MAC check gate over a snapshot of opened values.
pub struct MacCheck<T> {
    opened: Vec<OpenedValue<T>>,
    key_share: T,
    stage: Stage,
}

impl<T: MpcField> MacCheck<T> {
    /// Start check of `opened` values, drawing this party's combinator seed from the pool.
    pub fn new<R: ResourcePool>(pool: &mut R, opened: Vec<OpenedValue<T>>, key_share: T) -> Self {
        let num_parties = pool.num_parties();
        let seed = T::random(pool.rng());
        let stage = Stage::AgreeCombinator(CommitAndOpen::new(
            pool.rng(),
            &seed.to_bytes_be(),
            num_parties,
        ));
        Self {
            opened,
            key_share,
            stage,
        }
    }

    /// Number of values being checked.
    pub fn len(&self) -> usize {
        self.opened.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opened.is_empty()
    }

    pub fn phase(&self) -> MacCheckPhase {
        match &self.stage {
            Stage::AgreeCombinator(inner) if inner.phase() == CommitAndOpenPhase::Commit => {
                MacCheckPhase::CommitSent
            }
            Stage::AgreeCombinator(_) | Stage::CheckSigma(_) => MacCheckPhase::OpenSent,
            Stage::Done => MacCheckPhase::CheckDone,
        }
    }

    #[cfg(test)]
    pub(crate) fn tamper_mac(&mut self, index: usize, delta: T) {
        self.opened[index].mac += delta;
    }
}

impl<T: MpcField, R: ResourcePool> NativeProtocol<R> for MacCheck<T> {
    fn evaluate(
        &mut self,
        _round: usize,
        pool: &mut R,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus, MpcError> {
        let stage = std::mem::replace(&mut self.stage, Stage::Done);
        self.stage = match stage {
            Stage::AgreeCombinator(mut inner) => match inner.step(network)? {
                Some(seeds) => {
                    let combinator = sum_elements::<T>(&seeds)?;
                    let sigma = mac_check_share(&self.opened, self.key_share, combinator);
                    debug!(values = self.opened.len(), "Combinator agreed");

                    let num_parties = pool.num_parties();
                    let mut check =
                        CommitAndOpen::new(pool.rng(), &sigma.to_bytes_be(), num_parties);
                    check.step(network)?;
                    Stage::CheckSigma(check)
                }
                None => Stage::AgreeCombinator(inner),
            },
            Stage::CheckSigma(mut inner) => match inner.step(network)? {
                Some(sigmas) => {
                    if sum_elements::<T>(&sigmas)? != T::zero() {
                        warn!(values = self.opened.len(), "MAC check failed");
                        return Err(MpcError::MacCheckFailure);
                    }
                    info!(values = self.opened.len(), "MAC check passed");
                    Stage::Done
                }
                None => Stage::CheckSigma(inner),
            },
            Stage::Done => Stage::Done,
        };

        Ok(match self.stage {
            Stage::Done => EvaluationStatus::Done,
            _ => EvaluationStatus::MoreRoundsNeeded,
        })
    }
}

fn sum_elements<T: MpcField>(encoded: &[Vec<u8>]) -> Result<T, MpcError> {
    encoded
        .iter()
        .try_fold(T::zero(), |acc, bytes| Ok(acc + T::from_bytes_be(bytes)?))
}

#[cfg(test)]
mod tests {
    use ff::Field;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        executor::{process_batch, Batch},
        fields::Fp101,
        spdz::SpdzShare,
        testing::{init_tracing, spdz_parties},
        MpcDealer, MpcShare,
    };

    /// Authenticated sharings of `values` for every party, using the fake dealer's key.
    fn opened_for(keys: &[Fp101], values: &[u64]) -> Vec<Vec<OpenedValue<Fp101>>> {
        let num_parties = keys.len();
        (0..num_parties)
            .map(|id| {
                values
                    .iter()
                    .map(|&v| {
                        let share = SpdzShare::from_plain(Fp101::from(v), keys[id], id);
                        OpenedValue::new(Fp101::from(v), share)
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_honest_shares_sum_to_zero() {
        let keys = [Fp101::from(12), Fp101::from(77), Fp101::from(5)];
        let opened = opened_for(&keys, &[3, 50, 99, 0]);
        for combinator in [0, 1, 2, 100].map(Fp101::from) {
            let sum = (0..3).fold(Fp101::zero(), |acc, id| {
                acc + mac_check_share(&opened[id], keys[id], combinator)
            });
            assert_eq!(sum, Fp101::zero());
        }
    }

    #[test]
    fn test_tampered_mac_detected_with_fixed_combinator() {
        let keys = [Fp101::from(12), Fp101::from(77)];
        let mut opened = opened_for(&keys, &[3, 50]);
        opened[1][0].mac += Fp101::one();

        let combinator = Fp101::from(9);
        let sum = mac_check_share(&opened[0], keys[0], combinator)
            + mac_check_share(&opened[1], keys[1], combinator);
        assert_eq!(sum, Fp101::one());
    }

    #[test]
    fn test_coefficients_are_powers() {
        let opened = vec![
            OpenedValue {
                value: Fp101::zero(),
                mac: Fp101::from(1),
            },
            OpenedValue {
                value: Fp101::zero(),
                mac: Fp101::from(1),
            },
            OpenedValue {
                value: Fp101::zero(),
                mac: Fp101::from(1),
            },
        ];
        // 1 + 3 + 9
        assert_eq!(
            mac_check_share(&opened, Fp101::zero(), Fp101::from(3)),
            Fp101::from(13)
        );
    }

    /// MAC check of the values `0..4` over the network. `tamper` adds to the MAC of the opened
    /// value with the given index at the given party.
    async fn run_check(
        num_parties: usize,
        seed: u8,
        tamper: Option<(usize, usize)>,
    ) -> Vec<Result<usize, MpcError>> {
        init_tracing();
        futures::future::join_all(spdz_parties(num_parties, seed).into_iter().map(
            |(mut net, mut pool)| async move {
                let opened: Vec<_> = (0..4u64)
                    .map(|v| {
                        let share = pool.dealer().share_plain(Fp101::from(v));
                        OpenedValue::new(Fp101::from(v), share)
                    })
                    .collect();
                let key_share = pool.key_share();
                let mut check = MacCheck::new(&mut pool, opened, key_share);
                assert_eq!(check.phase(), MacCheckPhase::CommitSent);
                if let Some((party, index)) = tamper {
                    if party == net.party_id() {
                        check.tamper_mac(index, Fp101::from(5));
                    }
                }

                let mut batch = Batch::new(vec![check]);
                let rounds = process_batch(&mut batch, &mut pool, &mut net).await?;
                assert_eq!(batch.gates()[0].phase(), MacCheckPhase::CheckDone);
                Ok::<_, MpcError>(rounds)
            },
        ))
        .await
    }

    /// Combinator the parties of [`spdz_parties`] agree on: the sum of their first draws.
    fn expected_combinator(num_parties: usize, seed: u8) -> Fp101 {
        (0..num_parties).fold(Fp101::zero(), |acc, id| {
            let mut rng = StdRng::seed_from_u64(seed as u64 * 31 + id as u64);
            acc + Fp101::random(&mut rng)
        })
    }

    #[tokio::test]
    async fn test_honest_parties_pass() {
        for result in run_check(2, 3, None).await {
            assert_eq!(result.unwrap(), 5);
        }
        for result in run_check(3, 3, None).await {
            assert_eq!(result.unwrap(), 7);
        }
    }

    #[tokio::test]
    async fn test_tampered_party_fails_check() {
        for result in run_check(3, 3, Some((2, 0))).await {
            assert!(matches!(result, Err(MpcError::MacCheckFailure)));
        }
    }

    #[test]
    fn test_tampered_last_value_detected_by_nonzero_combinators() {
        let keys = [Fp101::from(12), Fp101::from(77)];
        let mut opened = opened_for(&keys, &[3, 50, 99, 7]);
        opened[0][3].mac += Fp101::from(5);

        let detected: Vec<_> = (0..101u64)
            .map(Fp101::from)
            .filter(|&combinator| {
                let sum = mac_check_share(&opened[0], keys[0], combinator)
                    + mac_check_share(&opened[1], keys[1], combinator);
                sum != Fp101::zero()
            })
            .collect();
        assert_eq!(detected.len(), 100);
        assert!(!detected.contains(&Fp101::zero()));
    }

    #[tokio::test]
    async fn test_tampered_last_value_fails_across_seeds() {
        let mut detected = 0;
        for seed in 0..10 {
            let combinator = expected_combinator(2, seed);
            for result in run_check(2, seed, Some((1, 3))).await {
                if combinator == Fp101::zero() {
                    // r^3 vanishes, the only undetected case
                    assert_eq!(result.unwrap(), 5);
                } else {
                    assert!(matches!(result, Err(MpcError::MacCheckFailure)));
                }
            }
            if combinator != Fp101::zero() {
                detected += 1;
            }
        }
        assert!(detected >= 8);
    }

    #[test]
    fn test_zero_share_is_neutral() {
        let zero = OpenedValue::new(Fp101::zero(), SpdzShare::<Fp101>::zero());
        assert_eq!(
            mac_check_share(&[zero], Fp101::from(4), Fp101::from(8)),
            Fp101::zero()
        );
    }
}
