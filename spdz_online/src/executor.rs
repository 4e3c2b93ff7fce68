//! Batched, round-synchronous evaluation of native protocols.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    error::MpcError,
    network::BatchNetwork,
    protocols::{EvaluationStatus, NativeProtocol},
};

/// Evaluation progress of a single gate in a batch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GateProgress {
    /// Gate will be evaluated again in `next_round`.
    Pending { next_round: usize },
    /// Gate finished after the given number of rounds.
    Done { rounds: usize },
}

/// Gates evaluated together. Gates in one batch must not depend on each other.
pub struct Batch<G> {
    gates: Vec<G>,
    progress: Vec<GateProgress>,
}

impl<G> Batch<G> {
    /// Create batch from gates that have not been evaluated yet.
    pub fn new(gates: Vec<G>) -> Self {
        let progress = vec![GateProgress::Pending { next_round: 0 }; gates.len()];
        Self { gates, progress }
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn gates(&self) -> &[G] {
        &self.gates
    }

    /// Progress of gate with given index.
    pub fn progress(&self, index: usize) -> Option<GateProgress> {
        self.progress.get(index).copied()
    }

    /// Whether all gates finished.
    pub fn is_done(&self) -> bool {
        self.progress
            .iter()
            .all(|p| matches!(p, GateProgress::Done { .. }))
    }

    pub fn into_gates(self) -> Vec<G> {
        self.gates
    }
}

/// Evaluate all gates of a batch until they are done. Returns the number of rounds.
///
/// Within a round every pending gate is evaluated once, in index order, followed by a single
/// network flush.
pub async fn process_batch<G, R, N>(
    batch: &mut Batch<G>,
    pool: &mut R,
    network: &mut N,
) -> Result<usize, MpcError>
where
    G: NativeProtocol<R>,
    N: BatchNetwork,
{
    process_batch_with(batch, pool, network, |_| ()).await
}

/// Same as [`process_batch`], calling `on_round` with the gates after every round.
pub async fn process_batch_with<G, R, N, F>(
    batch: &mut Batch<G>,
    pool: &mut R,
    network: &mut N,
    mut on_round: F,
) -> Result<usize, MpcError>
where
    G: NativeProtocol<R>,
    N: BatchNetwork,
    F: FnMut(&[G]),
{
    if batch.is_empty() {
        return Ok(0);
    }

    let mut round = 0;
    loop {
        for (gate, progress) in batch.gates.iter_mut().zip(batch.progress.iter_mut()) {
            if let GateProgress::Pending { .. } = progress {
                *progress = match gate.evaluate(round, pool, network)? {
                    EvaluationStatus::Done => GateProgress::Done { rounds: round + 1 },
                    EvaluationStatus::MoreRoundsNeeded => GateProgress::Pending {
                        next_round: round + 1,
                    },
                };
            }
        }
        round += 1;
        on_round(&batch.gates);

        if batch.is_done() {
            return Ok(round);
        }
        network.flush().await?;
    }
}

/// Suite-specific callbacks invoked by [`BatchEvaluator`] around every batch.
///
/// Only `finished_batch` is guaranteed to do anything meaningful; it may run additional rounds
/// on `network` before returning.
#[async_trait(?Send)]
pub trait RoundSynchronization<R, N> {
    /// Called right before the given gates are evaluated.
    fn before_batch<G: NativeProtocol<R>>(
        &mut self,
        _gates: &[G],
        _pool: &mut R,
    ) -> Result<(), MpcError> {
        Ok(())
    }

    /// Called once all gates of a batch finished. `gates_evaluated` is the size of the batch.
    async fn finished_batch(
        &mut self,
        gates_evaluated: usize,
        pool: &mut R,
        network: &mut N,
    ) -> Result<(), MpcError>;

    /// Called once at the end of the whole computation.
    async fn finished_eval(&mut self, _pool: &mut R, _network: &mut N) -> Result<(), MpcError> {
        Ok(())
    }
}

/// Round synchronization that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRoundSynchronization;

#[async_trait(?Send)]
impl<R, N> RoundSynchronization<R, N> for NoopRoundSynchronization {
    async fn finished_batch(
        &mut self,
        _gates_evaluated: usize,
        _pool: &mut R,
        _network: &mut N,
    ) -> Result<(), MpcError> {
        Ok(())
    }
}

/// Statistics of gates evaluated by [`BatchEvaluator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    pub batches: usize,
    pub gates: usize,
    pub rounds: usize,
}

/// Evaluates gates in batches of bounded size, notifying round synchronization.
pub struct BatchEvaluator<S> {
    max_batch_size: usize,
    sync: S,
    stats: EvaluationStats,
}

impl<S> BatchEvaluator<S> {
    /// Create new evaluator. `max_batch_size` must be positive.
    pub fn new(max_batch_size: usize, sync: S) -> Result<Self, MpcError> {
        if max_batch_size == 0 {
            return Err(MpcError::config("Maximum batch size must be positive"));
        }
        Ok(Self {
            max_batch_size,
            sync,
            stats: EvaluationStats::default(),
        })
    }

    pub fn sync(&self) -> &S {
        &self.sync
    }

    pub fn stats(&self) -> EvaluationStats {
        self.stats
    }

    /// Evaluate mutually independent gates. Gates are returned once every batch, including any
    /// work injected by round synchronization, has finished.
    #[instrument(skip_all, fields(gates = gates.len()))]
    pub async fn eval<G, R, N>(
        &mut self,
        gates: Vec<G>,
        pool: &mut R,
        network: &mut N,
    ) -> Result<Vec<G>, MpcError>
    where
        G: NativeProtocol<R>,
        N: BatchNetwork,
        S: RoundSynchronization<R, N>,
    {
        let mut evaluated = Vec::with_capacity(gates.len());
        let mut remaining = gates.into_iter().peekable();

        while remaining.peek().is_some() {
            let mut batch = Batch::new(remaining.by_ref().take(self.max_batch_size).collect());

            self.sync.before_batch(batch.gates(), pool)?;
            let rounds = process_batch(&mut batch, pool, network).await?;
            debug!(gates = batch.len(), rounds, "Batch finished");

            self.stats.batches += 1;
            self.stats.gates += batch.len();
            self.stats.rounds += rounds;

            self.sync.finished_batch(batch.len(), pool, network).await?;
            evaluated.extend(batch.into_gates());
        }

        Ok(evaluated)
    }

    /// Signal the end of the computation.
    pub async fn finish<R, N>(&mut self, pool: &mut R, network: &mut N) -> Result<(), MpcError>
    where
        S: RoundSynchronization<R, N>,
    {
        self.sync.finished_eval(pool, network).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{mock_networks, Network};

    /// Gate that exchanges a counter with all peers for a fixed number of rounds.
    struct PingGate {
        rounds: usize,
        received: usize,
    }

    impl NativeProtocol<()> for PingGate {
        fn evaluate(
            &mut self,
            round: usize,
            _pool: &mut (),
            network: &mut dyn Network,
        ) -> Result<EvaluationStatus, MpcError> {
            if round > 0 {
                self.received += network.receive_from_all()?.len();
            }
            if round + 1 == self.rounds {
                return Ok(EvaluationStatus::Done);
            }
            network.send_to_all(&[round as u8]);
            Ok(EvaluationStatus::MoreRoundsNeeded)
        }
    }

    #[tokio::test]
    async fn test_batch_takes_max_rounds() {
        let requirements = [3, 1, 5, 2];
        let results = futures::future::join_all(mock_networks(3).into_iter().map(
            |mut net| async move {
                let gates: Vec<_> = requirements
                    .iter()
                    .map(|&rounds| PingGate {
                        rounds,
                        received: 0,
                    })
                    .collect();
                let mut batch = Batch::new(gates);
                let rounds = process_batch(&mut batch, &mut (), &mut net).await.unwrap();
                let progress: Vec<_> = (0..batch.len()).map(|i| batch.progress(i)).collect();
                let received: Vec<_> = batch.gates().iter().map(|g| g.received).collect();
                (rounds, net.rounds(), progress, received)
            },
        ))
        .await;

        for (rounds, flushes, progress, received) in results {
            assert_eq!(rounds, 5);
            assert_eq!(flushes, 4);
            assert_eq!(progress[2], Some(GateProgress::Done { rounds: 5 }));
            assert_eq!(progress[1], Some(GateProgress::Done { rounds: 1 }));
            assert_eq!(received, vec![4, 0, 8, 2]);
        }
    }

    #[derive(Default)]
    struct CountingSync {
        before: Vec<usize>,
        finished: Vec<usize>,
        eval_done: bool,
    }

    #[async_trait(?Send)]
    impl<N> RoundSynchronization<(), N> for CountingSync {
        fn before_batch<G: NativeProtocol<()>>(
            &mut self,
            gates: &[G],
            _pool: &mut (),
        ) -> Result<(), MpcError> {
            self.before.push(gates.len());
            Ok(())
        }

        async fn finished_batch(
            &mut self,
            gates_evaluated: usize,
            _pool: &mut (),
            _network: &mut N,
        ) -> Result<(), MpcError> {
            self.finished.push(gates_evaluated);
            Ok(())
        }

        async fn finished_eval(
            &mut self,
            _pool: &mut (),
            _network: &mut N,
        ) -> Result<(), MpcError> {
            self.eval_done = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_evaluator_splits_batches() {
        let mut net = mock_networks(1).pop().unwrap();
        let mut evaluator = BatchEvaluator::new(2, CountingSync::default()).unwrap();
        let gates: Vec<_> = (1..=5)
            .map(|rounds| PingGate {
                rounds,
                received: 0,
            })
            .collect();

        let gates = evaluator.eval(gates, &mut (), &mut net).await.unwrap();
        evaluator.finish(&mut (), &mut net).await.unwrap();

        assert_eq!(gates.len(), 5);
        assert_eq!(evaluator.sync().before, vec![2, 2, 1]);
        assert_eq!(evaluator.sync().finished, vec![2, 2, 1]);
        assert!(evaluator.sync().eval_done);
        assert_eq!(
            evaluator.stats(),
            EvaluationStats {
                batches: 3,
                gates: 5,
                rounds: 2 + 4 + 5,
            }
        );
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(BatchEvaluator::new(0, NoopRoundSynchronization).is_err());
    }
}
