use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::{
    config::SpdzConfig,
    error::MpcError,
    executor::{process_batch_with, Batch, BatchEvaluator, RoundSynchronization},
    fields::MpcField,
    network::BatchNetwork,
    protocols::NativeProtocol,
    suite::ProtocolSuite,
    ResourcePool,
};

use super::{MacCheck, MacCheckPhase, SpdzDealer, SpdzFactory, SpdzResourcePool, SpdzShare};

/// SPDZ protocol suite.
pub struct SpdzProtocolSuite<T, D> {
    config: SpdzConfig,
    _marker: PhantomData<(T, D)>,
}

impl<T, D> SpdzProtocolSuite<T, D>
where
    T: MpcField,
    D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    pub fn new(config: SpdzConfig) -> Result<Self, MpcError> {
        config.validate()?;
        Ok(Self {
            config,
            _marker: PhantomData,
        })
    }

    pub fn config(&self) -> &SpdzConfig {
        &self.config
    }

    /// Evaluator honoring the configured batch size, with a fresh round synchronization.
    pub fn evaluator(&self) -> Result<BatchEvaluator<SpdzRoundSynchronization<T>>, MpcError> {
        BatchEvaluator::new(self.config.max_batch_size, self.create_round_synchronization())
    }
}

impl<T, D> ProtocolSuite for SpdzProtocolSuite<T, D>
where
    T: MpcField,
    D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    type ResourcePool = SpdzResourcePool<T, D>;
    type Factory = SpdzFactory<T>;
    type RoundSync = SpdzRoundSynchronization<T>;

    fn init(&mut self, pool: &mut Self::ResourcePool) -> Self::Factory {
        debug!(
            party_id = pool.party_id(),
            num_parties = pool.num_parties(),
            modulus = pool.modulus(),
            "Initializing SPDZ suite"
        );
        SpdzFactory::new(pool.party_id(), pool.key_share())
    }

    fn create_round_synchronization(&self) -> Self::RoundSync {
        SpdzRoundSynchronization::new(self.config.mac_check_threshold)
    }

    fn destroy(&mut self, pool: &mut Self::ResourcePool) {
        if !pool.store().is_empty() {
            warn!(
                values = pool.store().len(),
                "Destroying suite with unverified opened values"
            );
        }
        pool.dealer_mut().shutdown();
    }
}

/// Forces MAC checks between batches.
///
/// A check runs after a batch containing an output gate, once more than `threshold` gates were
/// evaluated since the last check, and at the end of evaluation if any opened value is still
/// unverified. Evaluated gates are handed back only after the check passed.
pub struct SpdzRoundSynchronization<T> {
    threshold: usize,
    gates_since_check: usize,
    output_pending: bool,
    phase: MacCheckPhase,
    checks: usize,
    _field: PhantomData<T>,
}

impl<T: MpcField> SpdzRoundSynchronization<T> {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            gates_since_check: 0,
            output_pending: false,
            phase: MacCheckPhase::Idle,
            checks: 0,
            _field: PhantomData,
        }
    }

    pub fn phase(&self) -> MacCheckPhase {
        self.phase
    }

    pub fn gates_since_check(&self) -> usize {
        self.gates_since_check
    }

    /// Number of MAC checks passed so far.
    pub fn checks(&self) -> usize {
        self.checks
    }

    #[instrument(skip_all, fields(values = pool.store().len()))]
    async fn run_mac_check<D, N>(
        &mut self,
        pool: &mut SpdzResourcePool<T, D>,
        network: &mut N,
    ) -> Result<(), MpcError>
    where
        D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
        N: BatchNetwork,
    {
        let opened = pool.store().snapshot();
        let key_share = pool.key_share();
        let mut batch = Batch::new(vec![MacCheck::new(pool, opened, key_share)]);
        set_phase(&mut self.phase, batch.gates()[0].phase());

        let phase = &mut self.phase;
        let rounds = process_batch_with(&mut batch, pool, network, |gates| {
            set_phase(phase, gates[0].phase());
        })
        .await?;

        pool.store_mut().clear();
        self.gates_since_check = 0;
        self.output_pending = false;
        self.checks += 1;
        set_phase(&mut self.phase, MacCheckPhase::Idle);
        debug!(rounds, "MAC check finished");
        Ok(())
    }
}

fn set_phase(current: &mut MacCheckPhase, next: MacCheckPhase) {
    if *current != next {
        debug!(from = ?*current, to = ?next, "MAC check phase");
        *current = next;
    }
}

#[async_trait(?Send)]
impl<T, D, N> RoundSynchronization<SpdzResourcePool<T, D>, N> for SpdzRoundSynchronization<T>
where
    T: MpcField,
    D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
    N: BatchNetwork,
{
    fn before_batch<G: NativeProtocol<SpdzResourcePool<T, D>>>(
        &mut self,
        gates: &[G],
        _pool: &mut SpdzResourcePool<T, D>,
    ) -> Result<(), MpcError> {
        self.output_pending |= gates.iter().any(|gate| gate.is_output());
        Ok(())
    }

    async fn finished_batch(
        &mut self,
        gates_evaluated: usize,
        pool: &mut SpdzResourcePool<T, D>,
        network: &mut N,
    ) -> Result<(), MpcError> {
        self.gates_since_check += gates_evaluated;
        if self.output_pending || self.gates_since_check > self.threshold {
            debug!(
                gates = self.gates_since_check,
                output = self.output_pending,
                "Forcing MAC check"
            );
            self.run_mac_check(pool, network).await?;
        }
        Ok(())
    }

    async fn finished_eval(
        &mut self,
        pool: &mut SpdzResourcePool<T, D>,
        network: &mut N,
    ) -> Result<(), MpcError> {
        if !pool.store().is_empty() {
            self.run_mac_check(pool, network).await?;
        }
        Ok(())
    }
}
