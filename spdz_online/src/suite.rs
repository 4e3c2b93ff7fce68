use crate::ResourcePool;

/// Plug-in point for a concrete MPC protocol.
///
/// A suite is initialized once per computation with the party's resource pool, hands out a
/// factory for its gates and a round synchronization for the evaluator, and releases its
/// resources in `destroy`.
pub trait ProtocolSuite {
    type ResourcePool: ResourcePool;

    /// Builder of the suite's gates.
    type Factory;

    /// Hook invoked by the evaluator around every batch.
    type RoundSync;

    fn init(&mut self, pool: &mut Self::ResourcePool) -> Self::Factory;

    fn create_round_synchronization(&self) -> Self::RoundSync;

    fn destroy(&mut self, pool: &mut Self::ResourcePool);
}
