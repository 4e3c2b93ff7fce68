mod dealer;
pub use dealer::ConfiguredDealer;

mod factory;
pub use factory::SpdzFactory;

mod fake_dealer;
pub use fake_dealer::FakeSpdzDealer;

mod gates;
pub use gates::{InputGate, MultGate, OpenGate, SpdzGate};

mod mac_check;
pub use mac_check::{mac_check_share, MacCheck, MacCheckPhase};

mod precomp_dealer;
pub use precomp_dealer::{
    generate_precomputed_data, PrecomputedAmounts, PrecomputedSpdzData, PrecomputedSpdzDealer,
};

mod resource_pool;
pub use resource_pool::SpdzResourcePool;

mod share;
pub use share::SpdzShare;

mod storage;
pub use storage::{OpenedValue, OpenedValueStore};

mod suite;
pub use suite::{SpdzProtocolSuite, SpdzRoundSynchronization};

use crate::{MpcDealer, MpcError};

/// Dealer of precomputed parameters for SPDZ protocol.
pub trait SpdzDealer: MpcDealer {
    /// Raw sharing of random authentication key.
    fn authentication_key_share(&self) -> Self::Field;

    /// Random sharing of a random value with plaintext known to current party.
    fn next_input_mask_own(&mut self) -> Result<(Self::Share, Self::Field), MpcError>;

    /// Random sharing of a random value with plaintext known to specified party.
    fn next_input_mask_for(&mut self, id: usize) -> Result<Self::Share, MpcError>;
}
