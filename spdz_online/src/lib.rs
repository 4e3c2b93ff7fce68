use std::ops::{Add, Mul, Neg, Sub};

use rand::rngs::StdRng;

pub mod commitment;
pub mod config;
pub mod error;
pub mod executor;
pub mod fields;
pub mod network;
pub mod protocols;
pub mod spdz;
pub mod suite;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::MpcError;
pub use fields::MpcField;

/// Private share of a field element.
/// Sharing is linear and supports multiplication by plaintext field elements without communication.
pub trait MpcShare:
    Copy
    + Clone
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<Self::Field, Output = Self>
{
    /// Field type of value represented by this share.
    type Field: MpcField;

    /// Sharing of zero.
    fn zero() -> Self;

    /// Sharing of doubled value.
    fn double(&self) -> Self;
}

/// Sharing-based MPC computation context.
pub trait MpcContext {
    /// Field type used by this MPC protocol.
    type Field: MpcField;

    /// Share type used by this MPC protocol.
    type Share: MpcShare<Field = Self::Field>;

    /// Number of parties participating in MPC computation.
    fn num_parties(&self) -> usize;

    /// ID of current party.
    fn party_id(&self) -> usize;
}

/// Dealer of precomputed parameters for MPC computation.
///
/// Running out of material is reported as [`MpcError::Configuration`].
pub trait MpcDealer: MpcContext {
    /// Sharing of a plain value known to all parties.
    fn share_plain(&self, x: Self::Field) -> Self::Share;

    /// Random sharing of a secret random triple (a, b, c) that satisfies ab = c.
    fn next_beaver_triple(&mut self) -> Result<(Self::Share, Self::Share, Self::Share), MpcError>;

    /// Random sharing of a secret random bit.
    fn next_bit(&mut self) -> Result<Self::Share, MpcError>;

    /// Release resources held by the dealer. Called once when the suite is destroyed.
    fn shutdown(&mut self) {}
}

/// Resources shared by all gates of a computation.
pub trait ResourcePool {
    /// ID of current party.
    fn party_id(&self) -> usize;

    /// Number of parties participating in the computation.
    fn num_parties(&self) -> usize;

    /// Decimal representation of the modulus of the computation's field.
    fn modulus(&self) -> &'static str;

    /// Local cryptographically secure randomness.
    fn rng(&mut self) -> &mut StdRng;
}
