use crate::fields::MpcField;

use super::{InputGate, MultGate, OpenGate, SpdzGate, SpdzShare};

/// Builds SPDZ gates and performs local linear operations for one party.
#[derive(Copy, Clone, Debug)]
pub struct SpdzFactory<T> {
    party_id: usize,
    key_share: T,
}

impl<T: MpcField> SpdzFactory<T> {
    pub fn new(party_id: usize, key_share: T) -> Self {
        Self {
            party_id,
            key_share,
        }
    }

    /// Sharing of a public value.
    pub fn known(&self, x: T) -> SpdzShare<T> {
        SpdzShare::from_plain(x, self.key_share, self.party_id)
    }

    /// Add public constant to shared value.
    pub fn add_constant(&self, share: SpdzShare<T>, c: T) -> SpdzShare<T> {
        share + self.known(c)
    }

    /// Gate sharing a value held by `owner`. Other parties pass `None`.
    pub fn input(&self, owner: usize, value: Option<T>) -> SpdzGate<T> {
        SpdzGate::Input(InputGate::new(owner, value))
    }

    pub fn mul(&self, x: SpdzShare<T>, y: SpdzShare<T>) -> SpdzGate<T> {
        SpdzGate::Mult(MultGate::new(x, y))
    }

    /// Gate revealing a shared value to all parties.
    pub fn open(&self, x: SpdzShare<T>) -> SpdzGate<T> {
        SpdzGate::Open(OpenGate::new(x))
    }
}
