use rand::{rngs::StdRng, SeedableRng};

use crate::{MpcField, ResourcePool};

use super::{OpenedValueStore, SpdzDealer, SpdzShare};

/// Resources of a single party in a SPDZ computation.
///
/// Owns the preprocessing dealer and the store of values opened since the last MAC check.
pub struct SpdzResourcePool<T, D> {
    dealer: D,
    store: OpenedValueStore<T>,
    rng: StdRng,
}

impl<T, D> SpdzResourcePool<T, D>
where
    T: MpcField,
    D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    /// Create pool with local randomness seeded from OS entropy.
    pub fn new(dealer: D) -> Self {
        Self::with_rng(dealer, StdRng::from_entropy())
    }

    pub fn with_rng(dealer: D, rng: StdRng) -> Self {
        Self {
            dealer,
            store: OpenedValueStore::new(),
            rng,
        }
    }

    pub fn dealer(&self) -> &D {
        &self.dealer
    }

    pub fn dealer_mut(&mut self) -> &mut D {
        &mut self.dealer
    }

    pub fn store(&self) -> &OpenedValueStore<T> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut OpenedValueStore<T> {
        &mut self.store
    }

    /// Local share of the authentication key.
    pub fn key_share(&self) -> T {
        self.dealer.authentication_key_share()
    }
}

impl<T, D> ResourcePool for SpdzResourcePool<T, D>
where
    T: MpcField,
    D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    fn party_id(&self) -> usize {
        self.dealer.party_id()
    }

    fn num_parties(&self) -> usize {
        self.dealer.num_parties()
    }

    fn modulus(&self) -> &'static str {
        T::MODULUS
    }

    fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
