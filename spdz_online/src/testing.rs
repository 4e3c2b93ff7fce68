//! Fixtures shared by multi-party tests.

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    fields::Fp101,
    network::{mock_networks, LocalNetwork, Network},
    spdz::{FakeSpdzDealer, SpdzResourcePool},
    MpcField, ResourcePool,
};

/// Install tracing subscriber honoring `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Resource pool without preprocessing material, for protocols that only need randomness.
pub struct TestPool {
    party_id: usize,
    num_parties: usize,
    rng: StdRng,
}

impl TestPool {
    pub fn new(party_id: usize, num_parties: usize) -> Self {
        Self {
            party_id,
            num_parties,
            rng: StdRng::seed_from_u64(1000 + party_id as u64),
        }
    }
}

impl ResourcePool for TestPool {
    fn party_id(&self) -> usize {
        self.party_id
    }

    fn num_parties(&self) -> usize {
        self.num_parties
    }

    fn modulus(&self) -> &'static str {
        Fp101::MODULUS
    }

    fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

/// SPDZ pool over the small test field backed by the fake dealer.
pub type TestSpdzPool = SpdzResourcePool<Fp101, FakeSpdzDealer<Fp101>>;

/// Connected networks and matching SPDZ pools for all parties. Dealers share `seed`.
pub fn spdz_parties(num_parties: usize, seed: u8) -> Vec<(LocalNetwork, TestSpdzPool)> {
    mock_networks(num_parties)
        .into_iter()
        .map(|net| {
            let party_id = net.party_id();
            let dealer = FakeSpdzDealer::new(num_parties, party_id, seed);
            let rng = StdRng::seed_from_u64(seed as u64 * 31 + party_id as u64);
            (net, SpdzResourcePool::with_rng(dealer, rng))
        })
        .collect()
}
