use crate::{config::PreprocessingConfig, MpcContext, MpcDealer, MpcError, MpcField};

use super::{FakeSpdzDealer, PrecomputedSpdzDealer, SpdzDealer, SpdzShare};

/// Dealer selected once from configuration.
pub enum ConfiguredDealer<T> {
    Fake(FakeSpdzDealer<T>),
    Precomputed(PrecomputedSpdzDealer<T>),
}

impl<T: MpcField> ConfiguredDealer<T> {
    /// Build dealer for party `party_id`. Precomputed material must belong to that party.
    pub fn from_config(
        config: &PreprocessingConfig,
        num_parties: usize,
        party_id: usize,
    ) -> Result<Self, MpcError> {
        let dealer = match config {
            PreprocessingConfig::Fake { seed } => {
                ConfiguredDealer::Fake(FakeSpdzDealer::new(num_parties, party_id, *seed))
            }
            PreprocessingConfig::Precomputed { path } => {
                ConfiguredDealer::Precomputed(PrecomputedSpdzDealer::from_file(path)?)
            }
        };
        if dealer.num_parties() != num_parties || dealer.party_id() != party_id {
            return Err(MpcError::config(format!(
                "Preprocessing is for party {} of {}, expected party {party_id} of {num_parties}",
                dealer.party_id(),
                dealer.num_parties(),
            )));
        }
        Ok(dealer)
    }
}

impl<T: MpcField> MpcContext for ConfiguredDealer<T> {
    type Field = T;
    type Share = SpdzShare<T>;

    fn num_parties(&self) -> usize {
        match self {
            ConfiguredDealer::Fake(dealer) => dealer.num_parties(),
            ConfiguredDealer::Precomputed(dealer) => dealer.num_parties(),
        }
    }

    fn party_id(&self) -> usize {
        match self {
            ConfiguredDealer::Fake(dealer) => dealer.party_id(),
            ConfiguredDealer::Precomputed(dealer) => dealer.party_id(),
        }
    }
}

impl<T: MpcField> MpcDealer for ConfiguredDealer<T> {
    fn share_plain(&self, x: T) -> SpdzShare<T> {
        match self {
            ConfiguredDealer::Fake(dealer) => dealer.share_plain(x),
            ConfiguredDealer::Precomputed(dealer) => dealer.share_plain(x),
        }
    }

    fn next_beaver_triple(
        &mut self,
    ) -> Result<(SpdzShare<T>, SpdzShare<T>, SpdzShare<T>), MpcError> {
        match self {
            ConfiguredDealer::Fake(dealer) => dealer.next_beaver_triple(),
            ConfiguredDealer::Precomputed(dealer) => dealer.next_beaver_triple(),
        }
    }

    fn next_bit(&mut self) -> Result<SpdzShare<T>, MpcError> {
        match self {
            ConfiguredDealer::Fake(dealer) => dealer.next_bit(),
            ConfiguredDealer::Precomputed(dealer) => dealer.next_bit(),
        }
    }

    fn shutdown(&mut self) {
        match self {
            ConfiguredDealer::Fake(dealer) => dealer.shutdown(),
            ConfiguredDealer::Precomputed(dealer) => dealer.shutdown(),
        }
    }
}

impl<T: MpcField> SpdzDealer for ConfiguredDealer<T> {
    fn authentication_key_share(&self) -> T {
        match self {
            ConfiguredDealer::Fake(dealer) => dealer.authentication_key_share(),
            ConfiguredDealer::Precomputed(dealer) => dealer.authentication_key_share(),
        }
    }

    fn next_input_mask_own(&mut self) -> Result<(SpdzShare<T>, T), MpcError> {
        match self {
            ConfiguredDealer::Fake(dealer) => dealer.next_input_mask_own(),
            ConfiguredDealer::Precomputed(dealer) => dealer.next_input_mask_own(),
        }
    }

    fn next_input_mask_for(&mut self, id: usize) -> Result<SpdzShare<T>, MpcError> {
        match self {
            ConfiguredDealer::Fake(dealer) => dealer.next_input_mask_for(id),
            ConfiguredDealer::Precomputed(dealer) => dealer.next_input_mask_for(id),
        }
    }
}
