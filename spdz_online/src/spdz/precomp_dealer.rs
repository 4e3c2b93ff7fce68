use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::Path,
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{MpcContext, MpcDealer, MpcError, MpcField, MpcShare};

use super::{SpdzDealer, SpdzShare};

/// Precomputed data for SPDZ protocol.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PrecomputedSpdzData<T> {
    pub num_parties: usize,
    pub party_id: usize,
    pub auth_key: T,
    pub beaver_triples: Vec<(SpdzShare<T>, SpdzShare<T>, SpdzShare<T>)>,
    pub random_bits: Vec<SpdzShare<T>>,
    pub input_masks: Vec<Vec<SpdzShare<T>>>,
    pub input_masks_plain: Vec<T>,
}

impl<T> PrecomputedSpdzData<T>
where
    T: Serialize + for<'a> Deserialize<'a>,
{
    /// Load precomputed data from file.
    pub fn load_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        bincode::deserialize_from(reader).map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }

    /// Save precomputed data to file.
    pub fn save_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }
}

/// Amount of material produced by [`generate_precomputed_data`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecomputedAmounts {
    pub beaver_triples: usize,
    pub random_bits: usize,
    /// Number of input masks for each party.
    pub input_masks: usize,
}

/// Trusted-dealer generation of precomputed data for all parties.
pub fn generate_precomputed_data<T, R>(
    mut rng: R,
    num_parties: usize,
    amounts: PrecomputedAmounts,
) -> Vec<PrecomputedSpdzData<T>>
where
    T: MpcField,
    R: Rng,
{
    let mut data: Vec<PrecomputedSpdzData<T>> = (0..num_parties)
        .map(|id| PrecomputedSpdzData {
            num_parties,
            party_id: id,
            auth_key: T::random(&mut rng),
            input_masks: (0..num_parties).map(|_| Vec::new()).collect(),
            ..Default::default()
        })
        .collect();

    let auth_key = data.iter().fold(T::zero(), |acc, x| acc + x.auth_key);
    let mut share_gen = ShareGenerator {
        num_parties,
        auth_key,
        rng,
    };

    debug!(?amounts, num_parties, "Generating precomputed data");
    share_gen.fill_beaver_triples(&mut data, amounts.beaver_triples);
    share_gen.fill_random_bits(&mut data, amounts.random_bits);
    for party_id in 0..num_parties {
        share_gen.fill_input_masks_for(&mut data, party_id, amounts.input_masks);
    }

    data
}

/// Generator of random SPDZ sharings.
struct ShareGenerator<T, R> {
    num_parties: usize,
    auth_key: T,
    rng: R,
}

impl<T, R> ShareGenerator<T, R>
where
    T: MpcField,
    R: Rng,
{
    /// Generate random sharing of given value.
    fn share(&mut self, value: T) -> Vec<SpdzShare<T>> {
        let mut shares: Vec<_> = (1..self.num_parties)
            .map(|_| SpdzShare {
                value: T::random(&mut self.rng),
                mac: T::random(&mut self.rng),
            })
            .collect();
        let sum = shares.iter().fold(SpdzShare::zero(), |acc, &x| acc + x);
        shares.push(SpdzShare {
            value: value - sum.value,
            mac: value * self.auth_key - sum.mac,
        });
        shares
    }

    /// Generate random sharing of random value.
    fn share_random(&mut self) -> (Vec<SpdzShare<T>>, T) {
        let value = T::random(&mut self.rng);
        (self.share(value), value)
    }

    fn fill_beaver_triples(&mut self, data: &mut [PrecomputedSpdzData<T>], count: usize) {
        for _ in 0..count {
            let (shares_a, a) = self.share_random();
            let (shares_b, b) = self.share_random();
            let shares_ab = self.share(a * b);
            for (i, party_data) in data.iter_mut().enumerate() {
                party_data
                    .beaver_triples
                    .push((shares_a[i], shares_b[i], shares_ab[i]));
            }
        }
    }

    fn fill_random_bits(&mut self, data: &mut [PrecomputedSpdzData<T>], count: usize) {
        for _ in 0..count {
            let bit = T::from(self.rng.gen_range(0..=1));
            let shares = self.share(bit);
            for (i, party_data) in data.iter_mut().enumerate() {
                party_data.random_bits.push(shares[i]);
            }
        }
    }

    fn fill_input_masks_for(
        &mut self,
        data: &mut [PrecomputedSpdzData<T>],
        party_id: usize,
        count: usize,
    ) {
        for _ in 0..count {
            let (shares, plain) = self.share_random();
            for (i, party_data) in data.iter_mut().enumerate() {
                party_data.input_masks[party_id].push(shares[i]);
            }
            data[party_id].input_masks_plain.push(plain);
        }
    }
}

/// Dealer for SPDZ protocol that serves precomputed data.
pub struct PrecomputedSpdzDealer<T> {
    data: PrecomputedSpdzData<T>,
}

impl<T> PrecomputedSpdzDealer<T>
where
    T: Serialize + for<'a> Deserialize<'a>,
{
    /// Create new dealer given precomputed data.
    pub fn new(data: PrecomputedSpdzData<T>) -> Self {
        Self { data }
    }

    /// Create new dealer from file with precomputed data.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MpcError> {
        let path = path.as_ref();
        let data = PrecomputedSpdzData::load_file(path).map_err(|err| {
            MpcError::config(format!("Cannot load preprocessing from {}: {err}", path.display()))
        })?;
        Ok(Self::new(data))
    }

    /// Material left, as (beaver triples, random bits).
    pub fn remaining(&self) -> (usize, usize) {
        (self.data.beaver_triples.len(), self.data.random_bits.len())
    }
}

fn exhausted(what: &str) -> MpcError {
    MpcError::config(format!("Precomputed {what} exhausted"))
}

impl<T: MpcField> MpcContext for PrecomputedSpdzDealer<T> {
    type Field = T;
    type Share = SpdzShare<T>;

    fn num_parties(&self) -> usize {
        self.data.num_parties
    }

    fn party_id(&self) -> usize {
        self.data.party_id
    }
}

impl<T: MpcField> MpcDealer for PrecomputedSpdzDealer<T> {
    fn share_plain(&self, x: Self::Field) -> Self::Share {
        SpdzShare::from_plain(x, self.data.auth_key, self.party_id())
    }

    fn next_beaver_triple(&mut self) -> Result<(Self::Share, Self::Share, Self::Share), MpcError> {
        self.data
            .beaver_triples
            .pop()
            .ok_or_else(|| exhausted("beaver triples"))
    }

    fn next_bit(&mut self) -> Result<Self::Share, MpcError> {
        self.data
            .random_bits
            .pop()
            .ok_or_else(|| exhausted("random bits"))
    }

    fn shutdown(&mut self) {
        let (triples, bits) = self.remaining();
        debug!(triples, bits, "Releasing unused preprocessing material");
        self.data = PrecomputedSpdzData {
            num_parties: self.data.num_parties,
            party_id: self.data.party_id,
            auth_key: self.data.auth_key,
            ..Default::default()
        };
    }
}

impl<T: MpcField> SpdzDealer for PrecomputedSpdzDealer<T> {
    fn authentication_key_share(&self) -> Self::Field {
        self.data.auth_key
    }

    fn next_input_mask_own(&mut self) -> Result<(Self::Share, Self::Field), MpcError> {
        let id = self.party_id();
        let mask = self
            .data
            .input_masks
            .get_mut(id)
            .and_then(Vec::pop)
            .ok_or_else(|| exhausted("input masks"))?;
        let plain = self
            .data
            .input_masks_plain
            .pop()
            .ok_or_else(|| exhausted("input mask plaintexts"))?;
        Ok((mask, plain))
    }

    fn next_input_mask_for(&mut self, id: usize) -> Result<Self::Share, MpcError> {
        if id == self.party_id() {
            return Err(MpcError::config("Own input mask requested as third-party mask"));
        }
        self.data
            .input_masks
            .get_mut(id)
            .and_then(Vec::pop)
            .ok_or_else(|| exhausted("input masks"))
    }
}

#[cfg(test)]
mod tests {
    use ff::Field;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::fields::{Fp101, Mersenne61};

    fn amounts(n: usize) -> PrecomputedAmounts {
        PrecomputedAmounts {
            beaver_triples: n,
            random_bits: n,
            input_masks: n,
        }
    }

    #[test]
    fn test_generated_triples_are_valid() {
        let data =
            generate_precomputed_data::<Mersenne61, _>(StdRng::seed_from_u64(1), 3, amounts(5));
        let alpha = data.iter().fold(Mersenne61::zero(), |acc, d| acc + d.auth_key);
        let mut dealers: Vec<_> = data.into_iter().map(PrecomputedSpdzDealer::new).collect();

        for _ in 0..5 {
            let (a, b, c) = dealers.iter_mut().fold(
                (SpdzShare::zero(), SpdzShare::zero(), SpdzShare::zero()),
                |acc, d| {
                    let t = d.next_beaver_triple().unwrap();
                    (acc.0 + t.0, acc.1 + t.1, acc.2 + t.2)
                },
            );
            assert_eq!(a.value * b.value, c.value);
            assert_eq!(c.mac, alpha * c.value);
        }
    }

    #[test]
    fn test_exhaustion_is_configuration_error() {
        let data = generate_precomputed_data::<Fp101, _>(StdRng::seed_from_u64(2), 2, amounts(1));
        let mut dealer = PrecomputedSpdzDealer::new(data[0].clone());

        assert!(dealer.next_beaver_triple().is_ok());
        assert!(matches!(
            dealer.next_beaver_triple(),
            Err(MpcError::Configuration(_))
        ));
        assert!(dealer.next_bit().is_ok());
        assert!(matches!(dealer.next_bit(), Err(MpcError::Configuration(_))));
        assert!(dealer.next_input_mask_own().is_ok());
        assert!(dealer.next_input_mask_own().is_err());
        assert!(dealer.next_input_mask_for(1).is_ok());
        assert!(dealer.next_input_mask_for(1).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let data = generate_precomputed_data::<Fp101, _>(StdRng::seed_from_u64(3), 2, amounts(2));
        let path = std::env::temp_dir().join(format!("spdz-precomp-{}.bin", std::process::id()));
        data[1].save_file(&path).unwrap();

        let mut dealer = PrecomputedSpdzDealer::<Fp101>::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(dealer.party_id(), 1);
        assert_eq!(dealer.authentication_key_share(), data[1].auth_key);
        assert_eq!(dealer.remaining(), (2, 2));

        dealer.shutdown();
        assert_eq!(dealer.remaining(), (0, 0));
        assert!(PrecomputedSpdzDealer::<Fp101>::from_file(&path).is_err());
    }
}
