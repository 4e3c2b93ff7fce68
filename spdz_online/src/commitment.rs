//! Hash-based commitments over byte strings.

use digest::Digest;
use rand::{CryptoRng, RngCore};
use sha3::Sha3_256;

use crate::error::MpcError;

/// Hash function used for commitments and broadcast echoes.
pub type CommitmentHash = Sha3_256;

/// Length of commitment randomness in bytes.
pub const NONCE_LENGTH: usize = 32;

/// Length of serialized commitment in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// Publishable part of a commitment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commitment {
    digest: [u8; DIGEST_LENGTH],
}

impl Commitment {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.digest
    }

    /// Parse commitment from its raw digest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MpcError> {
        let digest = bytes.try_into().map_err(|_| MpcError::LengthMismatch {
            len: bytes.len(),
            width: DIGEST_LENGTH,
        })?;
        Ok(Self { digest })
    }
}

/// Commit to `value`. Returns the commitment and the opening `nonce || value`.
pub fn commit<R: RngCore + CryptoRng>(rng: &mut R, value: &[u8]) -> (Commitment, Vec<u8>) {
    let mut opening = vec![0u8; NONCE_LENGTH];
    rng.fill_bytes(&mut opening);
    opening.extend_from_slice(value);
    (hash_opening(&opening), opening)
}

/// Check `opening` against `commitment` and extract the committed value.
pub fn open(commitment: &Commitment, opening: &[u8]) -> Result<Vec<u8>, MpcError> {
    if opening.len() < NONCE_LENGTH || hash_opening(opening) != *commitment {
        return Err(MpcError::CommitmentMismatch);
    }
    Ok(opening[NONCE_LENGTH..].to_vec())
}

fn hash_opening(opening: &[u8]) -> Commitment {
    let mut digest = [0u8; DIGEST_LENGTH];
    digest.copy_from_slice(&CommitmentHash::digest(opening));
    Commitment { digest }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn test_wrong_opening() {
        let mut rng = StdRng::seed_from_u64(7);
        let (commitment, mut opening) = commit(&mut rng, b"value");
        assert_eq!(open(&commitment, &opening).unwrap(), b"value");

        let last = opening.len() - 1;
        opening[last] ^= 1;
        assert!(matches!(
            open(&commitment, &opening),
            Err(MpcError::CommitmentMismatch)
        ));
        assert!(matches!(
            open(&commitment, &opening[..NONCE_LENGTH - 1]),
            Err(MpcError::CommitmentMismatch)
        ));
    }

    #[test]
    fn test_commitment_hides_equal_values() {
        let mut rng = StdRng::seed_from_u64(7);
        let (a, _) = commit(&mut rng, b"same");
        let (b, _) = commit(&mut rng, b"same");
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_digest() {
        let mut rng = StdRng::seed_from_u64(1);
        let (commitment, _) = commit(&mut rng, &[]);
        assert_eq!(Commitment::from_bytes(commitment.as_bytes()).unwrap(), commitment);
        assert!(Commitment::from_bytes(&[0; 31]).is_err());
    }

    proptest! {
        #[test]
        fn commit_then_open(
            value in proptest::collection::vec(any::<u8>(), 0..256),
            seed in any::<u64>()
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let (commitment, opening) = commit(&mut rng, &value);
            prop_assert_eq!(open(&commitment, &opening).unwrap(), value);
        }
    }
}
