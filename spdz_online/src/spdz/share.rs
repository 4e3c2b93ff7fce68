use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::{fields::MpcField, MpcShare};

/// Value share in SPDZ protocol.
///
/// Across all parties `sum(mac) == alpha * sum(value)`, where `alpha` is the shared
/// authentication key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpdzShare<T> {
    pub value: T,
    pub mac: T,
}

impl<T: MpcField> SpdzShare<T> {
    /// Sharing of a public value: party 0 holds the value, every party holds its part of the MAC.
    pub fn from_plain(x: T, key_share: T, party_id: usize) -> Self {
        SpdzShare {
            value: if party_id == 0 { x } else { T::zero() },
            mac: x * key_share,
        }
    }
}

impl<T: MpcField> MpcShare for SpdzShare<T> {
    type Field = T;

    fn zero() -> Self {
        SpdzShare {
            value: T::zero(),
            mac: T::zero(),
        }
    }

    fn double(&self) -> Self {
        SpdzShare {
            value: self.value.double(),
            mac: self.mac.double(),
        }
    }
}

impl<T: MpcField> Add for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn add(self, rhs: Self) -> Self::Output {
        SpdzShare {
            value: self.value + rhs.value,
            mac: self.mac + rhs.mac,
        }
    }
}

impl<T: MpcField> Sub for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn sub(self, rhs: Self) -> Self::Output {
        SpdzShare {
            value: self.value - rhs.value,
            mac: self.mac - rhs.mac,
        }
    }
}

impl<T: MpcField> Neg for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn neg(self) -> Self::Output {
        SpdzShare {
            value: -self.value,
            mac: -self.mac,
        }
    }
}

impl<T: MpcField> Mul<T> for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn mul(self, rhs: T) -> Self::Output {
        SpdzShare {
            value: self.value * rhs,
            mac: self.mac * rhs,
        }
    }
}
