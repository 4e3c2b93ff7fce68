use ff::PrimeField;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::MpcError;

/// Prime field usable in MPC computations.
///
/// Elements serialize to fixed-width big-endian byte strings of `byte_length()` bytes.
pub trait MpcField: PrimeField + Serialize + DeserializeOwned {
    /// Decimal representation of the field modulus.
    const MODULUS: &'static str;

    /// Width of serialized element in bytes.
    fn byte_length() -> usize {
        (Self::NUM_BITS as usize + 7) / 8
    }

    /// Serialize element as big-endian bytes.
    fn to_bytes_be(&self) -> Vec<u8> {
        let repr = self.to_repr();
        let mut bytes = repr.as_ref()[..Self::byte_length()].to_vec();
        bytes.reverse();
        bytes
    }

    /// Deserialize element from big-endian bytes. Rejects non-canonical values.
    fn from_bytes_be(bytes: &[u8]) -> Result<Self, MpcError> {
        let width = Self::byte_length();
        if bytes.len() != width {
            return Err(MpcError::LengthMismatch {
                len: bytes.len(),
                width,
            });
        }
        let mut repr = Self::Repr::default();
        for (dst, src) in repr.as_mut().iter_mut().zip(bytes.iter().rev()) {
            *dst = *src;
        }
        Option::from(Self::from_repr(repr)).ok_or(MpcError::InvalidElement)
    }
}

/// Concatenate serialized elements.
pub fn serialize_list<T: MpcField>(elements: &[T]) -> Vec<u8> {
    elements.iter().flat_map(|x| x.to_bytes_be()).collect()
}

/// Deserialize concatenated elements by fixed-stride slicing.
pub fn deserialize_list<T: MpcField>(bytes: &[u8]) -> Result<Vec<T>, MpcError> {
    fixed_chunks(bytes, T::byte_length())?
        .map(T::from_bytes_be)
        .collect()
}

/// Split bytes into chunks of exactly `width` bytes.
pub(crate) fn fixed_chunks(
    bytes: &[u8],
    width: usize,
) -> Result<std::slice::ChunksExact<'_, u8>, MpcError> {
    if width == 0 || bytes.len() % width != 0 {
        return Err(MpcError::LengthMismatch {
            len: bytes.len(),
            width,
        });
    }
    Ok(bytes.chunks_exact(width))
}

macro_rules! impl_mpc_field {
    ($field:ident, $repr:ident, $modulus:expr) => {
        impl crate::fields::MpcField for $field {
            const MODULUS: &'static str = $modulus;
        }

        impl serde::Serialize for $field {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serde::Serialize::serialize(&ff::PrimeField::to_repr(self).0, serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $field {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let repr = $repr(serde::Deserialize::deserialize(deserializer)?);
                <Self as ff::PrimeField>::from_repr_vartime(repr)
                    .ok_or_else(|| serde::de::Error::custom("Invalid field element"))
            }
        }
    };
}

mod mersenne_61 {
    use ff::PrimeField;

    /// Finite field mod 2^61-1.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "2305843009213693951"]
    #[PrimeFieldGenerator = "37"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Mersenne61([u64; 1]);

    impl_mpc_field!(Mersenne61, Mersenne61Repr, "2305843009213693951");
}

mod mersenne_127 {
    use ff::PrimeField;

    /// Finite field mod 2^127-1.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "170141183460469231731687303715884105727"]
    #[PrimeFieldGenerator = "43"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Mersenne127([u64; 2]);

    impl_mpc_field!(Mersenne127, Mersenne127Repr, "170141183460469231731687303715884105727");
}

mod fp_101 {
    use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

    use ff::{Field, PrimeField};
    use rand::RngCore;
    use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, CtOption};

    const P: u64 = 101;

    /// Tiny field mod 101. Only meant for deterministic tests.
    ///
    /// 101 is 5 mod 16, which the `PrimeField` derive cannot handle, so arithmetic is written out
    /// on a reduced `u64`.
    #[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Fp101(u64);

    /// Little-endian representation of [`Fp101`].
    #[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
    pub struct Fp101Repr([u8; 1]);

    impl AsRef<[u8]> for Fp101Repr {
        fn as_ref(&self) -> &[u8] {
            &self.0
        }
    }

    impl AsMut<[u8]> for Fp101Repr {
        fn as_mut(&mut self) -> &mut [u8] {
            &mut self.0
        }
    }

    impl From<u64> for Fp101 {
        fn from(value: u64) -> Self {
            Fp101(value % P)
        }
    }

    impl ConstantTimeEq for Fp101 {
        fn ct_eq(&self, other: &Self) -> Choice {
            self.0.ct_eq(&other.0)
        }
    }

    impl ConditionallySelectable for Fp101 {
        fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
            Fp101(u64::conditional_select(&a.0, &b.0, choice))
        }
    }

    impl Add for Fp101 {
        type Output = Self;

        fn add(self, rhs: Self) -> Self {
            Fp101((self.0 + rhs.0) % P)
        }
    }

    impl Sub for Fp101 {
        type Output = Self;

        fn sub(self, rhs: Self) -> Self {
            Fp101((self.0 + P - rhs.0) % P)
        }
    }

    impl Mul for Fp101 {
        type Output = Self;

        fn mul(self, rhs: Self) -> Self {
            Fp101(self.0 * rhs.0 % P)
        }
    }

    impl Neg for Fp101 {
        type Output = Self;

        fn neg(self) -> Self {
            Fp101((P - self.0) % P)
        }
    }

    macro_rules! impl_ref_ops {
        ($($op:ident::$method:ident, $assign:ident::$assign_method:ident);*) => {$(
            impl<'a> $op<&'a Fp101> for Fp101 {
                type Output = Fp101;

                fn $method(self, rhs: &'a Fp101) -> Fp101 {
                    $op::$method(self, *rhs)
                }
            }

            impl $assign for Fp101 {
                fn $assign_method(&mut self, rhs: Fp101) {
                    *self = $op::$method(*self, rhs);
                }
            }

            impl<'a> $assign<&'a Fp101> for Fp101 {
                fn $assign_method(&mut self, rhs: &'a Fp101) {
                    *self = $op::$method(*self, *rhs);
                }
            }
        )*};
    }

    impl_ref_ops!(
        Add::add, AddAssign::add_assign;
        Sub::sub, SubAssign::sub_assign;
        Mul::mul, MulAssign::mul_assign
    );

    impl Field for Fp101 {
        fn random(mut rng: impl RngCore) -> Self {
            loop {
                let candidate = u64::from(rng.next_u32() & 0x7f);
                if candidate < P {
                    return Fp101(candidate);
                }
            }
        }

        fn zero() -> Self {
            Fp101(0)
        }

        fn one() -> Self {
            Fp101(1)
        }

        fn square(&self) -> Self {
            *self * *self
        }

        fn double(&self) -> Self {
            *self + *self
        }

        fn invert(&self) -> CtOption<Self> {
            CtOption::new(self.pow_vartime([P - 2]), !self.is_zero())
        }

        /// Exhaustive search, the field has only 101 elements.
        fn sqrt(&self) -> CtOption<Self> {
            let root = (0..P).map(Fp101).find(|x| x.square() == *self);
            CtOption::new(root.unwrap_or_default(), Choice::from(root.is_some() as u8))
        }
    }

    impl PrimeField for Fp101 {
        type Repr = Fp101Repr;

        const NUM_BITS: u32 = 7;
        const CAPACITY: u32 = 6;
        // 100 = 2^2 * 25
        const S: u32 = 2;

        fn from_repr(repr: Self::Repr) -> CtOption<Self> {
            let value = u64::from(repr.0[0]);
            CtOption::new(Fp101(value % P), Choice::from((value < P) as u8))
        }

        fn to_repr(&self) -> Self::Repr {
            Fp101Repr([self.0 as u8])
        }

        fn is_odd(&self) -> Choice {
            Choice::from((self.0 & 1) as u8)
        }

        fn multiplicative_generator() -> Self {
            Fp101(2)
        }

        /// `2^25`, a primitive fourth root of unity.
        fn root_of_unity() -> Self {
            Fp101(10)
        }
    }

    impl_mpc_field!(Fp101, Fp101Repr, "101");
}

pub use fp_101::{Fp101, Fp101Repr};
pub use mersenne_127::{Mersenne127, Mersenne127Repr};
pub use mersenne_61::{Mersenne61, Mersenne61Repr};
