//! Conversions between Ethereum types and circuit field elements

use ethers_core::types::{Address, H256, U256};
use halo2_base::utils::ScalarField;

/// Interpret a 20-byte address as a single field element
///
/// 160 bits always fit in the BN254 scalar field, so the big-endian address
/// bytes are read as one integer.
pub fn address_to_field<F: ScalarField>(addr: &Address) -> F {
    let mut le = addr.as_bytes().to_vec();
    le.reverse();
    F::from_bytes_le(&le)
}

/// Split a 256-bit unsigned value into four little-endian u64 limbs
pub fn u256_to_limbs(value: &U256) -> [u64; 4] {
    value.0
}

/// Split a 32-byte hash into four little-endian u64 limbs
pub fn h256_to_limbs(hash: &H256) -> [u64; 4] {
    U256::from_big_endian(hash.as_bytes()).0
}
