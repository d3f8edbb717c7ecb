//! Message signatures
//!
//! HMAC-MD5 keyed by the 32-bit signature key, computed over the header byte
//! and the plaintext telemetry fields, truncated to the first six bytes of
//! the digest.

use hmac::digest::generic_array::GenericArray;
use hmac::{Hmac, Mac};
use md5::Md5;

use crate::config::{SIGNATURE_LEN, SIGNED_LEN};
use crate::keys::SignatureKey;

type HmacMd5 = Hmac<Md5>;

/// Input block size of MD5, which is also the HMAC key size.
const MD5_BLOCK_SIZE: usize = 64;

pub type Signature = [u8; SIGNATURE_LEN];

fn keyed(key: &SignatureKey) -> HmacMd5 {
    // HMAC zero-pads keys shorter than the block size, so padding here
    // yields the same MAC and keeps construction infallible.
    let mut block = [0u8; MD5_BLOCK_SIZE];
    block[..key.len()].copy_from_slice(key);
    HmacMd5::new(GenericArray::from_slice(&block))
}

/// Sign the 11 bytes preceding the signature field.
pub fn sign(signed: &[u8; SIGNED_LEN], key: &SignatureKey) -> Signature {
    let mut mac = keyed(key);
    mac.update(signed);
    let digest = mac.finalize().into_bytes();

    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&digest[..SIGNATURE_LEN]);
    signature
}

/// Recompute the signature and compare in constant time.
pub fn verify(signed: &[u8; SIGNED_LEN], key: &SignatureKey, signature: &Signature) -> bool {
    let mut mac = keyed(key);
    mac.update(signed);
    mac.verify_truncated_left(signature).is_ok()
}
