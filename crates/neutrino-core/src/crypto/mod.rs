//! Cryptographic primitives used on the wire.
//!
//! - [`auth`]: truncated HMAC-MD5 signature over the plaintext fields
//! - [`cipher`]: block-by-block Skipjack over the record
//! - [`skipjack`]: the block cipher itself

pub mod auth;
pub mod cipher;
pub mod skipjack;

pub use auth::{Signature, sign, verify};
pub use cipher::{CipherError, decrypt_blocks, decrypt_in_place, encrypt_blocks, encrypt_in_place};
