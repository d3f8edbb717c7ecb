//! Payload encryption
//!
//! Every 8-byte block of the buffer is encrypted on its own, starting at
//! offset 0, with no chaining and no IV. Equal plaintext blocks therefore
//! produce equal ciphertext blocks. Receivers in the field expect exactly
//! this layout, so it stays.

use thiserror_no_std::Error;

use super::skipjack::{BLOCK_SIZE, Skipjack};
use crate::keys::EncryptionKey;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherError {
    #[error("buffer of {0} bytes is not a whole number of 8-byte blocks")]
    UnalignedLength(usize),
}

fn blocks(buffer: &mut [u8]) -> Result<&mut [[u8; BLOCK_SIZE]], CipherError> {
    let len = buffer.len();
    match buffer.as_chunks_mut::<BLOCK_SIZE>() {
        (blocks, []) => Ok(blocks),
        _ => Err(CipherError::UnalignedLength(len)),
    }
}

/// Encrypt whole blocks in ascending order.
pub fn encrypt_blocks(blocks: &mut [[u8; BLOCK_SIZE]], key: &EncryptionKey) {
    let cipher = Skipjack::new(key);
    for block in blocks {
        cipher.encrypt_block(block);
    }
}

pub fn decrypt_blocks(blocks: &mut [[u8; BLOCK_SIZE]], key: &EncryptionKey) {
    let cipher = Skipjack::new(key);
    for block in blocks {
        cipher.decrypt_block(block);
    }
}

/// Encrypt `buffer` in place, block by block.
pub fn encrypt_in_place(buffer: &mut [u8], key: &EncryptionKey) -> Result<(), CipherError> {
    encrypt_blocks(blocks(buffer)?, key);
    Ok(())
}

/// Reverse [`encrypt_in_place`] with the same key.
pub fn decrypt_in_place(buffer: &mut [u8], key: &EncryptionKey) -> Result<(), CipherError> {
    decrypt_blocks(blocks(buffer)?, key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: EncryptionKey = [0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19];

    #[test]
    fn test_round_trip() {
        let original: [u8; 16] = core::array::from_fn(|i| (i * 17) as u8);
        let mut buffer = original;

        encrypt_in_place(&mut buffer, &KEY).unwrap();
        assert_ne!(buffer, original);
        decrypt_in_place(&mut buffer, &KEY).unwrap();
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_blocks_are_independent() {
        let mut buffer = [0x5Au8; 16];
        encrypt_in_place(&mut buffer, &KEY).unwrap();
        assert_eq!(buffer[..8], buffer[8..], "no chaining between blocks");

        let mut single = [0x5Au8; 8];
        Skipjack::new(&KEY).encrypt_block(&mut single);
        assert_eq!(buffer[..8], single);
    }

    #[test]
    fn test_wrong_key_does_not_decrypt() {
        let original = [7u8; 8];
        let mut buffer = original;
        encrypt_in_place(&mut buffer, &KEY).unwrap();

        let mut wrong = KEY;
        wrong[0] ^= 0xFF;
        decrypt_in_place(&mut buffer, &wrong).unwrap();
        assert_ne!(buffer, original);
    }

    #[test]
    fn test_rejects_partial_block() {
        let mut buffer = [0u8; 17];
        assert_eq!(
            encrypt_in_place(&mut buffer, &KEY),
            Err(CipherError::UnalignedLength(17))
        );
        assert_eq!(buffer, [0u8; 17], "nothing encrypted on error");
    }

    #[test]
    fn test_empty_buffer() {
        let mut buffer: [u8; 0] = [];
        assert_eq!(encrypt_in_place(&mut buffer, &KEY), Ok(()));
    }
}
