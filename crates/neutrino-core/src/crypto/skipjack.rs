//! Skipjack block cipher (64-bit block, 80-bit key)
//!
//! Follows the declassified NIST specification: the block is four
//! big-endian 16-bit words, processed by 32 rounds alternating eight rounds
//! of rule A with eight rounds of rule B. The round function G is a
//! four-round Feistel network over the F table, keyed by four key bytes
//! chosen cyclically from the 10-byte key.

pub const BLOCK_SIZE: usize = 8;
pub const KEY_SIZE: usize = 10;

const ROUNDS: u16 = 32;

#[rustfmt::skip]
const F: [u8; 256] = [
    0xa3, 0xd7, 0x09, 0x83, 0xf8, 0x48, 0xf6, 0xf4, 0xb3, 0x21, 0x15, 0x78, 0x99, 0xb1, 0xaf, 0xf9,
    0xe7, 0x2d, 0x4d, 0x8a, 0xce, 0x4c, 0xca, 0x2e, 0x52, 0x95, 0xd9, 0x1e, 0x4e, 0x38, 0x44, 0x28,
    0x0a, 0xdf, 0x02, 0xa0, 0x17, 0xf1, 0x60, 0x68, 0x12, 0xb7, 0x7a, 0xc3, 0xe9, 0xfa, 0x3d, 0x53,
    0x96, 0x84, 0x6b, 0xba, 0xf2, 0x63, 0x9a, 0x19, 0x7c, 0xae, 0xe5, 0xf5, 0xf7, 0x16, 0x6a, 0xa2,
    0x39, 0xb6, 0x7b, 0x0f, 0xc1, 0x93, 0x81, 0x1b, 0xee, 0xb4, 0x1a, 0xea, 0xd0, 0x91, 0x2f, 0xb8,
    0x55, 0xb9, 0xda, 0x85, 0x3f, 0x41, 0xbf, 0xe0, 0x5a, 0x58, 0x80, 0x5f, 0x66, 0x0b, 0xd8, 0x90,
    0x35, 0xd5, 0xc0, 0xa7, 0x33, 0x06, 0x65, 0x69, 0x45, 0x00, 0x94, 0x56, 0x6d, 0x98, 0x9b, 0x76,
    0x97, 0xfc, 0xb2, 0xc2, 0xb0, 0xfe, 0xdb, 0x20, 0xe1, 0xeb, 0xd6, 0xe4, 0xdd, 0x47, 0x4a, 0x1d,
    0x42, 0xed, 0x9e, 0x6e, 0x49, 0x3c, 0xcd, 0x43, 0x27, 0xd2, 0x07, 0xd4, 0xde, 0xc7, 0x67, 0x18,
    0x89, 0xcb, 0x30, 0x1f, 0x8d, 0xc6, 0x8f, 0xaa, 0xc8, 0x74, 0xdc, 0xc9, 0x5d, 0x5c, 0x31, 0xa4,
    0x70, 0x88, 0x61, 0x2c, 0x9f, 0x0d, 0x2b, 0x87, 0x50, 0x82, 0x54, 0x64, 0x26, 0x7d, 0x03, 0x40,
    0x34, 0x4b, 0x1c, 0x73, 0xd1, 0xc4, 0xfd, 0x3b, 0xcc, 0xfb, 0x7f, 0xab, 0xe6, 0x3e, 0x5b, 0xa5,
    0xad, 0x04, 0x23, 0x9c, 0x14, 0x51, 0x22, 0xf0, 0x29, 0x79, 0x71, 0x7e, 0xff, 0x8c, 0x0e, 0xe2,
    0x0c, 0xef, 0xbc, 0x72, 0x75, 0x6f, 0x37, 0xa1, 0xec, 0xd3, 0x8e, 0x62, 0x8b, 0x86, 0x10, 0xe8,
    0x08, 0x77, 0x11, 0xbe, 0x92, 0x4f, 0x24, 0xc5, 0x32, 0x36, 0x9d, 0xcf, 0xf3, 0xa6, 0xbb, 0xac,
    0x5e, 0x6c, 0xa9, 0x13, 0x57, 0x25, 0xb5, 0xe3, 0xbd, 0xa8, 0x3a, 0x01, 0x05, 0x59, 0x2a, 0x46,
];

/// Skipjack keyed with one 80-bit key.
pub struct Skipjack {
    key: [u8; KEY_SIZE],
}

impl Skipjack {
    pub const fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self { key: *key }
    }

    #[inline]
    fn subkey(&self, step: u16, i: u16) -> u8 {
        self.key[((4 * step + i) % KEY_SIZE as u16) as usize]
    }

    /// The keyed permutation G for round `step` (0-based).
    fn g(&self, step: u16, word: u16) -> u16 {
        let [g1, g2] = word.to_be_bytes();
        let g3 = F[(g2 ^ self.subkey(step, 0)) as usize] ^ g1;
        let g4 = F[(g3 ^ self.subkey(step, 1)) as usize] ^ g2;
        let g5 = F[(g4 ^ self.subkey(step, 2)) as usize] ^ g3;
        let g6 = F[(g5 ^ self.subkey(step, 3)) as usize] ^ g4;
        u16::from_be_bytes([g5, g6])
    }

    fn g_inverse(&self, step: u16, word: u16) -> u16 {
        let [g5, g6] = word.to_be_bytes();
        let g4 = F[(g5 ^ self.subkey(step, 3)) as usize] ^ g6;
        let g3 = F[(g4 ^ self.subkey(step, 2)) as usize] ^ g5;
        let g2 = F[(g3 ^ self.subkey(step, 1)) as usize] ^ g4;
        let g1 = F[(g2 ^ self.subkey(step, 0)) as usize] ^ g3;
        u16::from_be_bytes([g1, g2])
    }

    /// Rounds 1-8 and 17-24 use rule A, the rest rule B.
    #[inline]
    const fn is_rule_a(step: u16) -> bool {
        (step / 8) % 2 == 0
    }

    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let [mut w1, mut w2, mut w3, mut w4] = load(block);

        for step in 0..ROUNDS {
            let counter = step + 1;
            let g = self.g(step, w1);
            if Self::is_rule_a(step) {
                (w1, w2, w3, w4) = (g ^ w4 ^ counter, g, w2, w3);
            } else {
                (w1, w2, w3, w4) = (w4, g, w1 ^ w2 ^ counter, w3);
            }
        }

        store(block, [w1, w2, w3, w4]);
    }

    pub fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let [mut w1, mut w2, mut w3, mut w4] = load(block);

        for step in (0..ROUNDS).rev() {
            let counter = step + 1;
            let prev_w1 = self.g_inverse(step, w2);
            if Self::is_rule_a(step) {
                (w1, w2, w3, w4) = (prev_w1, w3, w4, w1 ^ w2 ^ counter);
            } else {
                (w1, w2, w3, w4) = (prev_w1, w3 ^ prev_w1 ^ counter, w4, w1);
            }
        }

        store(block, [w1, w2, w3, w4]);
    }
}

fn load(block: &[u8; BLOCK_SIZE]) -> [u16; 4] {
    [
        u16::from_be_bytes([block[0], block[1]]),
        u16::from_be_bytes([block[2], block[3]]),
        u16::from_be_bytes([block[4], block[5]]),
        u16::from_be_bytes([block[6], block[7]]),
    ]
}

fn store(block: &mut [u8; BLOCK_SIZE], words: [u16; 4]) {
    for (chunk, word) in block.chunks_exact_mut(2).zip(words) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTOR_KEY: [u8; KEY_SIZE] = [0x00, 0x99, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11];
    const VECTOR_PLAINTEXT: [u8; BLOCK_SIZE] = [0x33, 0x22, 0x11, 0x00, 0xdd, 0xcc, 0xbb, 0xaa];
    const VECTOR_CIPHERTEXT: [u8; BLOCK_SIZE] = [0x25, 0x87, 0xca, 0xe2, 0x7a, 0x12, 0xd3, 0x00];

    #[test]
    fn test_f_table_is_permutation() {
        let mut seen = [false; 256];
        for &value in F.iter() {
            assert!(!seen[value as usize], "F table repeats {:#04x}", value);
            seen[value as usize] = true;
        }
    }

    #[test]
    fn test_nist_vector_encrypt() {
        let cipher = Skipjack::new(&VECTOR_KEY);
        let mut block = VECTOR_PLAINTEXT;
        cipher.encrypt_block(&mut block);
        assert_eq!(block, VECTOR_CIPHERTEXT);
    }

    #[test]
    fn test_nist_vector_decrypt() {
        let cipher = Skipjack::new(&VECTOR_KEY);
        let mut block = VECTOR_CIPHERTEXT;
        cipher.decrypt_block(&mut block);
        assert_eq!(block, VECTOR_PLAINTEXT);
    }

    #[test]
    fn test_g_inverse() {
        let cipher = Skipjack::new(&VECTOR_KEY);
        for step in [0u16, 7, 13, 31] {
            for word in [0x0000u16, 0x1234, 0xffff, 0x8001] {
                assert_eq!(cipher.g_inverse(step, cipher.g(step, word)), word);
            }
        }
    }

    #[test]
    fn test_key_changes_ciphertext() {
        let mut other_key = VECTOR_KEY;
        other_key[9] ^= 0x01;
        let mut block = VECTOR_PLAINTEXT;
        Skipjack::new(&other_key).encrypt_block(&mut block);
        assert_ne!(block, VECTOR_CIPHERTEXT);
    }
}
