//! Symmetric key provisioning
//!
//! Each node owns an 80-bit encryption key and a 32-bit signature key, kept
//! in persistent storage at fixed offsets. Erased storage reads as `0xFF`,
//! so a slot holding nothing but `0xFF` is unprovisioned: on boot a random
//! key is generated for it and written back. Any other content is loaded
//! unchanged. There is no rotation; a key is only regenerated if someone
//! erases the slot.
//!
//! A legitimately random key could in principle be all `0xFF` and would
//! then be indistinguishable from erased storage. Generation redraws such a
//! key, so the only way to hit the collision is a key written by something
//! other than this module.

use embedded_storage::{ReadStorage, Storage};
use log::{debug, error, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror_no_std::Error;

use crate::config::{
    ENCRYPTION_KEY_ADDR, ENCRYPTION_KEY_LEN, ERASED_BYTE, SIGNATURE_KEY_ADDR, SIGNATURE_KEY_LEN,
};

pub type EncryptionKey = [u8; ENCRYPTION_KEY_LEN];
pub type SignatureKey = [u8; SIGNATURE_KEY_LEN];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStoreError {
    #[error("failed to read key slot at {offset:#04x}")]
    Read { offset: u32 },
    #[error("failed to write key slot at {offset:#04x}")]
    Write { offset: u32 },
}

/// Returns `false` only when every byte of `key` is the erased-storage value.
pub fn is_provisioned(key: &[u8]) -> bool {
    key.iter().any(|&byte| byte != ERASED_BYTE)
}

/// Location and length of one key in persistent storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlot<const N: usize> {
    pub offset: u32,
}

pub const ENCRYPTION_KEY_SLOT: KeySlot<ENCRYPTION_KEY_LEN> = KeySlot {
    offset: ENCRYPTION_KEY_ADDR,
};

pub const SIGNATURE_KEY_SLOT: KeySlot<SIGNATURE_KEY_LEN> = KeySlot {
    offset: SIGNATURE_KEY_ADDR,
};

/// A single physical noise sample, such as a conversion of a floating analog input.
pub trait NoiseSource {
    fn sample(&mut self) -> u16;
}

/// Random key material, seeded from one noise sample the first time it is needed.
pub struct KeyGenerator<N> {
    noise: N,
    rng: Option<SmallRng>,
}

impl<N: NoiseSource> KeyGenerator<N> {
    pub const fn new(noise: N) -> Self {
        Self { noise, rng: None }
    }

    /// Fill `key` with uniformly distributed bytes (0-255), never the all-erased pattern.
    pub fn fill(&mut self, key: &mut [u8]) {
        let noise = &mut self.noise;
        let rng = self
            .rng
            .get_or_insert_with(|| SmallRng::seed_from_u64(noise.sample() as u64));

        loop {
            for byte in key.iter_mut() {
                *byte = rng.r#gen::<u8>();
            }
            if is_provisioned(key) {
                return;
            }
        }
    }
}

/// Both keys of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetricKeyPair {
    pub encryption: EncryptionKey,
    pub signature: SignatureKey,
}

impl SymmetricKeyPair {
    pub const fn new(encryption: EncryptionKey, signature: SignatureKey) -> Self {
        Self {
            encryption,
            signature,
        }
    }
}

/// A window of a larger storage device, so key offsets stay relative.
///
/// On flash the key slots live in a reserved region rather than at the
/// start of the device.
pub struct Partition<S> {
    inner: S,
    base: u32,
    len: u32,
}

/// Access outside the partition, or a failure of the underlying device.
#[derive(Debug)]
pub enum PartitionError<E> {
    OutOfBounds,
    Device(E),
}

impl<S> Partition<S> {
    pub const fn new(inner: S, base: u32, len: u32) -> Self {
        Self { inner, base, len }
    }

    fn translate<E>(&self, offset: u32, len: usize) -> Result<u32, PartitionError<E>> {
        let end = offset.checked_add(len as u32).ok_or(PartitionError::OutOfBounds)?;
        if end > self.len {
            return Err(PartitionError::OutOfBounds);
        }
        self.base.checked_add(offset).ok_or(PartitionError::OutOfBounds)
    }
}

impl<S: ReadStorage> ReadStorage for Partition<S> {
    type Error = PartitionError<S::Error>;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let address = self.translate(offset, bytes.len())?;
        self.inner.read(address, bytes).map_err(PartitionError::Device)
    }

    fn capacity(&self) -> usize {
        self.len as usize
    }
}

impl<S: Storage> Storage for Partition<S> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let address = self.translate(offset, bytes.len())?;
        self.inner.write(address, bytes).map_err(PartitionError::Device)
    }
}

/// Key slots on top of byte-addressable persistent storage (EEPROM or flash).
pub struct KeyStore<S> {
    storage: S,
}

impl<S> KeyStore<S>
where
    S: Storage,
    S::Error: core::fmt::Debug,
{
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load the key in `slot`, generating and persisting one if the slot is erased.
    pub fn load_or_generate<const N: usize, G: NoiseSource>(
        &mut self,
        slot: KeySlot<N>,
        generator: &mut KeyGenerator<G>,
    ) -> Result<[u8; N], KeyStoreError> {
        let mut key = [0u8; N];
        self.storage.read(slot.offset, &mut key).map_err(|e| {
            error!("Key slot {:#04x} read failed: {:?}", slot.offset, e);
            KeyStoreError::Read {
                offset: slot.offset,
            }
        })?;

        if is_provisioned(&key) {
            debug!("Loaded {}-byte key from slot {:#04x}", N, slot.offset);
            return Ok(key);
        }

        generator.fill(&mut key);
        self.storage.write(slot.offset, &key).map_err(|e| {
            error!("Key slot {:#04x} write failed: {:?}", slot.offset, e);
            KeyStoreError::Write {
                offset: slot.offset,
            }
        })?;
        info!("Generated new {}-byte key in slot {:#04x}", N, slot.offset);

        Ok(key)
    }

    /// Load (or provision) both node keys.
    pub fn load_or_generate_pair<G: NoiseSource>(
        &mut self,
        generator: &mut KeyGenerator<G>,
    ) -> Result<SymmetricKeyPair, KeyStoreError> {
        let encryption = self.load_or_generate(ENCRYPTION_KEY_SLOT, generator)?;
        let signature = self.load_or_generate(SIGNATURE_KEY_SLOT, generator)?;
        Ok(SymmetricKeyPair::new(encryption, signature))
    }

    /// Give the underlying storage back.
    pub fn release(self) -> S {
        self.storage
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Erased in-memory EEPROM.
    pub(crate) struct MemoryStorage {
        pub bytes: [u8; 32],
        pub writes: usize,
        pub fail_writes: bool,
    }

    impl MemoryStorage {
        pub(crate) fn erased() -> Self {
            Self {
                bytes: [ERASED_BYTE; 32],
                writes: 0,
                fail_writes: false,
            }
        }
    }

    #[derive(Debug)]
    pub(crate) struct OutOfBounds;

    impl ReadStorage for MemoryStorage {
        type Error = OutOfBounds;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let src = self
                .bytes
                .get(start..start + bytes.len())
                .ok_or(OutOfBounds)?;
            bytes.copy_from_slice(src);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.bytes.len()
        }
    }

    impl Storage for MemoryStorage {
        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if self.fail_writes {
                return Err(OutOfBounds);
            }
            let start = offset as usize;
            let dst = self
                .bytes
                .get_mut(start..start + bytes.len())
                .ok_or(OutOfBounds)?;
            dst.copy_from_slice(bytes);
            self.writes += 1;
            Ok(())
        }
    }

    pub(crate) struct CountingNoise {
        pub value: u16,
        pub samples: usize,
    }

    impl NoiseSource for CountingNoise {
        fn sample(&mut self) -> u16 {
            self.samples += 1;
            self.value
        }
    }

    fn noise(value: u16) -> KeyGenerator<CountingNoise> {
        KeyGenerator::new(CountingNoise { value, samples: 0 })
    }

    #[test]
    fn test_is_provisioned() {
        assert!(!is_provisioned(&[0xFF; 10]));
        assert!(!is_provisioned(&[0xFF; 4]));
        assert!(is_provisioned(&[0x00; 4]));
        assert!(is_provisioned(&[0xFF, 0xFF, 0xFE, 0xFF]));
        assert!(is_provisioned(&[0x12, 0x34, 0x56, 0x78]));
    }

    #[test]
    fn test_generates_once_then_loads() {
        let mut store = KeyStore::new(MemoryStorage::erased());
        let mut generator = noise(0x1234);

        let first = store.load_or_generate_pair(&mut generator).unwrap();
        assert!(is_provisioned(&first.encryption));
        assert!(is_provisioned(&first.signature));

        let storage = store.release();
        assert_eq!(storage.writes, 2);
        assert_eq!(&storage.bytes[0..10], &first.encryption);
        assert_eq!(&storage.bytes[10..14], &first.signature);
        assert!(storage.bytes[14..].iter().all(|&b| b == ERASED_BYTE));

        // Second boot: different noise, same keys, nothing written.
        let mut store = KeyStore::new(storage);
        let second = store.load_or_generate_pair(&mut noise(0x9999)).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.release().writes, 2);
    }

    #[test]
    fn test_existing_key_loaded_unchanged() {
        let mut storage = MemoryStorage::erased();
        storage.bytes[..10].copy_from_slice(&[0u8; 10]);
        storage.bytes[10..14].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let mut store = KeyStore::new(storage);
        let mut generator = noise(1);
        let keys = store.load_or_generate_pair(&mut generator).unwrap();

        assert_eq!(keys.encryption, [0u8; 10]);
        assert_eq!(keys.signature, [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(generator.noise.samples, 0, "no generation, no noise sample");
    }

    #[test]
    fn test_only_erased_slot_regenerated() {
        let mut storage = MemoryStorage::erased();
        storage.bytes[10..14].copy_from_slice(&[1, 2, 3, 4]);

        let mut store = KeyStore::new(storage);
        let keys = store.load_or_generate_pair(&mut noise(42)).unwrap();
        assert_eq!(keys.signature, [1, 2, 3, 4]);
        assert_eq!(store.release().writes, 1);
    }

    #[test]
    fn test_generator_seeded_once() {
        let mut generator = noise(7);
        let mut a = [0u8; 10];
        let mut b = [0u8; 4];
        generator.fill(&mut a);
        generator.fill(&mut b);
        assert_eq!(generator.noise.samples, 1);
    }

    #[test]
    fn test_same_seed_same_keys() {
        let mut a = [0u8; 10];
        let mut b = [0u8; 10];
        noise(500).fill(&mut a);
        noise(500).fill(&mut b);
        assert_eq!(a, b);

        let mut c = [0u8; 10];
        noise(501).fill(&mut c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_write_failure_surfaces() {
        let mut storage = MemoryStorage::erased();
        storage.fail_writes = true;
        let mut store = KeyStore::new(storage);
        assert_eq!(
            store.load_or_generate(ENCRYPTION_KEY_SLOT, &mut noise(3)),
            Err(KeyStoreError::Write { offset: 0 })
        );
    }

    #[test]
    fn test_read_failure_surfaces() {
        let mut store = KeyStore::new(MemoryStorage::erased());
        let slot = KeySlot::<4> { offset: 30 };
        assert_eq!(
            store.load_or_generate(slot, &mut noise(3)),
            Err(KeyStoreError::Read { offset: 30 })
        );
    }

    #[test]
    fn test_partition_offsets_slots() {
        let mut store = KeyStore::new(Partition::new(MemoryStorage::erased(), 16, 16));
        let keys = store.load_or_generate_pair(&mut noise(77)).unwrap();

        let device = store.release().inner;
        assert_eq!(&device.bytes[16..26], &keys.encryption);
        assert_eq!(&device.bytes[26..30], &keys.signature);
        assert!(device.bytes[..16].iter().all(|&b| b == ERASED_BYTE));
    }

    #[test]
    fn test_partition_bounds() {
        let mut partition = Partition::new(MemoryStorage::erased(), 16, 12);
        let mut buf = [0u8; 4];
        assert!(partition.read(8, &mut buf).is_ok());
        assert!(matches!(
            partition.read(10, &mut buf),
            Err(PartitionError::OutOfBounds)
        ));
        assert!(matches!(
            partition.write(u32::MAX, &buf),
            Err(PartitionError::OutOfBounds)
        ));
        assert_eq!(partition.capacity(), 12);
    }

    #[test]
    fn test_partition_base_overflow() {
        let mut partition = Partition::new(MemoryStorage::erased(), u32::MAX - 2, 16);
        let mut buf = [0u8; 4];
        assert!(matches!(
            partition.read(4, &mut buf),
            Err(PartitionError::OutOfBounds)
        ));
        assert!(matches!(
            partition.write(4, &buf),
            Err(PartitionError::OutOfBounds)
        ));
    }
}
