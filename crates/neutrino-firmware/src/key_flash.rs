//! Key slots in on-chip flash.
//!
//! The node keys live in a small reserved flash region. The region is
//! addressed through a [`Partition`], so the key store sees the same offsets
//! it would on an external EEPROM.

use esp_hal::peripherals::FLASH;
use esp_storage::FlashStorage;
use log::info;
use neutrino_core::KeyStore;
use neutrino_core::keys::Partition;

/// Start of the reserved key region: the default partition table's NVS
/// area, which nothing else on this node uses.
pub const KEY_REGION_BASE: u32 = 0x9000;

/// One flash sector.
pub const KEY_REGION_LEN: u32 = 0x1000;

pub type KeyFlash = Partition<FlashStorage<'static>>;

pub fn key_store(flash: FLASH<'static>) -> KeyStore<KeyFlash> {
    info!(
        "Key region at {:#x}..{:#x}",
        KEY_REGION_BASE,
        KEY_REGION_BASE + KEY_REGION_LEN
    );
    KeyStore::new(Partition::new(
        FlashStorage::new(flash),
        KEY_REGION_BASE,
        KEY_REGION_LEN,
    ))
}
