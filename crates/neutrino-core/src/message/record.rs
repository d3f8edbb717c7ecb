//! The two 16-byte record layouts that follow the header byte.
//!
//! Binary format of a telemetry record (little-endian):
//! - addr: 1 byte (i8)
//! - proximity: 1 byte (0 = open, 1 = closed)
//! - temperature: 2 bytes (i16, centi-°C)
//! - humidity: 2 bytes (i16, basis points)
//! - pressure: 2 bytes (u16, decapascals)
//! - battery: 2 bytes (u16, millivolts)
//! - signature: 6 bytes
//!
//! Binary format of a pairing record:
//! - encryption key: 10 bytes
//! - signature key: 4 bytes
//! - padding: 2 bytes (zero)

use crate::config::{ENCRYPTION_KEY_LEN, RECORD_LEN, SIGNATURE_LEN, SIGNATURE_KEY_LEN};
use crate::crypto::Signature;
use crate::keys::SymmetricKeyPair;
use crate::sensors::SensorReading;

/// Offset of the signature inside a telemetry record.
pub const SIGNATURE_OFFSET: usize = RECORD_LEN - SIGNATURE_LEN;

pub type RecordBytes = [u8; RECORD_LEN];

/// Plaintext sensor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryRecord {
    pub addr: i8,
    pub proximity: bool,
    pub temperature_centi_celsius: i16,
    pub humidity_basis_points: i16,
    pub pressure_decapascals: u16,
    pub battery_millivolts: u16,
    pub signature: Signature,
}

impl TelemetryRecord {
    /// Record for `address` carrying `reading`, with an empty signature.
    pub fn from_reading(address: u8, reading: &SensorReading) -> Self {
        Self {
            addr: address as i8,
            proximity: reading.proximity,
            temperature_centi_celsius: reading.temperature_centi_celsius,
            humidity_basis_points: reading.humidity_basis_points,
            pressure_decapascals: reading.pressure_decapascals,
            battery_millivolts: reading.battery_millivolts,
            signature: [0; SIGNATURE_LEN],
        }
    }

    pub fn to_bytes(&self) -> RecordBytes {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0] = self.addr as u8;
        bytes[1] = self.proximity as u8;
        bytes[2..4].copy_from_slice(&self.temperature_centi_celsius.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.humidity_basis_points.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.pressure_decapascals.to_le_bytes());
        bytes[8..10].copy_from_slice(&self.battery_millivolts.to_le_bytes());
        bytes[SIGNATURE_OFFSET..].copy_from_slice(&self.signature);
        bytes
    }

    /// Parse a decrypted record. Any non-zero proximity byte reads as closed.
    pub fn from_bytes(bytes: &RecordBytes) -> Self {
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&bytes[SIGNATURE_OFFSET..]);

        Self {
            addr: bytes[0] as i8,
            proximity: bytes[1] != 0,
            temperature_centi_celsius: i16::from_le_bytes([bytes[2], bytes[3]]),
            humidity_basis_points: i16::from_le_bytes([bytes[4], bytes[5]]),
            pressure_decapascals: u16::from_le_bytes([bytes[6], bytes[7]]),
            battery_millivolts: u16::from_le_bytes([bytes[8], bytes[9]]),
            signature,
        }
    }
}

/// Plaintext key broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingRecord {
    pub keys: SymmetricKeyPair,
}

impl PairingRecord {
    pub const fn new(keys: SymmetricKeyPair) -> Self {
        Self { keys }
    }

    pub fn to_bytes(&self) -> RecordBytes {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[..ENCRYPTION_KEY_LEN].copy_from_slice(&self.keys.encryption);
        bytes[ENCRYPTION_KEY_LEN..ENCRYPTION_KEY_LEN + SIGNATURE_KEY_LEN]
            .copy_from_slice(&self.keys.signature);
        bytes
    }

    /// Parse a pairing record; the padding bytes are ignored.
    pub fn from_bytes(bytes: &RecordBytes) -> Self {
        let mut encryption = [0u8; ENCRYPTION_KEY_LEN];
        let mut signature = [0u8; SIGNATURE_KEY_LEN];
        encryption.copy_from_slice(&bytes[..ENCRYPTION_KEY_LEN]);
        signature.copy_from_slice(&bytes[ENCRYPTION_KEY_LEN..ENCRYPTION_KEY_LEN + SIGNATURE_KEY_LEN]);
        Self::new(SymmetricKeyPair::new(encryption, signature))
    }
}
