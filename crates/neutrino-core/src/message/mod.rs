//! Wire messages
//!
//! Every message is 17 bytes: one header byte followed by a 16-byte record.
//! Both variants share the envelope so a receiver can use a fixed payload
//! size.
//!
//! ```text
//! MSB  RRRAAAMM  LSB
//!
//! MM  - message type: 00 telemetry, 01 pairing, 10/11 reserved
//! AAA - node address
//! RRR - reserved, sent as zero
//! ```
//!
//! Telemetry is signed and then encrypted: the signature covers the header
//! and the plaintext fields before it, and encryption covers the whole
//! record including the signature. Pairing messages carry the node's keys
//! in the clear and are neither signed nor encrypted.

mod receiver;
pub mod record;

pub use receiver::{OpenError, open_pairing, open_telemetry};
pub use record::{PairingRecord, TelemetryRecord};

use log::debug;
use thiserror_no_std::Error;

use crate::config::{ADDRESS_MAX, MESSAGE_LEN, RECORD_LEN, SIGNED_LEN};
use crate::crypto::skipjack::BLOCK_SIZE;
use crate::crypto::{encrypt_blocks, sign};
use crate::identity::{Mode, NodeIdentity};
use crate::keys::SymmetricKeyPair;
use crate::sensors::SensorReading;
use record::{RecordBytes, SIGNATURE_OFFSET};

pub type Frame = [u8; MESSAGE_LEN];

const TYPE_MASK: u8 = 0b0000_0011;
const ADDRESS_SHIFT: u8 = 2;

const _: () = assert!(RECORD_LEN % BLOCK_SIZE == 0, "record must be whole cipher blocks");

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("reserved message type {0:#04b}")]
    ReservedType(u8),
}

/// The two bits of message type in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Telemetry = 0b00,
    Pairing = 0b01,
}

impl TryFrom<u8> for MessageType {
    type Error = HeaderError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits & TYPE_MASK {
            0b00 => Ok(Self::Telemetry),
            0b01 => Ok(Self::Pairing),
            other => Err(HeaderError::ReservedType(other)),
        }
    }
}

/// Decoded header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub address: u8,
    pub message_type: MessageType,
}

impl Header {
    /// Header for a message of `message_type` sent by `identity`.
    pub const fn for_node(identity: &NodeIdentity, message_type: MessageType) -> Self {
        Self {
            address: identity.address(),
            message_type,
        }
    }

    pub const fn to_byte(self) -> u8 {
        ((self.address & ADDRESS_MAX) << ADDRESS_SHIFT) | self.message_type as u8
    }

    /// Decode a header byte. Reserved high bits are ignored.
    pub fn from_byte(byte: u8) -> Result<Self, HeaderError> {
        Ok(Self {
            address: (byte >> ADDRESS_SHIFT) & ADDRESS_MAX,
            message_type: MessageType::try_from(byte)?,
        })
    }
}

/// One message ready to be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Telemetry(TelemetryRecord),
    Pairing(PairingRecord),
}

impl Message {
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Telemetry(_) => MessageType::Telemetry,
            Self::Pairing(_) => MessageType::Pairing,
        }
    }

    /// Serialise into the 17-byte envelope.
    ///
    /// Telemetry is signed with the signature key and then encrypted with
    /// the encryption key; any signature already in the record is
    /// overwritten. Pairing records go out verbatim.
    pub fn to_frame(&self, identity: &NodeIdentity, keys: &SymmetricKeyPair) -> Frame {
        let header = Header::for_node(identity, self.message_type()).to_byte();
        let record = match self {
            Self::Telemetry(record) => seal_telemetry(header, record, keys),
            Self::Pairing(record) => record.to_bytes(),
        };

        let mut frame = [0u8; MESSAGE_LEN];
        frame[0] = header;
        frame[1..].copy_from_slice(&record);
        frame
    }
}

/// Sign then encrypt a telemetry record.
fn seal_telemetry(header: u8, record: &TelemetryRecord, keys: &SymmetricKeyPair) -> RecordBytes {
    let mut bytes = record.to_bytes();

    let mut signed = [0u8; SIGNED_LEN];
    signed[0] = header;
    signed[1..].copy_from_slice(&bytes[..SIGNATURE_OFFSET]);
    bytes[SIGNATURE_OFFSET..].copy_from_slice(&sign(&signed, &keys.signature));

    let (blocks, _) = bytes.as_chunks_mut::<BLOCK_SIZE>();
    encrypt_blocks(blocks, &keys.encryption);
    bytes
}

/// Build the signed, encrypted telemetry frame for `reading`.
pub fn build_telemetry_message(
    identity: &NodeIdentity,
    reading: &SensorReading,
    keys: &SymmetricKeyPair,
) -> Frame {
    let record = TelemetryRecord::from_reading(identity.address(), reading);
    Message::Telemetry(record).to_frame(identity, keys)
}

/// Build the plaintext key broadcast frame.
pub fn build_pairing_message(identity: &NodeIdentity, keys: &SymmetricKeyPair) -> Frame {
    Message::Pairing(PairingRecord::new(*keys)).to_frame(identity, keys)
}

/// Identity and keys of the running node.
///
/// Constructed once at boot, after the key store has run, and shared by
/// reference with everything that builds messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeContext {
    identity: NodeIdentity,
    keys: SymmetricKeyPair,
}

impl NodeContext {
    pub const fn new(identity: NodeIdentity, keys: SymmetricKeyPair) -> Self {
        Self { identity, keys }
    }

    pub const fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub const fn keys(&self) -> &SymmetricKeyPair {
        &self.keys
    }

    pub const fn mode(&self) -> Mode {
        self.identity.mode()
    }

    pub fn build_telemetry_message(&self, reading: &SensorReading) -> Frame {
        build_telemetry_message(&self.identity, reading, &self.keys)
    }

    pub fn build_pairing_message(&self) -> Frame {
        build_pairing_message(&self.identity, &self.keys)
    }

    /// The message this node sends every cycle in its boot-time mode.
    ///
    /// `reading` is only consulted in paired mode.
    pub fn build_cycle_message(&self, reading: impl FnOnce() -> SensorReading) -> Frame {
        match self.mode() {
            Mode::Paired => {
                let reading = reading();
                debug!("Building telemetry message: {:?}", reading);
                self.build_telemetry_message(&reading)
            }
            Mode::Pairing => {
                debug!("Building pairing message");
                self.build_pairing_message()
            }
        }
    }
}
