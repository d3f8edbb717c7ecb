//! Receiving side of the wire format.
//!
//! Nodes never decode frames; these helpers state the contract a receiver
//! relies on and are what the simulator uses to check its own output.

use thiserror_no_std::Error;

use super::record::{PairingRecord, RecordBytes, SIGNATURE_OFFSET, TelemetryRecord};
use super::{Frame, Header, HeaderError, MessageType};
use crate::config::{RECORD_LEN, SIGNED_LEN};
use crate::crypto::skipjack::BLOCK_SIZE;
use crate::crypto::{decrypt_blocks, verify};
use crate::keys::SymmetricKeyPair;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    #[error("invalid header: {0}")]
    Header(#[from] HeaderError),
    #[error("expected a {expected:?} message, got {actual:?}")]
    UnexpectedType {
        expected: MessageType,
        actual: MessageType,
    },
    #[error("signature does not match")]
    BadSignature,
    #[error("record address {record} does not match header address {header}")]
    AddressMismatch { header: u8, record: u8 },
}

fn expect_type(frame: &Frame, expected: MessageType) -> Result<(Header, RecordBytes), OpenError> {
    let header = Header::from_byte(frame[0])?;
    if header.message_type != expected {
        return Err(OpenError::UnexpectedType {
            expected,
            actual: header.message_type,
        });
    }
    let mut record = [0u8; RECORD_LEN];
    record.copy_from_slice(&frame[1..]);
    Ok((header, record))
}

/// Decrypt a telemetry frame and check its signature.
pub fn open_telemetry(frame: &Frame, keys: &SymmetricKeyPair) -> Result<TelemetryRecord, OpenError> {
    let (header, mut bytes) = expect_type(frame, MessageType::Telemetry)?;

    let (blocks, _) = bytes.as_chunks_mut::<BLOCK_SIZE>();
    decrypt_blocks(blocks, &keys.encryption);

    let mut signed = [0u8; SIGNED_LEN];
    signed[0] = frame[0];
    signed[1..].copy_from_slice(&bytes[..SIGNATURE_OFFSET]);

    let record = TelemetryRecord::from_bytes(&bytes);
    if !verify(&signed, &keys.signature, &record.signature) {
        return Err(OpenError::BadSignature);
    }
    if record.addr as u8 != header.address {
        return Err(OpenError::AddressMismatch {
            header: header.address,
            record: record.addr as u8,
        });
    }
    Ok(record)
}

/// Extract the keys broadcast by a node in pairing mode.
pub fn open_pairing(frame: &Frame) -> Result<SymmetricKeyPair, OpenError> {
    let (_, bytes) = expect_type(frame, MessageType::Pairing)?;
    Ok(PairingRecord::from_bytes(&bytes).keys)
}
