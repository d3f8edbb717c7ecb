//! Node configuration
//!
//! Wire and storage layout constants are fixed: changing any of them breaks
//! compatibility with receivers or with keys already provisioned in the
//! field. [`NodeConfig`] holds the tunables that only affect behaviour on the
//! node itself.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

/// Size of a full wire message (header + record).
pub const MESSAGE_LEN: usize = 17;

/// Size of the record following the header byte.
pub const RECORD_LEN: usize = 16;

/// Size of the truncated signature embedded in a telemetry record.
pub const SIGNATURE_LEN: usize = 6;

/// Bytes covered by the signature: header + every record field before it.
pub const SIGNED_LEN: usize = 11;

/// Length of the encryption key (80 bits).
pub const ENCRYPTION_KEY_LEN: usize = 10;

/// Length of the signature key (32 bits).
pub const SIGNATURE_KEY_LEN: usize = 4;

/// Persistent storage offset of the encryption key.
pub const ENCRYPTION_KEY_ADDR: u32 = 0x00;

/// Persistent storage offset of the signature key, directly after the encryption key.
pub const SIGNATURE_KEY_ADDR: u32 = ENCRYPTION_KEY_ADDR + ENCRYPTION_KEY_LEN as u32;

/// Byte value of erased storage; a key slot filled with it is unprovisioned.
pub const ERASED_BYTE: u8 = 0xFF;

/// Lowest radio channel; the channel jumpers select an offset from here.
pub const CHANNEL_BASE: u8 = 60;

/// Highest radio channel reachable with four channel jumpers.
pub const CHANNEL_MAX: u8 = CHANNEL_BASE + 15;

/// Highest node address reachable with three address jumpers.
pub const ADDRESS_MAX: u8 = 7;

/// Upper bytes of the 40-bit radio pipe address. Channel and address fill the low 16 bits.
pub const PIPE_ADDRESS_BASE: u64 = 0xFC_FC_FC_FC_00;

/// Proximity transitions closer together than this are treated as contact bounce.
pub const DEBOUNCE_WINDOW_MS: u32 = 20;

/// Battery voltage below which the low-battery indication fires.
pub const LOW_BATTERY_MILLIVOLTS: u16 = 2200;

/// Over-the-air data rate of the transceiver.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRate {
    Kbps250,
    Mbps1,
    Mbps2,
}

/// Transmit power amplifier level.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerLevel {
    Min,
    Low,
    High,
    Max,
}

/// Runtime tunables for a node.
///
/// Defaults match the deployed hardware: a 56 second cycle (seven 8 second
/// power-down periods) and the transceiver's auto-retransmit set to six
/// 250 µs steps of delay with four retries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    /// Seconds between the end of one cycle and the start of the next.
    pub cycle_interval_secs: u32,
    /// Battery voltage below which the low-battery indication fires.
    pub low_battery_millivolts: u16,
    /// Auto-retransmit delay, in 250 µs steps above 250 µs (0-15).
    pub radio_retry_delay: u8,
    /// Auto-retransmit count (0-15).
    pub radio_retry_count: u8,
    /// Over-the-air data rate. Receivers must use the same rate.
    pub radio_data_rate: DataRate,
    pub radio_power_level: PowerLevel,
    /// Proximity debounce window in milliseconds.
    pub debounce_window_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 56,
            low_battery_millivolts: LOW_BATTERY_MILLIVOLTS,
            radio_retry_delay: 6,
            radio_retry_count: 4,
            radio_data_rate: DataRate::Kbps250,
            radio_power_level: PowerLevel::Max,
            debounce_window_ms: DEBOUNCE_WINDOW_MS,
        }
    }
}

impl NodeConfig {
    /// Sleep duration between cycles.
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs as u64)
    }

    /// Whether a measured battery voltage should raise the low-battery indication.
    pub fn is_low_battery(&self, millivolts: u16) -> bool {
        millivolts < self.low_battery_millivolts
    }
}
