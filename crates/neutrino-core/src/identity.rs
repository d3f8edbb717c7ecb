//! Boot-time node identity
//!
//! Address, channel and operating mode are set with jumpers. Every jumper
//! line is pulled up, so a fitted jumper reads low and sets its bit. The
//! lines are sampled once at boot; afterwards the identity never changes
//! until the node is reset.

use embedded_hal::digital::{InputPin, PinState};
use log::info;
use thiserror_no_std::Error;

use crate::config::{ADDRESS_MAX, CHANNEL_BASE, CHANNEL_MAX};

/// Bit weights of the address lines, least significant first.
const ADDRESS_WEIGHTS: [u8; 3] = [1, 2, 4];

/// Bit weights of the channel lines, least significant first.
const CHANNEL_WEIGHTS: [u8; 4] = [1, 2, 4, 8];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    #[error("node address {0} is outside 0-7")]
    AddressOutOfRange(u8),
    #[error("radio channel {0} is outside 60-75")]
    ChannelOutOfRange(u8),
}

/// Raw levels of the configuration jumpers, least significant line first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinStates {
    pub address: [PinState; 3],
    pub channel: [PinState; 4],
    pub mode: PinState,
}

impl PinStates {
    /// Sample every configuration line once.
    ///
    /// The pins must already be configured as pulled-up inputs. Releasing
    /// them to a low-power level afterwards is the caller's job, since that
    /// requires reconfiguring the hardware.
    pub fn sample<P: InputPin>(
        address: &mut [P; 3],
        channel: &mut [P; 4],
        mode: &mut P,
    ) -> Result<Self, P::Error> {
        let mut states = Self {
            address: [PinState::High; 3],
            channel: [PinState::High; 4],
            mode: level(mode)?,
        };
        for (state, pin) in states.address.iter_mut().zip(address.iter_mut()) {
            *state = level(pin)?;
        }
        for (state, pin) in states.channel.iter_mut().zip(channel.iter_mut()) {
            *state = level(pin)?;
        }
        Ok(states)
    }
}

fn level<P: InputPin>(pin: &mut P) -> Result<PinState, P::Error> {
    Ok(if pin.is_low()? {
        PinState::Low
    } else {
        PinState::High
    })
}

/// Sum the weights of every asserted (low) line.
fn jumper_value(states: &[PinState], weights: &[u8]) -> u8 {
    states
        .iter()
        .zip(weights)
        .filter(|(state, _)| **state == PinState::Low)
        .map(|(_, weight)| *weight)
        .sum()
}

/// Which message a node emits every cycle. Fixed at boot by the mode jumper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Keys are with the receiver: send signed, encrypted telemetry.
    Paired,
    /// Broadcast the keys in the clear so a receiver can be provisioned.
    Pairing,
}

/// Address, channel and mode of this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdentity {
    address: u8,
    channel: u8,
    encrypt_enabled: bool,
}

impl NodeIdentity {
    /// Build an identity from explicit values, rejecting anything the jumpers could not produce.
    pub fn new(address: u8, channel: u8, encrypt_enabled: bool) -> Result<Self, IdentityError> {
        if address > ADDRESS_MAX {
            return Err(IdentityError::AddressOutOfRange(address));
        }
        if !(CHANNEL_BASE..=CHANNEL_MAX).contains(&channel) {
            return Err(IdentityError::ChannelOutOfRange(channel));
        }
        Ok(Self {
            address,
            channel,
            encrypt_enabled,
        })
    }

    /// Derive the identity from sampled jumper levels. Always in range.
    pub fn derive(pins: &PinStates) -> Self {
        let identity = Self {
            address: jumper_value(&pins.address, &ADDRESS_WEIGHTS),
            channel: CHANNEL_BASE + jumper_value(&pins.channel, &CHANNEL_WEIGHTS),
            encrypt_enabled: pins.mode == PinState::Low,
        };
        info!(
            "Node identity: address {}, channel {}, encryption {}",
            identity.address,
            identity.channel,
            if identity.encrypt_enabled { "on" } else { "off" }
        );
        identity
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    pub const fn channel(&self) -> u8 {
        self.channel
    }

    /// Channel jumper value (0-15), i.e. the channel without its base.
    pub const fn channel_offset(&self) -> u8 {
        self.channel - CHANNEL_BASE
    }

    pub const fn encrypt_enabled(&self) -> bool {
        self.encrypt_enabled
    }

    pub const fn mode(&self) -> Mode {
        if self.encrypt_enabled {
            Mode::Paired
        } else {
            Mode::Pairing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    use embedded_hal::digital::PinState::{High, Low};

    fn pins(address: [PinState; 3], channel: [PinState; 4], mode: PinState) -> PinStates {
        PinStates {
            address,
            channel,
            mode,
        }
    }

    #[test]
    fn test_address_extremes() {
        let all_low = pins([Low, Low, Low], [High; 4], High);
        let all_high = pins([High, High, High], [High; 4], High);
        assert_eq!(NodeIdentity::derive(&all_low).address(), 7);
        assert_eq!(NodeIdentity::derive(&all_high).address(), 0);
    }

    #[test]
    fn test_each_address_line_contributes_its_weight() {
        for (line, weight) in ADDRESS_WEIGHTS.iter().enumerate() {
            let mut address = [High; 3];
            address[line] = Low;
            let identity = NodeIdentity::derive(&pins(address, [High; 4], High));
            assert_eq!(identity.address(), *weight);
        }
        // bit0 high, bit1 low, bit2 high
        let identity = NodeIdentity::derive(&pins([High, Low, High], [High; 4], High));
        assert_eq!(identity.address(), 2);
    }

    #[test]
    fn test_channel_extremes() {
        let all_high = NodeIdentity::derive(&pins([High; 3], [High; 4], High));
        let all_low = NodeIdentity::derive(&pins([High; 3], [Low; 4], High));
        assert_eq!(all_high.channel(), 60);
        assert_eq!(all_low.channel(), 75);
        assert_eq!(all_low.channel_offset(), 15);
    }

    #[test]
    fn test_mode_jumper() {
        let fitted = NodeIdentity::derive(&pins([High; 3], [High; 4], Low));
        let open = NodeIdentity::derive(&pins([High; 3], [High; 4], High));
        assert!(fitted.encrypt_enabled());
        assert_eq!(fitted.mode(), Mode::Paired);
        assert!(!open.encrypt_enabled());
        assert_eq!(open.mode(), Mode::Pairing);
    }

    #[test]
    fn test_new_validates_ranges() {
        assert!(NodeIdentity::new(7, 75, true).is_ok());
        assert_eq!(
            NodeIdentity::new(8, 60, true),
            Err(IdentityError::AddressOutOfRange(8))
        );
        assert_eq!(
            NodeIdentity::new(0, 59, true),
            Err(IdentityError::ChannelOutOfRange(59))
        );
        assert_eq!(
            NodeIdentity::new(0, 76, false),
            Err(IdentityError::ChannelOutOfRange(76))
        );
    }

    struct FixedPin(bool);

    impl ErrorType for FixedPin {
        type Error = Infallible;
    }

    impl InputPin for FixedPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0)
        }
    }

    #[test]
    fn test_sample_reads_each_line() {
        let mut address = [FixedPin(false), FixedPin(true), FixedPin(false)];
        let mut channel = [FixedPin(true), FixedPin(false), FixedPin(true), FixedPin(true)];
        let mut mode = FixedPin(false);

        let states = PinStates::sample(&mut address, &mut channel, &mut mode).unwrap();
        assert_eq!(states.address, [Low, High, Low]);
        assert_eq!(states.channel, [High, Low, High, High]);
        assert_eq!(states.mode, Low);

        let identity = NodeIdentity::derive(&states);
        assert_eq!(identity.address(), 5);
        assert_eq!(identity.channel(), 62);
        assert!(identity.encrypt_enabled());
    }
}
