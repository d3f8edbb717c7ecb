//! Jumper sampling at boot.
//!
//! The address, channel and mode lines are read once as pulled-up inputs.
//! After that they are driven low for the rest of the node's life so the
//! pull-ups stop drawing current through fitted jumpers.

use esp_hal::gpio::{AnyPin, Input, InputConfig, Level, Output, OutputConfig, Pull};
use log::debug;
use neutrino_core::{NodeIdentity, PinStates};

/// The configuration lines, least significant first.
pub struct ConfigPins {
    pub address: [AnyPin<'static>; 3],
    pub channel: [AnyPin<'static>; 4],
    pub mode: AnyPin<'static>,
}

/// Configuration lines after sampling. Dropping this releases the outputs.
pub struct ParkedPins {
    _address: [Output<'static>; 3],
    _channel: [Output<'static>; 4],
    _mode: Output<'static>,
}

impl ConfigPins {
    /// Sample the jumpers, derive the node identity and park the lines.
    pub fn read_identity(mut self) -> (NodeIdentity, ParkedPins) {
        let input = InputConfig::default().with_pull(Pull::Up);

        let states = {
            let mut address = self.address.each_mut().map(|pin| Input::new(pin.reborrow(), input));
            let mut channel = self.channel.each_mut().map(|pin| Input::new(pin.reborrow(), input));
            let mut mode = Input::new(self.mode.reborrow(), input);
            PinStates::sample(&mut address, &mut channel, &mut mode).unwrap_or_else(|e| match e {})
        };
        debug!("Jumper levels: {:?}", states);

        let parked = ParkedPins {
            _address: self.address.map(park),
            _channel: self.channel.map(park),
            _mode: park(self.mode),
        };

        (NodeIdentity::derive(&states), parked)
    }
}

fn park(pin: AnyPin<'static>) -> Output<'static> {
    Output::new(pin, Level::Low, OutputConfig::default())
}
