//! The node's transmit cycle.
//!
//! [`SensorNode`] owns the boot-time [`NodeContext`] and the hardware it
//! needs each cycle, reached only through the collaborator traits below.
//! One call to [`SensorNode::run_cycle`] samples, builds one frame,
//! transmits it and signals the outcome; sleeping between cycles is left to
//! the caller.

use core::fmt::Debug;

use embedded_hal::digital::InputPin;
use log::{debug, info, warn};

pub use crate::config::{DataRate, PowerLevel};
use crate::config::{MESSAGE_LEN, NodeConfig, PIPE_ADDRESS_BASE};
use crate::debounce::EdgeDebouncer;
use crate::identity::{Mode, NodeIdentity};
use crate::message::{Frame, NodeContext};
use crate::sensors::{BarometerReadings, ClimateReadings, Sampler, Sensor, SensorReading};

/// Sends finished frames.
pub trait Transmitter {
    type Error: Debug;

    /// Transmit one frame and wait for the link-layer acknowledgement.
    fn transmit(&mut self, frame: &Frame) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Measures the supply voltage.
pub trait BatteryMonitor {
    type Error: Debug;

    fn read_millivolts(&mut self) -> impl Future<Output = Result<u16, Self::Error>>;
}

/// Something a person can see on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indication {
    /// Power-on pattern.
    Boot,
    TransmitOk,
    TransmitFailed,
    LowBattery,
    /// Node address as a count of pulses.
    AddressCount(u8),
    /// Channel offset above the base channel as a count of pulses.
    ChannelCount(u8),
}

/// Shows [`Indication`]s, typically on LEDs.
pub trait StatusIndicator {
    fn indicate(&mut self, indication: Indication) -> impl Future<Output = ()>;
}

/// Transceiver configuration for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioSettings {
    pub channel: u8,
    /// 40-bit pipe address.
    pub pipe_address: u64,
    pub payload_size: u8,
    /// Auto-retransmit delay in 250 µs steps above 250 µs.
    pub retry_delay: u8,
    pub retry_count: u8,
    pub data_rate: DataRate,
    pub power_level: PowerLevel,
}

impl RadioSettings {
    pub fn for_identity(identity: &NodeIdentity, config: &NodeConfig) -> Self {
        Self {
            channel: identity.channel(),
            pipe_address: pipe_address(identity),
            payload_size: MESSAGE_LEN as u8,
            retry_delay: config.radio_retry_delay.min(15),
            retry_count: config.radio_retry_count.min(15),
            data_rate: config.radio_data_rate,
            power_level: config.radio_power_level,
        }
    }

    /// Pipe address as sent to the transceiver, least significant byte first.
    pub fn pipe_address_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes.copy_from_slice(&self.pipe_address.to_le_bytes()[..5]);
        bytes
    }
}

/// `0xFCFCFCFC00 + (channel << 8) + address`.
pub const fn pipe_address(identity: &NodeIdentity) -> u64 {
    PIPE_ADDRESS_BASE + ((identity.channel() as u64) << 8) + identity.address() as u64
}

/// What happened during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub mode: Mode,
    pub frame: Frame,
    pub transmitted: bool,
    /// Battery value carried by the frame, if it was a telemetry frame.
    pub reported_millivolts: Option<u16>,
    pub low_battery: bool,
    /// A debounced proximity edge arrived since the previous cycle.
    pub proximity_triggered: bool,
}

pub struct SensorNode<'d, R, L, V, P, C, B> {
    context: NodeContext,
    config: NodeConfig,
    radio: R,
    indicator: L,
    battery: V,
    proximity: P,
    debouncer: &'d EdgeDebouncer,
    sampler: Sampler<C, B>,
    last_millivolts: u16,
}

impl<'d, R, L, V, P, C, B> SensorNode<'d, R, L, V, P, C, B>
where
    R: Transmitter,
    L: StatusIndicator,
    V: BatteryMonitor,
    P: InputPin,
    C: Sensor<Readings = ClimateReadings>,
    B: Sensor<Readings = BarometerReadings>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: NodeContext,
        config: NodeConfig,
        radio: R,
        indicator: L,
        battery: V,
        proximity: P,
        debouncer: &'d EdgeDebouncer,
        sampler: Sampler<C, B>,
    ) -> Self {
        Self {
            context,
            config,
            radio,
            indicator,
            battery,
            proximity,
            debouncer,
            sampler,
            last_millivolts: 0,
        }
    }

    pub const fn context(&self) -> &NodeContext {
        &self.context
    }

    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Battery voltage that the next telemetry frame will carry.
    pub const fn last_millivolts(&self) -> u16 {
        self.last_millivolts
    }

    /// Power-on sequence: boot pattern, address and channel pulses, and the
    /// first battery measurement.
    pub async fn boot(&mut self) {
        let identity = *self.context.identity();
        info!(
            "Node {} on channel {} in {:?} mode",
            identity.address(),
            identity.channel(),
            identity.mode()
        );

        self.indicator.indicate(Indication::Boot).await;
        self.indicator
            .indicate(Indication::AddressCount(identity.address()))
            .await;
        self.indicator
            .indicate(Indication::ChannelCount(identity.channel_offset()))
            .await;

        self.measure_battery().await;
    }

    /// Run one cycle in the node's boot-time mode.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mode = self.context.mode();
        // The record carries the pin level, so any edge is consumed here.
        let proximity_triggered = self.debouncer.take_pending();
        if proximity_triggered {
            debug!("Proximity edge since last cycle");
        }

        let (frame, reported_millivolts) = match mode {
            Mode::Paired => {
                let reading = self.read_sensors().await;
                (self.context.build_telemetry_message(&reading), Some(reading.battery_millivolts))
            }
            Mode::Pairing => (self.context.build_pairing_message(), None),
        };

        let transmitted = match self.radio.transmit(&frame).await {
            Ok(()) => {
                debug!("Frame sent: {:02x?}", frame);
                self.indicator.indicate(Indication::TransmitOk).await;
                true
            }
            Err(e) => {
                warn!("Transmit failed: {:?}", e);
                self.indicator.indicate(Indication::TransmitFailed).await;
                false
            }
        };

        let mut low_battery = false;
        if let Some(millivolts) = reported_millivolts {
            // Measured right after the radio burst, reported next cycle.
            self.measure_battery().await;

            low_battery = self.config.is_low_battery(millivolts);
            if low_battery {
                warn!("Low battery: {} mV", millivolts);
                self.indicator.indicate(Indication::LowBattery).await;
            }
        }

        CycleReport {
            mode,
            frame,
            transmitted,
            reported_millivolts,
            low_battery,
            proximity_triggered,
        }
    }

    async fn read_sensors(&mut self) -> SensorReading {
        let environment = self.sampler.sample().await;

        // Pulled up: a closed switch reads low.
        let proximity = match self.proximity.is_low() {
            Ok(closed) => closed,
            Err(e) => {
                warn!("Proximity pin read failed: {:?}", e);
                false
            }
        };

        SensorReading::new(environment, proximity, self.last_millivolts)
    }

    async fn measure_battery(&mut self) {
        match self.battery.read_millivolts().await {
            Ok(millivolts) => {
                debug!("Battery: {} mV", millivolts);
                self.last_millivolts = millivolts;
            }
            Err(e) => warn!("Battery measurement failed: {:?}", e),
        }
    }
}
