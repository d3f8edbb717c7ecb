//! Desktop simulator for the neutrino sensor node.
//!
//! Runs the node cycle from `neutrino-core` against synthetic sensors, an
//! in-memory EEPROM and a radio that loses the occasional frame. Every frame
//! is printed as hex and decoded the way a receiver would decode it.
//!
//! The node first boots in pairing mode, so the simulated receiver learns
//! its keys from the clear-text pairing frame. It then reboots in paired
//! mode with the same EEPROM and sends encrypted telemetry.
//!
//! Set `RUST_LOG=debug` for per-cycle detail.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use embassy_futures::block_on;
use embassy_time::Instant;
use embedded_hal::digital::{ErrorType, InputPin, PinState};
use embedded_storage::{ReadStorage, Storage};
use log::{info, warn};

use neutrino_core::config::ERASED_BYTE;
use neutrino_core::keys::{KeyGenerator, NoiseSource};
use neutrino_core::message::{open_pairing, open_telemetry};
use neutrino_core::node::{BatteryMonitor, Indication, StatusIndicator, Transmitter};
use neutrino_core::sensors::{BarometerReadings, ClimateReadings, Sampler, Sensor, SensorError};
use neutrino_core::{
    CycleReport, EdgeDebouncer, Frame, KeyStore, Mode, NodeConfig, NodeContext, NodeIdentity,
    PinStates, RadioSettings, SensorNode, SymmetricKeyPair,
};

// ---------------------------------------------------------------------------
// Scenario constants
// ---------------------------------------------------------------------------

/// Telemetry cycles run after pairing.
const TELEMETRY_CYCLES: u32 = 12;

/// Every n-th frame gets no acknowledgement.
const LOST_FRAME_PERIOD: usize = 5;

/// Climate sensor drops out on these cycles, to show the barometer fallback.
const CLIMATE_DROPOUT_CYCLES: [u32; 2] = [4, 5];

/// Battery drain per measurement.
const BATTERY_DRAIN_MV: u16 = 70;

// ---------------------------------------------------------------------------
// Simulated hardware
// ---------------------------------------------------------------------------

/// Erased 1 KiB EEPROM.
struct Eeprom {
    bytes: [u8; 1024],
}

#[derive(Debug)]
struct OutOfRange;

impl Eeprom {
    fn erased() -> Self {
        Self {
            bytes: [ERASED_BYTE; 1024],
        }
    }
}

impl ReadStorage for Eeprom {
    type Error = OutOfRange;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let src = self.bytes.get(start..start + bytes.len()).ok_or(OutOfRange)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for Eeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let dst = self
            .bytes
            .get_mut(start..start + bytes.len())
            .ok_or(OutOfRange)?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

/// Wall-clock nanoseconds stand in for a floating analog pin.
struct ClockNoise;

impl NoiseSource for ClockNoise {
    fn sample(&mut self) -> u16 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u16)
            .unwrap_or(0)
    }
}

/// Shared simulation clock, in cycles and milliseconds.
#[derive(Default)]
struct SimClock {
    cycle: Cell<u32>,
    millis: Cell<u64>,
}

impl SimClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.millis.get())
    }

    fn advance(&self, millis: u64) {
        self.millis.set(self.millis.get() + millis);
    }
}

/// Generates climate readings that vary over time.
struct MockClimate {
    clock: Rc<SimClock>,
}

impl Sensor for MockClimate {
    type Readings = ClimateReadings;

    async fn read(&mut self) -> Result<ClimateReadings, SensorError> {
        let cycle = self.clock.cycle.get();
        if CLIMATE_DROPOUT_CYCLES.contains(&cycle) {
            return Err(SensorError::ReadFailed {
                sensor: "mock-climate",
                operation: "measure",
                details: "no acknowledge",
            });
        }

        let t = cycle as f64;
        // Temperature: 20–23 °C; humidity: 40–50 %
        let temperature = 21.5 + 1.5 * (t / 3.0).sin();
        let humidity = 45.0 + 5.0 * (t / 5.0).cos();
        Ok(ClimateReadings {
            temperature_centi_celsius: (temperature * 100.0) as i16,
            humidity_basis_points: (humidity * 100.0) as i16,
        })
    }
}

/// Barometer reading a slowly falling pressure, slightly warmer than the air.
struct MockBarometer {
    clock: Rc<SimClock>,
}

impl Sensor for MockBarometer {
    type Readings = BarometerReadings;

    async fn read(&mut self) -> Result<BarometerReadings, SensorError> {
        let t = self.clock.cycle.get() as f64;
        Ok(BarometerReadings {
            temperature_centi_celsius: ((22.0 + 1.5 * (t / 3.0).sin()) * 100.0) as i16,
            pressure_pascals: (101_300.0 - 25.0 * t) as u32,
        })
    }
}

/// Battery that drains a fixed amount every measurement.
struct DrainingBattery {
    millivolts: u16,
}

impl BatteryMonitor for DrainingBattery {
    type Error = Infallible;

    async fn read_millivolts(&mut self) -> Result<u16, Infallible> {
        let reading = self.millivolts;
        self.millivolts = self.millivolts.saturating_sub(BATTERY_DRAIN_MV);
        Ok(reading)
    }
}

/// Radio that keeps every frame and drops one in `LOST_FRAME_PERIOD`.
#[derive(Default)]
struct LossyRadio {
    attempts: usize,
}

impl Transmitter for LossyRadio {
    type Error = &'static str;

    async fn transmit(&mut self, _frame: &Frame) -> Result<(), Self::Error> {
        self.attempts += 1;
        if self.attempts % LOST_FRAME_PERIOD == 0 {
            Err("no acknowledgement after all retries")
        } else {
            Ok(())
        }
    }
}

/// Prints indications instead of lighting LEDs.
struct LogIndicator;

impl StatusIndicator for LogIndicator {
    async fn indicate(&mut self, indication: Indication) {
        info!("LED: {:?}", indication);
    }
}

/// Proximity switch toggled by the scenario.
#[derive(Clone, Default)]
struct SimSwitch {
    closed: Rc<Cell<bool>>,
}

impl ErrorType for SimSwitch {
    type Error = Infallible;
}

impl InputPin for SimSwitch {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.closed.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.closed.get())
    }
}

// ---------------------------------------------------------------------------
// Receiver side
// ---------------------------------------------------------------------------

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}

/// Decode one frame the way a receiver would.
fn receive(report: &CycleReport, learned: &mut Option<SymmetricKeyPair>) {
    let frame = &report.frame;
    println!("  frame: {}", hex(frame));

    if !report.transmitted {
        println!("  (lost on air)");
        return;
    }

    match report.mode {
        Mode::Pairing => match open_pairing(frame) {
            Ok(keys) => {
                println!(
                    "  pairing: encryption key {:02x?}, signature key {:02x?}",
                    keys.encryption, keys.signature
                );
                *learned = Some(keys);
            }
            Err(e) => warn!("Pairing frame rejected: {}", e),
        },
        Mode::Paired => {
            let Some(keys) = learned.as_ref() else {
                warn!("Telemetry received before pairing");
                return;
            };
            match open_telemetry(frame, keys) {
                Ok(record) => println!(
                    "  telemetry: node {} proximity {} {:.2} °C {:.2} %RH {} daPa {} mV",
                    record.addr,
                    record.proximity,
                    record.temperature_centi_celsius as f32 / 100.0,
                    record.humidity_basis_points as f32 / 100.0,
                    record.pressure_decapascals,
                    record.battery_millivolts
                ),
                Err(e) => warn!("Telemetry frame rejected: {}", e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Node runs
// ---------------------------------------------------------------------------

/// Jumper levels for address 2, channel 63 (offset 3), with the mode jumper as given.
fn jumpers(mode: PinState) -> PinStates {
    use PinState::{High, Low};
    PinStates {
        address: [High, Low, High],
        channel: [Low, Low, High, High],
        mode,
    }
}

/// Boot a node on `eeprom` and run `cycles` cycles.
fn run_node(
    eeprom: Eeprom,
    mode_jumper: PinState,
    cycles: u32,
    learned: &mut Option<SymmetricKeyPair>,
) -> Eeprom {
    let identity = NodeIdentity::derive(&jumpers(mode_jumper));
    let config = NodeConfig::default();
    let settings = RadioSettings::for_identity(&identity, &config);
    info!(
        "Radio: channel {}, pipe {:010x}",
        settings.channel, settings.pipe_address
    );

    let mut store = KeyStore::new(eeprom);
    let keys = match store.load_or_generate_pair(&mut KeyGenerator::new(ClockNoise)) {
        Ok(keys) => keys,
        Err(e) => {
            warn!("Key store failed: {}", e);
            return store.release();
        }
    };

    let clock = Rc::new(SimClock::default());
    let switch = SimSwitch::default();
    let debouncer = EdgeDebouncer::for_config(&config);
    let sampler = Sampler::new(
        Some(MockClimate {
            clock: clock.clone(),
        }),
        Some(MockBarometer {
            clock: clock.clone(),
        }),
    );

    let mut node = SensorNode::new(
        NodeContext::new(identity, keys),
        config,
        LossyRadio::default(),
        LogIndicator,
        DrainingBattery { millivolts: 2_600 },
        switch.clone(),
        &debouncer,
        sampler,
    );

    block_on(node.boot());

    let interval_ms = config.cycle_interval().as_millis();
    for cycle in 0..cycles {
        clock.cycle.set(cycle);

        // The switch closes on cycle 2, bouncing 5 ms later, and opens on cycle 7.
        if cycle == 2 || cycle == 7 {
            switch.closed.set(cycle == 2);
            debouncer.record_edge(clock.now());
            clock.advance(5);
            debouncer.record_edge(clock.now());
        }

        let report = block_on(node.run_cycle());
        println!(
            "cycle {cycle}: {:?}, sent {}, low battery {}, proximity edge {}",
            report.mode, report.transmitted, report.low_battery, report.proximity_triggered
        );
        receive(&report, learned);

        clock.advance(interval_ms);
    }

    store.release()
}

fn main() {
    env_logger::init();
    info!("Starting neutrino simulator");

    let mut learned = None;

    println!("== pairing boot ==");
    let eeprom = run_node(Eeprom::erased(), PinState::High, 1, &mut learned);

    println!("== paired boot ==");
    let eeprom = run_node(eeprom, PinState::Low, TELEMETRY_CYCLES, &mut learned);

    println!("EEPROM key area: {}", hex(&eeprom.bytes[..16]));
    info!("Simulator exiting");
}
