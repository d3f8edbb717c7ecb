#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_futures::select::select;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Pull};
use esp_hal::timer::timg::TimerGroup;
use log::{debug, error, info};
use rtt_target::rprintln;
use static_cell::StaticCell;

use neutrino_core::battery::VoltageDivider;
use neutrino_core::i2c_bus::{I2cBus, SharedI2c};
use neutrino_core::keys::KeyGenerator;
use neutrino_core::node::{Indication, StatusIndicator};
use neutrino_core::sensors::Sampler;
use neutrino_core::{EdgeDebouncer, NodeConfig, NodeContext, RadioSettings, SensorNode};

use neutrino_firmware::analog::{AdcBattery, AdcNoise};
use neutrino_firmware::config_pins::ConfigPins;
use neutrino_firmware::hardware::{self, I2cDriver, RadioPins, StatusLeds};
use neutrino_firmware::key_flash;
use neutrino_firmware::proximity::{ProximityLevel, WAKE, proximity_task};

#[cfg(feature = "sensor-bmp180")]
use neutrino_core::sensors::bmp180::Oversampling;
#[cfg(feature = "sensor-bmp180")]
type Barometer = neutrino_core::sensors::BMP180Sensor<SharedI2c<'static, I2cDriver>, Delay>;
#[cfg(not(feature = "sensor-bmp180"))]
type Barometer = neutrino_core::sensors::Unfitted<neutrino_core::sensors::BarometerReadings>;

#[cfg(feature = "sensor-sht40")]
type Climate = neutrino_core::sensors::SHT40Sensor<SharedI2c<'static, I2cDriver>>;
#[cfg(not(feature = "sensor-sht40"))]
type Climate = neutrino_core::sensors::Unfitted<neutrino_core::sensors::ClimateReadings>;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[allow(unused_variables)]
fn sensors(bus: &'static I2cBus<I2cDriver>) -> Sampler<Climate, Barometer> {
    #[cfg(feature = "sensor-sht40")]
    let climate = Some(Climate::new(SharedI2c::new(bus)));
    #[cfg(not(feature = "sensor-sht40"))]
    let climate = None;

    #[cfg(feature = "sensor-bmp180")]
    let barometer = Some(Barometer::new(
        SharedI2c::new(bus),
        Delay,
        Oversampling::Standard,
    ));
    #[cfg(not(feature = "sensor-bmp180"))]
    let barometer = None;

    Sampler::new(climate, barometer)
}

/// Without keys there is nothing safe to send: blink the failure LED forever.
async fn halt(leds: &mut StatusLeds) -> ! {
    loop {
        leds.indicate(Indication::TransmitFailed).await;
        Timer::after(Duration::from_secs(1)).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    // The node spends nearly all its time asleep; full speed buys nothing.
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::_80MHz);
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let node_config = NodeConfig::default();
    static DEBOUNCER: StaticCell<EdgeDebouncer> = StaticCell::new();
    let debouncer: &'static EdgeDebouncer = DEBOUNCER.init(EdgeDebouncer::for_config(&node_config));

    let mut leds = hardware::status_leds(peripherals.GPIO38, peripherals.GPIO39, peripherals.GPIO40);

    // 1. Jumpers: address, channel, mode
    let (identity, _parked) = ConfigPins {
        address: [
            peripherals.GPIO4.into(),
            peripherals.GPIO5.into(),
            peripherals.GPIO6.into(),
        ],
        channel: [
            peripherals.GPIO7.into(),
            peripherals.GPIO15.into(),
            peripherals.GPIO16.into(),
            peripherals.GPIO17.into(),
        ],
        mode: peripherals.GPIO18.into(),
    }
    .read_identity();

    // 2. Keys, generated on first boot
    let mut key_store = key_flash::key_store(peripherals.FLASH);
    let mut generator = KeyGenerator::new(AdcNoise::new(peripherals.ADC2, peripherals.GPIO13));
    let keys = match key_store.load_or_generate_pair(&mut generator) {
        Ok(keys) => keys,
        Err(e) => {
            error!("Key store unavailable: {}", e);
            halt(&mut leds).await
        }
    };
    drop(generator);
    let context = NodeContext::new(identity, keys);

    // 3. Radio
    let settings = RadioSettings::for_identity(&identity, &node_config);
    let radio = hardware::init_radio(
        peripherals.SPI2,
        RadioPins {
            sck: peripherals.GPIO36,
            mosi: peripherals.GPIO37,
            miso: peripherals.GPIO35,
            csn: peripherals.GPIO10,
            ce: peripherals.GPIO9,
        },
        &settings,
    )
    .await;

    // 4. Sensors on the shared I2C bus
    let i2c = hardware::create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11);
    let sampler = sensors(hardware::share_i2c_bus(i2c));

    // 5. Proximity switch
    let proximity = Input::new(
        peripherals.GPIO21,
        InputConfig::default().with_pull(Pull::Up),
    );
    spawner.spawn(proximity_task(proximity, debouncer).unwrap());

    let battery = AdcBattery::new(
        peripherals.ADC1,
        peripherals.GPIO1,
        VoltageDivider::ESP32S3_HALF,
    );

    let mut node = SensorNode::new(
        context,
        node_config,
        radio,
        leds,
        battery,
        ProximityLevel,
        debouncer,
        sampler,
    );

    node.boot().await;

    loop {
        let report = node.run_cycle().await;
        debug!(
            "Cycle done: {:?}, transmitted {}, low battery {}",
            report.mode, report.transmitted, report.low_battery
        );

        // Sleep until the next cycle, or until the switch changes state.
        select(Timer::after(node.config().cycle_interval()), WAKE.wait()).await;
    }
}
