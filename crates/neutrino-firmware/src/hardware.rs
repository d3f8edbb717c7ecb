//! Hardware initialization for the neutrino node
//!
//! Bring-up helpers for the buses and drivers the node cycle needs. Pin
//! assignments follow the board: I2C on GPIO12/11, the nRF24L01+ on SPI2
//! with CSN on GPIO10 and CE on GPIO9.

use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::Async;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::spi::Mode;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use log::{info, warn};
use neutrino_core::i2c_bus::I2cBus;
use neutrino_core::indicator::LedIndicator;
use neutrino_core::RadioSettings;
use neutrino_core::nrf24::Nrf24;
use static_cell::StaticCell;

pub type I2cDriver = I2c<'static, Async>;
pub type RadioSpi = ExclusiveDevice<Spi<'static, Async>, Output<'static>, Delay>;
pub type Radio = Nrf24<RadioSpi, Output<'static>, Delay>;
pub type StatusLeds = LedIndicator<Output<'static>, Output<'static>, Output<'static>, Delay>;

/// Initialize the I2C bus hardware
///
/// Creates the I2C peripheral with proper configuration
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO12<'static>,
    scl: esp_hal::peripherals::GPIO11<'static>,
) -> I2cDriver {
    I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .unwrap()
    .with_sda(sda)
    .with_scl(scl)
    .into_async()
}

/// Put the I2C bus in a `static` so each sensor can hold a handle to it.
pub fn share_i2c_bus(i2c: I2cDriver) -> &'static I2cBus<I2cDriver> {
    static I2C0_BUS: StaticCell<I2cBus<I2cDriver>> = StaticCell::new();
    I2C0_BUS.init(I2cBus::new(i2c))
}

/// Pins wired to the nRF24L01+ module.
pub struct RadioPins {
    pub sck: esp_hal::peripherals::GPIO36<'static>,
    pub mosi: esp_hal::peripherals::GPIO37<'static>,
    pub miso: esp_hal::peripherals::GPIO35<'static>,
    pub csn: esp_hal::peripherals::GPIO10<'static>,
    pub ce: esp_hal::peripherals::GPIO9<'static>,
}

/// Bring up SPI2 and the nRF24L01+ on it, programmed for this node.
///
/// A radio that does not answer is logged and returned anyway: every
/// transmit will then fail and show on the status LEDs.
pub async fn init_radio(
    spi2: esp_hal::peripherals::SPI2<'static>,
    pins: RadioPins,
    settings: &RadioSettings,
) -> Radio {
    // nRF24L01+ tops out at 10 MHz; SPI mode 0
    let spi_bus = Spi::new(
        spi2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(4))
            .with_mode(Mode::_0),
    )
    .unwrap()
    .with_sck(pins.sck)
    .with_mosi(pins.mosi)
    .with_miso(pins.miso)
    .into_async();

    let csn = Output::new(pins.csn, Level::High, OutputConfig::default());
    let spi_device = ExclusiveDevice::new(spi_bus, csn, Delay).unwrap();
    let ce = Output::new(pins.ce, Level::Low, OutputConfig::default());

    let mut radio = Nrf24::new(spi_device, ce, Delay);
    match radio.configure(settings).await {
        Ok(()) => info!("Radio ready"),
        Err(e) => warn!("Radio configuration failed: {}", e),
    }
    radio
}

/// Status LEDs: good on GPIO38, bad on GPIO39, low battery on GPIO40.
pub fn status_leds(
    good: esp_hal::peripherals::GPIO38<'static>,
    bad: esp_hal::peripherals::GPIO39<'static>,
    low_battery: esp_hal::peripherals::GPIO40<'static>,
) -> StatusLeds {
    LedIndicator::new(
        Output::new(good, Level::Low, OutputConfig::default()),
        Output::new(bad, Level::Low, OutputConfig::default()),
        Output::new(low_battery, Level::Low, OutputConfig::default()),
        Delay,
    )
}
