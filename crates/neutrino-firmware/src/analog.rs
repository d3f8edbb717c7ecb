//! ADC readings: battery voltage and the noise sample that seeds key generation.

use core::convert::Infallible;

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::peripherals::{ADC1, ADC2, GPIO1, GPIO13};
use log::debug;
use neutrino_core::battery::VoltageDivider;
use neutrino_core::keys::NoiseSource;
use neutrino_core::node::BatteryMonitor;

/// Conversions averaged per battery measurement.
const BATTERY_SAMPLES: u32 = 4;

/// Battery voltage through the divider on GPIO1.
pub struct AdcBattery {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    pin: AdcPin<GPIO1<'static>, ADC1<'static>>,
    divider: VoltageDivider,
}

impl AdcBattery {
    pub fn new(adc1: ADC1<'static>, pin: GPIO1<'static>, divider: VoltageDivider) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(pin, Attenuation::_11dB);
        Self {
            adc: Adc::new(adc1, config),
            pin,
            divider,
        }
    }

    fn read_raw(&mut self) -> u16 {
        loop {
            // Only `WouldBlock` is ever returned while the conversion runs.
            if let Ok(raw) = self.adc.read_oneshot(&mut self.pin) {
                return raw;
            }
        }
    }
}

impl BatteryMonitor for AdcBattery {
    type Error = Infallible;

    async fn read_millivolts(&mut self) -> Result<u16, Infallible> {
        let total: u32 = (0..BATTERY_SAMPLES).map(|_| self.read_raw() as u32).sum();
        let raw = (total / BATTERY_SAMPLES) as u16;
        debug!("Battery ADC raw {}", raw);
        Ok(self.divider.millivolts(raw))
    }
}

/// A floating ADC2 input. Only its low bits are worth anything, which is
/// all the key generator's seed needs.
pub struct AdcNoise {
    adc: Adc<'static, ADC2<'static>, Blocking>,
    pin: AdcPin<GPIO13<'static>, ADC2<'static>>,
}

impl AdcNoise {
    pub fn new(adc2: ADC2<'static>, pin: GPIO13<'static>) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(pin, Attenuation::_11dB);
        Self {
            adc: Adc::new(adc2, config),
            pin,
        }
    }
}

impl NoiseSource for AdcNoise {
    fn sample(&mut self) -> u16 {
        loop {
            if let Ok(raw) = self.adc.read_oneshot(&mut self.pin) {
                return raw;
            }
        }
    }
}
