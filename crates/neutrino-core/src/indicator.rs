//! Three-LED status indicator.
//!
//! - good (green): boot pattern, successful transmit, address count
//! - bad (red): boot pattern, failed transmit
//! - low battery (amber): low battery, channel count
//!
//! A flash is a 2 ms blip, visible in the dark without costing much charge.
//! Counts are shown as slow pulses of a low duty-cycle software PWM.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::warn;

use crate::node::{Indication, StatusIndicator};

const FLASH_MS: u32 = 2;
const BOOT_GAP_MS: u32 = 120;
const BOOT_PAUSE_MS: u32 = 1_000;
const PULSE_CYCLES: u32 = 50;
const PULSE_ON_MS: u32 = 1;
const PULSE_OFF_MS: u32 = 9;
const PULSE_GAP_MS: u32 = 500;

#[derive(Clone, Copy)]
enum Led {
    Good,
    Bad,
    LowBattery,
}

pub struct LedIndicator<G, B, L, D> {
    good: G,
    bad: B,
    low_battery: L,
    delay: D,
}

impl<G, B, L, D> LedIndicator<G, B, L, D>
where
    G: OutputPin,
    B: OutputPin,
    L: OutputPin,
    D: DelayNs,
{
    pub fn new(good: G, bad: B, low_battery: L, delay: D) -> Self {
        Self {
            good,
            bad,
            low_battery,
            delay,
        }
    }

    fn set(&mut self, led: Led, on: bool) {
        let result = match (led, on) {
            (Led::Good, true) => self.good.set_high().map_err(drop),
            (Led::Good, false) => self.good.set_low().map_err(drop),
            (Led::Bad, true) => self.bad.set_high().map_err(drop),
            (Led::Bad, false) => self.bad.set_low().map_err(drop),
            (Led::LowBattery, true) => self.low_battery.set_high().map_err(drop),
            (Led::LowBattery, false) => self.low_battery.set_low().map_err(drop),
        };
        if result.is_err() {
            warn!("Failed to drive status LED");
        }
    }

    async fn flash(&mut self, led: Led) {
        self.set(led, true);
        self.delay.delay_ms(FLASH_MS).await;
        self.set(led, false);
        self.delay.delay_ms(FLASH_MS).await;
    }

    async fn pulse(&mut self, led: Led, count: u8) {
        for _ in 0..count {
            for _ in 0..PULSE_CYCLES {
                self.set(led, true);
                self.delay.delay_ms(PULSE_ON_MS).await;
                self.set(led, false);
                self.delay.delay_ms(PULSE_OFF_MS).await;
            }
            self.delay.delay_ms(PULSE_GAP_MS).await;
        }
    }
}

impl<G, B, L, D> StatusIndicator for LedIndicator<G, B, L, D>
where
    G: OutputPin,
    B: OutputPin,
    L: OutputPin,
    D: DelayNs,
{
    async fn indicate(&mut self, indication: Indication) {
        match indication {
            Indication::Boot => {
                self.flash(Led::Good).await;
                self.delay.delay_ms(BOOT_GAP_MS).await;
                self.flash(Led::Bad).await;
                self.delay.delay_ms(BOOT_GAP_MS).await;
                self.flash(Led::Good).await;
                self.delay.delay_ms(BOOT_PAUSE_MS).await;
            }
            Indication::TransmitOk => self.flash(Led::Good).await,
            Indication::TransmitFailed => self.flash(Led::Bad).await,
            Indication::LowBattery => self.flash(Led::LowBattery).await,
            Indication::AddressCount(count) => self.pulse(Led::Good, count).await,
            Indication::ChannelCount(count) => self.pulse(Led::LowBattery, count).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embedded_hal::digital::ErrorType;

    #[derive(Default)]
    struct CountingLed {
        lit: bool,
        flashes: u32,
    }

    impl ErrorType for CountingLed {
        type Error = Infallible;
    }

    impl OutputPin for CountingLed {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.lit = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            if !self.lit {
                self.flashes += 1;
            }
            self.lit = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Clock {
        ms: u32,
    }

    impl DelayNs for Clock {
        async fn delay_ns(&mut self, ns: u32) {
            self.ms += ns / 1_000_000;
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.ms += ms;
        }
    }

    type Leds = LedIndicator<CountingLed, CountingLed, CountingLed, Clock>;

    fn leds() -> Leds {
        LedIndicator::new(
            CountingLed::default(),
            CountingLed::default(),
            CountingLed::default(),
            Clock::default(),
        )
    }

    fn counts(leds: &Leds) -> (u32, u32, u32) {
        (leds.good.flashes, leds.bad.flashes, leds.low_battery.flashes)
    }

    #[test]
    fn test_boot_pattern() {
        let mut leds = leds();
        block_on(leds.indicate(Indication::Boot));
        assert_eq!(counts(&leds), (2, 1, 0));
        assert_eq!(leds.delay.ms, 3 * 4 + 2 * 120 + 1_000);
    }

    #[test]
    fn test_transmit_outcomes() {
        let mut leds = leds();
        block_on(leds.indicate(Indication::TransmitOk));
        block_on(leds.indicate(Indication::TransmitFailed));
        block_on(leds.indicate(Indication::LowBattery));
        assert_eq!(counts(&leds), (1, 1, 1));
        assert!(!leds.good.lit && !leds.bad.lit && !leds.low_battery.lit);
    }

    #[test]
    fn test_address_and_channel_counts() {
        let mut leds = leds();
        block_on(leds.indicate(Indication::AddressCount(3)));
        assert_eq!(counts(&leds), (3 * PULSE_CYCLES, 0, 0));
        assert_eq!(leds.delay.ms, 3 * 1_000);

        block_on(leds.indicate(Indication::ChannelCount(2)));
        assert_eq!(leds.low_battery.flashes, 2 * PULSE_CYCLES);
    }

    #[test]
    fn test_zero_count_is_dark() {
        let mut leds = leds();
        block_on(leds.indicate(Indication::AddressCount(0)));
        assert_eq!(counts(&leds), (0, 0, 0));
        assert_eq!(leds.delay.ms, 0);
    }
}
