//! Proximity switch edge task.
//!
//! The task owns the interrupt-capable input. On every transition it feeds
//! the debouncer, mirrors the pin level for the main cycle and, when the
//! edge is accepted, wakes the main loop out of its sleep.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;
use embedded_hal::digital::{ErrorType, InputPin};
use esp_hal::gpio::Input;
use log::debug;
use neutrino_core::EdgeDebouncer;

/// Last level seen by the edge task; true while the switch is closed.
static SWITCH_CLOSED: AtomicBool = AtomicBool::new(false);

/// Raised when a debounced edge arrives.
pub static WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[embassy_executor::task]
pub async fn proximity_task(mut pin: Input<'static>, debouncer: &'static EdgeDebouncer) {
    SWITCH_CLOSED.store(pin.is_low(), Ordering::Relaxed);

    loop {
        pin.wait_for_any_edge().await;
        SWITCH_CLOSED.store(pin.is_low(), Ordering::Relaxed);

        if debouncer.record_edge(Instant::now()) {
            debug!("Proximity edge accepted");
            WAKE.signal(());
        }
    }
}

/// The switch level as the node cycle reads it. Low means closed, as on the pin.
pub struct ProximityLevel;

impl ErrorType for ProximityLevel {
    type Error = Infallible;
}

impl InputPin for ProximityLevel {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!SWITCH_CLOSED.load(Ordering::Relaxed))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(SWITCH_CLOSED.load(Ordering::Relaxed))
    }
}
