//! Shared async I2C bus
//!
//! The climate sensor and the barometer sit on the same two wires. Each
//! driver gets its own [`SharedI2c`] handle; every call locks the bus for
//! the whole transaction, so a register pointer write and the read that
//! follows it are never interleaved with the other sensor's traffic.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

/// The bus itself, placed in a `static` by the firmware.
pub type I2cBus<T> = Mutex<CriticalSectionRawMutex, T>;

/// One device's handle on a shared bus.
pub struct SharedI2c<'a, T> {
    bus: &'a I2cBus<T>,
}

impl<'a, T> SharedI2c<'a, T> {
    #[inline]
    pub const fn new(bus: &'a I2cBus<T>) -> Self {
        Self { bus }
    }
}

impl<T: ErrorType> ErrorType for SharedI2c<'_, T> {
    type Error = T::Error;
}

impl<T: I2c> I2c for SharedI2c<'_, T> {
    #[inline]
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.lock().await.read(address, read).await
    }

    #[inline]
    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.bus.lock().await.write(address, write).await
    }

    #[inline]
    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.bus.lock().await.write_read(address, write, read).await
    }

    #[inline]
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.bus.lock().await.transaction(address, operations).await
    }
}
