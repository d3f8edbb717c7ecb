//! Bosch BMP180 barometer over async I2C.
//!
//! The chip reports uncompensated values; the integer compensation from the
//! datasheet turns them into 0.1 °C and pascals using the factory
//! calibration block, which is read once on first use.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, error};

use super::{BarometerReadings, Sensor, SensorError};

// =============================================================================
// I2C Address and Registers
// =============================================================================

/// BMP180 I2C address
pub const I2C_ADDR: u8 = 0x77;

/// First byte of the 22-byte calibration block
pub const ADDR_CALIBRATION: u8 = 0xAA;
pub const ADDR_CHIP_ID: u8 = 0xD0;
pub const ADDR_CTRL_MEAS: u8 = 0xF4;
pub const ADDR_OUT_MSB: u8 = 0xF6;

pub const CHIP_ID: u8 = 0x55;

const CMD_TEMPERATURE: u8 = 0x2E;
const CMD_PRESSURE: u8 = 0x34;

const TEMPERATURE_CONVERSION_US: u32 = 4_500;
const CALIBRATION_LEN: usize = 22;

const SENSOR: &str = "BMP180";

/// Pressure oversampling setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Oversampling {
    UltraLowPower = 0,
    Standard = 1,
    HighResolution = 2,
    UltraHighResolution = 3,
}

impl Oversampling {
    /// Maximum conversion time for a pressure measurement.
    pub const fn conversion_time_us(self) -> u32 {
        match self {
            Self::UltraLowPower => 4_500,
            Self::Standard => 7_500,
            Self::HighResolution => 13_500,
            Self::UltraHighResolution => 25_500,
        }
    }

    const fn oss(self) -> u8 {
        self as u8
    }
}

/// Factory calibration coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Calibration {
    /// Parse the big-endian calibration block starting at 0xAA.
    pub fn from_bytes(bytes: &[u8; CALIBRATION_LEN]) -> Self {
        let word = |i: usize| [bytes[2 * i], bytes[2 * i + 1]];
        Self {
            ac1: i16::from_be_bytes(word(0)),
            ac2: i16::from_be_bytes(word(1)),
            ac3: i16::from_be_bytes(word(2)),
            ac4: u16::from_be_bytes(word(3)),
            ac5: u16::from_be_bytes(word(4)),
            ac6: u16::from_be_bytes(word(5)),
            b1: i16::from_be_bytes(word(6)),
            b2: i16::from_be_bytes(word(7)),
            mb: i16::from_be_bytes(word(8)),
            mc: i16::from_be_bytes(word(9)),
            md: i16::from_be_bytes(word(10)),
        }
    }

    /// An all-zero or all-one word means the block was not read correctly.
    pub fn is_valid(&self) -> bool {
        let words = [
            self.ac1 as u16,
            self.ac2 as u16,
            self.ac3 as u16,
            self.ac4,
            self.ac5,
            self.ac6,
            self.b1 as u16,
            self.b2 as u16,
            self.mb as u16,
            self.mc as u16,
            self.md as u16,
        ];
        words.iter().all(|&w| w != 0x0000 && w != 0xFFFF)
    }

    /// B5 term shared by the temperature and pressure compensation.
    ///
    /// `None` when the raw value lands on the zero of the datasheet's divisor.
    fn b5(&self, ut: i32) -> Option<i64> {
        let x1 = ((i64::from(ut) - i64::from(self.ac6)) * i64::from(self.ac5)) >> 15;
        let x2 = (i64::from(self.mc) << 11).checked_div(x1 + i64::from(self.md))?;
        Some(x1 + x2)
    }

    /// Compensated temperature in 0.1 °C, or `None` for a raw value the
    /// calibration cannot compensate.
    pub fn temperature_deci_celsius(&self, ut: i32) -> Option<i32> {
        i32::try_from((self.b5(ut)? + 8) >> 4).ok()
    }

    /// Compensated pressure in pascals, or `None` for raw values the
    /// calibration cannot compensate.
    pub fn pressure_pascals(&self, ut: i32, up: i32, oversampling: Oversampling) -> Option<i32> {
        let oss = oversampling.oss();
        let b6 = self.b5(ut)? - 4000;
        let b6_squared = b6.checked_mul(b6)? >> 12;

        let x1 = i64::from(self.b2).checked_mul(b6_squared)? >> 11;
        let x2 = (i64::from(self.ac2) * b6) >> 11;
        let x3 = x1 + x2;
        let b3 = (((i64::from(self.ac1) * 4 + x3) << oss) + 2) / 4;

        let x1 = (i64::from(self.ac3) * b6) >> 13;
        let x2 = i64::from(self.b1).checked_mul(b6_squared)? >> 16;
        let x3 = ((x1 + x2) + 2) >> 2;
        let b4 = (i64::from(self.ac4) * (x3 + 32768)) >> 15;
        if b4 <= 0 || i64::from(up) < b3 {
            return None;
        }
        let b7 = (i64::from(up) - b3) * i64::from(50_000u32 >> oss);

        let p = if b7 < 0x8000_0000 {
            (b7 * 2) / b4
        } else {
            (b7 / b4) * 2
        };
        let p = i64::from(i32::try_from(p).ok()?);

        let x1 = (p >> 8) * (p >> 8);
        let x1 = (x1 * 3038) >> 16;
        let x2 = (-7357 * p) >> 16;
        i32::try_from(p + ((x1 + x2 + 3791) >> 4)).ok()
    }
}

pub struct BMP180Sensor<I, D> {
    i2c: I,
    delay: D,
    oversampling: Oversampling,
    calibration: Option<Calibration>,
}

impl<I: I2c, D: DelayNs> BMP180Sensor<I, D> {
    pub fn new(i2c: I, delay: D, oversampling: Oversampling) -> Self {
        Self {
            i2c,
            delay,
            oversampling,
            calibration: None,
        }
    }

    /// Check the chip id and read the calibration block.
    async fn initialize(&mut self) -> Result<Calibration, SensorError> {
        let mut id = [0u8; 1];
        self.i2c
            .write_read(I2C_ADDR, &[ADDR_CHIP_ID], &mut id)
            .await
            .map_err(|e| {
                error!("BMP180 chip id read failed: {:?}", e);
                SensorError::InitializationFailed {
                    sensor: SENSOR,
                    details: "No response on I2C bus",
                }
            })?;
        if id[0] != CHIP_ID {
            error!("BMP180 unexpected chip id {:#04x}", id[0]);
            return Err(SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "Unexpected chip id",
            });
        }

        let mut block = [0u8; CALIBRATION_LEN];
        self.i2c
            .write_read(I2C_ADDR, &[ADDR_CALIBRATION], &mut block)
            .await
            .map_err(|e| {
                error!("BMP180 calibration read failed: {:?}", e);
                SensorError::InitializationFailed {
                    sensor: SENSOR,
                    details: "Failed to read calibration block",
                }
            })?;

        let calibration = Calibration::from_bytes(&block);
        if !calibration.is_valid() {
            return Err(SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "Calibration block is blank",
            });
        }
        debug!("BMP180 calibration: {:?}", calibration);
        Ok(calibration)
    }

    /// Start a conversion, wait for it and read `N` result bytes.
    async fn convert<const N: usize>(
        &mut self,
        command: u8,
        wait_us: u32,
        operation: &'static str,
    ) -> Result<[u8; N], SensorError> {
        self.i2c
            .write(I2C_ADDR, &[ADDR_CTRL_MEAS, command])
            .await
            .map_err(|e| {
                error!("BMP180 {} start failed: {:?}", operation, e);
                SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation,
                    details: "Failed to start conversion",
                }
            })?;

        self.delay.delay_us(wait_us).await;

        let mut raw = [0u8; N];
        self.i2c
            .write_read(I2C_ADDR, &[ADDR_OUT_MSB], &mut raw)
            .await
            .map_err(|e| {
                error!("BMP180 {} readout failed: {:?}", operation, e);
                SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation,
                    details: "Failed to read conversion result",
                }
            })?;
        Ok(raw)
    }
}

impl<I: I2c, D: DelayNs> Sensor for BMP180Sensor<I, D> {
    type Readings = BarometerReadings;

    async fn read(&mut self) -> Result<BarometerReadings, SensorError> {
        let calibration = match self.calibration {
            Some(calibration) => calibration,
            None => {
                let calibration = self.initialize().await?;
                self.calibration = Some(calibration);
                calibration
            }
        };

        let [msb, lsb] = self
            .convert::<2>(CMD_TEMPERATURE, TEMPERATURE_CONVERSION_US, "measure temperature")
            .await?;
        let ut = i32::from(u16::from_be_bytes([msb, lsb]));

        let oss = self.oversampling.oss();
        let [msb, lsb, xlsb] = self
            .convert::<3>(
                CMD_PRESSURE + (oss << 6),
                self.oversampling.conversion_time_us(),
                "measure pressure",
            )
            .await?;
        let up = ((i32::from(msb) << 16) | (i32::from(lsb) << 8) | i32::from(xlsb)) >> (8 - oss);

        let out_of_range = SensorError::ReadFailed {
            sensor: SENSOR,
            operation: "compensate",
            details: "raw reading outside calibration range",
        };
        let temperature = calibration
            .temperature_deci_celsius(ut)
            .and_then(|deci| i16::try_from(deci * 10).ok())
            .ok_or(out_of_range)?;
        let pressure = calibration
            .pressure_pascals(ut, up, self.oversampling)
            .ok_or(out_of_range)?;

        Ok(BarometerReadings {
            temperature_centi_celsius: temperature,
            pressure_pascals: pressure.max(0) as u32,
        })
    }
}
