//! Sensirion SHT40 climate sensor over async I2C.
//!
//! Wraps the `sht4x` driver. One high-precision measurement per read; the
//! fixed-point results are scaled to centi-degrees and basis points.

use embassy_time::Delay;
use embedded_hal_async::i2c::I2c;
use log::error;
use sht4x::{Precision, Sht4xAsync};

use super::{ClimateReadings, Sensor, SensorError};

const SENSOR: &str = "SHT40";

pub struct SHT40Sensor<I> {
    sensor: Sht4xAsync<I, Delay>,
}

impl<I: I2c> SHT40Sensor<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            sensor: Sht4xAsync::<I, Delay>::new(i2c),
        }
    }
}

/// Scale a reading to hundredths, saturating at the wire field's range.
fn hundredths(value: f32) -> i16 {
    (value * 100.0) as i16
}

impl<I: I2c> Sensor for SHT40Sensor<I> {
    type Readings = ClimateReadings;

    async fn read(&mut self) -> Result<ClimateReadings, SensorError> {
        let measurement = self
            .sensor
            .measure(Precision::High, &mut Delay)
            .await
            .map_err(|e| {
                error!("{} measurement failed: {:?}", SENSOR, e);
                SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation: "measure temperature/humidity",
                    details: "I2C communication error or sensor not responding",
                }
            })?;

        Ok(ClimateReadings {
            temperature_centi_celsius: hundredths(measurement.temperature_celsius().to_num::<f32>()),
            humidity_basis_points: hundredths(measurement.humidity_percent().to_num::<f32>()),
        })
    }
}
