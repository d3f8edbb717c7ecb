//! Environmental sensors and the per-cycle reading.
//!
//! A node has up to two sensors on its I2C bus: a climate sensor
//! (temperature and humidity) and a barometer (temperature and pressure).
//! Either may be missing or fail on a given cycle; [`Sampler`] folds whatever
//! is available into one [`EnvironmentReading`], defaulting absent values to
//! zero.

#[cfg(feature = "sensor-bmp180")]
pub mod bmp180;
#[cfg(feature = "sensor-sht40")]
pub mod sht40;

#[cfg(feature = "sensor-bmp180")]
pub use bmp180::BMP180Sensor;
#[cfg(feature = "sensor-sht40")]
pub use sht40::SHT40Sensor;

use core::marker::PhantomData;

use log::{debug, warn};
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: initialization failed ({details})")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: {operation} timed out")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
}

/// Trait for sensors that produce typed readings.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Readings;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> impl Future<Output = Result<Self::Readings, SensorError>>;
}

/// Readings from the climate sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClimateReadings {
    pub temperature_centi_celsius: i16,
    pub humidity_basis_points: i16,
}

/// Readings from the barometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarometerReadings {
    pub temperature_centi_celsius: i16,
    pub pressure_pascals: u32,
}

/// Environmental part of a telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvironmentReading {
    pub temperature_centi_celsius: i16,
    pub humidity_basis_points: i16,
    pub pressure_decapascals: u16,
}

impl EnvironmentReading {
    /// Combine whatever the sensors produced this cycle.
    ///
    /// Temperature comes from the climate sensor and falls back to the
    /// barometer. Anything with no source stays zero.
    pub fn combine(climate: Option<ClimateReadings>, barometer: Option<BarometerReadings>) -> Self {
        let mut reading = Self::default();

        if let Some(climate) = climate {
            reading.temperature_centi_celsius = climate.temperature_centi_celsius;
            reading.humidity_basis_points = climate.humidity_basis_points;
        }

        if let Some(barometer) = barometer {
            if climate.is_none() {
                reading.temperature_centi_celsius = barometer.temperature_centi_celsius;
            }
            reading.pressure_decapascals =
                u16::try_from(barometer.pressure_pascals / 10).unwrap_or(u16::MAX);
        }

        reading
    }
}

/// Everything a telemetry record carries apart from the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorReading {
    pub proximity: bool,
    pub temperature_centi_celsius: i16,
    pub humidity_basis_points: i16,
    pub pressure_decapascals: u16,
    pub battery_millivolts: u16,
}

impl SensorReading {
    pub const fn new(environment: EnvironmentReading, proximity: bool, battery_millivolts: u16) -> Self {
        Self {
            proximity,
            temperature_centi_celsius: environment.temperature_centi_celsius,
            humidity_basis_points: environment.humidity_basis_points,
            pressure_decapascals: environment.pressure_decapascals,
            battery_millivolts,
        }
    }
}

/// Placeholder for a sensor the board variant does not carry.
///
/// Only useful as the type parameter of a `None` slot in [`Sampler`].
pub struct Unfitted<R>(PhantomData<R>);

impl<R> Sensor for Unfitted<R> {
    type Readings = R;

    async fn read(&mut self) -> Result<R, SensorError> {
        Err(SensorError::InitializationFailed {
            sensor: "unfitted",
            details: "sensor not fitted on this board",
        })
    }
}

/// The node's sensor set. Either sensor may be absent from the board.
pub struct Sampler<C, B> {
    climate: Option<C>,
    barometer: Option<B>,
}

impl<C, B> Sampler<C, B>
where
    C: Sensor<Readings = ClimateReadings>,
    B: Sensor<Readings = BarometerReadings>,
{
    pub const fn new(climate: Option<C>, barometer: Option<B>) -> Self {
        Self { climate, barometer }
    }

    /// Read every present sensor. Failures are logged and treated as absent.
    pub async fn sample(&mut self) -> EnvironmentReading {
        let climate = match self.climate.as_mut() {
            Some(sensor) => sensor
                .read()
                .await
                .inspect_err(|e| warn!("Climate sensor unavailable: {}", e))
                .ok(),
            None => None,
        };

        let barometer = match self.barometer.as_mut() {
            Some(sensor) => sensor
                .read()
                .await
                .inspect_err(|e| warn!("Barometer unavailable: {}", e))
                .ok(),
            None => None,
        };

        if climate.is_none() && barometer.is_some() {
            debug!("Using barometer temperature");
        }

        EnvironmentReading::combine(climate, barometer)
    }
}

#[cfg(test)]
impl<C, B> Sampler<C, B> {
    pub(crate) fn sensors(&self) -> (Option<&C>, Option<&B>) {
        (self.climate.as_ref(), self.barometer.as_ref())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embassy_futures::block_on;

    /// Sensor returning a fixed result and counting reads.
    pub(crate) struct FixedSensor<R> {
        pub result: Result<R, SensorError>,
        pub reads: usize,
    }

    impl<R> FixedSensor<R> {
        pub fn ok(readings: R) -> Self {
            Self {
                result: Ok(readings),
                reads: 0,
            }
        }

        pub fn failing(sensor: &'static str) -> Self {
            Self {
                result: Err(SensorError::ReadFailed {
                    sensor,
                    operation: "measure",
                    details: "no acknowledge",
                }),
                reads: 0,
            }
        }
    }

    impl<R: Copy> Sensor for FixedSensor<R> {
        type Readings = R;

        async fn read(&mut self) -> Result<R, SensorError> {
            self.reads += 1;
            self.result
        }
    }

    const CLIMATE: ClimateReadings = ClimateReadings {
        temperature_centi_celsius: 2150,
        humidity_basis_points: 4500,
    };

    const BAROMETER: BarometerReadings = BarometerReadings {
        temperature_centi_celsius: 2075,
        pressure_pascals: 101_325,
    };

    #[test]
    fn test_combine_both_sensors() {
        let reading = EnvironmentReading::combine(Some(CLIMATE), Some(BAROMETER));
        assert_eq!(reading.temperature_centi_celsius, 2150);
        assert_eq!(reading.humidity_basis_points, 4500);
        assert_eq!(reading.pressure_decapascals, 10132);
    }

    #[test]
    fn test_combine_falls_back_to_barometer_temperature() {
        let reading = EnvironmentReading::combine(None, Some(BAROMETER));
        assert_eq!(reading.temperature_centi_celsius, 2075);
        assert_eq!(reading.humidity_basis_points, 0);
        assert_eq!(reading.pressure_decapascals, 10132);
    }

    #[test]
    fn test_combine_without_barometer() {
        let reading = EnvironmentReading::combine(Some(CLIMATE), None);
        assert_eq!(reading.temperature_centi_celsius, 2150);
        assert_eq!(reading.pressure_decapascals, 0);
    }

    #[test]
    fn test_combine_nothing_is_zero() {
        assert_eq!(EnvironmentReading::combine(None, None), EnvironmentReading::default());
    }

    #[test]
    fn test_sampler_treats_failure_as_absent() {
        let mut sampler = Sampler::new(
            Some(FixedSensor::<ClimateReadings>::failing("SHT40")),
            Some(FixedSensor::ok(BAROMETER)),
        );
        let reading = block_on(sampler.sample());
        assert_eq!(reading.temperature_centi_celsius, 2075);
        assert_eq!(reading.pressure_decapascals, 10132);
    }

    #[test]
    fn test_sampler_without_sensors() {
        let mut sampler: Sampler<Unfitted<ClimateReadings>, Unfitted<BarometerReadings>> =
            Sampler::new(None, None);
        assert_eq!(block_on(sampler.sample()), EnvironmentReading::default());
    }

    #[test]
    fn test_sampler_reads_each_sensor_once() {
        let mut sampler = Sampler::new(Some(FixedSensor::ok(CLIMATE)), Some(FixedSensor::ok(BAROMETER)));
        block_on(sampler.sample());
        assert_eq!(sampler.climate.as_ref().map(|s| s.reads), Some(1));
        assert_eq!(sampler.barometer.as_ref().map(|s| s.reads), Some(1));
    }

    #[test]
    fn test_sensor_reading_from_parts() {
        let environment = EnvironmentReading::combine(Some(CLIMATE), Some(BAROMETER));
        let reading = SensorReading::new(environment, true, 2950);
        assert!(reading.proximity);
        assert_eq!(reading.temperature_centi_celsius, 2150);
        assert_eq!(reading.battery_millivolts, 2950);
    }
}
