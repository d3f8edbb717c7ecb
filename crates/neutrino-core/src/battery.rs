//! Battery voltage from a raw ADC conversion.
//!
//! The cell is measured through a resistive divider, so the ADC sees a
//! fraction of the supply. Integer maths only; the result is clamped to
//! the wire field's range.

/// ADC scale and divider between the battery and the ADC pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoltageDivider {
    /// Pin voltage at the maximum raw reading.
    pub full_scale_millivolts: u32,
    /// Maximum raw reading (4095 for 12 bits).
    pub max_raw: u32,
    /// Battery voltage / pin voltage, as a fraction.
    pub ratio_numerator: u32,
    pub ratio_denominator: u32,
}

impl VoltageDivider {
    /// ESP32-S3 ADC at 11 dB attenuation behind two equal resistors.
    pub const ESP32S3_HALF: Self = Self {
        full_scale_millivolts: 3_100,
        max_raw: 4_095,
        ratio_numerator: 2,
        ratio_denominator: 1,
    };

    pub const fn millivolts(&self, raw: u16) -> u16 {
        let pin = (raw as u32) * self.full_scale_millivolts / self.max_raw;
        let battery = pin * self.ratio_numerator / self.ratio_denominator;
        if battery > u16::MAX as u32 {
            u16::MAX
        } else {
            battery as u16
        }
    }
}
