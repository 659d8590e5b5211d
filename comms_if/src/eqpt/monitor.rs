//! # System monitoring equipment
//!
//! Battery voltage monitoring and the operator enable switch.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Full scale of the battery monitor ADC, in counts.
pub const BATT_ADC_FULL_SCALE: f64 = 4096.0;

/// Voltage at the ADC input corresponding to full scale.
pub const BATT_ADC_REF_V: f64 = 14.0;

/// Low side resistor of the battery voltage divider.
pub const BATT_DIVIDER_R1_OHM: f64 = 3260.0;

/// High side resistor of the battery voltage divider.
pub const BATT_DIVIDER_R2_OHM: f64 = 10960.0;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Battery voltage monitor.
pub trait BatteryMonitor {
    /// Bring up the monitor.
    fn init(&mut self) -> Result<(), EqptError>;

    /// Start a conversion.
    fn start_read(&mut self) -> Result<(), EqptError>;

    /// Take the result of the last conversion once it has completed.
    ///
    /// Units: volts
    fn poll_voltage(&mut self) -> Option<f64>;
}

/// The operator's enable/disable push button.
pub trait EnableSwitch {
    /// Returns true while the switch is pressed.
    fn is_pressed(&mut self) -> bool;
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert a raw battery monitor ADC count into the battery voltage.
pub fn batt_adc_to_voltage(counts: u16) -> f64 {
    counts as f64 * (BATT_ADC_REF_V / BATT_ADC_FULL_SCALE)
        * (BATT_DIVIDER_R1_OHM + BATT_DIVIDER_R2_OHM) / BATT_DIVIDER_R1_OHM
}

/// Convert a battery voltage into the raw ADC count the monitor would read.
pub fn batt_voltage_to_adc(voltage: f64) -> u16 {
    let counts = voltage * BATT_DIVIDER_R1_OHM / (BATT_DIVIDER_R1_OHM + BATT_DIVIDER_R2_OHM)
        / (BATT_ADC_REF_V / BATT_ADC_FULL_SCALE);

    counts.round().max(0.0).min(u16::MAX as f64) as u16
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_batt_conversion() {
        assert_eq!(batt_adc_to_voltage(0), 0.0);

        // Half of full scale
        let v = batt_adc_to_voltage(2048);
        assert!((v - 7.0 * 14220.0 / 3260.0).abs() < 1e-9);

        let counts = batt_voltage_to_adc(12.6);
        assert!((batt_adc_to_voltage(counts) - 12.6).abs() < 0.02);
    }
}
