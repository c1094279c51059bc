use std::{fs, path::Path};

use super::error::{EnermonError, Result};
use super::signal::{calculate_rms, remove_offset, whole_cycle_range};
use super::types::AdcScale;

/// Linear search range for a calibration factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSweep {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    pub tolerance: f64, // Accepted distance to the target, in output units
}

impl Default for CalibrationSweep {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 100000.0,
            step: 0.1,
            tolerance: 0.10,
        }
    }
}

/*
* @brief RMS of a capture at the ADC pin, in volts.
* @param raw Raw ADC counts, offset included
* @param scale ADC conversion
*/
pub fn pin_rms_volts(raw: &[i32], scale: &AdcScale) -> f64 {
    let centred = remove_offset(raw);
    let range = whole_cycle_range(centred.view());
    let cropped = remove_offset(&raw[range]);
    calculate_rms(cropped.view()) * scale.volts_per_count()
}

/*
* @brief Closed form calibration: reference reading over RMS at the pin.
* @param raw Raw ADC counts
* @param target Reading of a reference meter (V or A)
* @param scale ADC conversion
* @return Calibration factor
*/
pub fn estimate_calibration(raw: &[i32], target: f64, scale: &AdcScale) -> Result<f64> {
    let rms = pin_rms_volts(raw, scale);
    if rms <= 0.0 {
        return Err(EnermonError::Capture("capture has no AC component".to_string()));
    }
    Ok(target / rms)
}

/*
* @brief Step the calibration factor until the RMS reading matches a reference.
* @param raw Raw ADC counts
* @param target Reading of a reference meter (V or A)
* @param scale ADC conversion
* @param sweep Search range and tolerance
* @return First factor within tolerance of the target
*/
pub fn find_calibration(raw: &[i32], target: f64, scale: &AdcScale, sweep: &CalibrationSweep) -> Result<f64> {
    let rms = pin_rms_volts(raw, scale);
    let not_found = EnermonError::CalibrationNotFound {
        start: sweep.start,
        stop: sweep.stop,
        target,
    };

    if sweep.step <= 0.0 || rms <= 0.0 {
        return Err(not_found);
    }

    let steps = ((sweep.stop - sweep.start) / sweep.step).floor() as u64;
    for k in 0..=steps {
        let calibration = sweep.start + k as f64 * sweep.step;
        let measured = rms * calibration;
        if (measured - target).abs() <= sweep.tolerance {
            log::debug!("Calibration {:.2} gives {:.3} (target {:.3})", calibration, measured, target);
            return Ok(calibration);
        }
        if measured > target + sweep.tolerance {
            break;
        }
    }

    Err(not_found)
}

/*
* @brief Read raw ADC counts captured to a text file.
* @param path File with counts separated by commas or whitespace
*/
pub fn load_capture(path: impl AsRef<Path>) -> Result<Vec<i32>> {
    let content = fs::read_to_string(path)?;
    parse_capture(&content)
}

pub fn parse_capture(content: &str) -> Result<Vec<i32>> {
    let samples = content
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<i32>()
                .map_err(|e| EnermonError::Capture(format!("'{}': {}", token, e)))
        })
        .collect::<Result<Vec<i32>>>()?;

    if samples.len() < 2 {
        return Err(EnermonError::Capture("at least two samples are needed".to_string()));
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enermon::generate_signal::{generate_samples, Waveform};
    use approx::assert_relative_eq;

    fn capture(voltage_rms: f64, calibration: f64) -> Vec<i32> {
        let scale = AdcScale::default();
        let wave = Waveform::for_voltage(voltage_rms, calibration, &scale);
        generate_samples(&wave, 1000, 5000.0, 0.0, 1, &scale)
    }

    #[test]
    fn test_estimate_recovers_calibration() {
        let raw = capture(230.0, 250.0);
        let estimate = estimate_calibration(&raw, 230.0, &AdcScale::default()).unwrap();
        assert_relative_eq!(estimate, 250.0, max_relative = 2e-3);
    }

    #[test]
    fn test_sweep_lands_within_tolerance() {
        let scale = AdcScale::default();
        let raw = capture(222.5, 300.0);
        let calibration = find_calibration(&raw, 222.5, &scale, &CalibrationSweep::default()).unwrap();

        assert!((pin_rms_volts(&raw, &scale) * calibration - 222.5).abs() <= 0.10);
        assert_relative_eq!(calibration, 300.0, max_relative = 2e-3);
    }

    #[test]
    fn test_sweep_out_of_range() {
        let raw = capture(230.0, 250.0);
        let sweep = CalibrationSweep {
            stop: 100.0,
            ..Default::default()
        };
        let err = find_calibration(&raw, 230.0, &AdcScale::default(), &sweep).unwrap_err();
        assert!(matches!(err, EnermonError::CalibrationNotFound { .. }));
    }

    #[test]
    fn test_flat_capture_cannot_be_calibrated() {
        assert!(estimate_calibration(&[2048; 64], 230.0, &AdcScale::default()).is_err());
    }

    #[test]
    fn test_parse_capture() {
        assert_eq!(parse_capture("2048, 2100,\n1990 2048").unwrap(), vec![2048, 2100, 1990, 2048]);
        assert!(matches!(parse_capture("2048, abc"), Err(EnermonError::Capture(_))));
        assert!(parse_capture("2048").is_err());
    }
}
