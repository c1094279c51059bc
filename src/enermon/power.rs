use ndarray::{Array1, ArrayView1};

/*
* @brief Shift the voltage samples to line up with the current samples.
* @param voltage Voltage signal without offset
* @param phase_correction 1.0 leaves the signal untouched, above 1.0 moves it forward in time
* @return Voltage interpolated (or extrapolated) between consecutive samples
* @note The first sample has no predecessor and is kept as is.
*/
pub fn phase_shift_voltage(voltage: ArrayView1<f64>, phase_correction: f64) -> Array1<f64> {
    let mut shifted = voltage.to_owned();

    for n in 1..voltage.len() {
        let last = voltage[n - 1];
        shifted[n] = last + phase_correction * (voltage[n] - last);
    }

    shifted
}

/*
* @brief Calculate the real power from paired voltage and current samples.
* @param voltage Voltage signal without offset, in counts
* @param current Current signal without offset, in counts
* @param phase_correction Voltage phase correction factor
* @param voltage_ratio Mains volts per count
* @param current_ratio Amps per count
* @return Real power in watts, negative when exporting
*/
pub fn calculate_real_power(
    voltage: ArrayView1<f64>,
    current: ArrayView1<f64>,
    phase_correction: f64,
    voltage_ratio: f64,
    current_ratio: f64,
) -> f64 {
    let length = voltage.len().min(current.len());
    if length == 0 {
        return 0.0;
    }

    let shifted = phase_shift_voltage(voltage.slice(ndarray::s![..length]), phase_correction);
    let instantaneous = shifted.dot(&current.slice(ndarray::s![..length])) / length as f64;

    instantaneous * voltage_ratio * current_ratio
}

pub fn calculate_apparent_power(voltage_rms: f64, current_rms: f64) -> f64 {
    voltage_rms * current_rms
}

pub fn calculate_power_factor(apparent_power: f64, real_power: f64) -> f64 {
    if apparent_power != 0.0 {
        (real_power / apparent_power).clamp(-1.0, 1.0)
    } else {
        // cannot calculate power factor
        0.0
    }
}

/*
* @brief Phase angle between current and voltage from the power factor.
* @param power_factor Power factor in [-1, 1]
* @return Angle in degrees
*/
pub fn phase_angle_from_power_factor(power_factor: f64) -> f64 {
    power_factor.clamp(-1.0, 1.0).acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn wave(amplitude: f64, phase: f64, len: usize) -> Array1<f64> {
        Array1::from_iter((0..len).map(|n| amplitude * (2.0 * PI * n as f64 / 100.0 + phase).sin()))
    }

    #[test]
    fn test_unity_correction_keeps_signal() {
        let v = wave(1.0, 0.0, 100);
        let shifted = phase_shift_voltage(v.view(), 1.0);
        for (a, b) in shifted.iter().zip(v.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_in_phase_power_matches_rms_product() {
        let v = wave(100.0, 0.0, 200);
        let i = wave(10.0, 0.0, 200);
        let p = calculate_real_power(v.view(), i.view(), 1.0, 2.0, 0.5);
        // (100 / sqrt2) * (10 / sqrt2) * 2.0 * 0.5
        assert_relative_eq!(p, 500.0, max_relative = 1e-9);
    }

    #[test]
    fn test_quadrature_has_no_real_power() {
        let v = wave(100.0, 0.0, 200);
        let i = wave(10.0, PI / 2.0, 200);
        assert!(calculate_real_power(v.view(), i.view(), 1.0, 1.0, 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reversed_current_is_negative() {
        let v = wave(100.0, 0.0, 200);
        let i = wave(10.0, PI, 200);
        assert!(calculate_real_power(v.view(), i.view(), 1.0, 1.0, 1.0) < 0.0);
    }

    #[test]
    fn test_power_factor_is_clamped() {
        assert_eq!(calculate_power_factor(100.0, 101.0), 1.0);
        assert_eq!(calculate_power_factor(100.0, -150.0), -1.0);
        assert_eq!(calculate_power_factor(0.0, 10.0), 0.0);
        assert_relative_eq!(phase_angle_from_power_factor(0.5), 60.0, max_relative = 1e-12);
    }
}
