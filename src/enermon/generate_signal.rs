use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::{PI, SQRT_2};

use super::types::AdcScale;

pub const MAINS_FREQUENCY: f64 = 50.0;
pub const ADC_MIDPOINT: f64 = 2048.0; // CT and voltage inputs are biased to half the supply

/// Sine wave as seen by the ADC, in counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waveform {
    pub frequency: f64, // Hz
    pub amplitude: f64, // Peak, in counts
    pub phase_deg: f64, // Phase at t = 0
    pub offset: f64,    // DC bias, in counts
}

impl Waveform {
    /*
    * @brief Waveform produced by a CT carrying a given RMS current.
    * @param current_rms RMS current in the conductor (A)
    * @param calibration Amps per volt at the ADC pin
    * @param scale ADC conversion
    */
    pub fn for_current(current_rms: f64, calibration: f64, scale: &AdcScale) -> Self {
        Self {
            frequency: MAINS_FREQUENCY,
            amplitude: current_rms * SQRT_2 / (calibration * scale.volts_per_count()),
            phase_deg: 0.0,
            offset: ADC_MIDPOINT,
        }
    }

    /*
    * @brief Waveform produced by the voltage divider for a given RMS mains voltage.
    * @param voltage_rms RMS mains voltage (V)
    * @param calibration Mains volts per volt at the ADC pin
    * @param scale ADC conversion
    */
    pub fn for_voltage(voltage_rms: f64, calibration: f64, scale: &AdcScale) -> Self {
        Self::for_current(voltage_rms, calibration, scale)
    }

    pub fn with_phase(mut self, phase_deg: f64) -> Self {
        self.phase_deg = phase_deg;
        self
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Value at time `t` (seconds), before quantisation.
    pub fn sample_at(&self, t: f64) -> f64 {
        self.offset + self.amplitude * (2.0 * PI * self.frequency * t + self.phase_deg.to_radians()).sin()
    }
}

/// Clamps to the converter range and rounds to whole counts.
pub fn quantize(value: f64, scale: &AdcScale) -> u16 {
    value.clamp(0.0, scale.max_count).round() as u16
}

/*
* @brief Generate a buffer of ADC samples.
* @param waveform Signal to sample
* @param num_samples Number of samples
* @param sample_rate Samples per second
* @param noise_counts Peak of the uniform noise added to each sample
* @param seed Seed of the noise generator
* @return Quantised samples
*/
pub fn generate_samples(
    waveform: &Waveform,
    num_samples: usize,
    sample_rate: f64,
    noise_counts: f64,
    seed: u64,
    scale: &AdcScale,
) -> Vec<i32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let times = Array1::range(0.0, num_samples as f64, 1.0) / sample_rate;

    times
        .iter()
        .map(|&t| {
            let noise = if noise_counts > 0.0 {
                rng.gen_range(-noise_counts..noise_counts)
            } else {
                0.0
            };
            quantize(waveform.sample_at(t) + noise, scale) as i32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_waveform_amplitude() {
        let scale = AdcScale::default();
        let wave = Waveform::for_current(10.0, 30.0, &scale);
        // 10 A rms on a 30 A/V CT is 0.4714 V peak at the pin
        let expected_peak_volts = 10.0 * SQRT_2 / 30.0;
        assert!((wave.amplitude * scale.volts_per_count() - expected_peak_volts).abs() < 1e-12);
    }

    #[test]
    fn test_generated_samples_stay_in_range() {
        let scale = AdcScale::default();
        let wave = Waveform {
            frequency: 50.0,
            amplitude: 3000.0,
            phase_deg: 0.0,
            offset: ADC_MIDPOINT,
        };
        let samples = generate_samples(&wave, 400, 5000.0, 20.0, 7, &scale);
        assert_eq!(samples.len(), 400);
        assert!(samples.iter().all(|&s| (0..=4095).contains(&s)));
        assert_eq!(*samples.iter().max().unwrap(), 4095);
        assert_eq!(*samples.iter().min().unwrap(), 0);
    }
}
