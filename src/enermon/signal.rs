use std::ops::Range;

use ndarray::{Array1, ArrayView1};

const ZERO_CROSSING_DEBOUNCE: usize = 5; // Samples ignored after a crossing

/*
* @brief Remove the DC offset from a buffer of raw samples.
* @param samples Raw ADC counts
* @return Samples centred around zero
* @note The offset is the mean of the buffer, which matches the bias point over whole cycles.
*/
pub fn remove_offset(samples: &[i32]) -> Array1<f64> {
    let signal: Array1<f64> = samples.iter().map(|&s| s as f64).collect();
    match signal.mean() {
        Some(offset) => signal - offset,
        None => signal,
    }
}

/*
* @brief Find the rising zero crossings of a centred signal.
* @param signal Signal without offset
* @return Index of the last negative sample before each crossing
*/
pub fn find_rising_zero_crossings(signal: ArrayView1<f64>) -> Vec<usize> {
    let mut crossings = Vec::new();
    let mut debounce: usize = 0;

    for p in 0..signal.len().saturating_sub(1) {
        if debounce == 0 && signal[p] < 0.0 && signal[p + 1] >= 0.0 {
            crossings.push(p);
            debounce = ZERO_CROSSING_DEBOUNCE;
        }

        if debounce > 0 {
            debounce -= 1;
        }
    }

    crossings
}

/*
* @brief Limit a buffer to whole cycles of the signal.
* @param signal Signal without offset
* @return Range between the first and the last rising crossing
* @note Falls back to the whole buffer when fewer than two crossings exist.
*/
pub fn whole_cycle_range(signal: ArrayView1<f64>) -> Range<usize> {
    let crossings = find_rising_zero_crossings(signal);

    match (crossings.first(), crossings.last()) {
        (Some(&first), Some(&last)) if last > first => (first + 1)..(last + 1),
        _ => 0..signal.len(),
    }
}

pub fn calculate_rms(signal: ArrayView1<f64>) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }

    let mean_square = signal.dot(&signal) / signal.len() as f64;

    if mean_square > 0.0 {
        mean_square.sqrt()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{PI, SQRT_2};

    fn sine(amplitude: f64, offset: f64, samples_per_cycle: f64, len: usize) -> Vec<i32> {
        (0..len)
            .map(|n| (offset + amplitude * (2.0 * PI * n as f64 / samples_per_cycle).sin()).round() as i32)
            .collect()
    }

    #[test]
    fn test_remove_offset_centres_signal() {
        let centred = remove_offset(&[2040, 2050, 2060, 2050]);
        assert_relative_eq!(centred.sum(), 0.0);
        assert_relative_eq!(centred[0], -10.0);
    }

    #[test]
    fn test_remove_offset_empty() {
        assert!(remove_offset(&[]).is_empty());
    }

    #[test]
    fn test_rms_of_sine_over_whole_cycles() {
        let raw = sine(1000.0, 2048.0, 100.0, 250);
        let centred = remove_offset(&raw);
        let range = whole_cycle_range(centred.view());

        assert_eq!(range.len() % 100, 0);
        let cropped = remove_offset(&raw[range]);
        assert_relative_eq!(calculate_rms(cropped.view()), 1000.0 / SQRT_2, max_relative = 1e-3);
    }

    #[test]
    fn test_crossings_are_debounced() {
        let signal = Array1::from(vec![-1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0]);
        assert_eq!(find_rising_zero_crossings(signal.view()), vec![0, 6]);
    }

    #[test]
    fn test_flat_signal_uses_whole_buffer() {
        let centred = remove_offset(&[2048; 16]);
        assert_eq!(whole_cycle_range(centred.view()), 0..16);
        assert_eq!(calculate_rms(centred.view()), 0.0);
    }
}
