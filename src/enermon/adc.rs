use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::{EnermonError, Result};
use super::generate_signal::{quantize, Waveform, ADC_MIDPOINT};
use super::types::AdcScale;

/// Source of raw analog readings.
///
/// Reads are short and bounded; an error only affects the channel being sampled.
pub trait AnalogInput {
    fn read(&mut self, pin: i32) -> Result<u16>;
}

/// ADC fed by synthetic waveforms, one per pin.
///
/// Every read advances time by one conversion period, so interleaved reads of the
/// voltage and current pins see the same skew as a real multiplexed converter.
pub struct SimulatedAdc {
    read_rate: f64, // Conversions per second
    reads: u64,
    scale: AdcScale,
    waveforms: HashMap<i32, Waveform>,
    failing: HashSet<i32>,
    noise_counts: f64,
    rng: StdRng,
}

impl SimulatedAdc {
    pub fn new(read_rate: f64, scale: AdcScale) -> Self {
        Self {
            read_rate,
            reads: 0,
            scale,
            waveforms: HashMap::new(),
            failing: HashSet::new(),
            noise_counts: 0.0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn with_waveform(mut self, pin: i32, waveform: Waveform) -> Self {
        self.waveforms.insert(pin, waveform);
        self
    }

    pub fn with_noise(mut self, noise_counts: f64, seed: u64) -> Self {
        self.noise_counts = noise_counts;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn set_waveform(&mut self, pin: i32, waveform: Waveform) {
        self.waveforms.insert(pin, waveform);
    }

    /// Makes every read of `pin` fail until cleared.
    pub fn set_failing(&mut self, pin: i32, failing: bool) {
        if failing {
            self.failing.insert(pin);
        } else {
            self.failing.remove(&pin);
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    fn now(&self) -> f64 {
        self.reads as f64 / self.read_rate
    }
}

impl AnalogInput for SimulatedAdc {
    fn read(&mut self, pin: i32) -> Result<u16> {
        if self.failing.contains(&pin) {
            return Err(EnermonError::SampleRead {
                pin,
                reason: "conversion timed out".to_string(),
            });
        }

        let t = self.now();
        self.reads += 1;

        // Unwired inputs float at the bias point
        let value = self.waveforms.get(&pin).map_or(ADC_MIDPOINT, |w| w.sample_at(t));
        let noise = if self.noise_counts > 0.0 {
            self.rng.gen_range(-self.noise_counts..self.noise_counts)
        } else {
            0.0
        };

        Ok(quantize(value + noise, &self.scale))
    }
}
