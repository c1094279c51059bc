use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Best-effort radio diagnostic published next to the measurements.
pub trait SignalStrength {
    /// Received signal strength in dBm, `None` when not connected.
    fn rssi_dbm(&mut self) -> Option<f64>;
}

/// Device without a radio.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignal;

impl SignalStrength for NoSignal {
    fn rssi_dbm(&mut self) -> Option<f64> {
        None
    }
}

/// Radio reporting a level that wanders around a base value.
pub struct SimulatedRadio {
    base_dbm: f64,
    jitter_db: f64,
    rng: StdRng,
}

impl SimulatedRadio {
    pub fn new(base_dbm: f64, jitter_db: f64, seed: u64) -> Self {
        Self {
            base_dbm,
            jitter_db,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SignalStrength for SimulatedRadio {
    fn rssi_dbm(&mut self) -> Option<f64> {
        let jitter = if self.jitter_db > 0.0 {
            self.rng.gen_range(-self.jitter_db..=self.jitter_db)
        } else {
            0.0
        };
        // RSSI is reported in whole dB
        Some((self.base_dbm + jitter).round())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_radio_stays_near_base() {
        let mut radio = SimulatedRadio::new(-67.0, 3.0, 42);
        for _ in 0..100 {
            let dbm = radio.rssi_dbm().unwrap();
            assert!((-70.0..=-64.0).contains(&dbm));
            assert_eq!(dbm, dbm.round());
        }
        assert_eq!(NoSignal.rssi_dbm(), None);
    }
}
