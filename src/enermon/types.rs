use std::time::Duration;

use super::energy::EnergyAccumulator;
use super::sensor::ChannelSensors;

pub const MAX_CHANNELS: usize = 4;

pub const ADC_MAX_COUNT: f64 = 4095.0; // 12-bit ADC full scale
pub const ADC_VREF: f64 = 3.3; // ADC reference voltage

pub const DEFAULT_CT_CALIBRATION: f64 = 1111.0;
pub const DEFAULT_VOLTAGE_CALIBRATION: f64 = 230.0;
pub const DEFAULT_VOLTAGE_PHASE: f64 = 1.7;
pub const DEFAULT_SAMPLE_COUNT: usize = 200;
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 200;
pub const DEFAULT_NOMINAL_VOLTAGE: f64 = 230.0;

/// Elapsed times above this multiple of the update interval are treated as a clock jump.
pub const MAX_ELAPSED_FACTOR: u32 = 10;

/// Conversion from raw ADC counts to volts at the ADC pin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcScale {
    pub vref: f64,      // Reference voltage of the converter
    pub max_count: f64, // Count returned at full scale
}

impl AdcScale {
    pub fn volts_per_count(&self) -> f64 {
        self.vref / self.max_count
    }
}

impl Default for AdcScale {
    fn default() -> Self {
        Self {
            vref: ADC_VREF,
            max_count: ADC_MAX_COUNT,
        }
    }
}

/// Mains voltage reference shared by every channel.
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageReference {
    pub pin: i32,              // Analog pin, 0 or negative when no voltage sensor is wired
    pub calibration: f64,      // Volts of mains per volt at the ADC pin
    pub phase_correction: f64, // Interpolation factor between consecutive voltage samples
    pub sample_count: usize,   // Sample pairs acquired per channel and pass
}

impl VoltageReference {
    pub fn is_configured(&self) -> bool {
        self.pin > 0
    }
}

impl Default for VoltageReference {
    fn default() -> Self {
        Self {
            pin: -1,
            calibration: DEFAULT_VOLTAGE_CALIBRATION,
            phase_correction: DEFAULT_VOLTAGE_PHASE,
            sample_count: DEFAULT_SAMPLE_COUNT,
        }
    }
}

/// Raw samples of the last successful acquisition of a channel.
///
/// When the voltage is measured, `voltage[n]` was read right before `current[n]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBuffer {
    pub voltage: Vec<i32>,
    pub current: Vec<i32>,
}

impl SampleBuffer {
    pub fn with_capacity(samples: usize) -> Self {
        Self {
            voltage: Vec::with_capacity(samples),
            current: Vec::with_capacity(samples),
        }
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

/// Values derived from one channel acquisition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelMeasurement {
    pub current_rms: f64,    // A
    pub voltage_rms: f64,    // V, nominal voltage when no voltage sensor is wired
    pub real_power: f64,     // W, negative when exporting
    pub apparent_power: f64, // VA
    pub power_factor: f64,   // cos(phi), clamped to [-1, 1]
}

/// One current transformer input.
#[derive(Debug, Clone)]
pub struct Channel {
    pub index: usize,
    pub pin: i32,         // Analog pin, 0 or negative disables the channel
    pub calibration: f64, // Amps per volt at the ADC pin
    pub name: String,     // Base name of the channel sensors
    pub buffer: SampleBuffer,
    pub sensors: ChannelSensors,
    pub energy: EnergyAccumulator,
    pub last_measurement: Option<ChannelMeasurement>,
}

impl Channel {
    pub fn new(index: usize, pin: i32, calibration: f64, name: String, sensors: ChannelSensors) -> Self {
        Self {
            index,
            pin,
            calibration,
            name,
            buffer: SampleBuffer::default(),
            sensors,
            energy: EnergyAccumulator::default(),
            last_measurement: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pin > 0
    }

    pub fn has_valid_calibration(&self) -> bool {
        self.calibration.is_finite() && self.calibration > 0.0
    }
}

/// Default base name of a channel when the configuration does not name it.
pub fn default_channel_name(index: usize) -> String {
    format!("CT{}", index)
}

/// Engine wide settings that do not belong to a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub update_interval: Duration, // Nominal period between two ticks
    pub nominal_voltage: f64,      // Used for power when the voltage is not measured
    pub adc: AdcScale,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_millis(DEFAULT_UPDATE_INTERVAL_MS),
            nominal_voltage: DEFAULT_NOMINAL_VOLTAGE,
            adc: AdcScale::default(),
        }
    }
}
