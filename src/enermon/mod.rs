pub mod adc;
pub mod calibrate;
pub mod config;
pub mod energy;
pub mod engine;
pub mod error;
pub mod generate_signal;
pub mod power;
pub mod print;
pub mod rssi;
pub mod sensor;
pub mod signal;
pub mod types;

pub use adc::{AnalogInput, SimulatedAdc};
pub use config::{ChannelConfig, EnermonConfig, VoltageConfig};
pub use energy::{EnergyAccumulator, EnergyWindow, EnergyWindowKind};
pub use engine::{PassSummary, SamplingEngine};
pub use error::{EnermonError, Result};
pub use generate_signal::Waveform;
pub use rssi::{NoSignal, SignalStrength, SimulatedRadio};
pub use sensor::{ChannelSensorNames, ChannelSensors, DeviceSensorNames, DeviceSensors, Sensor};
pub use types::*;
