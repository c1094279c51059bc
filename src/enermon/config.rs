use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use std::{fs, path::Path};

use super::error::{EnermonError, Result};
use super::sensor::{ChannelSensorNames, DeviceSensorNames};
use super::types::*;

/// Startup configuration of the energy monitor, immutable once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnermonConfig {
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Mains voltage assumed for power when no voltage pin is wired
    #[serde(default = "default_nominal_voltage")]
    pub nominal_voltage: f64,
    #[serde(default)]
    pub adc: AdcConfig,
    #[serde(default)]
    pub voltage: VoltageConfig,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub sensors: DeviceSensorNames,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdcConfig {
    #[serde(default = "default_vref")]
    pub vref: f64,
    #[serde(default = "default_max_count")]
    pub max_count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoltageConfig {
    /// Absent when no voltage sensor is wired
    pub pin: Option<i32>,
    #[serde(default = "default_voltage_calibration")]
    pub calibration: f64,
    #[serde(default = "default_voltage_phase")]
    pub phase_correction: f64,
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// 0 keeps the channel configured but unsampled
    pub pin: i32,
    #[serde(default = "default_ct_calibration")]
    pub calibration: f64,
    pub name: Option<String>,
    #[serde(default)]
    pub sensors: ChannelSensorNames,
}

fn default_update_interval_ms() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MS
}
fn default_nominal_voltage() -> f64 {
    DEFAULT_NOMINAL_VOLTAGE
}
fn default_vref() -> f64 {
    ADC_VREF
}
fn default_max_count() -> f64 {
    ADC_MAX_COUNT
}
fn default_voltage_calibration() -> f64 {
    DEFAULT_VOLTAGE_CALIBRATION
}
fn default_voltage_phase() -> f64 {
    DEFAULT_VOLTAGE_PHASE
}
fn default_sample_count() -> usize {
    DEFAULT_SAMPLE_COUNT
}
fn default_ct_calibration() -> f64 {
    DEFAULT_CT_CALIBRATION
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            vref: ADC_VREF,
            max_count: ADC_MAX_COUNT,
        }
    }
}

impl Default for VoltageConfig {
    fn default() -> Self {
        Self {
            pin: None,
            calibration: DEFAULT_VOLTAGE_CALIBRATION,
            phase_correction: DEFAULT_VOLTAGE_PHASE,
            sample_count: DEFAULT_SAMPLE_COUNT,
        }
    }
}

impl Default for EnermonConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            nominal_voltage: DEFAULT_NOMINAL_VOLTAGE,
            adc: AdcConfig::default(),
            voltage: VoltageConfig::default(),
            channels: Vec::new(),
            sensors: DeviceSensorNames::default(),
        }
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl EnermonConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EnermonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_interval_ms == 0 {
            return Err(EnermonError::Configuration(
                "update_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !is_positive(self.nominal_voltage) {
            return Err(EnermonError::Configuration(format!(
                "nominal_voltage must be positive, got {}",
                self.nominal_voltage
            )));
        }
        if !is_positive(self.adc.vref) || !is_positive(self.adc.max_count) {
            return Err(EnermonError::Configuration(
                "adc vref and max_count must be positive".to_string(),
            ));
        }

        self.validate_voltage()?;
        self.validate_channels()
    }

    fn validate_voltage(&self) -> Result<()> {
        let voltage = &self.voltage;

        if let Some(pin) = voltage.pin {
            if pin <= 0 {
                return Err(EnermonError::Configuration(format!(
                    "voltage pin must be positive, got {}",
                    pin
                )));
            }
        }
        if !is_positive(voltage.calibration) {
            return Err(EnermonError::Configuration(format!(
                "voltage calibration must be positive, got {}",
                voltage.calibration
            )));
        }
        if !voltage.phase_correction.is_finite() {
            return Err(EnermonError::Configuration(
                "voltage phase_correction must be a finite number".to_string(),
            ));
        }
        if voltage.sample_count == 0 {
            return Err(EnermonError::Configuration(
                "sample_count must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_channels(&self) -> Result<()> {
        if self.channels.len() > MAX_CHANNELS {
            return Err(EnermonError::Configuration(format!(
                "at most {} CT channels are supported, got {}",
                MAX_CHANNELS,
                self.channels.len()
            )));
        }

        let mut used_pins: HashSet<i32> = self.voltage.pin.into_iter().collect();

        for (index, channel) in self.channels.iter().enumerate() {
            if channel.pin < 0 {
                return Err(EnermonError::Configuration(format!(
                    "channel {} pin must not be negative, got {}",
                    index, channel.pin
                )));
            }
            if !is_positive(channel.calibration) {
                return Err(EnermonError::Configuration(format!(
                    "channel {} calibration must be positive, got {}",
                    index, channel.calibration
                )));
            }
            if channel.pin > 0 && !used_pins.insert(channel.pin) {
                return Err(EnermonError::Configuration(format!(
                    "channel {} reuses pin {}",
                    index, channel.pin
                )));
            }
        }

        Ok(())
    }

    /// Base name of the sensors of channel `index`.
    pub fn channel_name(&self, index: usize) -> String {
        self.channels
            .get(index)
            .and_then(|c| c.name.clone())
            .unwrap_or_else(|| default_channel_name(index))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            update_interval: Duration::from_millis(self.update_interval_ms),
            nominal_voltage: self.nominal_voltage,
            adc: AdcScale {
                vref: self.adc.vref,
                max_count: self.adc.max_count,
            },
        }
    }

    pub fn voltage_reference(&self) -> VoltageReference {
        VoltageReference {
            pin: self.voltage.pin.unwrap_or(-1),
            calibration: self.voltage.calibration,
            phase_correction: self.voltage.phase_correction,
            sample_count: self.voltage.sample_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
update_interval_ms = 500
nominal_voltage = 120.0

[voltage]
pin = 36
calibration = 234.26
phase_correction = 1.6
sample_count = 400

[sensors]
voltage = "Grid Voltage"

[[channels]]
pin = 34
calibration = 111.1
name = "Heat Pump"

[channels.sensors]
power = "Heat Pump Load"

[[channels]]
pin = 35
"#;

    #[test]
    fn test_defaults_match_component_schema() {
        let config = EnermonConfig::from_toml_str("").unwrap();
        assert_eq!(config, EnermonConfig::default());
        assert_eq!(config.voltage.calibration, 230.0);
        assert_eq!(config.voltage.phase_correction, 1.7);
        assert_eq!(config.voltage.sample_count, 200);
        assert_eq!(config.voltage.pin, None);
        assert_eq!(config.voltage_reference().pin, -1);
    }

    #[test]
    fn test_full_config() {
        let config = EnermonConfig::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(config.update_interval_ms, 500);
        assert_eq!(config.voltage.pin, Some(36));
        assert_eq!(config.voltage.sample_count, 400);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[1].calibration, DEFAULT_CT_CALIBRATION);
        assert_eq!(config.channel_name(0), "Heat Pump");
        assert_eq!(config.channel_name(1), "CT1");
        assert_eq!(config.channels[0].sensors.power.as_deref(), Some("Heat Pump Load"));
        assert_eq!(config.sensors.voltage.as_deref(), Some("Grid Voltage"));
        assert_eq!(
            config.engine_settings().update_interval,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_zero_calibration_is_rejected() {
        let err = EnermonConfig::from_toml_str("[[channels]]\npin = 34\ncalibration = 0.0\n").unwrap_err();
        assert!(matches!(err, EnermonError::Configuration(msg) if msg.contains("calibration")));
    }

    #[test]
    fn test_duplicate_pins_are_rejected() {
        let toml = "[voltage]\npin = 34\n\n[[channels]]\npin = 34\n";
        assert!(EnermonConfig::from_toml_str(toml).is_err());

        let toml = "[[channels]]\npin = 32\n\n[[channels]]\npin = 32\n";
        assert!(EnermonConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_disabled_channels_may_share_pin_zero() {
        let toml = "[[channels]]\npin = 0\n\n[[channels]]\npin = 0\n";
        assert!(EnermonConfig::from_toml_str(toml).is_ok());
    }

    #[test]
    fn test_too_many_channels() {
        let toml: String = (30..35).map(|pin| format!("[[channels]]\npin = {}\n", pin)).collect();
        assert!(EnermonConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_unknown_field_is_a_parse_error() {
        let err = EnermonConfig::from_toml_str("sample_rate = 3\n").unwrap_err();
        assert!(matches!(err, EnermonError::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enermon.toml");
        fs::write(&path, FULL_CONFIG).unwrap();

        let config = EnermonConfig::load(&path).unwrap();
        assert_eq!(config.channels[0].pin, 34);

        let missing = EnermonConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, EnermonError::Io(_)));
    }
}
