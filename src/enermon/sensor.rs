use serde::{Deserialize, Serialize};

pub const UNIT_AMPERE: &str = "A";
pub const UNIT_WATT: &str = "W";
pub const UNIT_WATT_HOUR: &str = "Wh";
pub const UNIT_VOLT: &str = "V";
pub const UNIT_DECIBEL_MILLIWATT: &str = "dBm";

pub const VOLTAGE_SENSOR_NAME: &str = "Mains Voltage";
pub const SIGNAL_STRENGTH_SENSOR_NAME: &str = "WiFi RSSI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Current,
    Power,
    Energy,
    Voltage,
    SignalStrength,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Current => "current",
            DeviceClass::Power => "power",
            DeviceClass::Energy => "energy",
            DeviceClass::Voltage => "voltage",
            DeviceClass::SignalStrength => "signal_strength",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Measurement,
    TotalIncreasing, // Only grows, a drop means the counter was reset
}

/// Named numeric output read by the reporting layer.
///
/// Publishing only stores the value; there is no acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    name: String,
    unit: &'static str,
    device_class: DeviceClass,
    state_class: StateClass,
    accuracy_decimals: usize,
    state: Option<f64>,
    publish_count: u64,
}

impl Sensor {
    pub fn new(
        name: impl Into<String>,
        unit: &'static str,
        accuracy_decimals: usize,
        device_class: DeviceClass,
        state_class: StateClass,
    ) -> Self {
        Self {
            name: name.into(),
            unit,
            device_class,
            state_class,
            accuracy_decimals,
            state: None,
            publish_count: 0,
        }
    }

    pub fn publish(&mut self, value: f64) {
        self.state = Some(value);
        self.publish_count += 1;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    pub fn device_class(&self) -> DeviceClass {
        self.device_class
    }

    pub fn state_class(&self) -> StateClass {
        self.state_class
    }

    pub fn accuracy_decimals(&self) -> usize {
        self.accuracy_decimals
    }

    /// Last published value, `None` until the first publish.
    pub fn state(&self) -> Option<f64> {
        self.state
    }

    pub fn publish_count(&self) -> u64 {
        self.publish_count
    }

    /// Last value rounded to the display precision, with its unit.
    pub fn display_state(&self) -> String {
        match self.state {
            Some(value) => format!("{:.*} {}", self.accuracy_decimals, value, self.unit),
            None => "unknown".to_string(),
        }
    }
}

/// Explicit names for a subset of the channel outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSensorNames {
    pub current: Option<String>,
    pub power: Option<String>,
    pub energy_daily: Option<String>,
    pub energy_weekly: Option<String>,
    pub energy_monthly: Option<String>,
}

/// Explicit names for the device outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSensorNames {
    pub voltage: Option<String>,
    pub signal_strength: Option<String>,
}

fn bound_or(binding: &Option<String>, fallback: String) -> String {
    binding.clone().unwrap_or(fallback)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSensors {
    pub current: Sensor,
    pub power: Sensor,
    pub energy_daily: Sensor,
    pub energy_weekly: Sensor,
    pub energy_monthly: Sensor,
}

impl ChannelSensors {
    pub fn new(base_name: &str, names: &ChannelSensorNames) -> Self {
        let energy = |binding: &Option<String>, window: &str| {
            Sensor::new(
                bound_or(binding, format!("{} Energy {}", base_name, window)),
                UNIT_WATT_HOUR,
                1,
                DeviceClass::Energy,
                StateClass::TotalIncreasing,
            )
        };

        Self {
            current: Sensor::new(
                bound_or(&names.current, format!("{} Current", base_name)),
                UNIT_AMPERE,
                2,
                DeviceClass::Current,
                StateClass::Measurement,
            ),
            power: Sensor::new(
                bound_or(&names.power, format!("{} Power", base_name)),
                UNIT_WATT,
                1,
                DeviceClass::Power,
                StateClass::Measurement,
            ),
            energy_daily: energy(&names.energy_daily, "Daily"),
            energy_weekly: energy(&names.energy_weekly, "Weekly"),
            energy_monthly: energy(&names.energy_monthly, "Monthly"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        [
            &self.current,
            &self.power,
            &self.energy_daily,
            &self.energy_weekly,
            &self.energy_monthly,
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSensors {
    pub voltage: Sensor,
    pub signal_strength: Sensor,
}

impl DeviceSensors {
    pub fn new(names: &DeviceSensorNames) -> Self {
        Self {
            voltage: Sensor::new(
                bound_or(&names.voltage, VOLTAGE_SENSOR_NAME.to_string()),
                UNIT_VOLT,
                1,
                DeviceClass::Voltage,
                StateClass::Measurement,
            ),
            signal_strength: Sensor::new(
                bound_or(&names.signal_strength, SIGNAL_STRENGTH_SENSOR_NAME.to_string()),
                UNIT_DECIBEL_MILLIWATT,
                0,
                DeviceClass::SignalStrength,
                StateClass::Measurement,
            ),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sensor> {
        [&self.voltage, &self.signal_strength].into_iter()
    }
}

impl Default for DeviceSensors {
    fn default() -> Self {
        Self::new(&DeviceSensorNames::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sensor_default_names() {
        let sensors = ChannelSensors::new("CT0", &ChannelSensorNames::default());
        let names: Vec<&str> = sensors.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "CT0 Current",
                "CT0 Power",
                "CT0 Energy Daily",
                "CT0 Energy Weekly",
                "CT0 Energy Monthly"
            ]
        );
        assert_eq!(sensors.energy_daily.state_class(), StateClass::TotalIncreasing);
        assert_eq!(sensors.energy_daily.device_class(), DeviceClass::Energy);
        assert_eq!(sensors.current.unit(), UNIT_AMPERE);
        assert_eq!(sensors.current.accuracy_decimals(), 2);
        assert_eq!(sensors.power.device_class().as_str(), "power");
    }

    #[test]
    fn test_explicit_bindings_override_subset() {
        let names = ChannelSensorNames {
            power: Some("Heat Pump Power".to_string()),
            energy_monthly: Some("Heat Pump Month".to_string()),
            ..Default::default()
        };
        let sensors = ChannelSensors::new("Heat Pump", &names);
        assert_eq!(sensors.current.name(), "Heat Pump Current");
        assert_eq!(sensors.power.name(), "Heat Pump Power");
        assert_eq!(sensors.energy_monthly.name(), "Heat Pump Month");
    }

    #[test]
    fn test_publish_keeps_last_value() {
        let mut device = DeviceSensors::default();
        assert_eq!(device.voltage.state(), None);
        assert_eq!(device.voltage.display_state(), "unknown");

        device.voltage.publish(229.96);
        device.voltage.publish(231.04);
        assert_eq!(device.voltage.state(), Some(231.04));
        assert_eq!(device.voltage.publish_count(), 2);
        assert_eq!(device.voltage.display_state(), "231.0 V");
        assert_eq!(device.signal_strength.name(), SIGNAL_STRENGTH_SENSOR_NAME);
        assert_eq!(device.signal_strength.accuracy_decimals(), 0);
        assert_eq!(device.signal_strength.device_class(), DeviceClass::SignalStrength);
    }
}
