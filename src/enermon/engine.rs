use std::time::Duration;

use chrono::NaiveDateTime;

use super::adc::AnalogInput;
use super::config::EnermonConfig;
use super::energy::EnergyWindowKind;
use super::error::{EnermonError, Result};
use super::power;
use super::rssi::SignalStrength;
use super::sensor::{ChannelSensorNames, ChannelSensors, DeviceSensorNames, DeviceSensors, Sensor};
use super::signal;
use super::types::*;

/// How voltage enters the power calculation during one pass.
#[derive(Debug, Clone, Copy)]
enum VoltageMode {
    Measured {
        pin: i32,
        voltage_ratio: f64,
        phase_correction: f64,
    },
    Nominal(f64),
}

/// Outcome of one sampling pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSummary {
    pub sampled: Vec<usize>,                          // Channels updated in this pass
    pub skipped: Vec<usize>,                          // Channels without a pin or with a bad calibration
    pub failed: Vec<usize>,                           // Channels left on their last good values
    pub closed_windows: Vec<(usize, EnergyWindowKind)>, // Windows reset after publishing
    pub elapsed: Duration,                            // Interval integrated into energy
}

/// Samples every CT channel once per tick and publishes current, power and energy.
pub struct SamplingEngine {
    channels: Vec<Channel>, // Kept sorted by index
    voltage: VoltageReference,
    settings: EngineSettings,
    device: DeviceSensors,
    last_voltage_rms: Option<f64>,
    last_elapsed: Option<Duration>, // Interval integrated by the previous tick
    cycles: u64,
}

impl Default for SamplingEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl SamplingEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            channels: Vec::new(),
            voltage: VoltageReference::default(),
            settings,
            device: DeviceSensors::default(),
            last_voltage_rms: None,
            last_elapsed: None,
            cycles: 0,
        }
    }

    /// Builds an engine from a configuration, validating it first.
    pub fn from_config(config: &EnermonConfig) -> Result<Self> {
        config.validate()?;

        let mut engine = Self::new(config.engine_settings());
        engine.voltage = config.voltage_reference();
        engine.device = DeviceSensors::new(&config.sensors);

        for (index, channel) in config.channels.iter().enumerate() {
            let name = config.channel_name(index);
            let sensors = ChannelSensors::new(&name, &channel.sensors);
            engine
                .channels
                .push(Channel::new(index, channel.pin, channel.calibration, name, sensors));
        }

        log::info!(
            "Energy monitor configured with {} CT channel(s), voltage pin {}",
            engine.channels.len(),
            engine.voltage.pin
        );

        Ok(engine)
    }

    /*
    * @brief Add or replace a CT channel.
    * @param index Channel slot, 0 to MAX_CHANNELS - 1
    * @param pin Analog pin, 0 or negative leaves the channel unsampled
    * @param calibration Amps per volt at the ADC pin
    * @note Values are not validated here; bad calibrations are skipped while sampling.
    */
    pub fn add_ct_channel(&mut self, index: usize, pin: i32, calibration: f64) {
        if index >= MAX_CHANNELS {
            log::warn!("Ignoring CT channel {}: only {} channels are supported", index, MAX_CHANNELS);
            return;
        }

        match self.channels.iter_mut().find(|c| c.index == index) {
            Some(channel) => {
                channel.pin = pin;
                channel.calibration = calibration;
            }
            None => {
                let name = default_channel_name(index);
                let sensors = ChannelSensors::new(&name, &ChannelSensorNames::default());
                self.channels.push(Channel::new(index, pin, calibration, name, sensors));
                self.channels.sort_by_key(|c| c.index);
            }
        }
    }

    pub fn set_voltage_config(&mut self, pin: i32, calibration: f64, phase_correction: f64, sample_count: usize) {
        self.voltage = VoltageReference {
            pin,
            calibration,
            phase_correction,
            sample_count,
        };
    }

    /// Nominal period between ticks, for hosts that do not tick every 200 ms.
    pub fn set_update_interval(&mut self, interval: Duration) {
        if interval.is_zero() {
            log::warn!("Ignoring zero update interval, keeping {:?}", self.settings.update_interval);
            return;
        }
        self.settings.update_interval = interval;
    }

    pub fn set_device_sensor_names(&mut self, names: &DeviceSensorNames) {
        self.device = DeviceSensors::new(names);
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.iter().find(|c| c.index == index)
    }

    pub fn voltage_reference(&self) -> &VoltageReference {
        &self.voltage
    }

    pub fn device_sensors(&self) -> &DeviceSensors {
        &self.device
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn last_voltage_rms(&self) -> Option<f64> {
        self.last_voltage_rms
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Every output, channel sensors first, for the reporting layer.
    pub fn sensors(&self) -> impl Iterator<Item = &Sensor> {
        self.channels
            .iter()
            .flat_map(|c| c.sensors.iter())
            .chain(self.device.iter())
    }

    /*
    * @brief Interval to integrate energy over.
    * @param elapsed Time measured by the caller since the previous tick
    * @return The measured time, the nominal interval when it is zero, or the upper bound on a clock jump
    * @note The bound is MAX_ELAPSED_FACTOR times the larger of the nominal interval and the previous
    *       integrated interval, so a host ticking slower than nominal is followed after its first tick.
    */
    fn effective_elapsed(&self, elapsed: Duration) -> Duration {
        let nominal = self.settings.update_interval;
        if elapsed.is_zero() {
            log::debug!("Integrating over {:?} instead of a zero interval", nominal);
            return nominal;
        }

        let period = self.last_elapsed.map_or(nominal, |last| last.max(nominal));
        let bound = period * MAX_ELAPSED_FACTOR;
        if elapsed > bound {
            log::warn!("Elapsed time {:?} looks like a clock jump, integrating over {:?}", elapsed, bound);
            bound
        } else {
            elapsed
        }
    }

    fn voltage_mode(&self) -> VoltageMode {
        let reference = &self.voltage;
        if !reference.is_configured() {
            return VoltageMode::Nominal(self.settings.nominal_voltage);
        }

        if !(reference.calibration.is_finite() && reference.calibration > 0.0) {
            log::warn!(
                "Voltage calibration {} is unusable, using nominal {} V",
                reference.calibration,
                self.settings.nominal_voltage
            );
            return VoltageMode::Nominal(self.settings.nominal_voltage);
        }

        VoltageMode::Measured {
            pin: reference.pin,
            voltage_ratio: reference.calibration * self.settings.adc.volts_per_count(),
            phase_correction: reference.phase_correction,
        }
    }

    /*
    * @brief Run one sampling pass over all channels.
    * @param adc Analog input to read from
    * @param radio Source of the signal strength diagnostic
    * @param elapsed Time since the previous tick
    * @param local_now Local wall-clock time, None while the clock is not set
    * @return Which channels were sampled, skipped or failed and which windows closed
    * @note Errors are handled per channel and never stop the pass.
    */
    pub fn tick<A, R>(
        &mut self,
        adc: &mut A,
        radio: &mut R,
        elapsed: Duration,
        local_now: Option<NaiveDateTime>,
    ) -> PassSummary
    where
        A: AnalogInput,
        R: SignalStrength,
    {
        let elapsed = self.effective_elapsed(elapsed);
        self.last_elapsed = Some(elapsed);
        let mode = self.voltage_mode();
        let sample_count = self.voltage.sample_count;
        let scale = self.settings.adc;

        let mut summary = PassSummary {
            elapsed,
            ..Default::default()
        };
        let mut voltages: Vec<f64> = Vec::new();

        for channel in self.channels.iter_mut() {
            if !channel.is_enabled() {
                log::debug!("Channel {} has no pin, skipping", channel.index);
                summary.skipped.push(channel.index);
                continue;
            }
            if !channel.has_valid_calibration() {
                let err = EnermonError::Calibration {
                    channel: channel.index,
                    value: channel.calibration,
                };
                log::warn!("{}, skipping", err);
                summary.skipped.push(channel.index);
                continue;
            }

            let measurement = acquire(adc, channel.pin, mode, sample_count).map(|buffer| {
                let measurement = measure(&buffer, channel.calibration, mode, &scale);
                channel.buffer = buffer;
                measurement
            });

            match measurement {
                Ok(measurement) => {
                    publish_channel(channel, &measurement, elapsed);
                    if let VoltageMode::Measured { .. } = mode {
                        voltages.push(measurement.voltage_rms);
                    }
                    summary.sampled.push(channel.index);
                }
                Err(err) => {
                    log::warn!("Channel {} keeps its last values: {}", channel.index, err);
                    summary.failed.push(channel.index);
                }
            }
        }

        if let VoltageMode::Measured {
            pin, voltage_ratio, ..
        } = mode
        {
            let voltage_rms = if voltages.is_empty() {
                measure_voltage_only(adc, pin, voltage_ratio, sample_count)
            } else {
                Some(voltages.iter().sum::<f64>() / voltages.len() as f64)
            };

            if let Some(voltage_rms) = voltage_rms {
                self.last_voltage_rms = Some(voltage_rms);
                self.device.voltage.publish(voltage_rms);
            }
        }

        if let Some(dbm) = radio.rssi_dbm() {
            self.device.signal_strength.publish(dbm);
        }

        if let Some(now) = local_now {
            let today = now.date();
            for channel in self.channels.iter_mut() {
                for window in channel.energy.roll_over(today) {
                    log::info!(
                        "Channel {} closed its {} window at {:.1} Wh",
                        channel.index,
                        window.as_str(),
                        channel.energy.window(window).last_closed_wh.unwrap_or(0.0)
                    );
                    summary.closed_windows.push((channel.index, window));
                }
            }
        }

        self.cycles += 1;
        log::debug!(
            "Pass {}: sampled {:?}, skipped {:?}, failed {:?}",
            self.cycles,
            summary.sampled,
            summary.skipped,
            summary.failed
        );

        summary
    }
}

/*
* @brief Read `sample_count` samples of a channel.
* @note With a measured voltage each current read directly follows a voltage read.
*/
fn acquire<A: AnalogInput>(adc: &mut A, pin: i32, mode: VoltageMode, sample_count: usize) -> Result<SampleBuffer> {
    let mut buffer = SampleBuffer::with_capacity(sample_count);

    for _ in 0..sample_count {
        if let VoltageMode::Measured { pin: voltage_pin, .. } = mode {
            buffer.voltage.push(adc.read(voltage_pin)? as i32);
        }
        buffer.current.push(adc.read(pin)? as i32);
    }

    if buffer.is_empty() {
        return Err(EnermonError::SampleRead {
            pin,
            reason: "no samples requested".to_string(),
        });
    }

    Ok(buffer)
}

fn measure(buffer: &SampleBuffer, calibration: f64, mode: VoltageMode, scale: &AdcScale) -> ChannelMeasurement {
    let current_ratio = calibration * scale.volts_per_count();

    let (current_rms, voltage_rms, real_power) = match mode {
        VoltageMode::Measured {
            voltage_ratio,
            phase_correction,
            ..
        } => {
            let range = signal::whole_cycle_range(signal::remove_offset(&buffer.voltage).view());
            let voltage = signal::remove_offset(&buffer.voltage[range.clone()]);
            let current = signal::remove_offset(&buffer.current[range]);

            let current_rms = current_ratio * signal::calculate_rms(current.view());
            let voltage_rms = voltage_ratio * signal::calculate_rms(voltage.view());
            let real_power = power::calculate_real_power(
                voltage.view(),
                current.view(),
                phase_correction,
                voltage_ratio,
                current_ratio,
            );
            (current_rms, voltage_rms, real_power)
        }
        VoltageMode::Nominal(voltage_rms) => {
            let current = signal::remove_offset(&buffer.current);
            let current_rms = current_ratio * signal::calculate_rms(current.view());
            (current_rms, voltage_rms, voltage_rms * current_rms)
        }
    };

    let apparent_power = power::calculate_apparent_power(voltage_rms, current_rms);

    ChannelMeasurement {
        current_rms,
        voltage_rms,
        real_power,
        apparent_power,
        power_factor: power::calculate_power_factor(apparent_power, real_power),
    }
}

fn measure_voltage_only<A: AnalogInput>(adc: &mut A, pin: i32, voltage_ratio: f64, sample_count: usize) -> Option<f64> {
    let samples: Result<Vec<i32>> = (0..sample_count).map(|_| adc.read(pin).map(i32::from)).collect();

    match samples {
        Ok(samples) if !samples.is_empty() => {
            let voltage = signal::remove_offset(&samples);
            let range = signal::whole_cycle_range(voltage.view());
            let voltage = signal::remove_offset(&samples[range]);
            Some(voltage_ratio * signal::calculate_rms(voltage.view()))
        }
        Ok(_) => None,
        Err(err) => {
            log::warn!("Voltage keeps its last value: {}", err);
            None
        }
    }
}

/// Publishes the channel outputs, then integrates and publishes its energy windows.
fn publish_channel(channel: &mut Channel, measurement: &ChannelMeasurement, elapsed: Duration) {
    channel.sensors.current.publish(measurement.current_rms);
    channel.sensors.power.publish(measurement.real_power);

    channel.energy.integrate(measurement.real_power, elapsed);
    channel.sensors.energy_daily.publish(channel.energy.daily.imported_wh);
    channel.sensors.energy_weekly.publish(channel.energy.weekly.imported_wh);
    channel.sensors.energy_monthly.publish(channel.energy.monthly.imported_wh);

    channel.last_measurement = Some(*measurement);
}
