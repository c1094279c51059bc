use super::engine::SamplingEngine;
use super::power::phase_angle_from_power_factor;
use super::types::Channel;

/*
* @brief Print the measurements of one channel.
* @param channel Channel to print
*/
pub fn print_channel(channel: &Channel) {
    log::info!("{} (pin {}):", channel.name, channel.pin);

    match channel.last_measurement {
        Some(m) => {
            log::info!("  Current: {}", channel.sensors.current.display_state());
            log::info!("  Power: {}", channel.sensors.power.display_state());
            log::info!("  Apparent: {:.1} VA", m.apparent_power);
            log::info!(
                "  Factor: {:.3} ({:.1}º)",
                m.power_factor,
                phase_angle_from_power_factor(m.power_factor)
            );
        }
        None => log::info!("  No measurement yet"),
    }
}

/*
* @brief Print the energy windows of one channel.
* @param channel Channel to print
*/
pub fn print_energy(channel: &Channel) {
    let energy = &channel.energy;
    log::info!("  Energy:");
    log::info!(
        "    Daily: {} (exported {:.1} Wh)",
        channel.sensors.energy_daily.display_state(),
        energy.daily.exported_wh
    );
    log::info!(
        "    Weekly: {} (exported {:.1} Wh)",
        channel.sensors.energy_weekly.display_state(),
        energy.weekly.exported_wh
    );
    log::info!(
        "    Monthly: {} (exported {:.1} Wh)",
        channel.sensors.energy_monthly.display_state(),
        energy.monthly.exported_wh
    );
    if let Some(previous) = energy.daily.last_closed_wh {
        log::info!("    Previous day: {:.1} Wh", previous);
    }
}

pub fn print_device(engine: &SamplingEngine) {
    let device = engine.device_sensors();
    log::info!("Device:");
    log::info!("  {}: {}", device.voltage.name(), device.voltage.display_state());
    log::info!(
        "  {}: {}",
        device.signal_strength.name(),
        device.signal_strength.display_state()
    );
}

/*
* @brief Print everything the engine measured so far.
* @param engine Sampling engine
*/
pub fn print_all(engine: &SamplingEngine) {
    log::info!("Pass {}", engine.cycles());
    for channel in engine.channels() {
        print_channel(channel);
        if channel.is_enabled() {
            print_energy(channel);
        }
    }
    print_device(engine);
}
