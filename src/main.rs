use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use clap::{Parser, Subcommand};
use signal_hook::consts::signal::{SIGINT, SIGTERM};

use enermon::calibrate::{estimate_calibration, find_calibration, load_capture, pin_rms_volts, CalibrationSweep};
use enermon::print::print_all;
use enermon::{ChannelConfig, EnermonConfig, Result, SamplingEngine, SimulatedAdc, SimulatedRadio, VoltageConfig, Waveform};

const SIMULATED_READ_RATE: f64 = 10_000.0; // ADC conversions per second
const SIMULATED_NOISE_COUNTS: f64 = 2.0;

/// CT and mains voltage energy monitor
#[derive(Parser, Debug)]
#[command(author, version, about = "CT energy monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sampling loop against the simulated ADC
    Run {
        /// TOML configuration, a two channel demo setup when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Stop after this many passes, 0 runs until interrupted
        #[arg(short, long, default_value_t = 0)]
        ticks: u64,
        /// Log a measurement report every N passes
        #[arg(short, long, default_value_t = 25)]
        report_every: u64,
        /// Seed of the simulated noise
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Derive a calibration factor from a raw capture and a reference reading
    Calibrate {
        /// File with raw ADC counts separated by commas or whitespace
        capture: PathBuf,
        /// Reading of the reference meter (V or A)
        #[arg(short, long)]
        target: f64,
        /// Accepted distance to the target
        #[arg(long, default_value_t = 0.10)]
        tolerance: f64,
        /// TOML configuration providing the ADC scale
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            ticks,
            report_every,
            seed,
        } => run(load_config(config)?, ticks, report_every, seed),
        Command::Calibrate {
            capture,
            target,
            tolerance,
            config,
        } => calibrate(load_config(config)?, capture, target, tolerance),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<EnermonConfig> {
    match path {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            EnermonConfig::load(path)
        }
        None => Ok(demo_config()),
    }
}

fn demo_config() -> EnermonConfig {
    EnermonConfig {
        voltage: VoltageConfig {
            pin: Some(36),
            ..Default::default()
        },
        channels: vec![
            ChannelConfig {
                pin: 34,
                calibration: 30.0,
                name: Some("Mains".to_string()),
                sensors: Default::default(),
            },
            ChannelConfig {
                pin: 35,
                calibration: 30.0,
                name: Some("Heat Pump".to_string()),
                sensors: Default::default(),
            },
        ],
        ..Default::default()
    }
}

/*
* @brief Build a simulated ADC that feeds every configured pin.
* @param config Validated configuration
* @param seed Seed of the noise generator
* @note Channel n draws 2.5 * (n + 1) A, lagging the voltage by 10º per channel.
*/
fn simulated_adc(config: &EnermonConfig, seed: u64) -> SimulatedAdc {
    let scale = config.engine_settings().adc;
    let mut adc = SimulatedAdc::new(SIMULATED_READ_RATE, scale).with_noise(SIMULATED_NOISE_COUNTS, seed);

    if let Some(pin) = config.voltage.pin {
        adc.set_waveform(
            pin,
            Waveform::for_voltage(config.nominal_voltage, config.voltage.calibration, &scale),
        );
    }
    for (index, channel) in config.channels.iter().enumerate().filter(|(_, c)| c.pin > 0) {
        let amps = 2.5 * (index + 1) as f64;
        adc.set_waveform(
            channel.pin,
            Waveform::for_current(amps, channel.calibration, &scale).with_phase(-10.0 * index as f64),
        );
    }

    adc
}

fn run(config: EnermonConfig, ticks: u64, report_every: u64, seed: u64) -> Result<()> {
    let mut engine = SamplingEngine::from_config(&config)?;
    let mut adc = simulated_adc(&config, seed);
    let mut radio = SimulatedRadio::new(-67.0, 3.0, seed);
    let interval = engine.settings().update_interval;

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&term))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&term))?;

    log::info!("Sampling every {:?} with simulated ADC", interval);

    let mut last_tick = Instant::now();
    while !term.load(Ordering::Relaxed) {
        let started = Instant::now();
        let elapsed = started.duration_since(last_tick);
        last_tick = started;

        engine.tick(&mut adc, &mut radio, elapsed, Some(Local::now().naive_local()));

        if report_every > 0 && engine.cycles() % report_every == 0 {
            print_all(&engine);
        }
        if ticks > 0 && engine.cycles() >= ticks {
            break;
        }

        if let Some(remaining) = interval.checked_sub(started.elapsed()) {
            spin_sleep::sleep(remaining);
        } else {
            log::warn!("Pass took longer than {:?}", interval);
        }
    }

    log::info!("Stopping after {} passes", engine.cycles());
    print_all(&engine);

    Ok(())
}

fn calibrate(config: EnermonConfig, capture: PathBuf, target: f64, tolerance: f64) -> Result<()> {
    let scale = config.engine_settings().adc;
    let raw = load_capture(&capture)?;

    log::info!(
        "{} samples, {:.4} V RMS at the pin",
        raw.len(),
        pin_rms_volts(&raw, &scale)
    );

    let sweep = CalibrationSweep {
        tolerance,
        ..Default::default()
    };

    match find_calibration(&raw, target, &scale, &sweep) {
        Ok(calibration) => log::info!("Calibrated factor: {:.2} (within ±{:.2})", calibration, tolerance),
        Err(err) => log::error!("{}", err),
    }
    log::info!("Closed form estimate: {:.2}", estimate_calibration(&raw, target, &scale)?);

    Ok(())
}
