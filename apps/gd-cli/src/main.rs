//! gd-cli: run calibration scenarios against the mock dock.
//!
//! A scenario YAML describes the docked instrument, the available gas end
//! points, the session options and the mock hardware's scripted behavior.
//! Useful for exercising the engine end to end without a dock on the
//! bench.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use gd_core::{
    Cylinder, DockedInstrument, GasCode, GasEndPoint, GasSourceKind, InstalledComponent,
    InstalledSensor, PressureLevel, Slot,
};
use gd_engine::{AccountPolicy, CalibrationSession, SessionOptions};
use gd_hal::{MockDock, MockPurge};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid scenario: {0}")]
    Scenario(#[from] serde_yaml::Error),

    #[error("Failed to render report: {0}")]
    Report(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "gd-cli")]
#[command(about = "gasdock CLI - calibration session simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scenario file without running it
    Validate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Run a calibration session for a scenario
    Run {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Emit the full session report as JSON
        #[arg(long)]
        json: bool,
    },
}

// ---------------------------------------------------------------------------
// Scenario schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Scenario {
    instrument: String,
    #[serde(default)]
    options: ScenarioOptions,
    sensors: Vec<ScenarioSensor>,
    end_points: Vec<ScenarioEndPoint>,
    #[serde(default)]
    mock: ScenarioMock,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScenarioOptions {
    poll_interval_ms: u64,
    timeout_cushion_s: u64,
    sensor_filter: Option<Vec<GasCode>>,
    o2_high_bump: bool,
    max_sensor_age_days: Option<i64>,
    min_span_reserve_pct: Option<f64>,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            timeout_cushion_s: 10,
            sensor_filter: None,
            o2_high_bump: false,
            max_sensor_age_days: None,
            min_span_reserve_pct: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScenarioSensor {
    slot: u32,
    gas: GasCode,
    concentration: f64,
    resolution: f64,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_flow_rate")]
    flow_rate_lpm: f64,
}

fn default_true() -> bool {
    true
}

fn default_flow_rate() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
struct ScenarioEndPoint {
    slot: u32,
    kind: ScenarioSourceKind,
    gas: Option<GasCode>,
    concentration: Option<f64>,
    #[serde(default)]
    pressure: ScenarioPressure,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ScenarioSourceKind {
    CylinderCard,
    Manifold,
    Manual,
    FreshAir,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScenarioPressure {
    #[default]
    Full,
    Low,
    Empty,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScenarioMock {
    polls_to_finish: usize,
    hardware_timeout_s: u64,
    span_reserve: f64,
    reading: f64,
    undock_after_polls: Option<usize>,
    fail_sources: Vec<u32>,
}

impl Default for ScenarioMock {
    fn default() -> Self {
        Self {
            polls_to_finish: 2,
            hardware_timeout_s: 60,
            span_reserve: 50.0,
            reading: 0.0,
            undock_after_polls: None,
            fail_sources: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn main() -> CliResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Run {
            scenario_path,
            json,
        } => cmd_run(&scenario_path, json),
    }
}

fn load_scenario(path: &Path) -> CliResult<Scenario> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

fn cmd_validate(path: &Path) -> CliResult<()> {
    let scenario = load_scenario(path)?;
    println!(
        "✓ Scenario is valid: {} ({} sensors, {} end points)",
        scenario.instrument,
        scenario.sensors.len(),
        scenario.end_points.len()
    );
    Ok(())
}

fn cmd_run(path: &Path, json: bool) -> CliResult<()> {
    let scenario = load_scenario(path)?;
    tracing::debug!(path = %path.display(), "loaded scenario");

    let mut instrument = DockedInstrument::new(scenario.instrument.clone());
    for s in &scenario.sensors {
        let mut sensor = InstalledSensor::new(
            Slot::from_index(s.slot),
            s.gas,
            s.concentration,
            s.resolution,
        )
        .with_flow_rate(s.flow_rate_lpm);
        sensor.enabled = s.enabled;
        instrument = instrument.with_component(InstalledComponent::Sensor(sensor));
    }

    let end_points: Vec<GasEndPoint> = scenario.end_points.iter().map(build_end_point).collect();

    let mut dock = build_mock(&scenario);
    let mut purge = MockPurge::new();
    let session = CalibrationSession::new(&mut dock, &mut purge, end_points, build_options(&scenario));

    let outcome = session.run(&mut instrument);

    if json {
        let report = serde_json::json!({
            "instrument": instrument.serial,
            "passed": outcome.passed,
            "cumulative_s": outcome.cumulative_s,
            "fault": outcome.fault.as_ref().map(|f| f.to_string()),
            "responses": outcome.responses,
            "end_points": outcome.end_points,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Session for {}: {}", instrument.serial, verdict(outcome.passed));
        for r in &outcome.responses {
            println!(
                "  slot {} [{}]: {:?}  span reserve {}  gas entries {}",
                r.slot,
                r.gas,
                r.status,
                r.span_reserve.map_or("-".to_string(), |v| format!("{v:.1}%")),
                r.used_gas_end_points.len()
            );
        }
        if let Some(fault) = &outcome.fault {
            println!("  fault: {fault}");
        }
    }

    if !outcome.passed {
        std::process::exit(1);
    }
    Ok(())
}

fn verdict(passed: bool) -> &'static str {
    if passed { "PASSED" } else { "NOT PASSED" }
}

fn build_end_point(ep: &ScenarioEndPoint) -> GasEndPoint {
    let cylinder = || {
        let gas = ep.gas.unwrap_or(GasCode::FreshAir);
        let concentration = ep.concentration.unwrap_or(0.0);
        let pressure = match ep.pressure {
            ScenarioPressure::Full => PressureLevel::Full,
            ScenarioPressure::Low => PressureLevel::Low,
            ScenarioPressure::Empty => PressureLevel::Empty,
        };
        Cylinder::new(gas, concentration).with_pressure(pressure)
    };
    let kind = match ep.kind {
        ScenarioSourceKind::CylinderCard => GasSourceKind::CylinderCard(cylinder()),
        ScenarioSourceKind::Manifold => GasSourceKind::Manifold(cylinder()),
        ScenarioSourceKind::Manual => GasSourceKind::Manual(cylinder()),
        ScenarioSourceKind::FreshAir => GasSourceKind::FreshAir,
    };
    GasEndPoint::new(Slot::from_index(ep.slot), kind)
}

fn build_options(scenario: &Scenario) -> SessionOptions {
    let o = &scenario.options;
    SessionOptions {
        poll_interval: Duration::from_millis(o.poll_interval_ms),
        timeout_cushion: Duration::from_secs(o.timeout_cushion_s),
        sensor_filter: o.sensor_filter.clone(),
        o2_high_bump: o.o2_high_bump,
        account: AccountPolicy {
            max_sensor_age_days: o.max_sensor_age_days,
            min_span_reserve_pct: o.min_span_reserve_pct,
        },
    }
}

fn build_mock(scenario: &Scenario) -> MockDock {
    let m = &scenario.mock;
    let mut dock = MockDock::new()
        .with_polls_to_finish(m.polls_to_finish)
        .with_hardware_timeout(Duration::from_secs(m.hardware_timeout_s));
    for s in &scenario.sensors {
        dock = dock
            .with_span_reserve(Slot::from_index(s.slot), m.span_reserve)
            .with_reading(Slot::from_index(s.slot), m.reading);
    }
    for slot in &m.fail_sources {
        dock = dock.with_verdict_for_source(Slot::from_index(*slot), false);
    }
    if let Some(polls) = m.undock_after_polls {
        dock = dock.with_undock_after_polls(polls);
    }
    dock
}
