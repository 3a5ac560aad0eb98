//! Headless simulation host.
//!
//! Runs the simulation core in a Bevy app without rendering, feeds it a scripted
//! input timeline, and logs every snapshot as one JSON line.
//!
//! Environment:
//! - `SIM_CONFIG`: path to a RON `SimConfig` (defaults when unset)
//! - `SIM_SCRIPT`: path to a RON input script (built-in tour when unset)
//! - `RUST_LOG`: log filter

mod script;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use sim::{LatestFrame, SimConfig, SimError, SimulationPlugin, SimulationSet, SnapshotEmitted};

use script::{play_script, Script, ScriptError, ScriptPlayer};

fn load_config() -> Result<SimConfig, SimError> {
    match std::env::var_os("SIM_CONFIG") {
        Some(path) => SimConfig::load(path),
        None => {
            let config = SimConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn load_script() -> Result<Script, ScriptError> {
    match std::env::var_os("SIM_SCRIPT") {
        Some(path) => Script::load(path),
        None => Script::builtin(),
    }
}

/// Emit each snapshot as a JSON line.
fn log_snapshots(mut snapshots: MessageReader<SnapshotEmitted>) {
    for SnapshotEmitted(snapshot) in snapshots.read() {
        match snapshot.to_json() {
            Ok(json) => info!("{json}"),
            Err(err) => warn!("Failed to encode snapshot: {err}"),
        }
    }
}

/// Log possession changes as they happen.
fn log_transitions(latest: Res<LatestFrame>) {
    let Some(frame) = latest.0.as_ref() else {
        return;
    };
    if let Some(transition) = frame.transition {
        debug!("Tick {}: {:?} -> {:?}", frame.tick, transition, frame.possession);
    }
}

fn main() -> AppExit {
    let config = load_config();
    let script = load_script();

    let frame = script
        .as_ref()
        .map(Script::frame_duration)
        .unwrap_or(std::time::Duration::from_millis(16));

    let mut app = App::new();

    // Headless plugins (no rendering), one frame per script step.
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame)));
    app.add_plugins(LogPlugin::default());

    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!("Cannot start simulation: {err}");
            return AppExit::error();
        }
    };
    let script = match script {
        Ok(script) => script,
        Err(err) => {
            error!("Cannot load input script: {err}");
            return AppExit::error();
        }
    };

    info!(
        "Running {} frames at {:?} per frame with {} scripted actions",
        script.frames,
        frame,
        script.events.len()
    );

    app.add_plugins(SimulationPlugin::new(config));
    app.insert_resource(ScriptPlayer::new(script));

    app.add_systems(Update, play_script.before(SimulationSet::Input));
    app.add_systems(
        Update,
        (log_snapshots, log_transitions).after(SimulationSet::Publish),
    );

    app.run()
}
