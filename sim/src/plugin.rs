//! Bevy host for the simulation core.
//!
//! Updated for Bevy 0.17 (messages replace buffered events)

use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;

use crate::config::SimConfig;
use crate::input::{ControlKey, InputEvent};
use crate::simulation::{Simulation, TickResult};
use crate::snapshot::Snapshot;

/// Browser-style wheel units per scroll line.
const WHEEL_UNITS_PER_LINE: f32 = 100.0;

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    Input,
    Tick,
    Publish,
}

/// Written whenever the throttle lets a snapshot through.
#[derive(Message, Clone, Debug, PartialEq)]
pub struct SnapshotEmitted(pub Snapshot);

/// Output of the most recent tick. `None` before the first tick and after shutdown.
#[derive(Resource, Default, Debug)]
pub struct LatestFrame(pub Option<TickResult>);

pub struct SimulationPlugin {
    pub config: SimConfig,
    /// Forward keyboard and mouse wheel input. Needs `InputPlugin`.
    pub forward_keyboard: bool,
}

impl SimulationPlugin {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            forward_keyboard: false,
        }
    }

    pub fn with_keyboard(mut self) -> Self {
        self.forward_keyboard = true;
        self
    }
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        match Simulation::new(self.config.clone()) {
            Ok(simulation) => {
                app.insert_resource(simulation);
            }
            Err(err) => error!("Simulation failed to start: {err}"),
        }

        app.add_message::<InputEvent>()
            .add_message::<SnapshotEmitted>()
            .init_resource::<LatestFrame>();

        app.configure_sets(
            Update,
            (SimulationSet::Input, SimulationSet::Tick, SimulationSet::Publish).chain(),
        );

        app.add_systems(
            Update,
            (
                drain_input_events.in_set(SimulationSet::Input),
                tick_simulation.in_set(SimulationSet::Tick),
                publish_snapshot.in_set(SimulationSet::Publish),
            )
                .run_if(resource_exists::<Simulation>),
        );

        app.add_systems(Last, shutdown_on_exit.run_if(resource_exists::<Simulation>));

        if self.forward_keyboard {
            app.add_systems(
                Update,
                (forward_keyboard_input, forward_mouse_wheel)
                    .before(SimulationSet::Input),
            );
        }
    }
}

/// Translate pressed/released keys into [`InputEvent`]s.
pub fn forward_keyboard_input(keys: Res<ButtonInput<KeyCode>>, mut events: MessageWriter<InputEvent>) {
    for code in keys.get_just_pressed() {
        if let Some(key) = ControlKey::from_key_code(*code) {
            events.write(InputEvent::KeyDown(key));
        }
    }
    for code in keys.get_just_released() {
        if let Some(key) = ControlKey::from_key_code(*code) {
            events.write(InputEvent::KeyUp(key));
        }
    }
}

/// Scrolling down zooms out.
pub fn forward_mouse_wheel(mut wheel: MessageReader<MouseWheel>, mut events: MessageWriter<InputEvent>) {
    for scroll in wheel.read() {
        let units = match scroll.unit {
            MouseScrollUnit::Line => scroll.y * WHEEL_UNITS_PER_LINE,
            MouseScrollUnit::Pixel => scroll.y,
        };
        if units != 0.0 {
            events.write(InputEvent::Wheel(-units));
        }
    }
}

pub fn drain_input_events(mut events: MessageReader<InputEvent>, mut simulation: ResMut<Simulation>) {
    for event in events.read() {
        simulation.handle_input(*event);
    }
}

pub fn tick_simulation(time: Res<Time>, mut simulation: ResMut<Simulation>, mut latest: ResMut<LatestFrame>) {
    let tick_input = simulation.frame_input();
    latest.0 = simulation.tick(&tick_input, time.delta_secs(), time.elapsed());
}

pub fn publish_snapshot(latest: Res<LatestFrame>, mut emitted: MessageWriter<SnapshotEmitted>) {
    if let Some(snapshot) = latest.0.as_ref().and_then(|frame| frame.snapshot.clone()) {
        emitted.write(SnapshotEmitted(snapshot));
    }
}

/// Release the world and stop listening once the app is exiting.
pub fn shutdown_on_exit(mut exit: MessageReader<AppExit>, mut simulation: ResMut<Simulation>) {
    if exit.read().next().is_none() {
        return;
    }
    simulation.shutdown();
}
