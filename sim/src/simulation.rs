//! The tick driver.
//!
//! [`Simulation`] owns every piece of simulation state, including the input
//! accumulator. A host forwards [`InputEvent`]s as they arrive, freezes them with
//! [`Simulation::frame_input`] once per frame, and gets back a [`TickResult`]
//! describing what to draw.
//!
//! Order within a tick:
//! 1. clamp the frame delta
//! 2. one-shot input: zoom, interact, jump
//! 3. step physics
//! 4. drive the controlled body
//! 5. orbit the camera, wander the NPCs, ease the camera
//! 6. collect render transforms and maybe a snapshot

use std::time::Duration;

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::camera::{CameraFocus, CameraRig};
use crate::config::SimConfig;
use crate::control::{is_airborne, try_jump, ControlTarget, Drive};
use crate::error::SimError;
use crate::input::{InputEvent, InputState, TickInput};
use crate::npc::tick_npcs;
use crate::physics::{PhysicsWorld, StepReport};
use crate::possession::{Possession, PossessionMachine, Transition};
use crate::registry::{body_position, EntityRegistry};
use crate::snapshot::{Snapshot, SnapshotThrottle};
use crate::world::{create_physics_world, register_static_geometry};

/// Everything the presentation layer needs after one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickResult {
    pub tick: u64,
    /// Frame delta after clamping.
    pub frame_delta: f32,
    pub step: StepReport,
    pub possession: Possession,
    /// Set when an interact press was handled this tick.
    pub transition: Option<Transition>,
    pub jumped: bool,
    /// Avatar height is away from resting height. Always true while parked.
    pub airborne: bool,
    pub avatar: Transform,
    pub avatar_visible: bool,
    /// In roster order.
    pub vehicles: Vec<Transform>,
    /// In roster order.
    pub npcs: Vec<Transform>,
    pub camera: Transform,
    pub camera_look_at: Vec3,
    pub snapshot: Option<Snapshot>,
}

#[derive(Resource)]
pub struct Simulation {
    config: SimConfig,
    world: PhysicsWorld,
    registry: EntityRegistry,
    possession: PossessionMachine,
    input: InputState,
    camera: CameraRig,
    throttle: SnapshotThrottle,
    rng: StdRng,
    mission: String,
    ticks: u64,
    shut_down: bool,
}

impl Simulation {
    /// Validate `config` and build the world, rosters and camera.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut world = create_physics_world(&config.physics);
        register_static_geometry(&mut world, &config.world);
        let registry = EntityRegistry::spawn(&mut world, &config, &mut rng);

        info!(
            "Simulation ready: {} bodies, possession {}, npcs {}",
            world.len(),
            if config.features.possession { "on" } else { "off" },
            if config.features.npcs { "on" } else { "off" },
        );

        Ok(Self {
            possession: PossessionMachine::new(config.features.possession),
            input: InputState::default(),
            camera: CameraRig::new(&config.camera),
            throttle: SnapshotThrottle::new(Duration::from_millis(config.snapshot.interval_ms)),
            mission: config.snapshot.mission.clone(),
            config,
            world,
            registry,
            rng,
            ticks: 0,
            shut_down: false,
        })
    }

    /// Advance one frame. `now` is host wall time, used only for snapshot pacing.
    ///
    /// Returns `None` once the simulation has been shut down.
    pub fn tick(&mut self, input: &TickInput, frame_delta: f32, now: Duration) -> Option<TickResult> {
        if self.shut_down {
            return None;
        }

        let physics = &self.config.physics;
        let dt = if frame_delta.is_nan() {
            0.0
        } else {
            frame_delta.clamp(0.0, physics.max_frame_delta)
        };

        // --- One-shot input ---
        if input.wheel_delta != 0.0 {
            self.camera.zoom(input.wheel_delta, self.config.camera.zoom_sensitivity);
        }

        let transition = input
            .interact
            .then(|| self.possession.interact(&mut self.world, &mut self.registry, &self.config.vehicles));

        let jumped = input.jump
            && !self.possession.state().in_vehicle()
            && try_jump(&mut self.world, self.registry.avatar().body, &self.config.avatar);

        // --- Physics ---
        let step = self.world.step(physics.fixed_substep, dt, physics.substep_budget());

        // --- Control ---
        if let Some(target) = self.control_target() {
            if let Some(yaw) = target.apply(&mut self.world, input.held.movement_axes(), dt) {
                self.registry.avatar_mut().facing = yaw;
            }
        }

        self.camera.rotate(input.held.rotate_axis(), self.config.camera.rotate_step);

        // --- NPCs ---
        tick_npcs(
            &mut self.world,
            self.registry.npcs_mut(),
            &self.config.npcs,
            &mut self.rng,
            dt,
        );

        // --- Camera ---
        let focus = CameraFocus {
            position: self.controlled_position(),
            in_vehicle: self.possession.state().in_vehicle(),
        };
        self.camera.update(focus, &self.config.camera);

        // --- Output ---
        let snapshot = self.throttle.poll(now).then(|| self.snapshot());
        if let Some(snapshot) = &snapshot {
            debug!("Snapshot at {:?}: {:?}", now, snapshot.position);
        }

        let avatar_height = body_position(&self.world, self.registry.avatar().body).y;
        let avatar_cfg = &self.config.avatar;
        let airborne = is_airborne(avatar_height, avatar_cfg.resting_height, avatar_cfg.airborne_epsilon);

        self.ticks += 1;

        Some(TickResult {
            tick: self.ticks,
            frame_delta: dt,
            step,
            possession: self.possession.state(),
            transition,
            jumped,
            airborne,
            avatar: self.registry.avatar_transform(&self.world),
            avatar_visible: self.registry.avatar().visible,
            vehicles: self
                .registry
                .vehicles()
                .iter()
                .filter_map(|vehicle| self.registry.vehicle_transform(&self.world, vehicle.id))
                .collect(),
            npcs: self
                .registry
                .npcs()
                .iter()
                .filter_map(|npc| self.registry.npc_transform(&self.world, npc.id))
                .collect(),
            camera: self.camera.transform(),
            camera_look_at: self.camera.look_at,
            snapshot,
        })
    }

    /// Record one input event for the next [`Simulation::frame_input`].
    ///
    /// Ignored after shutdown.
    pub fn handle_input(&mut self, event: InputEvent) {
        self.input.handle(event);
    }

    /// Freeze the input gathered since the previous frame.
    pub fn frame_input(&mut self) -> TickInput {
        self.input.begin_tick()
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Remove every body, detach input and stop ticking. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.world.clear();
        self.input.detach();
        self.shut_down = true;
        info!("Simulation shut down after {} ticks", self.ticks);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// The body receiving player input and how it is driven.
    pub fn control_target(&self) -> Option<ControlTarget> {
        match self.possession.state() {
            Possession::OnFoot => Some(ControlTarget {
                body: self.registry.avatar().body,
                drive: Drive::Velocity {
                    speed: self.config.avatar.walk_speed,
                    idle_decay: self.config.avatar.idle_decay,
                },
            }),
            Possession::InVehicle(id) => self.registry.vehicle(id).map(|vehicle| ControlTarget {
                body: vehicle.body,
                drive: Drive::Force {
                    force: self.config.vehicles.drive_force,
                },
            }),
        }
    }

    /// Position of the avatar on foot, or of the possessed vehicle.
    pub fn controlled_position(&self) -> Vec3 {
        self.control_target()
            .map(|target| body_position(&self.world, target.body))
            .unwrap_or(Vec3::ZERO)
    }

    /// Unthrottled snapshot of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(
            &self.config.snapshot,
            &self.mission,
            self.possession.state().in_vehicle(),
            self.controlled_position(),
        )
    }

    pub fn set_mission_label(&mut self, label: impl Into<String>) {
        self.mission = label.into();
        debug!("Mission label set to {:?}", self.mission);
    }

    pub fn mission(&self) -> &str {
        &self.mission
    }

    pub fn possession(&self) -> Possession {
        self.possession.state()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Direct body access for hosts that teleport or inspect bodies.
    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::input::{ControlKey, HeldKeys};
    use crate::registry::VehicleId;

    const FRAME: f32 = 1.0 / 60.0;

    fn seeded() -> SimConfig {
        SimConfig {
            rng_seed: Some(11),
            ..SimConfig::default()
        }
    }

    fn at(tick: u32) -> Duration {
        Duration::from_secs_f32(tick as f32 * FRAME)
    }

    fn interact() -> TickInput {
        TickInput {
            interact: true,
            ..TickInput::default()
        }
    }

    #[test]
    fn test_invalid_config_fails_startup() {
        let mut config = seeded();
        config.vehicles.roster.clear();
        let result = Simulation::new(config);
        assert!(matches!(
            result,
            Err(SimError::Configuration(ConfigError::NoVehicles))
        ));
    }

    #[test]
    fn test_frame_delta_is_clamped() {
        let mut sim = Simulation::new(seeded()).unwrap();
        let result = sim.tick(&TickInput::default(), 5.0, at(0)).unwrap();
        assert_eq!(result.frame_delta, 0.1);
        assert!(result.step.simulated <= 0.1 + 1e-6);

        let result = sim.tick(&TickInput::default(), f32::NAN, at(1)).unwrap();
        assert_eq!(result.frame_delta, 0.0);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_final() {
        let mut sim = Simulation::new(seeded()).unwrap();
        sim.handle_input(InputEvent::KeyDown(ControlKey::Forward));
        assert!(sim.tick(&TickInput::default(), FRAME, at(0)).is_some());

        sim.shutdown();
        sim.shutdown();

        assert!(sim.is_shut_down());
        assert!(sim.world().is_empty());
        assert!(sim.input().is_detached());

        sim.handle_input(InputEvent::KeyDown(ControlKey::Interact));
        assert_eq!(sim.frame_input(), TickInput::default());
        assert!(sim.tick(&TickInput::default(), FRAME, at(1)).is_none());
        assert_eq!(sim.ticks(), 1);
    }

    #[test]
    fn test_frame_input_freezes_handled_events() {
        let mut sim = Simulation::new(seeded()).unwrap();
        sim.handle_input(InputEvent::KeyDown(ControlKey::Forward));
        sim.handle_input(InputEvent::KeyDown(ControlKey::Jump));

        let input = sim.frame_input();
        assert!(input.held.forward);
        assert!(input.jump);
        assert!(!sim.frame_input().jump);
    }

    #[test]
    fn test_coarse_substeps_stay_within_clamp() {
        let mut config = seeded();
        config.physics.fixed_substep = 0.03;
        config.physics.max_substeps = 10;
        let mut sim = Simulation::new(config).unwrap();

        for tick in 0..20 {
            let result = sim.tick(&TickInput::default(), 5.0, at(tick)).unwrap();
            assert!(
                result.step.simulated <= 0.1 + 1e-6,
                "tick {tick} simulated {}",
                result.step.simulated
            );
        }
    }

    #[test]
    fn test_airborne_is_reported_every_tick() {
        let mut sim = Simulation::new(seeded()).unwrap();
        let result = sim.tick(&TickInput::default(), FRAME, at(0)).unwrap();
        assert!(!result.airborne);

        let jump = TickInput {
            jump: true,
            ..TickInput::default()
        };
        assert!(sim.tick(&jump, FRAME, at(1)).unwrap().jumped);
        let mut result = None;
        for tick in 2..7 {
            result = sim.tick(&TickInput::default(), FRAME, at(tick));
        }
        assert!(result.unwrap().airborne);

        let avatar = sim.registry().avatar().body;
        sim.world_mut().body_mut(avatar).unwrap().position = Vec3::new(-10.0, 1.0, -7.0);
        sim.world_mut().body_mut(avatar).unwrap().linvel = Vec3::ZERO;
        let result = sim.tick(&interact(), FRAME, at(7)).unwrap();
        assert!(result.possession.in_vehicle());
        assert!(result.airborne);
    }

    #[test]
    fn test_walking_sets_facing() {
        let mut sim = Simulation::new(seeded()).unwrap();
        let input = TickInput::holding(HeldKeys::default().with(ControlKey::Right));
        let result = sim.tick(&input, FRAME, at(0)).unwrap();

        assert!((sim.registry().avatar().facing - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        assert!(result.avatar.rotation.angle_between(expected) < 1e-3);
    }

    #[test]
    fn test_driving_pushes_possessed_vehicle() {
        let mut sim = Simulation::new(seeded()).unwrap();
        let avatar = sim.registry().avatar().body;
        sim.world_mut().body_mut(avatar).unwrap().position = Vec3::new(-7.0, 1.0, -10.0);

        let result = sim.tick(&interact(), FRAME, at(0)).unwrap();
        assert_eq!(result.transition, Some(Transition::Entered(VehicleId(0))));
        assert!(!result.avatar_visible);

        let forward = TickInput::holding(HeldKeys::default().with(ControlKey::Forward));
        for tick in 1..=60 {
            sim.tick(&forward, FRAME, at(tick));
        }

        let car = sim.registry().vehicle(VehicleId(0)).unwrap().body;
        let position = sim.world().body(car).unwrap().position;
        assert!(position.z < -10.5, "car only reached z = {}", position.z);
        assert!(sim.world().body(avatar).unwrap().position.y <= -900.0);
        assert_eq!(sim.controlled_position(), position);
    }

    #[test]
    fn test_jump_is_ignored_in_vehicle() {
        let mut sim = Simulation::new(seeded()).unwrap();
        let avatar = sim.registry().avatar().body;
        sim.world_mut().body_mut(avatar).unwrap().position = Vec3::new(-10.0, 1.0, -7.0);

        let input = TickInput {
            interact: true,
            jump: true,
            ..TickInput::default()
        };
        let result = sim.tick(&input, FRAME, at(0)).unwrap();

        assert!(result.possession.in_vehicle());
        assert!(!result.jumped);
    }

    #[test]
    fn test_mission_label_reaches_snapshot() {
        let mut sim = Simulation::new(seeded()).unwrap();
        sim.set_mission_label("Deliver the package");

        let result = sim.tick(&TickInput::default(), FRAME, at(0)).unwrap();
        let snapshot = result.snapshot.unwrap();
        assert_eq!(snapshot.mission, "Deliver the package");
        assert!(!snapshot.in_vehicle);
        assert_eq!(snapshot.currency, 5420);
    }

    #[test]
    fn test_render_output_covers_rosters() {
        let mut sim = Simulation::new(seeded()).unwrap();
        let result = sim.tick(&TickInput::default(), FRAME, at(0)).unwrap();
        assert_eq!(result.vehicles.len(), 4);
        assert_eq!(result.npcs.len(), 5);
        assert!(result.avatar_visible);
    }
}
