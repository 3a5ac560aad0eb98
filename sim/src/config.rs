//! Simulation configuration.
//!
//! Every tunable lives here with defaults equal to the shipped layout
//! (four cars and five pedestrians around a crossroads).
//! A config can be loaded from a RON file; missing fields fall back to defaults.

use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SimError};

// =============================================================================
// PHYSICS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity in m/s^2. Stronger than real-world for snappier jumps.
    pub gravity: Vec3,
    /// Global contact friction coefficient.
    pub friction: f32,
    /// Global contact restitution (0 = no bounce).
    pub restitution: f32,
    /// Internal integration step in seconds.
    pub fixed_substep: f32,
    /// Maximum internal steps per frame.
    pub max_substeps: u32,
    /// Upper bound applied to every frame delta before it reaches the physics world.
    pub max_frame_delta: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -20.0, 0.0),
            friction: 0.3,
            restitution: 0.0,
            fixed_substep: 1.0 / 60.0,
            max_substeps: 3,
            max_frame_delta: 0.1,
        }
    }
}

impl PhysicsConfig {
    /// Substeps allowed per frame. Also capped so that leftover accumulator time can
    /// never push one frame past `max_frame_delta`.
    pub fn substep_budget(&self) -> u32 {
        let within_clamp = (self.max_frame_delta / self.fixed_substep).floor();
        if within_clamp.is_finite() && within_clamp >= 0.0 {
            self.max_substeps.min(within_clamp as u32)
        } else {
            0
        }
    }
}

// =============================================================================
// AVATAR
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AvatarConfig {
    pub spawn: Vec3,
    pub mass: f32,
    pub radius: f32,
    pub height: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Multiplied by the frame delta and written straight into the body velocity.
    pub walk_speed: f32,
    /// Horizontal velocity multiplier per tick when no movement key is held.
    pub idle_decay: f32,
    pub jump_speed: f32,
    /// Body-center height when standing on flat ground.
    pub resting_height: f32,
    /// Within this distance of `resting_height` the avatar counts as grounded.
    pub airborne_epsilon: f32,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            spawn: Vec3::new(0.0, 1.0, 0.0),
            mass: 70.0,
            radius: 0.3,
            height: 1.8,
            linear_damping: 0.8,
            angular_damping: 0.99,
            walk_speed: 150.0,
            idle_decay: 0.8,
            jump_speed: 10.0,
            resting_height: 1.0,
            airborne_epsilon: 0.2,
        }
    }
}

// =============================================================================
// VEHICLES
// =============================================================================

/// One entry of the fixed vehicle roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleSpawn {
    pub label: String,
    pub position: Vec3,
    /// Paint colour as 0xRRGGBB, passed through to presentation.
    pub color: u32,
}

impl VehicleSpawn {
    pub fn new(label: &str, x: f32, z: f32, color: u32) -> Self {
        Self {
            label: label.to_string(),
            position: Vec3::new(x, 1.0, z),
            color,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VehicleConfig {
    pub roster: Vec<VehicleSpawn>,
    pub mass: f32,
    pub half_extents: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Newtons per held movement key, applied at the center of mass.
    pub drive_force: f32,
    /// Planar distance below which the avatar may take a vehicle.
    pub interact_radius: f32,
    /// Where the avatar reappears relative to the vehicle on exit.
    pub exit_offset: Vec3,
    /// Where the avatar body waits while a vehicle is possessed.
    pub parking_position: Vec3,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            roster: vec![
                VehicleSpawn::new("red", -10.0, -10.0, 0xff4444),
                VehicleSpawn::new("blue", 10.0, 10.0, 0x4444ff),
                VehicleSpawn::new("green", -15.0, 15.0, 0x44ff44),
                VehicleSpawn::new("yellow", 20.0, -15.0, 0xffff44),
            ],
            mass: 500.0,
            half_extents: Vec3::new(2.0, 0.75, 1.0),
            linear_damping: 0.5,
            angular_damping: 0.5,
            drive_force: 7500.0,
            interact_radius: 5.0,
            exit_offset: Vec3::new(3.0, 2.0, 0.0),
            parking_position: Vec3::new(0.0, -1000.0, 0.0),
        }
    }
}

// =============================================================================
// NPCS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NpcSpawn {
    pub position: Vec3,
    pub color: u32,
}

impl NpcSpawn {
    pub fn new(x: f32, z: f32, color: u32) -> Self {
        Self {
            position: Vec3::new(x, 1.0, z),
            color,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NpcConfig {
    pub roster: Vec<NpcSpawn>,
    pub mass: f32,
    pub radius: f32,
    pub height: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub walk_speed: f32,
    /// Maximum heading change per tick in radians.
    pub turn_step: f32,
    /// Idle countdown range in ticks (inclusive).
    pub idle_ticks_min: u32,
    pub idle_ticks_max: u32,
    /// Soft boundary on |x| and |z|.
    pub world_radius: f32,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            roster: vec![
                NpcSpawn::new(-20.0, -5.0, 0xff6b6b),
                NpcSpawn::new(15.0, -8.0, 0x6bff6b),
                NpcSpawn::new(-8.0, 20.0, 0x6b6bff),
                NpcSpawn::new(25.0, 25.0, 0xffff6b),
                NpcSpawn::new(-25.0, 10.0, 0xff6bff),
            ],
            mass: 70.0,
            radius: 0.3,
            height: 1.8,
            linear_damping: 0.8,
            angular_damping: 0.99,
            walk_speed: 30.0,
            turn_step: 0.05,
            idle_ticks_min: 60,
            idle_ticks_max: 180,
            world_radius: 40.0,
        }
    }
}

// =============================================================================
// CAMERA
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub initial_position: Vec3,
    pub initial_distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Orbit distance change per wheel unit.
    pub zoom_sensitivity: f32,
    /// Orbit angle change per tick while a rotate key is held.
    pub rotate_step: f32,
    /// Fraction of the remaining distance covered per tick.
    pub smoothing: f32,
    pub follow_height_on_foot: f32,
    pub follow_height_vehicle: f32,
    pub look_height_on_foot: f32,
    pub look_height_vehicle: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            initial_position: Vec3::new(0.0, 15.0, 25.0),
            initial_distance: 15.0,
            min_distance: 5.0,
            max_distance: 30.0,
            zoom_sensitivity: 0.01,
            rotate_step: 0.03,
            smoothing: 0.1,
            follow_height_on_foot: 8.0,
            follow_height_vehicle: 10.0,
            look_height_on_foot: 1.0,
            look_height_vehicle: 0.0,
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotConfig {
    pub interval_ms: u64,
    pub health: u32,
    pub armor: u32,
    pub currency: u32,
    pub wanted: u8,
    pub mission: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            health: 100,
            armor: 50,
            currency: 5420,
            wanted: 0,
            mission: "Free roam".to_string(),
        }
    }
}

// =============================================================================
// STATIC WORLD
// =============================================================================

/// Immovable geometry registered with the physics world at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Obstacle {
    /// Infinite ground plane through `height`, facing +Y.
    Ground { height: f32 },
    /// Axis-aligned building resting on the ground.
    Building { x: f32, z: f32, width: f32, height: f32, depth: f32 },
}

/// Only the ground collides by default. The city blocks are scenery; the blue car
/// spawns inside the footprint of the (15, 15) block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub obstacles: Vec<Obstacle>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            obstacles: vec![Obstacle::Ground { height: 0.0 }],
        }
    }
}

impl WorldConfig {
    /// The four city blocks around the crossroads, as solid obstacles.
    pub fn city_blocks() -> Vec<Obstacle> {
        vec![
            Obstacle::Building { x: -30.0, z: -30.0, width: 15.0, height: 25.0, depth: 15.0 },
            Obstacle::Building { x: -30.0, z: 15.0, width: 15.0, height: 20.0, depth: 15.0 },
            Obstacle::Building { x: 15.0, z: -30.0, width: 15.0, height: 30.0, depth: 15.0 },
            Obstacle::Building { x: 15.0, z: 15.0, width: 15.0, height: 18.0, depth: 15.0 },
        ]
    }
}

/// Feature level. Disabling both yields the walk-and-jump-only variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    pub possession: bool,
    pub npcs: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            possession: true,
            npcs: true,
        }
    }
}

// =============================================================================
// ROOT
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub physics: PhysicsConfig,
    pub avatar: AvatarConfig,
    pub vehicles: VehicleConfig,
    pub npcs: NpcConfig,
    pub camera: CameraConfig,
    pub snapshot: SnapshotConfig,
    pub world: WorldConfig,
    pub features: FeatureConfig,
    /// Seed for NPC wandering. Entropy-seeded when absent.
    pub rng_seed: Option<u64>,
}

impl SimConfig {
    /// Walk-and-jump only: no vehicles to take and no pedestrians.
    pub fn minimal() -> Self {
        let mut config = Self::default();
        config.features = FeatureConfig {
            possession: false,
            npcs: false,
        };
        config.vehicles.roster.clear();
        config.npcs.roster.clear();
        config
    }

    /// Parse a RON document.
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Load and validate a RON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron(&text).map_err(|source| SimError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject rosters and tunables the simulation cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let physics = &self.physics;
        if !(physics.fixed_substep > 0.0)
            || physics.max_substeps == 0
            || physics.fixed_substep > physics.max_frame_delta
        {
            return Err(ConfigError::InvalidTimestep {
                substep: physics.fixed_substep,
                max_substeps: physics.max_substeps,
            });
        }
        if !(physics.max_frame_delta > 0.0) {
            return Err(ConfigError::NonPositiveClamp(physics.max_frame_delta));
        }

        check_mass("avatar", self.avatar.mass)?;

        if self.features.possession {
            if self.vehicles.roster.is_empty() {
                return Err(ConfigError::NoVehicles);
            }
            check_mass("vehicle", self.vehicles.mass)?;
        }

        if self.features.npcs && !self.npcs.roster.is_empty() {
            check_mass("npc", self.npcs.mass)?;
            if self.npcs.idle_ticks_min == 0 || self.npcs.idle_ticks_min > self.npcs.idle_ticks_max {
                return Err(ConfigError::InvalidIdleRange {
                    min: self.npcs.idle_ticks_min,
                    max: self.npcs.idle_ticks_max,
                });
            }
        }

        let camera = &self.camera;
        if !(camera.min_distance > 0.0) || camera.min_distance > camera.max_distance {
            return Err(ConfigError::InvalidZoomRange {
                min: camera.min_distance,
                max: camera.max_distance,
            });
        }

        Ok(())
    }
}

fn check_mass(entity: &'static str, mass: f32) -> Result<(), ConfigError> {
    // `!(x > 0)` also rejects NaN.
    if !(mass > 0.0) {
        return Err(ConfigError::NonPositiveMass { entity, mass });
    }
    Ok(())
}
