//! Open-world movement simulation core.
//!
//! One avatar walks, jumps and takes over vehicles in a physics world shared with
//! wandering pedestrians. [`Simulation`] is the whole core behind a single `tick`
//! call; [`SimulationPlugin`] hosts it inside a Bevy app.

pub mod camera;
pub mod config;
pub mod control;
pub mod error;
pub mod input;
pub mod npc;
pub mod physics;
pub mod plugin;
pub mod possession;
pub mod registry;
pub mod simulation;
pub mod snapshot;
pub mod world;

pub use camera::{CameraFocus, CameraRig};
pub use config::SimConfig;
pub use control::{ControlTarget, Drive};
pub use error::{ConfigError, SimError};
pub use input::{ControlKey, HeldKeys, InputEvent, InputState, TickInput};
pub use physics::{BodyHandle, PhysicsWorld, RigidBody, Shape};
pub use plugin::{LatestFrame, SimulationPlugin, SimulationSet, SnapshotEmitted};
pub use possession::{IgnoreReason, Possession, PossessionMachine, Transition};
pub use registry::{EntityRegistry, NpcId, VehicleId};
pub use simulation::{Simulation, TickResult};
pub use snapshot::{GridPosition, Snapshot, SnapshotThrottle};
