//! Startup failures.
//!
//! Everything here is fatal to construction. Unmet possession guards are not
//! errors; see [`crate::possession::Transition`].

use std::path::PathBuf;

use thiserror::Error;

/// A roster or tunable the simulation refuses to start with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("vehicle possession is enabled but the vehicle roster is empty")]
    NoVehicles,

    #[error("{entity} mass must be positive, got {mass}")]
    NonPositiveMass { entity: &'static str, mass: f32 },

    #[error("invalid physics timestep: substep {substep}s with at most {max_substeps} substeps")]
    InvalidTimestep { substep: f32, max_substeps: u32 },

    #[error("frame delta clamp must be positive, got {0}")]
    NonPositiveClamp(f32),

    #[error("camera zoom range [{min}, {max}] is empty or non-positive")]
    InvalidZoomRange { min: f32, max: f32 },

    #[error("npc idle range [{min}, {max}] ticks is empty or starts at zero")]
    InvalidIdleRange { min: u32, max: u32 },
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("failed to read config {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}
