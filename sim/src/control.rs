//! Input-to-motion mapping shared by everything the player can control.
//!
//! Walking assigns velocity directly, which makes the avatar responsive but
//! frame-rate dependent (speed is scaled by the frame delta). Driving accumulates
//! force instead, so cars carry momentum and slow down through their own damping.

use bevy::prelude::*;

use crate::config::AvatarConfig;
use crate::physics::{BodyHandle, PhysicsWorld};

/// How control input moves a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Drive {
    /// Horizontal velocity = axes * speed * dt; multiplied by `idle_decay` when no key is held.
    Velocity { speed: f32, idle_decay: f32 },
    /// Force = axes * force, applied at the center of mass.
    Force { force: f32 },
}

/// The one body receiving player input this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlTarget {
    pub body: BodyHandle,
    pub drive: Drive,
}

impl ControlTarget {
    /// Apply movement axes (see [`crate::input::HeldKeys::movement_axes`]).
    ///
    /// Returns the yaw of the movement direction when a velocity-driven body moved.
    pub fn apply(&self, world: &mut PhysicsWorld, axes: Vec3, dt: f32) -> Option<f32> {
        let moving = axes.length_squared() > 0.0;

        match self.drive {
            Drive::Velocity { speed, idle_decay } => {
                let body = world.body_mut(self.body)?;
                if moving {
                    body.linvel.x = axes.x * speed * dt;
                    body.linvel.z = axes.z * speed * dt;
                    Some(axes.x.atan2(axes.z))
                } else {
                    body.linvel.x *= idle_decay;
                    body.linvel.z *= idle_decay;
                    None
                }
            }
            Drive::Force { force } => {
                if moving {
                    world.apply_force(self.body, axes * force);
                }
                None
            }
        }
    }
}

/// Airborne is inferred from height alone: anything further than `epsilon` from the
/// resting height counts, including standing on a car roof. There is no contact sensor.
#[inline]
pub fn is_airborne(height: f32, resting_height: f32, epsilon: f32) -> bool {
    (height - resting_height).abs() >= epsilon
}

/// Launch the avatar if it is standing. Returns true when the jump happened.
pub fn try_jump(world: &mut PhysicsWorld, body: BodyHandle, config: &AvatarConfig) -> bool {
    let Some(body) = world.body_mut(body) else {
        return false;
    };
    if is_airborne(body.position.y, config.resting_height, config.airborne_epsilon) {
        return false;
    }
    body.linvel.y = config.jump_speed;
    true
}
