//! Pedestrian wandering.
//!
//! Each NPC idles on a heading for a random number of ticks, then picks a new
//! target heading and turns toward it at a bounded rate. Walking past the edge of
//! the play area flips the NPC around (soft boundary, may overshoot briefly).

use std::f32::consts::{PI, TAU};

use bevy::prelude::*;
use rand::Rng;

use crate::config::NpcConfig;
use crate::physics::PhysicsWorld;
use crate::registry::Npc;

/// Per-NPC wander state.
#[derive(Clone, Debug, PartialEq)]
pub struct Wander {
    /// Radians; 0 walks toward +Z, PI/2 toward +X.
    pub current_heading: f32,
    pub target_heading: f32,
    /// Ticks left before the next redirect.
    pub idle_timer: u32,
}

impl Wander {
    /// Random headings and an expired timer, so the first tick redirects.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            current_heading: rng.gen_range(0.0..TAU),
            target_heading: rng.gen_range(0.0..TAU),
            idle_timer: 0,
        }
    }

    /// Count down, and on expiry draw a new target heading and idle duration.
    ///
    /// Returns true when a redirect happened.
    pub fn tick_timer(&mut self, rng: &mut impl Rng, idle_min: u32, idle_max: u32) -> bool {
        self.idle_timer = self.idle_timer.saturating_sub(1);
        if self.idle_timer > 0 {
            return false;
        }
        self.target_heading = rng.gen_range(0.0..TAU);
        self.idle_timer = rng.gen_range(idle_min..=idle_max);
        true
    }

    /// Turn toward the target by at most `max_step` radians.
    pub fn turn(&mut self, max_step: f32) {
        self.current_heading = step_heading(self.current_heading, self.target_heading, max_step);
    }

    /// Turn around by half a revolution, keeping the pending turn intact.
    pub fn reverse(&mut self) {
        self.current_heading += PI;
        self.target_heading += PI;
    }

    /// Unit walking direction on the XZ plane.
    pub fn direction(&self) -> Vec3 {
        Vec3::new(self.current_heading.sin(), 0.0, self.current_heading.cos())
    }
}

/// Wrap an angle into [-PI, PI).
#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Move `current` toward `target` along the shorter arc, by at most `max_step`.
pub fn step_heading(current: f32, target: f32, max_step: f32) -> f32 {
    let diff = wrap_angle(target - current);
    current + diff.signum() * diff.abs().min(max_step)
}

/// True when the NPC is past the boundary on some axis and still walking outward.
pub fn walking_out_of_bounds(position: Vec3, direction: Vec3, radius: f32) -> bool {
    (position.x.abs() > radius && direction.x * position.x > 0.0)
        || (position.z.abs() > radius && direction.z * position.z > 0.0)
}

/// Advance every NPC by one tick and write its walking velocity.
///
/// Vertical velocity is left to gravity.
pub fn tick_npcs(
    world: &mut PhysicsWorld,
    npcs: &mut [Npc],
    config: &NpcConfig,
    rng: &mut impl Rng,
    dt: f32,
) {
    for npc in npcs.iter_mut() {
        if npc.wander.tick_timer(rng, config.idle_ticks_min, config.idle_ticks_max) {
            trace!(
                "NPC {} redirecting to heading {:.2} for {} ticks",
                npc.id.0,
                npc.wander.target_heading,
                npc.wander.idle_timer
            );
        }

        npc.wander.turn(config.turn_step);

        let Some(body) = world.body_mut(npc.body) else {
            continue;
        };
        let walk = npc.wander.direction() * config.walk_speed * dt;
        body.linvel.x = walk.x;
        body.linvel.z = walk.z;

        if walking_out_of_bounds(body.position, npc.wander.direction(), config.world_radius) {
            npc.wander.reverse();
        }
    }
}
