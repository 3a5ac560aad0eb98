//! Static world geometry.
//!
//! Ground and buildings are supplied by configuration and registered once as
//! immovable bodies. The simulation never looks at them again; they only take part
//! in contacts.

use bevy::prelude::*;

use crate::config::{Obstacle, PhysicsConfig, WorldConfig};
use crate::physics::{BodyHandle, ContactParams, PhysicsWorld, RigidBody, Shape};

/// Build an empty world with the configured gravity and contact material.
pub fn create_physics_world(config: &PhysicsConfig) -> PhysicsWorld {
    PhysicsWorld::new(
        config.gravity,
        ContactParams {
            friction: config.friction,
            restitution: config.restitution,
        },
    )
}

/// Register every configured obstacle as a static body.
pub fn register_static_geometry(world: &mut PhysicsWorld, config: &WorldConfig) -> Vec<BodyHandle> {
    let handles: Vec<BodyHandle> = config
        .obstacles
        .iter()
        .map(|obstacle| world.add_body(static_body(obstacle)))
        .collect();

    debug!("Registered {} static obstacle(s)", handles.len());
    handles
}

fn static_body(obstacle: &Obstacle) -> RigidBody {
    match *obstacle {
        Obstacle::Ground { height } => RigidBody::fixed(
            Shape::Plane {
                normal: Vec3::Y,
                offset: height,
            },
            Vec3::new(0.0, height, 0.0),
        ),
        Obstacle::Building {
            x,
            z,
            width,
            height,
            depth,
        } => RigidBody::fixed(
            Shape::Cuboid {
                half_extents: Vec3::new(width, height, depth) * 0.5,
            },
            Vec3::new(x, height * 0.5, z),
        ),
    }
}
