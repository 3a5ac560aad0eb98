//! Entity registry: the avatar, the vehicle roster and the NPC roster.
//!
//! Membership is fixed at construction. Only the physical state of each body changes
//! afterwards, so handles stay valid for the life of the session.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::npc::Wander;
use crate::physics::{BodyHandle, PhysicsWorld, RigidBody, Shape};

/// Index into the vehicle roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub usize);

/// Index into the NPC roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NpcId(pub usize);

/// The player character.
#[derive(Clone, Debug)]
pub struct Avatar {
    pub body: BodyHandle,
    /// Hidden while a vehicle is possessed.
    pub visible: bool,
    /// Render yaw, follows the last movement direction.
    pub facing: f32,
    half_height: f32,
}

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id: VehicleId,
    pub body: BodyHandle,
    pub label: String,
    pub color: u32,
}

#[derive(Clone, Debug)]
pub struct Npc {
    pub id: NpcId,
    pub body: BodyHandle,
    pub wander: Wander,
    pub color: u32,
    half_height: f32,
}

pub struct EntityRegistry {
    avatar: Avatar,
    vehicles: Vec<Vehicle>,
    npcs: Vec<Npc>,
}

impl EntityRegistry {
    /// Create every roster body in `world`.
    ///
    /// Vehicles and NPCs are only spawned when their feature is enabled.
    pub fn spawn(world: &mut PhysicsWorld, config: &SimConfig, rng: &mut impl Rng) -> Self {
        let avatar_cfg = &config.avatar;
        let avatar_body = world.add_body(
            RigidBody::dynamic(
                Shape::Cylinder {
                    radius: avatar_cfg.radius,
                    height: avatar_cfg.height,
                },
                avatar_cfg.mass,
                avatar_cfg.spawn,
            )
            .with_damping(avatar_cfg.linear_damping, avatar_cfg.angular_damping)
            .with_fixed_rotation(),
        );
        let avatar = Avatar {
            body: avatar_body,
            visible: true,
            facing: 0.0,
            half_height: avatar_cfg.height * 0.5,
        };

        let mut vehicles = Vec::new();
        if config.features.possession {
            let vehicle_cfg = &config.vehicles;
            for (index, spawn) in vehicle_cfg.roster.iter().enumerate() {
                let body = world.add_body(
                    RigidBody::dynamic(
                        Shape::Cuboid {
                            half_extents: vehicle_cfg.half_extents,
                        },
                        vehicle_cfg.mass,
                        spawn.position,
                    )
                    .with_damping(vehicle_cfg.linear_damping, vehicle_cfg.angular_damping),
                );
                vehicles.push(Vehicle {
                    id: VehicleId(index),
                    body,
                    label: spawn.label.clone(),
                    color: spawn.color,
                });
            }
        }

        let mut npcs = Vec::new();
        if config.features.npcs {
            let npc_cfg = &config.npcs;
            for (index, spawn) in npc_cfg.roster.iter().enumerate() {
                let body = world.add_body(
                    RigidBody::dynamic(
                        Shape::Cylinder {
                            radius: npc_cfg.radius,
                            height: npc_cfg.height,
                        },
                        npc_cfg.mass,
                        spawn.position,
                    )
                    .with_damping(npc_cfg.linear_damping, npc_cfg.angular_damping)
                    .with_fixed_rotation(),
                );
                npcs.push(Npc {
                    id: NpcId(index),
                    body,
                    wander: Wander::random(rng),
                    color: spawn.color,
                    half_height: npc_cfg.height * 0.5,
                });
            }
        }

        info!(
            "Spawned avatar at {:?}, {} vehicle(s), {} NPC(s)",
            avatar_cfg.spawn,
            vehicles.len(),
            npcs.len()
        );

        Self {
            avatar,
            vehicles,
            npcs,
        }
    }

    pub fn avatar(&self) -> &Avatar {
        &self.avatar
    }

    pub fn avatar_mut(&mut self) -> &mut Avatar {
        &mut self.avatar
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id.0)
    }

    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    pub fn npc(&self, id: NpcId) -> Option<&Npc> {
        self.npcs.get(id.0)
    }

    pub(crate) fn npcs_mut(&mut self) -> &mut [Npc] {
        &mut self.npcs
    }

    /// Visual root of the avatar: feet on the ground, facing the last move direction.
    pub fn avatar_transform(&self, world: &PhysicsWorld) -> Transform {
        let position = body_position(world, self.avatar.body);
        Transform::from_translation(position - Vec3::Y * self.avatar.half_height)
            .with_rotation(Quat::from_rotation_y(self.avatar.facing))
    }

    /// Vehicles are drawn exactly at their body pose.
    pub fn vehicle_transform(&self, world: &PhysicsWorld, id: VehicleId) -> Option<Transform> {
        let vehicle = self.vehicle(id)?;
        let body = world.body(vehicle.body)?;
        Some(Transform::from_translation(body.position).with_rotation(body.rotation))
    }

    pub fn npc_transform(&self, world: &PhysicsWorld, id: NpcId) -> Option<Transform> {
        let npc = self.npc(id)?;
        let body = world.body(npc.body)?;
        Some(
            Transform::from_translation(body.position - Vec3::Y * npc.half_height)
                .with_rotation(Quat::from_rotation_y(npc.wander.current_heading)),
        )
    }
}

/// Position of a body, or the origin if it no longer exists.
pub(crate) fn body_position(world: &PhysicsWorld, handle: BodyHandle) -> Vec3 {
    world.body(handle).map(|b| b.position).unwrap_or(Vec3::ZERO)
}
