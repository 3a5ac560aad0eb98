//! Lightweight rigid-body world.
//!
//! Goals:
//! - Owns every body in the simulation (characters, vehicles, static geometry)
//! - Advances variable frame deltas in fixed sub-steps for stable integration
//! - Resolves contacts against the ground plane, static buildings and other bodies
//!
//! Contacts use world-space bounding volumes rather than exact shape queries. That is
//! plenty for upright characters and unrotated cars on flat ground.
//!
//! NaN or infinite state is a caller bug and is not checked.

use bevy::prelude::*;

/// Stable index of a body inside one [`PhysicsWorld`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(usize);

impl BodyHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Collision shape, expressed in body-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    /// Cylinder along the local Y axis (characters).
    Cylinder { radius: f32, height: f32 },
    /// Box with the given half-extents (vehicles, buildings).
    Cuboid { half_extents: Vec3 },
    /// Infinite half-space `normal · p <= offset`. Only valid on static bodies.
    Plane { normal: Vec3, offset: f32 },
}

impl Shape {
    /// Half-extents of the world-space AABB for a body with this orientation.
    fn aabb_half_extents(&self, rotation: Quat) -> Vec3 {
        match *self {
            Shape::Cylinder { radius, height } => {
                let axis = rotation * Vec3::Y;
                let half = height * 0.5;
                let extent = |a: f32| a.abs() * half + radius * (1.0 - a * a).max(0.0).sqrt();
                Vec3::new(extent(axis.x), extent(axis.y), extent(axis.z))
            }
            Shape::Cuboid { half_extents } => {
                let m = Mat3::from_quat(rotation);
                m.x_axis.abs() * half_extents.x
                    + m.y_axis.abs() * half_extents.y
                    + m.z_axis.abs() * half_extents.z
            }
            Shape::Plane { .. } => Vec3::splat(f32::INFINITY),
        }
    }

    /// Distance from the body center to its furthest point along `dir` (unit length).
    fn support_extent(&self, rotation: Quat, dir: Vec3) -> f32 {
        match *self {
            Shape::Cylinder { radius, height } => {
                let a = (rotation * Vec3::Y).dot(dir);
                a.abs() * height * 0.5 + radius * (1.0 - a * a).max(0.0).sqrt()
            }
            Shape::Cuboid { half_extents } => {
                let m = Mat3::from_quat(rotation);
                m.x_axis.dot(dir).abs() * half_extents.x
                    + m.y_axis.dot(dir).abs() * half_extents.y
                    + m.z_axis.dot(dir).abs() * half_extents.z
            }
            Shape::Plane { .. } => f32::INFINITY,
        }
    }
}

/// A single rigid body. Mass zero means static (immovable).
#[derive(Clone, Debug, PartialEq)]
pub struct RigidBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub linvel: Vec3,
    pub angvel: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Upright characters never topple.
    pub fixed_rotation: bool,
    pub shape: Shape,
    /// Disabled bodies are skipped by integration and contacts.
    pub enabled: bool,
    force: Vec3,
}

impl RigidBody {
    pub fn dynamic(shape: Shape, mass: f32, position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            linvel: Vec3::ZERO,
            angvel: Vec3::ZERO,
            mass,
            linear_damping: 0.01,
            angular_damping: 0.01,
            fixed_rotation: false,
            shape,
            enabled: true,
            force: Vec3::ZERO,
        }
    }

    pub fn fixed(shape: Shape, position: Vec3) -> Self {
        Self {
            mass: 0.0,
            ..Self::dynamic(shape, 0.0, position)
        }
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_fixed_rotation(mut self) -> Self {
        self.fixed_rotation = true;
        self
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }

    #[inline]
    fn inverse_mass(&self) -> f32 {
        if self.is_static() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Force accumulated since the last [`PhysicsWorld::step`].
    pub fn accumulated_force(&self) -> Vec3 {
        self.force
    }

    fn aabb(&self) -> (Vec3, Vec3) {
        let half = self.shape.aabb_half_extents(self.rotation);
        (self.position - half, self.position + half)
    }
}

/// Global contact material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactParams {
    pub friction: f32,
    pub restitution: f32,
}

/// What a call to [`PhysicsWorld::step`] actually did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    pub substeps: u32,
    /// Simulated seconds advanced during this call.
    pub simulated: f32,
}

pub struct PhysicsWorld {
    pub gravity: Vec3,
    pub contact: ContactParams,
    bodies: Vec<RigidBody>,
    accumulator: f32,
    elapsed: f64,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3, contact: ContactParams) -> Self {
        Self {
            gravity,
            contact,
            bodies: Vec::new(),
            accumulator: 0.0,
            elapsed: 0.0,
        }
    }

    pub fn add_body(&mut self, body: RigidBody) -> BodyHandle {
        self.bodies.push(body);
        BodyHandle(self.bodies.len() - 1)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.0)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Total simulated seconds since creation.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Remove every body. Handles issued before this call no longer resolve.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.accumulator = 0.0;
    }

    /// Accumulate a force through the center of mass until the next step.
    pub fn apply_force(&mut self, handle: BodyHandle, force: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            if !body.is_static() {
                body.force += force;
            }
        }
    }

    /// Advance by `frame_delta`, split into at most `max_substeps` steps of `fixed_substep`.
    ///
    /// Time beyond `max_substeps` is discarded rather than carried, so one slow frame
    /// cannot snowball into a backlog. The caller clamps `frame_delta` first and keeps
    /// `max_substeps * fixed_substep` within that clamp.
    pub fn step(&mut self, fixed_substep: f32, frame_delta: f32, max_substeps: u32) -> StepReport {
        let mut report = StepReport::default();
        if fixed_substep <= 0.0 {
            return report;
        }

        self.accumulator += frame_delta.max(0.0);
        while self.accumulator >= fixed_substep && report.substeps < max_substeps {
            self.internal_step(fixed_substep);
            self.accumulator -= fixed_substep;
            report.substeps += 1;
        }
        self.accumulator %= fixed_substep;

        for body in &mut self.bodies {
            body.force = Vec3::ZERO;
        }

        report.simulated = report.substeps as f32 * fixed_substep;
        self.elapsed += f64::from(report.simulated);
        report
    }

    fn internal_step(&mut self, dt: f32) {
        let gravity = self.gravity;

        // --- Integrate (semi-implicit Euler) ---
        for body in self.bodies.iter_mut().filter(|b| b.enabled && !b.is_static()) {
            body.linvel += (gravity + body.force * body.inverse_mass()) * dt;
            body.linvel *= (1.0 - body.linear_damping).powf(dt);

            if body.fixed_rotation {
                body.angvel = Vec3::ZERO;
            } else {
                body.angvel *= (1.0 - body.angular_damping).powf(dt);
                if body.angvel.length_squared() > 0.0 {
                    body.rotation = (Quat::from_scaled_axis(body.angvel * dt) * body.rotation).normalize();
                }
            }

            body.position += body.linvel * dt;
        }

        // --- Contacts ---
        let count = self.bodies.len();
        for i in 0..count {
            if !self.bodies[i].enabled || self.bodies[i].is_static() {
                continue;
            }
            for j in 0..count {
                if i == j || !self.bodies[j].enabled {
                    continue;
                }
                if self.bodies[j].is_static() {
                    self.resolve_static_contact(i, j);
                } else if j > i {
                    self.resolve_dynamic_contact(i, j);
                }
            }
        }
    }

    fn resolve_static_contact(&mut self, dynamic: usize, fixed: usize) {
        let contact = self.contact;
        let obstacle = self.bodies[fixed].clone();
        let body = &mut self.bodies[dynamic];

        let hit = match obstacle.shape {
            Shape::Plane { normal, offset } => {
                let lowest = normal.dot(body.position) - body.shape.support_extent(body.rotation, -normal);
                let depth = offset - lowest;
                (depth > 0.0).then_some((normal, depth))
            }
            _ => aabb_penetration(body.aabb(), obstacle.aabb()),
        };

        if let Some((normal, depth)) = hit {
            body.position += normal * depth;
            body.linvel = resolve_against_static(body.linvel, normal, contact);
        }
    }

    fn resolve_dynamic_contact(&mut self, a: usize, b: usize) {
        let Some((normal, depth)) = aabb_penetration(self.bodies[a].aabb(), self.bodies[b].aabb()) else {
            return;
        };

        let inv_a = self.bodies[a].inverse_mass();
        let inv_b = self.bodies[b].inverse_mass();
        let inv_sum = inv_a + inv_b;
        if inv_sum <= 0.0 {
            return;
        }

        // Separate proportionally to inverse mass (heavier body moves less).
        self.bodies[a].position += normal * depth * (inv_a / inv_sum);
        self.bodies[b].position -= normal * depth * (inv_b / inv_sum);

        let relative = self.bodies[a].linvel - self.bodies[b].linvel;
        let vn = relative.dot(normal);
        if vn >= 0.0 {
            return;
        }

        let jn = -(1.0 + self.contact.restitution) * vn / inv_sum;
        let mut impulse = normal * jn;

        let tangent = relative - normal * vn;
        let tangent_speed = tangent.length();
        if tangent_speed > 1e-6 {
            let jt = (tangent_speed / inv_sum).min(self.contact.friction * jn);
            impulse -= tangent / tangent_speed * jt;
        }

        self.bodies[a].linvel += impulse * inv_a;
        self.bodies[b].linvel -= impulse * inv_b;
    }
}

/// Remove the inward normal velocity and apply Coulomb friction against an immovable surface.
fn resolve_against_static(velocity: Vec3, normal: Vec3, contact: ContactParams) -> Vec3 {
    let vn = velocity.dot(normal);
    if vn >= 0.0 {
        return velocity;
    }

    let jn = -(1.0 + contact.restitution) * vn;
    let mut out = velocity + normal * jn;

    let tangent = velocity - normal * vn;
    let tangent_speed = tangent.length();
    if tangent_speed > 1e-6 {
        let reduce = tangent_speed.min(contact.friction * jn);
        out -= tangent / tangent_speed * reduce;
    }
    out
}

/// Minimum translation pushing box `a` out of box `b`, as (unit normal toward `a`, depth).
fn aabb_penetration(a: (Vec3, Vec3), b: (Vec3, Vec3)) -> Option<(Vec3, f32)> {
    let (a_min, a_max) = a;
    let (b_min, b_max) = b;

    let overlap = a_max.min(b_max) - a_min.max(b_min);
    if overlap.x <= 0.0 || overlap.y <= 0.0 || overlap.z <= 0.0 {
        return None;
    }

    let a_center = (a_min + a_max) * 0.5;
    let b_center = (b_min + b_max) * 0.5;
    let side = |axis: f32| if axis >= 0.0 { 1.0 } else { -1.0 };
    let away = a_center - b_center;

    let (normal, depth) = if overlap.x <= overlap.y && overlap.x <= overlap.z {
        (Vec3::X * side(away.x), overlap.x)
    } else if overlap.y <= overlap.z {
        (Vec3::Y * side(away.y), overlap.y)
    } else {
        (Vec3::Z * side(away.z), overlap.z)
    };
    Some((normal, depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn world_with_ground() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(
            Vec3::new(0.0, -20.0, 0.0),
            ContactParams {
                friction: 0.3,
                restitution: 0.0,
            },
        );
        world.add_body(RigidBody::fixed(
            Shape::Plane {
                normal: Vec3::Y,
                offset: 0.0,
            },
            Vec3::ZERO,
        ));
        world
    }

    fn character(position: Vec3) -> RigidBody {
        RigidBody::dynamic(Shape::Cylinder { radius: 0.3, height: 1.8 }, 70.0, position)
            .with_damping(0.8, 0.99)
            .with_fixed_rotation()
    }

    #[test]
    fn test_body_settles_on_ground() {
        let mut world = world_with_ground();
        let h = world.add_body(character(Vec3::new(0.0, 3.0, 0.0)));

        for _ in 0..240 {
            world.step(DT, DT, 3);
        }

        let body = world.body(h).unwrap();
        assert!((body.position.y - 0.9).abs() < 0.05, "y = {}", body.position.y);
        assert!(body.linvel.y.abs() < 0.5);
    }

    #[test]
    fn test_step_subdivides_frame() {
        let mut world = world_with_ground();
        let report = world.step(DT, 0.055, 10);
        assert_eq!(report.substeps, 3);
        assert!((report.simulated - 0.05).abs() < 1e-5);
    }

    #[test]
    fn test_step_discards_time_beyond_max_substeps() {
        let mut world = world_with_ground();
        let report = world.step(0.25, 10.0, 3);
        assert_eq!(report.substeps, 3);
        assert_eq!(report.simulated, 0.75);

        // The backlog was dropped: a short follow-up frame does not trigger catch-up steps.
        let report = world.step(0.25, 0.1, 3);
        assert_eq!(report.substeps, 0);
    }

    #[test]
    fn test_linear_damping_is_exponential() {
        let mut world = PhysicsWorld::new(Vec3::ZERO, ContactParams { friction: 0.0, restitution: 0.0 });
        let mut body = RigidBody::dynamic(Shape::Cuboid { half_extents: Vec3::ONE }, 1.0, Vec3::ZERO)
            .with_damping(0.5, 0.5);
        body.linvel = Vec3::new(10.0, 0.0, 0.0);
        let h = world.add_body(body);

        world.step(DT, DT, 1);

        let expected = 10.0 * 0.5_f32.powf(DT);
        assert!((world.body(h).unwrap().linvel.x - expected).abs() < 1e-4);
    }

    #[test]
    fn test_fixed_rotation_never_spins() {
        let mut world = world_with_ground();
        let mut body = character(Vec3::new(0.0, 0.9, 0.0));
        body.angvel = Vec3::new(3.0, 1.0, 0.0);
        let h = world.add_body(body);

        world.step(DT, 0.05, 3);

        let body = world.body(h).unwrap();
        assert_eq!(body.rotation, Quat::IDENTITY);
        assert_eq!(body.angvel, Vec3::ZERO);
    }

    #[test]
    fn test_free_body_rotates_with_angular_velocity() {
        let mut world = PhysicsWorld::new(Vec3::ZERO, ContactParams { friction: 0.0, restitution: 0.0 });
        let mut body = RigidBody::dynamic(Shape::Cuboid { half_extents: Vec3::ONE }, 1.0, Vec3::ZERO)
            .with_damping(0.0, 0.0);
        body.angvel = Vec3::new(0.0, 1.0, 0.0);
        let h = world.add_body(body);

        world.step(DT, DT, 1);

        let (axis, angle) = world.body(h).unwrap().rotation.to_axis_angle();
        assert!((angle - DT).abs() < 1e-4);
        assert!((axis - Vec3::Y).length() < 1e-3);
    }

    #[test]
    fn test_disabled_body_is_inert() {
        let mut world = world_with_ground();
        let mut body = character(Vec3::new(0.0, -1000.0, 0.0));
        body.enabled = false;
        let h = world.add_body(body);

        for _ in 0..60 {
            world.step(DT, DT, 3);
        }

        assert_eq!(world.body(h).unwrap().position, Vec3::new(0.0, -1000.0, 0.0));
    }

    #[test]
    fn test_force_accelerates_then_clears() {
        let mut world = PhysicsWorld::new(Vec3::ZERO, ContactParams { friction: 0.0, restitution: 0.0 });
        let body = RigidBody::dynamic(Shape::Cuboid { half_extents: Vec3::ONE }, 500.0, Vec3::ZERO)
            .with_damping(0.0, 0.0);
        let h = world.add_body(body);

        world.apply_force(h, Vec3::new(0.0, 0.0, -500.0));
        assert_eq!(world.body(h).unwrap().accumulated_force(), Vec3::new(0.0, 0.0, -500.0));

        world.step(DT, DT, 3);

        let body = world.body(h).unwrap();
        assert!((body.linvel.z + DT).abs() < 1e-5);
        assert_eq!(body.accumulated_force(), Vec3::ZERO);
    }

    #[test]
    fn test_body_is_pushed_out_of_building() {
        let mut world = world_with_ground();
        world.add_body(RigidBody::fixed(
            Shape::Cuboid {
                half_extents: Vec3::new(7.5, 12.5, 7.5),
            },
            Vec3::new(15.0, 12.5, 15.0),
        ));
        // Walk into the -X face of the building.
        let mut body = character(Vec3::new(7.4, 0.9, 15.0));
        body.linvel = Vec3::new(5.0, 0.0, 0.0);
        let h = world.add_body(body);

        world.step(DT, DT, 1);

        let body = world.body(h).unwrap();
        assert!(body.position.x <= 7.5 - 0.3 + 1e-3, "x = {}", body.position.x);
        assert!(body.linvel.x <= 1e-4);
    }

    #[test]
    fn test_overlapping_bodies_separate() {
        let mut world = world_with_ground();
        let a = world.add_body(character(Vec3::new(0.0, 0.9, 0.0)));
        let b = world.add_body(character(Vec3::new(0.2, 0.9, 0.0)));

        world.step(DT, DT, 1);

        let pa = world.body(a).unwrap().position;
        let pb = world.body(b).unwrap().position;
        assert!((pb.x - pa.x) >= 0.6 - 1e-3);
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut world = world_with_ground();
        let h = world.add_body(character(Vec3::Y));
        world.clear();
        assert!(world.is_empty());
        assert!(world.body(h).is_none());
    }
}
