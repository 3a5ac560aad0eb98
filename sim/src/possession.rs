//! On-foot / in-vehicle state machine.
//!
//! The interact key toggles between the two states. Entering is guarded by
//! proximity. Leaving always succeeds. While a vehicle is possessed the avatar body
//! is parked far below the world and disabled, so it takes no part in physics or
//! proximity checks.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::VehicleConfig;
use crate::physics::PhysicsWorld;
use crate::registry::{body_position, EntityRegistry, VehicleId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Possession {
    #[default]
    OnFoot,
    InVehicle(VehicleId),
}

impl Possession {
    pub fn in_vehicle(self) -> bool {
        matches!(self, Self::InVehicle(_))
    }
}

/// Why an interact request did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No vehicle within the interact radius.
    NoVehicleInRange,
    /// Possession is turned off for this session.
    Disabled,
}

/// Outcome of one interact request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Entered(VehicleId),
    Exited(VehicleId),
    /// Unmet guard. Not an error.
    Ignored(IgnoreReason),
}

/// Planar (x-z) distance, ignoring height.
#[inline]
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

#[derive(Clone, Debug, Default)]
pub struct PossessionMachine {
    state: Possession,
    enabled: bool,
}

impl PossessionMachine {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: Possession::OnFoot,
            enabled,
        }
    }

    pub fn state(&self) -> Possession {
        self.state
    }

    /// First vehicle in roster order within `radius` of `position` on the x-z plane.
    pub fn eligible_vehicle(
        world: &PhysicsWorld,
        registry: &EntityRegistry,
        position: Vec3,
        radius: f32,
    ) -> Option<VehicleId> {
        registry
            .vehicles()
            .iter()
            .find(|vehicle| planar_distance(position, body_position(world, vehicle.body)) < radius)
            .map(|vehicle| vehicle.id)
    }

    /// Handle one interact press.
    pub fn interact(
        &mut self,
        world: &mut PhysicsWorld,
        registry: &mut EntityRegistry,
        config: &VehicleConfig,
    ) -> Transition {
        if !self.enabled {
            debug!("Interact ignored: possession is disabled");
            return Transition::Ignored(IgnoreReason::Disabled);
        }

        match self.state {
            Possession::OnFoot => self.enter(world, registry, config),
            Possession::InVehicle(id) => self.exit(world, registry, config, id),
        }
    }

    fn enter(
        &mut self,
        world: &mut PhysicsWorld,
        registry: &mut EntityRegistry,
        config: &VehicleConfig,
    ) -> Transition {
        let avatar_body = registry.avatar().body;
        let avatar_position = body_position(world, avatar_body);

        let Some(id) = Self::eligible_vehicle(world, registry, avatar_position, config.interact_radius) else {
            debug!("Interact ignored: no vehicle within {} of {:?}", config.interact_radius, avatar_position);
            return Transition::Ignored(IgnoreReason::NoVehicleInRange);
        };

        if let Some(body) = world.body_mut(avatar_body) {
            body.position = config.parking_position;
            body.linvel = Vec3::ZERO;
            body.angvel = Vec3::ZERO;
            body.enabled = false;
        }
        registry.avatar_mut().visible = false;
        self.state = Possession::InVehicle(id);

        info!("Avatar entered vehicle {}", id.0);
        Transition::Entered(id)
    }

    fn exit(
        &mut self,
        world: &mut PhysicsWorld,
        registry: &mut EntityRegistry,
        config: &VehicleConfig,
        id: VehicleId,
    ) -> Transition {
        let vehicle_position = registry
            .vehicle(id)
            .map(|vehicle| body_position(world, vehicle.body))
            .unwrap_or(Vec3::ZERO);

        let avatar_body = registry.avatar().body;
        if let Some(body) = world.body_mut(avatar_body) {
            body.position = vehicle_position + config.exit_offset;
            body.linvel = Vec3::ZERO;
            body.angvel = Vec3::ZERO;
            body.enabled = true;
        }
        registry.avatar_mut().visible = true;
        self.state = Possession::OnFoot;

        info!("Avatar exited vehicle {}", id.0);
        Transition::Exited(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::physics::ContactParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (PhysicsWorld, EntityRegistry, SimConfig) {
        let config = SimConfig::default();
        let mut world = PhysicsWorld::new(
            Vec3::ZERO,
            ContactParams {
                friction: 0.3,
                restitution: 0.0,
            },
        );
        let mut rng = StdRng::seed_from_u64(9);
        let registry = EntityRegistry::spawn(&mut world, &config, &mut rng);
        (world, registry, config)
    }

    fn place_avatar(world: &mut PhysicsWorld, registry: &EntityRegistry, position: Vec3) {
        world.body_mut(registry.avatar().body).unwrap().position = position;
    }

    #[test]
    fn test_interact_out_of_range_is_ignored() {
        let (mut world, mut registry, config) = setup();
        let mut machine = PossessionMachine::new(true);

        let result = machine.interact(&mut world, &mut registry, &config.vehicles);

        assert_eq!(result, Transition::Ignored(IgnoreReason::NoVehicleInRange));
        assert_eq!(machine.state(), Possession::OnFoot);
        assert!(registry.avatar().visible);
    }

    #[test]
    fn test_enter_parks_avatar() {
        let (mut world, mut registry, config) = setup();
        let mut machine = PossessionMachine::new(true);
        place_avatar(&mut world, &registry, Vec3::new(-8.0, 1.0, -8.0));

        let result = machine.interact(&mut world, &mut registry, &config.vehicles);

        assert_eq!(result, Transition::Entered(VehicleId(0)));
        assert_eq!(machine.state(), Possession::InVehicle(VehicleId(0)));
        assert!(!registry.avatar().visible);
        let avatar = world.body(registry.avatar().body).unwrap();
        assert!(avatar.position.y <= -900.0);
        assert!(!avatar.enabled);
    }

    #[test]
    fn test_exit_places_avatar_beside_vehicle() {
        let (mut world, mut registry, config) = setup();
        let mut machine = PossessionMachine::new(true);
        place_avatar(&mut world, &registry, Vec3::new(9.0, 1.0, 9.0));
        machine.interact(&mut world, &mut registry, &config.vehicles);

        let car = registry.vehicle(VehicleId(1)).unwrap().body;
        world.body_mut(car).unwrap().position = Vec3::new(30.0, 1.0, 5.0);

        let result = machine.interact(&mut world, &mut registry, &config.vehicles);

        assert_eq!(result, Transition::Exited(VehicleId(1)));
        assert_eq!(machine.state(), Possession::OnFoot);
        let avatar = world.body(registry.avatar().body).unwrap();
        assert_eq!(avatar.position, Vec3::new(33.0, 3.0, 5.0));
        assert_eq!(avatar.linvel, Vec3::ZERO);
        assert!(avatar.enabled);
        assert!(registry.avatar().visible);
    }

    #[test]
    fn test_first_vehicle_in_roster_wins() {
        let (mut world, mut registry, config) = setup();
        // Move car 2 closer than car 0 to the same spot.
        let green = registry.vehicle(VehicleId(2)).unwrap().body;
        world.body_mut(green).unwrap().position = Vec3::new(-10.5, 1.0, -7.0);
        let spot = Vec3::new(-10.0, 1.0, -6.0);

        let found = PossessionMachine::eligible_vehicle(&world, &registry, spot, 5.0);
        assert_eq!(found, Some(VehicleId(0)));

        let mut machine = PossessionMachine::new(true);
        place_avatar(&mut world, &registry, spot);
        assert_eq!(
            machine.interact(&mut world, &mut registry, &config.vehicles),
            Transition::Entered(VehicleId(0))
        );
    }

    #[test]
    fn test_height_does_not_affect_range() {
        let (world, registry, _) = setup();
        let above = Vec3::new(-10.0, 50.0, -7.0);
        assert_eq!(
            PossessionMachine::eligible_vehicle(&world, &registry, above, 5.0),
            Some(VehicleId(0))
        );
    }

    #[test]
    fn test_disabled_machine_ignores_interact() {
        let (mut world, mut registry, config) = setup();
        let mut machine = PossessionMachine::new(false);
        place_avatar(&mut world, &registry, Vec3::new(-10.0, 1.0, -9.0));

        assert_eq!(
            machine.interact(&mut world, &mut registry, &config.vehicles),
            Transition::Ignored(IgnoreReason::Disabled)
        );
        assert_eq!(machine.state(), Possession::OnFoot);
    }
}
