//! Orbit camera that trails whichever body has control.

use bevy::prelude::*;

use crate::config::CameraConfig;

/// What the camera is following this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraFocus {
    pub position: Vec3,
    pub in_vehicle: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraRig {
    /// Radians around the focus; 0 places the camera on the focus's +Z side.
    pub orbit_angle: f32,
    pub orbit_distance: f32,
    /// Smoothed eye position.
    pub position: Vec3,
    pub look_at: Vec3,
    min_distance: f32,
    max_distance: f32,
}

impl CameraRig {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            orbit_angle: 0.0,
            orbit_distance: config
                .initial_distance
                .clamp(config.min_distance, config.max_distance),
            position: config.initial_position,
            look_at: Vec3::ZERO,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
        }
    }

    /// Rotate by `steps * step` radians (steps is -1, 0 or +1 per tick).
    pub fn rotate(&mut self, steps: f32, step: f32) {
        self.orbit_angle += steps * step;
    }

    /// Apply a wheel delta; the distance stays inside the zoom range.
    pub fn zoom(&mut self, wheel_delta: f32, sensitivity: f32) {
        let distance = self.orbit_distance + wheel_delta * sensitivity;
        // NaN input leaves the distance untouched.
        if distance.is_nan() {
            return;
        }
        self.orbit_distance = distance.clamp(self.min_distance, self.max_distance);
    }

    /// Where the camera wants to be for `focus`.
    pub fn target_position(&self, focus: CameraFocus, config: &CameraConfig) -> Vec3 {
        let height = if focus.in_vehicle {
            config.follow_height_vehicle
        } else {
            config.follow_height_on_foot
        };
        focus.position
            + Vec3::new(
                self.orbit_angle.sin() * self.orbit_distance,
                height,
                self.orbit_angle.cos() * self.orbit_distance,
            )
    }

    /// Ease toward the target and re-aim at the focus.
    pub fn update(&mut self, focus: CameraFocus, config: &CameraConfig) {
        let target = self.target_position(focus, config);
        self.position = self.position.lerp(target, config.smoothing);

        let look_height = if focus.in_vehicle {
            config.look_height_vehicle
        } else {
            config.look_height_on_foot
        };
        self.look_at = focus.position + Vec3::Y * look_height;
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position).looking_at(self.look_at, Vec3::Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_foot(position: Vec3) -> CameraFocus {
        CameraFocus {
            position,
            in_vehicle: false,
        }
    }

    #[test]
    fn test_zoom_is_clamped() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);

        rig.zoom(1.0e9, config.zoom_sensitivity);
        assert_eq!(rig.orbit_distance, 30.0);

        rig.zoom(-1.0e9, config.zoom_sensitivity);
        assert_eq!(rig.orbit_distance, 5.0);

        rig.zoom(300.0, config.zoom_sensitivity);
        assert!((rig.orbit_distance - 8.0).abs() < 1e-5);

        rig.zoom(f32::NAN, config.zoom_sensitivity);
        assert!((rig.orbit_distance - 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_target_orbits_focus() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);

        let behind = rig.target_position(on_foot(Vec3::ZERO), &config);
        assert!((behind - Vec3::new(0.0, 8.0, 15.0)).length() < 1e-5);

        rig.orbit_angle = std::f32::consts::FRAC_PI_2;
        let side = rig.target_position(on_foot(Vec3::new(1.0, 1.0, 1.0)), &config);
        assert!((side - Vec3::new(16.0, 9.0, 1.0)).length() < 1e-4);
    }

    #[test]
    fn test_vehicle_is_followed_from_higher() {
        let config = CameraConfig::default();
        let rig = CameraRig::new(&config);
        let focus = CameraFocus {
            position: Vec3::ZERO,
            in_vehicle: true,
        };
        assert_eq!(rig.target_position(focus, &config).y, 10.0);
    }

    #[test]
    fn test_update_eases_instead_of_snapping() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);
        let start = rig.position;
        let target = rig.target_position(on_foot(Vec3::new(50.0, 1.0, 0.0)), &config);

        rig.update(on_foot(Vec3::new(50.0, 1.0, 0.0)), &config);

        let expected = start + (target - start) * 0.1;
        assert!((rig.position - expected).length() < 1e-4);
        assert_eq!(rig.look_at, Vec3::new(50.0, 2.0, 0.0));
    }

    #[test]
    fn test_rotation_accumulates() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);
        rig.rotate(1.0, config.rotate_step);
        rig.rotate(1.0, config.rotate_step);
        rig.rotate(-1.0, config.rotate_step);
        assert!((rig.orbit_angle - 0.03).abs() < 1e-6);
    }

    #[test]
    fn test_transform_faces_look_target() {
        let config = CameraConfig::default();
        let mut rig = CameraRig::new(&config);
        rig.update(on_foot(Vec3::ZERO), &config);

        let transform = rig.transform();
        let to_target = (rig.look_at - rig.position).normalize();
        assert!(transform.forward().dot(to_target) > 0.999);
    }
}
