//! Control input.
//!
//! The host forwards raw key and wheel events as [`InputEvent`]s between ticks. At the
//! start of each tick the accumulated [`InputState`] is frozen into a [`TickInput`], so
//! one tick always acts on a single consistent view of the controls.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Every key the simulation reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKey {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    /// Enter or leave a vehicle.
    Interact,
    RotateCameraLeft,
    RotateCameraRight,
}

impl ControlKey {
    /// Default keyboard layout (WASD/arrows, Space, F, Q/E).
    pub fn from_key_code(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::KeyW | KeyCode::ArrowUp => Some(Self::Forward),
            KeyCode::KeyS | KeyCode::ArrowDown => Some(Self::Back),
            KeyCode::KeyA | KeyCode::ArrowLeft => Some(Self::Left),
            KeyCode::KeyD | KeyCode::ArrowRight => Some(Self::Right),
            KeyCode::Space => Some(Self::Jump),
            KeyCode::KeyF => Some(Self::Interact),
            KeyCode::KeyQ => Some(Self::RotateCameraLeft),
            KeyCode::KeyE => Some(Self::RotateCameraRight),
            _ => None,
        }
    }

    /// Same layout keyed by lower-case key name, for scripted input.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "w" | "arrowup" => Some(Self::Forward),
            "s" | "arrowdown" => Some(Self::Back),
            "a" | "arrowleft" => Some(Self::Left),
            "d" | "arrowright" => Some(Self::Right),
            " " | "space" => Some(Self::Jump),
            "f" => Some(Self::Interact),
            "q" => Some(Self::RotateCameraLeft),
            "e" => Some(Self::RotateCameraRight),
            _ => None,
        }
    }
}

/// A raw event from the presentation layer.
#[derive(Message, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown(ControlKey),
    KeyUp(ControlKey),
    /// Scroll amount in wheel units (positive zooms out).
    Wheel(f32),
}

/// Which control keys are currently held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeldKeys {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub interact: bool,
    pub rotate_left: bool,
    pub rotate_right: bool,
}

impl HeldKeys {
    fn slot(&mut self, key: ControlKey) -> &mut bool {
        match key {
            ControlKey::Forward => &mut self.forward,
            ControlKey::Back => &mut self.back,
            ControlKey::Left => &mut self.left,
            ControlKey::Right => &mut self.right,
            ControlKey::Jump => &mut self.jump,
            ControlKey::Interact => &mut self.interact,
            ControlKey::RotateCameraLeft => &mut self.rotate_left,
            ControlKey::RotateCameraRight => &mut self.rotate_right,
        }
    }

    pub fn is_held(&self, key: ControlKey) -> bool {
        match key {
            ControlKey::Forward => self.forward,
            ControlKey::Back => self.back,
            ControlKey::Left => self.left,
            ControlKey::Right => self.right,
            ControlKey::Jump => self.jump,
            ControlKey::Interact => self.interact,
            ControlKey::RotateCameraLeft => self.rotate_left,
            ControlKey::RotateCameraRight => self.rotate_right,
        }
    }

    /// Builder used by tests and scripted hosts.
    pub fn with(mut self, key: ControlKey) -> Self {
        *self.slot(key) = true;
        self
    }

    /// Movement direction on the XZ plane: forward is -Z, right is +X.
    ///
    /// Not normalised, so a diagonal is √2 times faster than a single axis.
    pub fn movement_axes(&self) -> Vec3 {
        let mut axes = Vec3::ZERO;
        if self.forward {
            axes.z -= 1.0;
        }
        if self.back {
            axes.z += 1.0;
        }
        if self.left {
            axes.x -= 1.0;
        }
        if self.right {
            axes.x += 1.0;
        }
        axes
    }

    /// -1, 0 or +1 for the camera orbit direction.
    pub fn rotate_axis(&self) -> f32 {
        match (self.rotate_left, self.rotate_right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }
}

/// Frozen controls for exactly one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickInput {
    pub held: HeldKeys,
    /// Jump was pressed since the previous tick.
    pub jump: bool,
    /// Interact was pressed since the previous tick.
    pub interact: bool,
    /// Wheel units accumulated since the previous tick.
    pub wheel_delta: f32,
}

impl TickInput {
    pub fn holding(held: HeldKeys) -> Self {
        Self {
            held,
            ..default()
        }
    }
}

/// Event accumulator between ticks.
#[derive(Resource, Clone, Debug, Default)]
pub struct InputState {
    held: HeldKeys,
    jump_pressed: bool,
    interact_pressed: bool,
    wheel_delta: f32,
    detached: bool,
}

impl InputState {
    pub fn handle(&mut self, event: InputEvent) {
        if self.detached {
            return;
        }

        match event {
            InputEvent::KeyDown(key) => {
                let slot = self.held.slot(key);
                let just_pressed = !*slot;
                *slot = true;

                // Auto-repeat key-downs do not retrigger one-shot actions.
                if just_pressed {
                    match key {
                        ControlKey::Jump => self.jump_pressed = true,
                        ControlKey::Interact => self.interact_pressed = true,
                        _ => {}
                    }
                }
            }
            InputEvent::KeyUp(key) => {
                *self.held.slot(key) = false;
            }
            InputEvent::Wheel(delta) => {
                self.wheel_delta += delta;
            }
        }
    }

    /// Freeze the current controls and reset one-shot triggers.
    pub fn begin_tick(&mut self) -> TickInput {
        let input = TickInput {
            held: self.held,
            jump: self.jump_pressed,
            interact: self.interact_pressed,
            wheel_delta: self.wheel_delta,
        };
        self.jump_pressed = false;
        self.interact_pressed = false;
        self.wheel_delta = 0.0;
        input
    }

    /// Stop listening: drop held keys and pending triggers, ignore further events.
    pub fn detach(&mut self) {
        *self = Self {
            detached: true,
            ..default()
        };
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }
}
