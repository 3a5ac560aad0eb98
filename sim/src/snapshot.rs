//! Throttled HUD snapshot.

use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SnapshotConfig;

/// Rounded world position, half-up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridPosition {
    pub fn from_vec3(v: Vec3) -> Self {
        Self {
            x: round_half_up(v.x),
            y: round_half_up(v.y),
            z: round_half_up(v.z),
        }
    }
}

#[inline]
pub fn round_half_up(value: f32) -> i32 {
    (value + 0.5).floor() as i32
}

/// Read-only summary for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub health: u32,
    pub armor: u32,
    pub currency: u32,
    pub wanted: u8,
    pub in_vehicle: bool,
    pub mission: String,
    pub position: GridPosition,
}

impl Snapshot {
    pub fn capture(config: &SnapshotConfig, mission: &str, in_vehicle: bool, position: Vec3) -> Self {
        Self {
            health: config.health,
            armor: config.armor,
            currency: config.currency,
            wanted: config.wanted,
            in_vehicle,
            mission: mission.to_string(),
            position: GridPosition::from_vec3(position),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Emits on the first tick, then once per interval of wall time.
///
/// Due times advance on a fixed grid so tick jitter does not stretch the cadence.
/// After a stall longer than one interval the grid restarts from the current time
/// instead of bursting.
#[derive(Clone, Debug)]
pub struct SnapshotThrottle {
    interval: Duration,
    next_due: Option<Duration>,
}

impl SnapshotThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// True if a snapshot should go out at `now`.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.next_due {
            Some(due) if now < due => false,
            Some(due) => {
                let next = due + self.interval;
                self.next_due = Some(if next <= now { now + self.interval } else { next });
                true
            }
            None => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }
}
