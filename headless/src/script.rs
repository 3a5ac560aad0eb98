//! Scripted input timeline.
//!
//! A script is a RON document listing actions by frame number. Keys are named the
//! way a browser reports them ("w", "arrowup", "space", "f", ...).

use std::path::Path;
use std::time::Duration;

use bevy::prelude::*;
use serde::Deserialize;
use sim::{ControlKey, InputEvent, Simulation};
use thiserror::Error;

/// Used when `SIM_SCRIPT` is not set.
const BUILTIN_TOUR: &str = include_str!("../scripts/tour.ron");

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse script: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("unknown key {name:?} at frame {frame}")]
    UnknownKey { name: String, frame: u32 },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Action {
    Press(String),
    Release(String),
    Wheel(f32),
    Mission(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptedAction {
    pub frame: u32,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Script {
    pub frame_ms: u64,
    /// The app exits after this many frames.
    pub frames: u32,
    pub events: Vec<ScriptedAction>,
}

impl Script {
    pub fn builtin() -> Result<Self, ScriptError> {
        Self::parse(BUILTIN_TOUR)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse, sort by frame and check every key name.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut script: Script = ron::from_str(text)?;
        script.events.sort_by_key(|event| event.frame);

        for event in &script.events {
            if let Action::Press(name) | Action::Release(name) = &event.action {
                if ControlKey::from_key_name(name).is_none() {
                    return Err(ScriptError::UnknownKey {
                        name: name.clone(),
                        frame: event.frame,
                    });
                }
            }
        }
        Ok(script)
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_ms.max(1))
    }
}

/// Playback position in a [`Script`].
#[derive(Resource)]
pub struct ScriptPlayer {
    script: Script,
    frame: u32,
    cursor: usize,
}

impl ScriptPlayer {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            frame: 0,
            cursor: 0,
        }
    }

    /// Actions scheduled for the current frame; advances to the next frame.
    pub fn advance(&mut self) -> Vec<Action> {
        let mut due = Vec::new();
        while let Some(event) = self.script.events.get(self.cursor) {
            if event.frame > self.frame {
                break;
            }
            due.push(event.action.clone());
            self.cursor += 1;
        }
        self.frame += 1;
        due
    }

    pub fn finished(&self) -> bool {
        self.frame >= self.script.frames
    }
}

pub fn play_script(
    mut player: ResMut<ScriptPlayer>,
    mut simulation: Option<ResMut<Simulation>>,
    mut input: MessageWriter<InputEvent>,
    mut exit: MessageWriter<AppExit>,
) {
    if player.finished() {
        return;
    }

    for action in player.advance() {
        match action {
            Action::Press(name) => {
                if let Some(key) = ControlKey::from_key_name(&name) {
                    input.write(InputEvent::KeyDown(key));
                }
            }
            Action::Release(name) => {
                if let Some(key) = ControlKey::from_key_name(&name) {
                    input.write(InputEvent::KeyUp(key));
                }
            }
            Action::Wheel(delta) => {
                input.write(InputEvent::Wheel(delta));
            }
            Action::Mission(label) => {
                if let Some(simulation) = simulation.as_mut() {
                    simulation.set_mission_label(label);
                }
            }
        }
    }

    if player.finished() {
        info!("Script finished after {} frames", player.frame);
        exit.write(AppExit::Success);
    }
}
