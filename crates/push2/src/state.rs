//! Persisted surface state.

use padbridge_core::PersistentState;
use serde::{Deserialize, Serialize};

use crate::scale::{MusicalMode, NoteGridOrigin, RowInterval, ScaleConfig};

/// One logical port and the physical ports it was connected to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub connections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceState {
    #[serde(default)]
    pub input: PortState,
    #[serde(default)]
    pub output: PortState,
    #[serde(default)]
    pub root: u8,
    #[serde(default = "default_root_octave")]
    pub root_octave: u8,
    #[serde(default = "default_in_key")]
    pub in_key: bool,
    #[serde(default)]
    pub mode: MusicalMode,
    #[serde(default)]
    pub origin: NoteGridOrigin,
    #[serde(default)]
    pub row_interval: RowInterval,
}

fn default_root_octave() -> u8 {
    ScaleConfig::default().octave
}

fn default_in_key() -> bool {
    true
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self::from_scale(&ScaleConfig::default())
    }
}

impl SurfaceState {
    pub fn from_scale(cfg: &ScaleConfig) -> Self {
        Self {
            input: PortState::default(),
            output: PortState::default(),
            root: cfg.root,
            root_octave: cfg.octave,
            in_key: cfg.in_key,
            mode: cfg.mode,
            origin: cfg.origin,
            row_interval: cfg.row_interval,
        }
    }

    pub fn scale(&self) -> ScaleConfig {
        ScaleConfig {
            root: self.root,
            octave: self.root_octave,
            mode: self.mode,
            origin: self.origin,
            row_interval: self.row_interval,
            in_key: self.in_key,
        }
    }
}

impl PersistentState for SurfaceState {
    const FILE_NAME: &'static str = "push2.json";

    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.root > 11 {
            errors.push(format!("root must be 0-11, got {}", self.root));
        }

        if self.root_octave > 10 {
            errors.push(format!("root_octave must be 0-10, got {}", self.root_octave));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
