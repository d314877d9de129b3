//! Engine tunables
//!
//! Stored as JSON next to the game data. Every field has a default, so a
//! partial file only overrides what it names.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::Screen;

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    // === Screen ===
    pub screen_width: f32,
    pub screen_height: f32,
    /// Nominal frame rate; sets the collision rewind step
    pub max_fps: f32,
    /// Unconfined entities are destroyed this far past the screen edge
    pub off_screen_cutoff: f32,

    // === Collisions ===
    pub bounciness: f32,
    pub collision_damage_mult: f32,
    pub min_collision_damage: f32,
    /// Rewind steps per nominal frame when searching for the contact time
    pub impact_steps_per_frame: u32,
    /// Cap on rewind steps (defaults to one second of history)
    pub max_impact_steps: u32,
    /// Bracket doublings allowed for the impulse search
    pub max_bracket_doublings: u32,
    pub max_bisections: u32,

    // === Behaviors ===
    pub reached_dest_threshold: f32,

    /// Seed for formation shuffles and random patrol points
    pub seed: u64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            screen_width: SCREEN_WIDTH,
            screen_height: SCREEN_HEIGHT,
            max_fps: MAX_FPS,
            off_screen_cutoff: OFF_SCREEN_CUTOFF,

            bounciness: BOUNCINESS_MULT,
            collision_damage_mult: COLLISION_DAMAGE_MULT,
            min_collision_damage: MIN_COLLISION_DAMAGE,
            impact_steps_per_frame: 4,
            max_impact_steps: 4 * MAX_FPS as u32,
            max_bracket_doublings: 64,
            max_bisections: 64,

            reached_dest_threshold: REACHED_DEST_THRESHOLD,

            seed: 0x5eed,
        }
    }
}

/// Settings file could not be read
#[derive(Debug)]
pub enum SettingsError {
    Io { path: String, message: String },
    Malformed { path: String, message: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io { path, message } => write!(f, "cannot read settings {path}: {message}"),
            SettingsError::Malformed { path, message } => {
                write!(f, "malformed settings {path}: {message}")
            }
        }
    }
}

impl std::error::Error for SettingsError {}

impl SimSettings {
    pub fn screen(&self) -> Screen {
        Screen::new(self.screen_width, self.screen_height)
    }

    /// Seconds per collision rewind step
    pub fn impact_step(&self) -> f32 {
        1.0 / (self.max_fps * self.impact_steps_per_frame.max(1) as f32)
    }

    /// Load from a JSON file; a missing file gives the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {display}, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(SettingsError::Io {
                    path: display,
                    message: e.to_string(),
                });
            }
        };
        let settings = serde_json::from_str(&text).map_err(|e| SettingsError::Malformed {
            path: display.clone(),
            message: e.to_string(),
        })?;
        log::info!("Loaded settings from {display}");
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let io_error = |e: String| SettingsError::Io {
            path: path.display().to_string(),
            message: e,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| io_error(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| io_error(e.to_string()))?;
        log::info!("Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: SimSettings = serde_json::from_str(r#"{"max_fps": 30, "seed": 7}"#).unwrap();
        assert_eq!(settings.max_fps, 30.0);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.screen_width, SCREEN_WIDTH);
        assert!((settings.impact_step() - 1.0 / 120.0).abs() < 1e-7);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = SimSettings::load("/nonexistent/astro-sim/settings.json").unwrap();
        assert_eq!(settings, SimSettings::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("astro-sim-settings-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let result = SimSettings::load(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(SettingsError::Malformed { .. })));
    }
}
