//! Player profile save/load
//!
//! The profile is a small JSON document: money, the keys of owned items and
//! the campaign cursor. Keys are checked against the registry on load, so a
//! profile naming a template that no longer exists fails loudly.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::blueprint::CampaignSpec;
use crate::config::{ConfigError, Registry};
use crate::sim::{Campaign, CampaignProgress};

/// Current profile document version
pub const PROFILE_VERSION: u32 = 1;

/// Profile could not be read, written or validated
#[derive(Debug)]
pub enum PersistenceError {
    Io { path: String, message: String },
    Malformed { path: String, message: String },
    UnsupportedVersion { version: u32 },
    Config(ConfigError),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot access profile {path}: {message}"),
            Self::Malformed { path, message } => write!(f, "malformed profile {path}: {message}"),
            Self::UnsupportedVersion { version } => {
                write!(f, "profile version {version} is newer than {PROFILE_VERSION}")
            }
            Self::Config(e) => write!(f, "profile does not match the config: {e}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for PersistenceError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerProfile {
    pub version: u32,
    pub money: u64,
    /// `PlayerShip` keys
    pub ships: Vec<String>,
    pub weapons: Vec<String>,
    pub shields: Vec<String>,
    pub campaign: Option<CampaignProgress>,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            version: PROFILE_VERSION,
            money: 0,
            ships: Vec::new(),
            weapons: Vec::new(),
            shields: Vec::new(),
            campaign: None,
        }
    }
}

impl PlayerProfile {
    /// Parse a profile document without touching the registry
    pub fn from_json(text: &str, source: &str) -> Result<Self, PersistenceError> {
        let profile: Self = serde_json::from_str(text).map_err(|e| PersistenceError::Malformed {
            path: source.to_string(),
            message: e.to_string(),
        })?;
        if profile.version > PROFILE_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                version: profile.version,
            });
        }
        Ok(profile)
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self).map_err(|e| PersistenceError::Malformed {
            path: "<profile>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load and validate a profile; a missing file is a fresh profile
    pub fn load(path: &Path, registry: &Registry) -> Result<Self, PersistenceError> {
        if !path.exists() {
            log::info!("No profile at {}, starting fresh", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| PersistenceError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let profile = Self::from_json(&text, &path.display().to_string())?;
        profile.validate(registry)?;
        log::info!("Loaded profile from {}", path.display());
        Ok(profile)
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let io_error = |e: std::io::Error| PersistenceError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, self.to_json()?).map_err(io_error)
    }

    /// Every key must name a defined template
    pub fn validate(&self, registry: &Registry) -> Result<(), ConfigError> {
        let owned = [
            ("PlayerShip", &self.ships),
            ("Weapon", &self.weapons),
            ("Shield", &self.shields),
        ];
        for (class, keys) in owned {
            for key in keys {
                registry.lookup(class, key)?;
            }
        }
        if let Some(progress) = &self.campaign {
            registry.lookup("Campaign", &progress.key)?;
        }
        Ok(())
    }

    /// The saved campaign, positioned at the saved level
    pub fn resume_campaign(&self, registry: &Registry) -> Result<Option<Campaign>, ConfigError> {
        let Some(progress) = &self.campaign else {
            return Ok(None);
        };
        let spec: CampaignSpec = registry.build_key("Campaign", &progress.key)?;
        Ok(Some(Campaign::resume(spec, progress)))
    }

    /// Record the cursor of a campaign in progress
    pub fn record_campaign(&mut self, campaign: &Campaign) {
        self.campaign = campaign.progress();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HANGAR: &str = r#"
Projectile[Pellet]: {speed: 300}
Weapon[Popgun]:
  rate_of_fire: 2
  projectile: Projectile[Pellet]
Shield[Bubble]: {capacity: 10, recharge_rate: 2, recharge_delay: 1}
PlayerShip[Scout]:
  acceleration: 500
  max_speed: 200
  hp: 10
  weapons: [Weapon(Popgun)]
"#;

    fn hangar() -> Registry {
        let mut registry = Registry::new();
        registry.load_str(HANGAR, "hangar").unwrap();
        registry.check_for_undefined_objects().unwrap();
        registry
    }

    fn profile() -> PlayerProfile {
        PlayerProfile {
            money: 250,
            ships: vec!["Scout".into()],
            weapons: vec!["Popgun".into()],
            shields: vec!["Bubble".into()],
            ..PlayerProfile::default()
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("astro-sim-profile-{}", std::process::id()));
        let path = dir.join("profile.json");
        profile().save(&path).unwrap();
        let loaded = PlayerProfile::load(&path, &hangar()).unwrap();
        assert_eq!(loaded, profile());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut p = profile();
        p.weapons.push("Railgun".into());
        assert_eq!(
            p.validate(&hangar()),
            Err(ConfigError::UndefinedReference {
                class: "Weapon".into(),
                key: "Railgun".into()
            })
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let p = PlayerProfile::from_json(r#"{"money": 5}"#, "inline").unwrap();
        assert_eq!(p.money, 5);
        assert!(p.ships.is_empty());
        assert_eq!(p.campaign, None);
    }

    #[test]
    fn test_newer_version_is_refused() {
        let err = PlayerProfile::from_json(r#"{"version": 99}"#, "inline").unwrap_err();
        assert!(matches!(err, PersistenceError::UnsupportedVersion { version: 99 }));
    }
}
