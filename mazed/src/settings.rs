//! Daemon settings: `config.json` in the data directory, then `MAZE3D_*`
//! environment overrides, then runtime changes through `CfgSet`.

use std::fs;
use std::path::{Path, PathBuf};

use maze3d::config::{parse_size, ConfigError, RunConfig};
use maze3d::controller::NavigationMode;
use maze3d::generator::GoalRule;
use maze3d::observation::ObservationProfile;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("reading {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("writing {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// Q-network weights (JSON). Unset falls back to `policy.json` in the
    /// data directory, then to the scripted goal-seeking policy.
    #[serde(default)]
    pub policy_weights: Option<PathBuf>,
}

fn default_target_fps() -> u32 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            target_fps: default_target_fps(),
            policy_weights: None,
        }
    }
}

impl Settings {
    /// A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings =
            serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        settings.target_fps = settings.target_fps.clamp(MIN_FPS, MAX_FPS);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.run.validate()?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `MAZE3D_*` overrides from `lookup`. Unparseable values are
    /// logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // MAZE3D_SIZE=11x11x5
        if let Some(v) = lookup("MAZE3D_SIZE") {
            match parse_size(&v) {
                Ok(size) => self.run.size = size,
                Err(e) => warn!("ignoring MAZE3D_SIZE: {e}"),
            }
        }

        // MAZE3D_SEED=42
        if let Some(v) = lookup("MAZE3D_SEED") {
            match v.trim().parse::<u64>() {
                Ok(n) => self.run.seed = Some(n),
                Err(_) => warn!("ignoring MAZE3D_SEED={v:?}"),
            }
        }

        // MAZE3D_MAX_STEPS=400 (0 means derive from the grid)
        if let Some(v) = lookup("MAZE3D_MAX_STEPS") {
            match v.trim().parse::<u32>() {
                Ok(0) => self.run.max_steps = None,
                Ok(n) => self.run.max_steps = Some(n),
                Err(_) => warn!("ignoring MAZE3D_MAX_STEPS={v:?}"),
            }
        }

        // MAZE3D_MODE=path_follow|policy
        if let Some(v) = lookup("MAZE3D_MODE") {
            match NavigationMode::parse(&v) {
                Some(m) => self.run.mode = m,
                None => warn!("ignoring MAZE3D_MODE={v:?}"),
            }
        }

        // MAZE3D_PROFILE=flags|spatial
        if let Some(v) = lookup("MAZE3D_PROFILE") {
            match ObservationProfile::parse(&v) {
                Some(p) => self.run.profile = p,
                None => warn!("ignoring MAZE3D_PROFILE={v:?}"),
            }
        }

        // MAZE3D_GOAL=farthest|far_corner
        if let Some(v) = lookup("MAZE3D_GOAL") {
            match GoalRule::parse(&v) {
                Some(g) => self.run.goal_rule = g,
                None => warn!("ignoring MAZE3D_GOAL={v:?}"),
            }
        }

        // MAZE3D_FPS=30
        if let Some(v) = lookup("MAZE3D_FPS") {
            match v.trim().parse::<u32>() {
                Ok(n) => self.target_fps = n.clamp(MIN_FPS, MAX_FPS),
                Err(_) => warn!("ignoring MAZE3D_FPS={v:?}"),
            }
        }

        // MAZE3D_WEIGHTS=/path/to/policy.json
        if let Some(v) = lookup("MAZE3D_WEIGHTS") {
            let v = v.trim();
            self.policy_weights = if v.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
    }
}
