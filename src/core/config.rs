//! Run parameters shared by the runner binary, the evaluator and the daemon.

use crate::controller::NavigationMode;
use crate::episode::{EpisodeParams, RewardShaping};
use crate::generator::GoalRule;
use crate::grid::Dims;
use crate::observation::ObservationProfile;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest extent accepted per axis. Keeps a single grid well under a few MB.
pub const MAX_EXTENT: usize = 201;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid size `{0}` (expected e.g. 11x11x5)")]
    InvalidSize(String),
    #[error("size {dims} exceeds the per-axis limit of {max}")]
    TooLarge { dims: Dims, max: usize },
    #[error("invalid value for {key}: `{value}`")]
    InvalidValue { key: String, value: String },
    #[cfg(feature = "serde")]
    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunConfig {
    /// Requested extents; generation rounds each up to odd.
    #[cfg_attr(feature = "serde", serde(default = "default_size"))]
    pub size: [usize; 3],
    /// Step cap; `None` derives `4 * sx * sy * sz`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_steps: Option<u32>,
    /// Seed for the first maze; `None` draws one from the clock.
    #[cfg_attr(feature = "serde", serde(default))]
    pub seed: Option<u64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub goal_rule: GoalRule,
    #[cfg_attr(feature = "serde", serde(default))]
    pub reward: RewardShaping,
    #[cfg_attr(feature = "serde", serde(default))]
    pub profile: ObservationProfile,
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: NavigationMode,
}

fn default_size() -> [usize; 3] {
    [11, 11, 5]
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            max_steps: None,
            seed: None,
            goal_rule: GoalRule::default(),
            reward: RewardShaping::default(),
            profile: ObservationProfile::default(),
            mode: NavigationMode::default(),
        }
    }
}

impl RunConfig {
    pub fn dims(&self) -> Dims {
        Dims::new(self.size[0], self.size[1], self.size[2])
    }

    pub fn episode_params(&self) -> EpisodeParams {
        EpisodeParams {
            max_steps: self.max_steps,
            reward: self.reward,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let dims = self.dims();
        if dims.as_array().iter().any(|&e| e > MAX_EXTENT) {
            return Err(ConfigError::TooLarge {
                dims,
                max: MAX_EXTENT,
            });
        }
        let r = self.reward;
        if ![r.step_cost, r.wall_penalty, r.progress_scale, r.goal_bonus]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ConfigError::InvalidValue {
                key: "reward".to_string(),
                value: format!("{r:?}"),
            });
        }
        Ok(())
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: RunConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(feature = "serde")]
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parse `"11x11x5"` (also accepts `,` or `*` separators, or a single number
/// for a cube).
pub fn parse_size(s: &str) -> Result<[usize; 3], ConfigError> {
    let bad = || ConfigError::InvalidSize(s.to_string());
    let parts: Vec<&str> = s
        .split(|c: char| c == 'x' || c == 'X' || c == ',' || c == '*')
        .map(str::trim)
        .collect();
    let nums = parts
        .iter()
        .map(|p| p.parse::<usize>().map_err(|_| bad()))
        .collect::<Result<Vec<_>, _>>()?;
    match nums.as_slice() {
        [n] => Ok([*n, *n, *n]),
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("11x11x5").unwrap(), [11, 11, 5]);
        assert_eq!(parse_size(" 7, 9 ,3").unwrap(), [7, 9, 3]);
        assert_eq!(parse_size("5").unwrap(), [5, 5, 5]);
        assert!(parse_size("5x5").is_err());
        assert!(parse_size("axbxc").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn default_is_valid() {
        let cfg = RunConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.dims(), Dims::new(11, 11, 5));
        assert_eq!(cfg.episode_params().max_steps, None);
    }

    #[test]
    fn oversize_is_rejected() {
        let cfg = RunConfig {
            size: [MAX_EXTENT + 2, 3, 3],
            ..RunConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::TooLarge { .. })));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn missing_json_fields_take_defaults() {
        let cfg = RunConfig::from_json_str(r#"{"size":[5,5,5],"mode":"policy"}"#).unwrap();
        assert_eq!(cfg.size, [5, 5, 5]);
        assert_eq!(cfg.mode, NavigationMode::Policy);
        assert_eq!(cfg.goal_rule, GoalRule::Farthest);
        assert_eq!(cfg.reward, RewardShaping::shaped());

        let back = RunConfig::from_json_str(&cfg.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
