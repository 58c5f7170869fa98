//! The inference boundary.
//!
//! A policy maps an [`Observation`] to an action index in `0..6`. Whatever
//! goes wrong on the far side of that call (missing weights, a bad tensor,
//! NaNs, an index out of range) is absorbed by [`resolve_action`], which swaps
//! in a uniformly random action so the episode loop never stalls.

use tracing::warn;

use crate::grid::{Action, ACTION_COUNT};
use crate::observation::{Observation, OBS_LEN};
use crate::prng::{Prng, RandomSource};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("malformed policy output: {0}")]
    MalformedOutput(String),
    #[error("missing tensor: {0}")]
    MissingTensor(String),
    #[error("inference runtime fault: {0}")]
    Runtime(String),
    #[error("invalid weights: {0}")]
    InvalidWeights(String),
    #[error("reading weights: {0}")]
    Io(#[from] std::io::Error),
}

pub trait PolicyPort: Send + Sync {
    fn name(&self) -> &str;

    fn choose_action(&self, observation: &Observation) -> Result<usize, PolicyError>;
}

pub fn random_action<R: RandomSource>(rng: &mut R) -> Action {
    Action::ALL[rng.index_below(ACTION_COUNT)]
}

/// Turn a policy result into a move. Never fails.
pub fn resolve_action<R: RandomSource>(result: Result<usize, PolicyError>, rng: &mut R) -> Action {
    match result {
        Ok(i) => match Action::from_index(i) {
            Some(a) => a,
            None => {
                warn!(index = i, "policy index out of range; using random action");
                random_action(rng)
            }
        },
        Err(e) => {
            warn!(error = %e, "policy failed; using random action");
            random_action(rng)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// RandomPolicy: every call fails, so the random fallback drives the agent.
// Stands in when no weights are configured.
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPolicy;

impl PolicyPort for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn choose_action(&self, _observation: &Observation) -> Result<usize, PolicyError> {
        Err(PolicyError::MissingTensor("no model loaded".to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────
// GoalSeeking: scripted policy over the `Flags` observation layout.
// Prefers a safe move toward the goal, then any safe move that does not undo
// the previous one, then any safe move.
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct GoalSeekingPolicy;

impl PolicyPort for GoalSeekingPolicy {
    fn name(&self) -> &str {
        "goal_seeking"
    }

    fn choose_action(&self, observation: &Observation) -> Result<usize, PolicyError> {
        let o = &observation.0;
        let danger = &o[0..6];
        let toward = &o[6..12];
        let last = [o[15], o[16], o[17]];

        let safe = |i: usize| danger[i] < 0.5;
        let reverses_last = |i: usize| {
            let d = Action::ALL[i].delta();
            d[0] as f32 == -last[0] && d[1] as f32 == -last[1] && d[2] as f32 == -last[2]
                && last.iter().any(|v| *v != 0.0)
        };

        if let Some(i) = (0..ACTION_COUNT).find(|&i| safe(i) && toward[i] > 0.5) {
            return Ok(i);
        }
        if let Some(i) = (0..ACTION_COUNT).find(|&i| safe(i) && !reverses_last(i)) {
            return Ok(i);
        }
        Ok((0..ACTION_COUNT).find(|&i| safe(i)).unwrap_or(0))
    }
}

// ─────────────────────────────────────────────────────────────────────────
// QNetwork: dense ReLU MLP, argmax over six Q-values.
// Weight layout follows the usual `[out][in]` convention for linear layers.
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerWeights {
    pub weight: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QNetworkWeights {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    pub layers: Vec<LayerWeights>,
}

#[derive(Debug, Clone)]
struct DenseLayer {
    inputs: usize,
    outputs: usize,
    /// Row-major `outputs x inputs`.
    weight: Vec<f32>,
    bias: Vec<f32>,
}

impl DenseLayer {
    fn forward(&self, x: &[f32], relu: bool, out: &mut Vec<f32>) {
        out.clear();
        for o in 0..self.outputs {
            let row = &self.weight[o * self.inputs..(o + 1) * self.inputs];
            let mut acc = self.bias[o];
            for (w, v) in row.iter().zip(x) {
                acc += w * v;
            }
            out.push(if relu { acc.max(0.0) } else { acc });
        }
    }
}

#[derive(Debug, Clone)]
pub struct QNetworkPolicy {
    name: String,
    layers: Vec<DenseLayer>,
}

impl QNetworkPolicy {
    pub fn from_weights(weights: QNetworkWeights) -> Result<Self, PolicyError> {
        if weights.layers.is_empty() {
            return Err(PolicyError::InvalidWeights("no layers".to_string()));
        }

        let mut layers = Vec::with_capacity(weights.layers.len());
        let mut expected_in = OBS_LEN;
        for (li, lw) in weights.layers.into_iter().enumerate() {
            let outputs = lw.weight.len();
            if outputs == 0 || lw.bias.len() != outputs {
                return Err(PolicyError::InvalidWeights(format!(
                    "layer {li}: {outputs} weight rows but {} biases",
                    lw.bias.len()
                )));
            }
            let mut flat = Vec::with_capacity(outputs * expected_in);
            for (ri, row) in lw.weight.iter().enumerate() {
                if row.len() != expected_in {
                    return Err(PolicyError::InvalidWeights(format!(
                        "layer {li} row {ri}: expected {expected_in} inputs, got {}",
                        row.len()
                    )));
                }
                flat.extend_from_slice(row);
            }
            if flat.iter().chain(lw.bias.iter()).any(|v| !v.is_finite()) {
                return Err(PolicyError::InvalidWeights(format!(
                    "layer {li}: non-finite parameter"
                )));
            }
            layers.push(DenseLayer {
                inputs: expected_in,
                outputs,
                weight: flat,
                bias: lw.bias,
            });
            expected_in = outputs;
        }

        if expected_in != ACTION_COUNT {
            return Err(PolicyError::InvalidWeights(format!(
                "final layer has {expected_in} outputs, expected {ACTION_COUNT}"
            )));
        }

        let name = if weights.name.trim().is_empty() {
            "q_network".to_string()
        } else {
            weights.name
        };
        Ok(Self { name, layers })
    }

    /// Small random network, useful for smoke runs and benchmarks.
    pub fn random(hidden: usize, seed: u64) -> Self {
        let hidden = hidden.max(1);
        let mut rng = Prng::new(seed);
        let mut layer = |inputs: usize, outputs: usize| {
            let scale = 1.0 / (inputs as f32).sqrt();
            LayerWeights {
                weight: (0..outputs)
                    .map(|_| {
                        (0..inputs)
                            .map(|_| (rng.next_unit() as f32 * 2.0 - 1.0) * scale)
                            .collect()
                    })
                    .collect(),
                bias: vec![0.0; outputs],
            }
        };
        let weights = QNetworkWeights {
            name: "q_network_random".to_string(),
            layers: vec![
                layer(OBS_LEN, hidden),
                layer(hidden, hidden),
                layer(hidden, ACTION_COUNT),
            ],
        };
        Self::from_weights(weights).unwrap_or_else(|_| Self {
            name: "q_network_random".to_string(),
            layers: Vec::new(),
        })
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, PolicyError> {
        let weights: QNetworkWeights = serde_json::from_str(json)
            .map_err(|e| PolicyError::InvalidWeights(format!("parse: {e}")))?;
        Self::from_weights(weights)
    }

    #[cfg(feature = "serde")]
    pub fn load(path: &std::path::Path) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn q_values(&self, observation: &Observation) -> Result<Vec<f32>, PolicyError> {
        if self.layers.is_empty() {
            return Err(PolicyError::MissingTensor("q".to_string()));
        }
        let mut x: Vec<f32> = observation.0.to_vec();
        let mut y = Vec::new();
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            layer.forward(&x, i != last, &mut y);
            std::mem::swap(&mut x, &mut y);
        }
        Ok(x)
    }
}

impl PolicyPort for QNetworkPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose_action(&self, observation: &Observation) -> Result<usize, PolicyError> {
        let q = self.q_values(observation)?;
        if q.len() != ACTION_COUNT {
            return Err(PolicyError::MalformedOutput(format!(
                "expected {ACTION_COUNT} q-values, got {}",
                q.len()
            )));
        }
        if q.iter().any(|v| !v.is_finite()) {
            return Err(PolicyError::MalformedOutput("non-finite q-value".to_string()));
        }
        let mut best = 0usize;
        for (i, v) in q.iter().enumerate() {
            if *v > q[best] {
                best = i;
            }
        }
        Ok(best)
    }
}
