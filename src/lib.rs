//! # maze3d
//!
//! Procedurally generated 3D grid mazes with a single agent, a step-wise
//! reward model and a pluggable decision policy.
//!
//! A maze is carved by randomized depth-first search on the all-odd lattice,
//! so every open cell is reachable from the start. An [`episode::Episode`]
//! walks one maze; each step is scored and the episode ends at the goal or
//! at the step cap. Decisions come either from a breadth-first route
//! ([`solver`]) or from a [`policy::PolicyPort`] fed an 18-value
//! [`observation::Observation`]. Any policy failure falls back to a random
//! move.
//!
//! ## Quick Start
//!
//! ```
//! use maze3d::prelude::*;
//!
//! let mut rng = Prng::new(42);
//! let layout = generate_layout(Dims::new(11, 11, 5), GoalRule::Farthest, &mut rng);
//! let mut episode = Episode::from_layout(layout, EpisodeParams::default());
//!
//! let path = solve(&episode.grid, episode.start, episode.goal);
//! for action in path_actions(&path) {
//!     episode.step_action(action);
//! }
//! assert!(episode.done && episode.at_goal());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): serialization of grids, snapshots and configs, JSON
//!   weight loading
//! - `parallel`: run evaluation episodes on rayon
//!
//! ## Modules
//!
//! - [`grid`]: coordinates, extents, cells and actions
//! - [`generator`]: maze carving and goal placement
//! - [`episode`]: step transition and reward
//! - [`observation`]: feature encoding for policies
//! - [`solver`]: shortest paths and route following
//! - [`policy`]: the inference boundary and concrete policies
//! - [`controller`]: single-writer tick state machine
//! - [`evaluate`]: headless multi-episode runs
//! - [`observer`]: read-only frame snapshots for renderers

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/grid.rs"]
pub mod grid;

#[path = "core/generator.rs"]
pub mod generator;

#[path = "core/episode.rs"]
pub mod episode;

#[path = "core/observation.rs"]
pub mod observation;

#[path = "core/solver.rs"]
pub mod solver;

#[path = "core/policy.rs"]
pub mod policy;

#[path = "core/stats.rs"]
pub mod stats;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/controller.rs"]
pub mod controller;

#[path = "core/evaluate.rs"]
pub mod evaluate;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use maze3d::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::RunConfig;
    pub use crate::controller::{Controller, Decision, DecisionTicket, NavigationMode};
    pub use crate::episode::{Episode, EpisodeParams, RewardShaping, StepEvent, StepOutcome};
    pub use crate::evaluate::{evaluate, EvaluationReport};
    pub use crate::generator::{generate, generate_layout, GoalRule, MazeLayout};
    pub use crate::grid::{Action, Cell, Coord, Dims, Grid};
    pub use crate::observation::{encode, Observation, ObservationProfile, OBS_LEN};
    pub use crate::policy::{
        resolve_action, GoalSeekingPolicy, PolicyError, PolicyPort, QNetworkPolicy, RandomPolicy,
    };
    pub use crate::prng::{Prng, RandomSource};
    pub use crate::solver::{action_between, path_actions, solve, PathFollower};
}
