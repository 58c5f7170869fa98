use std::sync::Arc;

use crate::generator::MazeLayout;
use crate::grid::{Action, Coord, Grid};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────
// Episode: one playthrough of one grid. The grid is shared read-only; the
// agent state is mutated in place by `step` until `done` flips, after which
// the episode is dropped and replaced rather than reset.
// ─────────────────────────────────────────────────────────────────────────

/// Reward terms applied by [`Episode::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RewardShaping {
    /// Subtracted on every accepted step call.
    pub step_cost: f32,
    /// Extra cost when the move hits a wall or the border.
    pub wall_penalty: f32,
    /// Multiplies the decrease in Manhattan distance to the goal.
    pub progress_scale: f32,
    pub goal_bonus: f32,
}

impl RewardShaping {
    pub fn shaped() -> Self {
        Self {
            step_cost: 0.01,
            wall_penalty: 0.20,
            progress_scale: 0.10,
            goal_bonus: 10.0,
        }
    }

    /// Goal bonus only.
    pub fn sparse() -> Self {
        Self {
            step_cost: 0.0,
            wall_penalty: 0.0,
            progress_scale: 0.0,
            goal_bonus: 10.0,
        }
    }
}

impl Default for RewardShaping {
    fn default() -> Self {
        Self::shaped()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StepEvent {
    /// The episode was already done; nothing changed.
    Ignored,
    Moved,
    Bump,
    ReachedGoal,
    Timeout,
}

impl StepEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            StepEvent::Ignored => "ignored",
            StepEvent::Moved => "moved",
            StepEvent::Bump => "bump",
            StepEvent::ReachedGoal => "reached_goal",
            StepEvent::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepOutcome {
    pub action: Action,
    pub event: StepEvent,
    pub moved: bool,
    pub reward: f32,
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpisodeParams {
    /// Step cap; `None` derives `4 * sx * sy * sz`.
    pub max_steps: Option<u32>,
    pub reward: RewardShaping,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EpisodeError {
    #[error("start cell {0} is not open")]
    StartBlocked(Coord),
    #[error("goal cell {0} is outside the grid")]
    GoalOutOfBounds(Coord),
    #[error("goal cell {0} is not open")]
    GoalBlocked(Coord),
}

#[derive(Debug, Clone)]
pub struct Episode {
    pub grid: Arc<Grid>,
    pub start: Coord,
    pub goal: Coord,
    pub position: Coord,
    pub steps_taken: u32,
    pub max_steps: u32,
    /// `None` until a move is accepted, and again after a rejected move.
    pub last_action: Option<Action>,
    pub done: bool,
    pub total_reward: f32,
    pub reward: RewardShaping,
}

/// `4 * sx * sy * sz`, saturating.
pub fn default_max_steps(grid: &Grid) -> u32 {
    let cells = grid.dims().cell_count().saturating_mul(4);
    u32::try_from(cells).unwrap_or(u32::MAX)
}

impl Episode {
    pub fn new(
        grid: Arc<Grid>,
        start: Coord,
        goal: Coord,
        params: EpisodeParams,
    ) -> Result<Self, EpisodeError> {
        if !grid.is_open(start) {
            return Err(EpisodeError::StartBlocked(start));
        }
        if grid.index(goal).is_none() {
            return Err(EpisodeError::GoalOutOfBounds(goal));
        }
        if !grid.is_open(goal) {
            return Err(EpisodeError::GoalBlocked(goal));
        }
        Ok(Self::build(grid, start, goal, params))
    }

    /// Generated layouts always open their start and pick an in-bounds goal.
    pub fn from_layout(layout: MazeLayout, params: EpisodeParams) -> Self {
        Self::build(Arc::new(layout.grid), layout.start, layout.goal, params)
    }

    fn build(grid: Arc<Grid>, start: Coord, goal: Coord, params: EpisodeParams) -> Self {
        let max_steps = params
            .max_steps
            .unwrap_or_else(|| default_max_steps(&grid))
            .max(1);
        Self {
            grid,
            start,
            goal,
            position: start,
            steps_taken: 0,
            max_steps,
            last_action: None,
            done: false,
            total_reward: 0.0,
            reward: params.reward,
        }
    }

    pub fn distance_to_goal(&self) -> u32 {
        self.position.manhattan(self.goal)
    }

    pub fn at_goal(&self) -> bool {
        self.position == self.goal
    }

    /// Advance one tick. `raw_action` is clamped into `0..=5`.
    pub fn step(&mut self, raw_action: i64) -> StepOutcome {
        self.step_action(Action::clamped(raw_action))
    }

    pub fn step_action(&mut self, action: Action) -> StepOutcome {
        if self.done {
            return StepOutcome {
                action,
                event: StepEvent::Ignored,
                moved: false,
                reward: 0.0,
                done: true,
            };
        }

        self.steps_taken = self.steps_taken.saturating_add(1);
        let shaping = self.reward;
        let dist_before = self.distance_to_goal() as f32;
        let mut reward = -shaping.step_cost;

        let candidate = self.position.offset(action.delta());
        let moved = self.grid.is_open(candidate);
        if moved {
            self.position = candidate;
            self.last_action = Some(action);
        } else {
            reward -= shaping.wall_penalty;
            self.last_action = None;
        }

        let dist_after = self.distance_to_goal() as f32;
        reward += (dist_before - dist_after) * shaping.progress_scale;

        let reached = self.at_goal();
        if reached {
            reward += shaping.goal_bonus;
        }
        let timed_out = self.steps_taken >= self.max_steps;
        self.done = reached || timed_out;
        self.total_reward += reward;

        let event = if reached {
            StepEvent::ReachedGoal
        } else if timed_out {
            StepEvent::Timeout
        } else if moved {
            StepEvent::Moved
        } else {
            StepEvent::Bump
        };

        StepOutcome {
            action,
            event,
            moved,
            reward,
            done: self.done,
        }
    }
}
