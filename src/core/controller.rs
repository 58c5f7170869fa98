//! Single-writer tick state machine around the active [`Episode`].
//!
//! At most one decision is outstanding at a time. A decision is identified by
//! a [`DecisionTicket`]; the episode is only ever stepped by the holder of the
//! current ticket (or directly, in path-follow mode, when no ticket is out).
//! Requests that arrive while a ticket is out are dropped, not queued.
//! Replacing the maze cancels the ticket, so a late inference result for an
//! old episode is recognised as stale and discarded.

use tracing::{debug, info};

use crate::config::RunConfig;
use crate::episode::{Episode, StepOutcome};
use crate::generator::generate_layout;
use crate::grid::Action;
use crate::observation::{encode, Observation};
use crate::policy::{resolve_action, PolicyError, PolicyPort};
use crate::prng::Prng;
use crate::solver::{solve, PathFollower};
use crate::stats::EpisodeStats;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NavigationMode {
    /// Walk the solved route; ask the policy only once it runs out.
    #[default]
    PathFollow,
    /// Ask the policy every tick.
    Policy,
}

impl NavigationMode {
    pub fn name(self) -> &'static str {
        match self {
            NavigationMode::PathFollow => "path_follow",
            NavigationMode::Policy => "policy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path_follow" | "path-follow" | "path" | "follow" => Some(NavigationMode::PathFollow),
            "policy" | "model" | "infer" => Some(NavigationMode::Policy),
            _ => None,
        }
    }
}

/// Claim on the right to step the episode once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecisionTicket {
    pub generation: u64,
    pub serial: u64,
}

#[derive(Debug, Clone)]
pub enum Decision {
    /// Apply with [`Controller::apply_action`].
    Immediate(Action),
    /// Run the policy on `observation`, then hand the result back through
    /// [`Controller::complete_decision`].
    Infer {
        ticket: DecisionTicket,
        observation: Observation,
    },
}

/// Seed for the maze after `seed`.
pub fn next_seed(seed: u64) -> u64 {
    seed.wrapping_add(0x9E37_79B9_7F4A_7C15)
}

#[derive(Debug)]
pub struct Controller {
    config: RunConfig,
    episode: Episode,
    follower: PathFollower,
    stats: EpisodeStats,
    seed: u64,
    generation: u64,
    next_serial: u64,
    in_flight: Option<DecisionTicket>,
    last_outcome: Option<StepOutcome>,
    fallback_rng: Prng,
}

impl Controller {
    pub fn new(config: RunConfig) -> Self {
        let seed = config
            .seed
            .unwrap_or_else(|| Prng::from_entropy().next_u64());
        Self::with_seed(config, seed)
    }

    pub fn with_seed(config: RunConfig, seed: u64) -> Self {
        let (episode, follower) = build_episode(&config, seed);
        Self {
            config,
            episode,
            follower,
            stats: EpisodeStats::new(),
            seed,
            generation: 0,
            next_serial: 0,
            in_flight: None,
            last_outcome: None,
            fallback_rng: Prng::new(seed ^ 0xA076_1D64_78BD_642F),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn follower(&self) -> &PathFollower {
        &self.follower
    }

    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> Option<DecisionTicket> {
        self.in_flight
    }

    pub fn last_outcome(&self) -> Option<StepOutcome> {
        self.last_outcome
    }

    pub fn mode(&self) -> NavigationMode {
        self.config.mode
    }

    /// Takes effect on the next decision; the current route is kept.
    pub fn set_mode(&mut self, mode: NavigationMode) {
        self.config.mode = mode;
    }

    /// Ask for the next move. `None` when a decision is already outstanding
    /// or the episode is over.
    pub fn begin_decision(&mut self) -> Option<Decision> {
        if self.in_flight.is_some() {
            debug!("decision already in flight; dropping request");
            return None;
        }
        if self.episode.done {
            return None;
        }

        if self.config.mode == NavigationMode::PathFollow {
            if let Some(action) = self.follower.next_action(self.episode.position) {
                return Some(Decision::Immediate(action));
            }
        }

        let ticket = DecisionTicket {
            generation: self.generation,
            serial: self.next_serial,
        };
        self.next_serial = self.next_serial.wrapping_add(1);
        self.in_flight = Some(ticket);
        Some(Decision::Infer {
            ticket,
            observation: encode(&self.episode, self.config.profile),
        })
    }

    /// Step with an action that needed no inference. Refused while a ticket
    /// is out.
    pub fn apply_action(&mut self, action: Action) -> Option<StepOutcome> {
        if self.in_flight.is_some() || self.episode.done {
            return None;
        }
        Some(self.commit(action))
    }

    /// Deliver a policy result. Stale or cancelled tickets are discarded
    /// without touching the episode.
    pub fn complete_decision(
        &mut self,
        ticket: DecisionTicket,
        result: Result<usize, PolicyError>,
    ) -> Option<StepOutcome> {
        if self.in_flight != Some(ticket) {
            debug!(
                generation = ticket.generation,
                serial = ticket.serial,
                current = self.generation,
                "discarding stale decision"
            );
            return None;
        }
        self.in_flight = None;
        let action = resolve_action(result, &mut self.fallback_rng);
        Some(self.commit(action))
    }

    /// Any completion for the returned ticket will be treated as stale.
    pub fn cancel_in_flight(&mut self) -> Option<DecisionTicket> {
        self.in_flight.take()
    }

    fn commit(&mut self, action: Action) -> StepOutcome {
        let outcome = self.episode.step_action(action);
        self.last_outcome = Some(outcome);
        outcome
    }

    /// Between ticks: once the episode is done, record it and start the next
    /// maze. Returns whether a new episode was started.
    pub fn roll_over(&mut self) -> bool {
        if !self.episode.done || self.in_flight.is_some() {
            return false;
        }
        self.stats.record_episode(&self.episode);
        info!(
            generation = self.generation,
            reached_goal = self.episode.at_goal(),
            steps = self.episode.steps_taken,
            reward = self.episode.total_reward,
            "episode finished"
        );
        self.regenerate(next_seed(self.seed));
        true
    }

    /// Replace the maze now, abandoning the current episode unrecorded.
    pub fn regenerate(&mut self, seed: u64) {
        if let Some(t) = self.cancel_in_flight() {
            debug!(serial = t.serial, "cancelled in-flight decision for new maze");
        }
        let (episode, follower) = build_episode(&self.config, seed);
        self.episode = episode;
        self.follower = follower;
        self.seed = seed;
        self.generation += 1;
        self.last_outcome = None;
        debug!(
            generation = self.generation,
            seed,
            dims = %self.episode.grid.dims(),
            "new maze"
        );
    }

    /// Swap parameters and start over on a fresh maze.
    pub fn reconfigure(&mut self, config: RunConfig) {
        let seed = config.seed.unwrap_or_else(|| next_seed(self.seed));
        self.config = config;
        self.regenerate(seed);
    }

    /// Synchronous tick for headless runs: roll over if needed, then decide
    /// and step, consulting `policy` inline.
    pub fn tick<P: PolicyPort + ?Sized>(&mut self, policy: &P) -> Option<StepOutcome> {
        self.roll_over();
        match self.begin_decision()? {
            Decision::Immediate(action) => self.apply_action(action),
            Decision::Infer {
                ticket,
                observation,
            } => {
                let result = policy.choose_action(&observation);
                self.complete_decision(ticket, result)
            }
        }
    }
}

fn build_episode(config: &RunConfig, seed: u64) -> (Episode, PathFollower) {
    let mut rng = Prng::new(seed);
    let layout = generate_layout(config.dims(), config.goal_rule, &mut rng);
    let episode = Episode::from_layout(layout, config.episode_params());
    let path = solve(&episode.grid, episode.start, episode.goal);
    (episode, PathFollower::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::StepEvent;
    use crate::policy::{GoalSeekingPolicy, RandomPolicy};

    fn config(mode: NavigationMode) -> RunConfig {
        RunConfig {
            size: [7, 7, 5],
            seed: Some(42),
            mode,
            ..RunConfig::default()
        }
    }

    #[test]
    fn overlapping_requests_are_dropped() {
        let mut c = Controller::new(config(NavigationMode::Policy));
        let first = c.begin_decision();
        assert!(matches!(first, Some(Decision::Infer { .. })));
        assert!(c.begin_decision().is_none());
        assert!(c.begin_decision().is_none());
        assert_eq!(c.episode().steps_taken, 0);
        // Direct steps are refused too while the ticket is out.
        assert!(c.apply_action(Action::PosX).is_none());
    }

    #[test]
    fn completion_steps_once_and_releases() {
        let mut c = Controller::new(config(NavigationMode::Policy));
        let Some(Decision::Infer { ticket, .. }) = c.begin_decision() else {
            panic!("expected inference");
        };
        let out = c.complete_decision(ticket, Ok(0)).unwrap();
        assert_eq!(out.action, Action::PosX);
        assert_eq!(c.episode().steps_taken, 1);
        assert!(c.in_flight().is_none());
        // Same ticket again is stale.
        assert!(c.complete_decision(ticket, Ok(0)).is_none());
        assert_eq!(c.episode().steps_taken, 1);
    }

    #[test]
    fn stale_completion_after_new_maze_is_discarded() {
        let mut c = Controller::new(config(NavigationMode::Policy));
        let Some(Decision::Infer { ticket, .. }) = c.begin_decision() else {
            panic!("expected inference");
        };
        let gen_before = c.generation();
        c.regenerate(next_seed(c.seed()));
        assert_eq!(c.generation(), gen_before + 1);

        let pos = c.episode().position;
        assert!(c.complete_decision(ticket, Ok(2)).is_none());
        assert_eq!(c.episode().position, pos);
        assert_eq!(c.episode().steps_taken, 0);
    }

    #[test]
    fn cancelled_ticket_is_stale() {
        let mut c = Controller::new(config(NavigationMode::Policy));
        let Some(Decision::Infer { ticket, .. }) = c.begin_decision() else {
            panic!("expected inference");
        };
        assert_eq!(c.cancel_in_flight(), Some(ticket));
        assert!(c.complete_decision(ticket, Ok(1)).is_none());
        assert_eq!(c.episode().steps_taken, 0);
        assert!(c.begin_decision().is_some());
    }

    #[test]
    fn path_follow_reaches_goal_in_path_length() {
        let mut c = Controller::new(config(NavigationMode::PathFollow));
        let expected = c.follower().path().len() - 1;
        let mut steps = 0;
        while !c.episode().done {
            let out = c.tick(&RandomPolicy).unwrap();
            assert!(out.moved);
            steps += 1;
        }
        assert_eq!(steps, expected);
        assert!(c.episode().at_goal());
        assert_eq!(c.last_outcome().map(|o| o.event), Some(StepEvent::ReachedGoal));
    }

    #[test]
    fn roll_over_records_and_starts_fresh_generation() {
        let mut c = Controller::new(config(NavigationMode::PathFollow));
        assert!(!c.roll_over());
        while !c.episode().done {
            c.tick(&RandomPolicy);
        }
        let old_seed = c.seed();
        assert!(c.roll_over());
        assert_eq!(c.generation(), 1);
        assert_eq!(c.seed(), next_seed(old_seed));
        assert_eq!(c.stats().episodes, 1);
        assert_eq!(c.stats().successes, 1);
        assert!(!c.episode().done);
        assert_eq!(c.episode().steps_taken, 0);
        assert!(!c.follower().path().is_empty());
    }

    #[test]
    fn done_episode_yields_no_decision() {
        let mut c = Controller::new(RunConfig {
            max_steps: Some(1),
            ..config(NavigationMode::Policy)
        });
        assert!(c.tick(&RandomPolicy).is_some());
        assert!(c.episode().done);
        assert!(c.begin_decision().is_none());
    }

    #[test]
    fn random_fallback_keeps_episode_running() {
        let mut c = Controller::new(RunConfig {
            max_steps: Some(50),
            ..config(NavigationMode::Policy)
        });
        for _ in 0..50 {
            c.tick(&RandomPolicy);
        }
        assert!(c.episode().done);
        assert!(c.episode().grid.is_open(c.episode().position));
    }

    #[test]
    fn headless_ticks_keep_rolling_over() {
        let mut c = Controller::new(RunConfig {
            size: [5, 5, 5],
            ..config(NavigationMode::Policy)
        });
        for _ in 0..5_000 {
            c.tick(&GoalSeekingPolicy);
        }
        assert!(c.generation() > 0);
        assert_eq!(c.stats().episodes as u64, c.generation());
    }

    #[test]
    fn same_seed_same_maze() {
        let a = Controller::new(config(NavigationMode::Policy));
        let b = Controller::new(config(NavigationMode::Policy));
        assert_eq!(a.episode().grid, b.episode().grid);
        assert_eq!(a.episode().goal, b.episode().goal);
    }

    #[test]
    fn mode_names_parse() {
        for m in [NavigationMode::PathFollow, NavigationMode::Policy] {
            assert_eq!(NavigationMode::parse(m.name()), Some(m));
        }
    }
}
