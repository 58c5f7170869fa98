use crate::controller::{Controller, NavigationMode};
use crate::episode::{Episode, StepEvent};
use crate::grid::{Coord, Dims};
use crate::stats::EpisodeStats;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Read-only picture of the controller after a tick.
///
/// Design intent:
/// - Observers cannot mutate or steer the episode.
/// - Snapshotting is *on-demand* and allocates; the tick loop stays unchanged.
/// - The wall layout is sent as a flat mask with `x` varying fastest
///   (`index = x + sx * (y + sy * z)`), so a renderer only needs `dims`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameSnapshot {
    pub dims: Dims,
    pub open: Vec<bool>,
    pub start: Coord,
    pub goal: Coord,
    pub agent: Coord,
    pub steps_taken: u32,
    pub max_steps: u32,
    pub done: bool,
    pub generation: u64,
    pub seed: u64,
    pub mode: NavigationMode,
    pub decision_in_flight: bool,
    pub last_reward: Option<f32>,
    pub last_event: Option<StepEvent>,
    pub episode_reward: f32,
    /// Empty unless requested.
    pub path: Vec<Coord>,
    pub stats: StatsSummary,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatsSummary {
    pub episodes: u32,
    pub successes: u32,
    pub success_rate: f32,
    pub recent_rate: f32,
    pub mean_reward: f32,
    pub mean_steps: f32,
    pub best_reward: Option<f32>,
}

impl From<&EpisodeStats> for StatsSummary {
    fn from(s: &EpisodeStats) -> Self {
        Self {
            episodes: s.episodes,
            successes: s.successes,
            success_rate: s.success_rate(),
            recent_rate: s.recent_rate(),
            mean_reward: s.mean_reward(),
            mean_steps: s.mean_steps(),
            best_reward: s.best_reward,
        }
    }
}

pub struct FrameAdapter<'a> {
    controller: &'a Controller,
}

impl<'a> FrameAdapter<'a> {
    pub fn new(controller: &'a Controller) -> Self {
        Self { controller }
    }

    pub fn snapshot(&self, include_path: bool) -> FrameSnapshot {
        let c = self.controller;
        let ep = c.episode();
        let last = c.last_outcome();
        FrameSnapshot {
            dims: ep.grid.dims(),
            open: ep.grid.open_mask(),
            start: ep.start,
            goal: ep.goal,
            agent: ep.position,
            steps_taken: ep.steps_taken,
            max_steps: ep.max_steps,
            done: ep.done,
            generation: c.generation(),
            seed: c.seed(),
            mode: c.mode(),
            decision_in_flight: c.in_flight().is_some(),
            last_reward: last.map(|o| o.reward),
            last_event: last.map(|o| o.event),
            episode_reward: ep.total_reward,
            path: if include_path {
                c.follower().path().to_vec()
            } else {
                Vec::new()
            },
            stats: StatsSummary::from(c.stats()),
        }
    }
}

impl FrameSnapshot {
    /// Same layout as [`render_ascii_slice`], from the shipped mask.
    pub fn render_slice(&self, z: i32) -> String {
        let d = self.dims;
        render_layer(d, z, self.agent, self.goal, |c| {
            let i = c.x as usize + d.x * (c.y as usize + d.y * c.z as usize);
            self.open.get(i).copied().unwrap_or(false)
        })
    }
}

/// One `z` layer as text, rows of constant `y` from top (`y = 0`) down.
/// `A` agent, `G` goal, `#` wall, `.` open. `z` is clamped into the grid.
pub fn render_ascii_slice(episode: &Episode, z: i32) -> String {
    render_layer(episode.grid.dims(), z, episode.position, episode.goal, |c| {
        episode.grid.is_open(c)
    })
}

fn render_layer(
    dims: Dims,
    z: i32,
    agent: Coord,
    goal: Coord,
    is_open: impl Fn(Coord) -> bool,
) -> String {
    let z = z.clamp(0, (dims.z as i32 - 1).max(0));
    let mut out = String::with_capacity((dims.x + 1) * dims.y);
    for y in 0..dims.y as i32 {
        for x in 0..dims.x as i32 {
            let c = Coord::new(x, y, z);
            let ch = if c == agent {
                'A'
            } else if c == goal {
                'G'
            } else if is_open(c) {
                '.'
            } else {
                '#'
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::grid::{Cell, Grid};
    use crate::episode::EpisodeParams;
    use crate::policy::RandomPolicy;
    use std::sync::Arc;

    #[test]
    fn ascii_slice_marks_agent_goal_and_walls() {
        let mut g = Grid::new(Dims::new(4, 3, 3));
        for x in 1..=2 {
            g.set(Coord::new(x, 1, 1), Cell::Open).unwrap();
        }
        let ep = Episode::new(
            Arc::new(g),
            Coord::new(1, 1, 1),
            Coord::new(2, 1, 1),
            EpisodeParams::default(),
        )
        .unwrap();
        assert_eq!(render_ascii_slice(&ep, 1), "####\n#AG#\n####\n");
        assert_eq!(render_ascii_slice(&ep, 0), "####\n####\n####\n");
        // out-of-range layers clamp to the nearest one
        assert_eq!(render_ascii_slice(&ep, 99), render_ascii_slice(&ep, 2));
        assert_eq!(render_ascii_slice(&ep, -1), render_ascii_slice(&ep, 0));
    }

    #[test]
    fn snapshot_tracks_controller() {
        let mut c = Controller::new(RunConfig {
            size: [5, 5, 5],
            seed: Some(10),
            ..RunConfig::default()
        });
        c.tick(&RandomPolicy);
        let snap = FrameAdapter::new(&c).snapshot(true);
        assert_eq!(snap.dims, Dims::new(5, 5, 5));
        assert_eq!(snap.open.len(), 125);
        assert_eq!(snap.open.iter().filter(|o| **o).count(), c.episode().grid.open_count());
        assert_eq!(snap.agent, c.episode().position);
        assert_eq!(snap.steps_taken, 1);
        assert_eq!(snap.last_event, Some(StepEvent::Moved));
        assert!(snap.last_reward.is_some());
        assert_eq!(snap.path.first(), Some(&snap.start));
        assert_eq!(snap.path.last(), Some(&snap.goal));

        let bare = FrameAdapter::new(&c).snapshot(false);
        assert!(bare.path.is_empty());

        for z in 0..5 {
            assert_eq!(snap.render_slice(z), render_ascii_slice(c.episode(), z));
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snapshot_serialises_to_json() {
        let c = Controller::new(RunConfig {
            size: [3, 3, 3],
            seed: Some(1),
            ..RunConfig::default()
        });
        let snap = FrameAdapter::new(&c).snapshot(false);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"generation\":0"));
        let back: FrameSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
