//! Fixed-length feature vector handed to the inference boundary.
//!
//! The order of components is the contract with whatever model consumes it, so
//! a profile must stay matched to the artifact it was trained against. Every
//! profile produces exactly [`OBS_LEN`] finite values in `[-1, 1]`.

use crate::episode::Episode;
use crate::grid::Action;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const OBS_LEN: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ObservationProfile {
    /// `[0..6]` danger flags, `[6..12]` goal greater/less flags per axis,
    /// `[12..15]` goal deltas over `extent - 1`, `[15..18]` last move vector.
    #[default]
    Flags,
    /// `[0..6]` danger flags, `[6..9]` signed goal direction, `[9..12]` own
    /// position over `extent - 1`, `[12..15]` last move vector, `[15]` last
    /// action index, `[16]` step budget used, `[17]` distance to goal.
    Spatial,
}

impl ObservationProfile {
    pub fn name(self) -> &'static str {
        match self {
            ObservationProfile::Flags => "flags",
            ObservationProfile::Spatial => "spatial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flags" => Some(ObservationProfile::Flags),
            "spatial" => Some(ObservationProfile::Spatial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Observation(pub [f32; OBS_LEN]);

impl Observation {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

#[inline]
fn flag(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[inline]
fn signum(v: i32) -> f32 {
    v.signum() as f32
}

/// Divide by `max(1, extent - 1)` so single-cell axes contribute 0.
#[inline]
fn over_extent(v: i32, extent: usize) -> f32 {
    let denom = extent.saturating_sub(1).max(1) as f32;
    v as f32 / denom
}

/// Pure function of episode state; safe to call any number of times.
pub fn encode(episode: &Episode, profile: ObservationProfile) -> Observation {
    let mut out = [0.0f32; OBS_LEN];
    let pos = episode.position;
    let goal = episode.goal;
    let dims = episode.grid.dims();

    for (i, a) in Action::ALL.iter().enumerate() {
        out[i] = flag(episode.grid.is_wall(pos.offset(a.delta())));
    }

    let (dx, dy, dz) = (goal.x - pos.x, goal.y - pos.y, goal.z - pos.z);
    let last = episode.last_action.map(|a| a.delta()).unwrap_or([0, 0, 0]);

    match profile {
        ObservationProfile::Flags => {
            out[6] = flag(dx > 0);
            out[7] = flag(dx < 0);
            out[8] = flag(dy > 0);
            out[9] = flag(dy < 0);
            out[10] = flag(dz > 0);
            out[11] = flag(dz < 0);
            out[12] = over_extent(dx, dims.x);
            out[13] = over_extent(dy, dims.y);
            out[14] = over_extent(dz, dims.z);
            out[15] = last[0] as f32;
            out[16] = last[1] as f32;
            out[17] = last[2] as f32;
        }
        ObservationProfile::Spatial => {
            out[6] = signum(dx);
            out[7] = signum(dy);
            out[8] = signum(dz);
            out[9] = over_extent(pos.x, dims.x);
            out[10] = over_extent(pos.y, dims.y);
            out[11] = over_extent(pos.z, dims.z);
            out[12] = last[0] as f32;
            out[13] = last[1] as f32;
            out[14] = last[2] as f32;
            out[15] = episode
                .last_action
                .map(|a| (a.index() + 1) as f32 / 6.0)
                .unwrap_or(0.0);
            out[16] = (episode.steps_taken as f32 / episode.max_steps.max(1) as f32).min(1.0);
            out[17] = episode.distance_to_goal() as f32 / dims.max_manhattan().max(1) as f32;
        }
    }

    for v in out.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
        *v = v.clamp(-1.0, 1.0);
    }
    Observation(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::EpisodeParams;
    use crate::generator::{generate_layout, GoalRule};
    use crate::grid::{Cell, Coord, Dims, Grid};
    use crate::prng::Prng;
    use std::sync::Arc;

    fn check_bounds(o: &Observation) {
        assert_eq!(o.as_slice().len(), OBS_LEN);
        assert!(o.is_finite());
        for v in o.as_slice() {
            assert!((-1.0..=1.0).contains(v), "component {v} out of range");
        }
    }

    #[test]
    fn single_cell_grid_encodes_finite() {
        let mut g = Grid::new(Dims::new(1, 1, 1));
        g.set(Coord::new(0, 0, 0), Cell::Open).unwrap();
        let c = Coord::new(0, 0, 0);
        let ep = Episode::new(Arc::new(g), c, c, EpisodeParams::default()).unwrap();
        for p in [ObservationProfile::Flags, ObservationProfile::Spatial] {
            let o = encode(&ep, p);
            check_bounds(&o);
            assert_eq!(&o.0[..6], &[1.0; 6]);
        }
    }

    #[test]
    fn sizes_up_to_51_stay_bounded() {
        let mut rng = Prng::new(11);
        for &(x, y, z) in &[(1, 1, 1), (3, 1, 5), (5, 5, 5), (11, 11, 5), (51, 51, 51)] {
            let layout = generate_layout(Dims::new(x, y, z), GoalRule::Farthest, &mut rng);
            let mut ep = Episode::from_layout(layout, EpisodeParams::default());
            for i in 0..30i64 {
                for p in [ObservationProfile::Flags, ObservationProfile::Spatial] {
                    check_bounds(&encode(&ep, p));
                }
                ep.step(i % 6);
            }
        }
    }

    #[test]
    fn flags_layout_matches_geometry() {
        let mut g = Grid::new(Dims::new(5, 5, 5));
        let a = Coord::new(1, 1, 1);
        g.set(a, Cell::Open).unwrap();
        g.set(Coord::new(2, 1, 1), Cell::Open).unwrap();
        g.set(Coord::new(3, 3, 3), Cell::Open).unwrap();
        let mut ep =
            Episode::new(Arc::new(g), a, Coord::new(3, 3, 3), EpisodeParams::default()).unwrap();

        let o = encode(&ep, ObservationProfile::Flags);
        assert_eq!(&o.0[..6], &[0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(&o.0[6..12], &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        assert_eq!(&o.0[12..15], &[0.5, 0.5, 0.5]);
        assert_eq!(&o.0[15..18], &[0.0, 0.0, 0.0]);

        ep.step_action(Action::PosX);
        let o = encode(&ep, ObservationProfile::Flags);
        assert_eq!(&o.0[..6], &[1.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(&o.0[15..18], &[1.0, 0.0, 0.0]);
        assert_eq!(o.0[12], 0.25);
    }

    #[test]
    fn spatial_layout_tracks_progress() {
        let mut g = Grid::new(Dims::new(5, 3, 3));
        for x in 1..=3 {
            g.set(Coord::new(x, 1, 1), Cell::Open).unwrap();
        }
        let mut ep = Episode::new(
            Arc::new(g),
            Coord::new(1, 1, 1),
            Coord::new(3, 1, 1),
            EpisodeParams {
                max_steps: Some(4),
                ..EpisodeParams::default()
            },
        )
        .unwrap();
        ep.step_action(Action::PosX);
        let o = encode(&ep, ObservationProfile::Spatial);
        assert_eq!(&o.0[6..9], &[1.0, 0.0, 0.0]);
        assert_eq!(&o.0[9..12], &[0.5, 0.5, 0.5]);
        assert_eq!(&o.0[12..15], &[1.0, 0.0, 0.0]);
        assert!((o.0[15] - 1.0 / 6.0).abs() < 1e-6);
        assert_eq!(o.0[16], 0.25);
        // one cell left out of a maximum Manhattan span of 4 + 2 + 2
        assert_eq!(o.0[17], 0.125);
    }

    #[test]
    fn encode_has_no_side_effects() {
        let mut rng = Prng::new(3);
        let layout = generate_layout(Dims::new(7, 7, 7), GoalRule::Farthest, &mut rng);
        let ep = Episode::from_layout(layout, EpisodeParams::default());
        let a = encode(&ep, ObservationProfile::Flags);
        let b = encode(&ep, ObservationProfile::Flags);
        assert_eq!(a, b);
        assert_eq!(ep.steps_taken, 0);
    }

    #[test]
    fn profile_names_parse() {
        for p in [ObservationProfile::Flags, ObservationProfile::Spatial] {
            assert_eq!(ObservationProfile::parse(p.name()), Some(p));
        }
    }
}
