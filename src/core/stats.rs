use crate::episode::Episode;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const RECENT_WINDOW: usize = 200;

/// Running tally over finished episodes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EpisodeStats {
    pub episodes: u32,
    pub successes: u32,
    pub timeouts: u32,
    pub total_steps: u64,
    pub total_reward: f64,
    pub best_reward: Option<f32>,
    pub last_reward: Option<f32>,
    /// Success flags of the most recent episodes, oldest first.
    pub recent: Vec<bool>,
    pub first_success_at: Option<u32>,
}

impl EpisodeStats {
    pub fn new() -> Self {
        Self {
            episodes: 0,
            successes: 0,
            timeouts: 0,
            total_steps: 0,
            total_reward: 0.0,
            best_reward: None,
            last_reward: None,
            recent: Vec::with_capacity(RECENT_WINDOW),
            first_success_at: None,
        }
    }

    /// Fold in a finished episode. Callers only pass episodes with `done` set.
    pub fn record_episode(&mut self, episode: &Episode) {
        self.record(episode.at_goal(), episode.steps_taken, episode.total_reward);
    }

    pub fn record(&mut self, reached_goal: bool, steps: u32, reward: f32) {
        self.episodes += 1;
        if reached_goal {
            self.successes += 1;
            if self.first_success_at.is_none() {
                self.first_success_at = Some(self.episodes);
            }
        } else {
            self.timeouts += 1;
        }
        self.total_steps += steps as u64;
        self.total_reward += reward as f64;
        self.last_reward = Some(reward);
        self.best_reward = Some(match self.best_reward {
            Some(b) if b >= reward => b,
            _ => reward,
        });

        self.recent.push(reached_goal);
        if self.recent.len() > RECENT_WINDOW {
            self.recent.remove(0);
        }
    }

    pub fn success_rate(&self) -> f32 {
        if self.episodes == 0 {
            0.0
        } else {
            self.successes as f32 / self.episodes as f32
        }
    }

    pub fn recent_rate(&self) -> f32 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let hits = self.recent.iter().filter(|&&x| x).count();
        hits as f32 / self.recent.len() as f32
    }

    pub fn mean_reward(&self) -> f32 {
        if self.episodes == 0 {
            0.0
        } else {
            (self.total_reward / self.episodes as f64) as f32
        }
    }

    pub fn mean_steps(&self) -> f32 {
        if self.episodes == 0 {
            0.0
        } else {
            self.total_steps as f32 / self.episodes as f32
        }
    }
}

impl Default for EpisodeStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_report_zero() {
        let s = EpisodeStats::new();
        assert_eq!(s.success_rate(), 0.0);
        assert_eq!(s.recent_rate(), 0.0);
        assert_eq!(s.mean_reward(), 0.0);
        assert_eq!(s.best_reward, None);
    }

    #[test]
    fn record_tracks_rates_and_extremes() {
        let mut s = EpisodeStats::new();
        s.record(false, 400, -6.0);
        s.record(true, 20, 9.5);
        s.record(true, 30, 9.0);
        assert_eq!(s.episodes, 3);
        assert_eq!(s.successes, 2);
        assert_eq!(s.timeouts, 1);
        assert_eq!(s.first_success_at, Some(2));
        assert_eq!(s.best_reward, Some(9.5));
        assert_eq!(s.last_reward, Some(9.0));
        assert!((s.success_rate() - 2.0 / 3.0).abs() < 1e-6);
        assert!((s.mean_steps() - 150.0).abs() < 1e-4);
        assert!((s.mean_reward() - 12.5 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn recent_window_is_bounded() {
        let mut s = EpisodeStats::new();
        for _ in 0..RECENT_WINDOW {
            s.record(false, 1, 0.0);
        }
        for _ in 0..RECENT_WINDOW {
            s.record(true, 1, 0.0);
        }
        assert_eq!(s.recent.len(), RECENT_WINDOW);
        assert_eq!(s.recent_rate(), 1.0);
        assert_eq!(s.success_rate(), 0.5);
    }
}
