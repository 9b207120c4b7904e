use serde::{Deserialize, Serialize};

use super::NavigationDirection;

/// Episode bounds supplied by the episode list, used to gate previous/next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeNavigationContext {
    /// 1-based episode currently playing
    pub current_episode: u32,
    /// Number of episodes the series advertises
    pub total_episodes: u32,
}

impl EpisodeNavigationContext {
    /// Builds a context, clamping the current episode into `[1, total]`.
    pub fn new(current_episode: u32, total_episodes: u32) -> Self {
        let total_episodes = total_episodes.max(1);
        Self {
            current_episode: current_episode.clamp(1, total_episodes),
            total_episodes,
        }
    }

    pub fn contains(&self, episode: u32) -> bool {
        (1..=self.total_episodes).contains(&episode)
    }

    pub fn has_previous(&self) -> bool {
        self.current_episode > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_episode < self.total_episodes
    }

    /// The neighbouring episode in `direction`, or `None` at a list edge.
    pub fn adjacent(&self, direction: NavigationDirection) -> Option<u32> {
        match direction {
            NavigationDirection::Previous if self.has_previous() => Some(self.current_episode - 1),
            NavigationDirection::Next if self.has_next() => Some(self.current_episode + 1),
            _ => None,
        }
    }

    pub fn with_current(self, episode: u32) -> Self {
        Self::new(episode, self.total_episodes)
    }
}

impl Default for EpisodeNavigationContext {
    fn default() -> Self {
        Self::new(1, 1)
    }
}
