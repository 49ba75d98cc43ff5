use std::collections::VecDeque;

use crate::coma::LearnMetrics;

/// Training metrics tracker with rolling window computations.
pub struct TrainingMetrics {
    episode_rewards: VecDeque<f32>,
    critic_losses: VecDeque<f32>,
    actor_losses: VecDeque<f32>,
    capacity: usize,
    total_episodes: usize, // lifetime count, never capped
}

impl TrainingMetrics {
    pub fn with_capacity(capacity: usize) -> Self {
        TrainingMetrics {
            episode_rewards: VecDeque::with_capacity(capacity),
            critic_losses: VecDeque::with_capacity(capacity),
            actor_losses: VecDeque::with_capacity(capacity),
            capacity,
            total_episodes: 0,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn record_episode(&mut self, reward: f32) {
        self.total_episodes += 1;
        self.episode_rewards.push_back(reward);
        if self.episode_rewards.len() > self.capacity {
            self.episode_rewards.pop_front();
        }
    }

    pub fn record_update(&mut self, metrics: LearnMetrics) {
        self.critic_losses.push_back(metrics.critic_loss);
        self.actor_losses.push_back(metrics.actor_loss);
        if self.critic_losses.len() > self.capacity {
            self.critic_losses.pop_front();
        }
        if self.actor_losses.len() > self.capacity {
            self.actor_losses.pop_front();
        }
    }

    /// Average episode reward over the last N episodes.
    pub fn average_reward(&self, last_n: usize) -> f32 {
        rolling_average(&self.episode_rewards, last_n)
    }

    /// Average critic loss over the last N updates.
    pub fn average_critic_loss(&self, last_n: usize) -> f32 {
        rolling_average(&self.critic_losses, last_n)
    }

    /// Average actor loss over the last N updates.
    pub fn average_actor_loss(&self, last_n: usize) -> f32 {
        rolling_average(&self.actor_losses, last_n)
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn rolling_average(values: &VecDeque<f32>, last_n: usize) -> f32 {
    let n = values.len().min(last_n);
    if n == 0 {
        return 0.0;
    }
    let sum: f32 = values.iter().rev().take(n).sum();
    sum / n as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics_average_zero() {
        let metrics = TrainingMetrics::new();
        assert_eq!(metrics.average_reward(10), 0.0);
        assert_eq!(metrics.average_critic_loss(10), 0.0);
    }

    #[test]
    fn test_rolling_window_averages() {
        let mut metrics = TrainingMetrics::new();
        for reward in [1.0, 2.0, 3.0, 4.0] {
            metrics.record_episode(reward);
        }
        assert!((metrics.average_reward(2) - 3.5).abs() < 1e-6);
        assert!((metrics.average_reward(10) - 2.5).abs() < 1e-6);
        assert_eq!(metrics.total_episodes(), 4);
    }

    #[test]
    fn test_capacity_caps_window_but_not_total() {
        let mut metrics = TrainingMetrics::with_capacity(3);
        for i in 0..10 {
            metrics.record_episode(i as f32);
        }
        assert_eq!(metrics.total_episodes(), 10);
        // Window holds only the last 3 rewards: 7, 8, 9.
        assert!((metrics.average_reward(100) - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_update_losses_tracked_separately() {
        let mut metrics = TrainingMetrics::new();
        metrics.record_update(LearnMetrics {
            critic_loss: 2.0,
            actor_loss: -1.0,
        });
        metrics.record_update(LearnMetrics {
            critic_loss: 4.0,
            actor_loss: -3.0,
        });
        assert!((metrics.average_critic_loss(10) - 3.0).abs() < 1e-6);
        assert!((metrics.average_actor_loss(10) + 2.0).abs() < 1e-6);
    }
}
