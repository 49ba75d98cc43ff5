use crate::checkpoint::Checkpointer;
use crate::coma::{ComaLearner, EpisodeBatch};
use crate::config::{ComaConfig, TrainerConfig};
use crate::env::MultiAgentEnv;
use crate::error::TrainError;
use crate::training::metrics::TrainingMetrics;
use crate::training::rollout::rollout;

/// On-policy training driver: one batch of fresh episodes per learning
/// step, no replay. Episodes are collected and consumed strictly
/// sequentially on a single thread.
pub struct Trainer {
    config: TrainerConfig,
    checkpointer: Checkpointer,
}

impl Trainer {
    pub fn new(config: TrainerConfig, save_cycle: usize) -> Self {
        let checkpointer = Checkpointer::new(config.checkpoint_dir.clone(), save_cycle);
        Trainer {
            config,
            checkpointer,
        }
    }

    /// Run the full training loop.
    pub fn train(
        &self,
        env: &mut dyn MultiAgentEnv,
        learner: &mut ComaLearner,
    ) -> Result<(), TrainError> {
        check_env_shapes(env, learner.config())?;

        let epsilon = learner.config().epsilon;
        let mut metrics = TrainingMetrics::new();
        let mut train_step = 0usize;

        println!(
            "Starting COMA training for {} epochs ({} episode(s) per batch, {} steps each)...",
            self.config.n_epochs, self.config.episodes_per_batch, self.config.max_episode_len
        );
        println!("-------------------------------------------");

        for epoch in 1..=self.config.n_epochs {
            let mut episodes = Vec::with_capacity(self.config.episodes_per_batch);
            for _ in 0..self.config.episodes_per_batch {
                let (batch, reward) =
                    rollout(env, learner, self.config.max_episode_len, epsilon, false)?;
                metrics.record_episode(reward);
                episodes.push(batch);
            }
            let batch = EpisodeBatch::concat(episodes)?;

            let update = learner.learn(&batch, self.config.max_episode_len, train_step, epsilon)?;
            metrics.record_update(update);
            train_step += 1;

            if epoch % self.config.log_interval == 0 {
                let window = self.config.log_interval;
                println!(
                    "Epoch {}/{} | reward({}): {:.2} | critic_loss: {:.4} | actor_loss: {:.4}",
                    epoch,
                    self.config.n_epochs,
                    window,
                    metrics.average_reward(window),
                    metrics.average_critic_loss(window),
                    metrics.average_actor_loss(window),
                );
            }

            if epoch % self.config.checkpoint_interval == 0 {
                match self.checkpointer.save(learner, train_step) {
                    Ok(path) => println!("  >> Checkpoint saved: {}", path.display()),
                    Err(e) => eprintln!("  >> Checkpoint failed: {}", e),
                }
            }
        }

        println!("-------------------------------------------");
        println!(
            "Training complete. Total episodes: {}",
            metrics.total_episodes()
        );
        Ok(())
    }

    /// Average greedy episode reward over `n_episodes` evaluation runs.
    pub fn evaluate(
        &self,
        env: &mut dyn MultiAgentEnv,
        learner: &mut ComaLearner,
        n_episodes: usize,
    ) -> Result<f32, TrainError> {
        let mut total = 0.0;
        for _ in 0..n_episodes {
            let (_, reward) = rollout(env, learner, self.config.max_episode_len, 0.0, true)?;
            total += reward;
        }
        Ok(total / n_episodes.max(1) as f32)
    }

    pub fn checkpointer(&self) -> &Checkpointer {
        &self.checkpointer
    }
}

/// The environment's declared shapes must agree with the learner's
/// configuration before any batch is built.
fn check_env_shapes(env: &dyn MultiAgentEnv, config: &ComaConfig) -> Result<(), TrainError> {
    let checks: [(&'static str, usize, usize); 4] = [
        ("n_agents", config.n_agents, env.n_agents()),
        ("n_actions", config.n_actions, env.n_actions()),
        ("obs_dim", config.obs_dim, env.obs_dim()),
        ("state_dim", config.state_dim, env.state_dim()),
    ];
    for (field, expected, actual) in checks {
        if expected != actual {
            return Err(TrainError::EnvMismatch {
                field,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::GoalGrid;
    use std::path::PathBuf;

    fn test_configs(dir: PathBuf) -> (ComaConfig, TrainerConfig) {
        let coma = ComaConfig {
            hidden_size: 8,
            ..Default::default()
        };
        let trainer = TrainerConfig {
            n_epochs: 2,
            episodes_per_batch: 2,
            max_episode_len: 3,
            log_interval: 1,
            checkpoint_interval: 2,
            checkpoint_dir: dir,
        };
        (coma, trainer)
    }

    #[test]
    fn test_train_smoke() {
        let dir = tempfile::tempdir().unwrap();
        let (coma, trainer_config) = test_configs(dir.path().to_path_buf());
        let save_cycle = coma.save_cycle;
        let mut learner = ComaLearner::new(coma);
        let mut env = GoalGrid::new();

        let trainer = Trainer::new(trainer_config, save_cycle);
        trainer.train(&mut env, &mut learner).unwrap();

        // The checkpoint interval fired once during the run.
        assert!(trainer.checkpointer().latest_metadata().is_ok());
    }

    #[test]
    fn test_env_shape_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (mut coma, trainer_config) = test_configs(dir.path().to_path_buf());
        coma.obs_dim = 99;
        let save_cycle = coma.save_cycle;
        let mut learner = ComaLearner::new(coma);
        let mut env = GoalGrid::new();

        let trainer = Trainer::new(trainer_config, save_cycle);
        assert!(matches!(
            trainer.train(&mut env, &mut learner),
            Err(TrainError::EnvMismatch {
                field: "obs_dim",
                ..
            })
        ));
    }

    #[test]
    fn test_evaluate_returns_finite_reward() {
        let dir = tempfile::tempdir().unwrap();
        let (coma, trainer_config) = test_configs(dir.path().to_path_buf());
        let save_cycle = coma.save_cycle;
        let mut learner = ComaLearner::new(coma);
        let mut env = GoalGrid::new();

        let trainer = Trainer::new(trainer_config, save_cycle);
        let reward = trainer.evaluate(&mut env, &mut learner, 2).unwrap();
        assert!(reward.is_finite());
    }
}
