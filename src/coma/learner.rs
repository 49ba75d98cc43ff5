use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{GradientsParams, Optimizer, RmsProp, RmsPropConfig};
use burn::prelude::*;
use burn::record::DefaultRecorder;
use burn::tensor::TensorData;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::coma::batch::{
    joint_actions_without_self, repeat_per_agent, shift_left, shift_right, EpisodeBatch,
};
use crate::coma::networks::{
    ActorNetwork, ActorNetworkConfig, CriticNetwork, CriticNetworkConfig,
};
use crate::coma::returns::td_lambda_targets;
use crate::config::ComaConfig;
use crate::error::{BatchError, CheckpointError};

pub type InferBackend = NdArray;
pub type TrainBackend = Autodiff<InferBackend>;

/// Losses from one learning step.
#[derive(Debug, Clone, Copy, Default)]
pub struct LearnMetrics {
    pub critic_loss: f32,
    pub actor_loss: f32,
}

/// COMA agent: one shared actor, a trained eval critic, and a frozen
/// target critic synced by wholesale weight copy every
/// `target_update_interval` learning steps.
pub struct ComaLearner {
    config: ComaConfig,
    actor: ActorNetwork<TrainBackend>,
    eval_critic: CriticNetwork<TrainBackend>,
    target_critic: CriticNetwork<InferBackend>,
    actor_optimizer: OptimizerAdaptor<RmsProp, ActorNetwork<TrainBackend>, TrainBackend>,
    critic_optimizer: OptimizerAdaptor<RmsProp, CriticNetwork<TrainBackend>, TrainBackend>,
    device: <TrainBackend as Backend>::Device,
    rng: StdRng,
}

impl ComaLearner {
    pub fn new(config: ComaConfig) -> Self {
        let device = Default::default();
        let actor = ActorNetworkConfig::new(config.obs_dim, config.n_agents, config.n_actions)
            .with_hidden_size(config.hidden_size)
            .init(&device);
        let critic_config = CriticNetworkConfig::new(
            config.obs_dim,
            config.state_dim,
            config.n_agents,
            config.n_actions,
        )
        .with_hidden_size(config.hidden_size);
        let eval_critic: CriticNetwork<TrainBackend> = critic_config.init(&device);
        // Target starts as an exact copy of the eval critic.
        let target_critic = eval_critic.valid();

        ComaLearner {
            config,
            actor,
            eval_critic,
            target_critic,
            actor_optimizer: RmsPropConfig::new().init(),
            critic_optimizer: RmsPropConfig::new().init(),
            device,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn config(&self) -> &ComaConfig {
        &self.config
    }

    /// Select one agent's action from its local observation and its own
    /// previous action.
    ///
    /// When `evaluate` is true the argmax action is returned. Otherwise
    /// the exploration branch fires when the uniform draw is at or above
    /// `epsilon`, so a larger epsilon means a greedier policy.
    pub fn choose_action(
        &mut self,
        obs: &[f32],
        last_action_onehot: &[f32],
        agent_id: usize,
        epsilon: f32,
        evaluate: bool,
    ) -> usize {
        assert_eq!(obs.len(), self.config.obs_dim, "observation length");
        assert_eq!(
            last_action_onehot.len(),
            self.config.n_actions,
            "previous action one-hot length"
        );
        assert!(agent_id < self.config.n_agents, "agent index out of range");

        let mut agent_onehot = vec![0.0f32; self.config.n_agents];
        agent_onehot[agent_id] = 1.0;

        let pi = self.actor.valid().forward(
            tensor2::<InferBackend>(obs, 1, self.config.obs_dim, &self.device),
            tensor2::<InferBackend>(&agent_onehot, 1, self.config.n_agents, &self.device),
            tensor2::<InferBackend>(last_action_onehot, 1, self.config.n_actions, &self.device),
        );
        let pi: Vec<f32> = pi.into_data().to_vec().expect("f32 tensor data extraction");

        if evaluate {
            argmax(&pi)
        } else if self.rng.random_range(0.0..1.0) >= epsilon {
            self.rng.random_range(0..self.config.n_actions)
        } else {
            argmax(&pi)
        }
    }

    /// One learning step: a critic update from TD(λ) targets, then an
    /// actor update weighted by the counterfactual advantage, then a
    /// periodic target sync.
    ///
    /// The two gradient passes are strictly sequential: the critic's
    /// optimizer step is applied before the actor's forward pass, and the
    /// actor re-reads the critic's Q-values as detached data, so no
    /// second gradient path into the critic exists.
    pub fn learn(
        &mut self,
        batch: &EpisodeBatch,
        max_episode_len: usize,
        train_step: usize,
        epsilon: f32,
    ) -> Result<LearnMetrics, BatchError> {
        batch.validate(&self.config)?;
        if batch.episode_len != max_episode_len {
            return Err(BatchError::EpisodeLength {
                expected: max_episode_len,
                actual: batch.episode_len,
            });
        }

        let (q_values, critic_loss) = self.train_critic(batch);
        let actor_loss = self.train_actor(batch, &q_values, epsilon);

        if train_step > 0 && train_step % self.config.target_update_interval == 0 {
            self.sync_target();
        }

        Ok(LearnMetrics {
            critic_loss,
            actor_loss,
        })
    }

    /// Copy the eval critic's weights into the target critic verbatim.
    pub fn sync_target(&mut self) {
        self.target_critic = self.eval_critic.valid();
    }

    /// Critic update. Returns the full Q-values table `[E, T, A,
    /// n_actions]` as detached data for the actor step, plus the summed
    /// squared TD-error loss.
    fn train_critic(&mut self, batch: &EpisodeBatch) -> (Vec<f32>, f32) {
        let cfg = &self.config;
        let (e, t) = (batch.n_episodes, batch.episode_len);
        let n = e * t * cfg.n_agents;
        let joint_width = cfg.n_agents * cfg.n_actions;

        // `u_onehot` in [E, T, A, n_actions] layout already reads as one
        // joint action row per (episode, timestep).
        let joint = &batch.u_onehot;
        let next_joint = shift_left(joint, e, t, joint_width);
        let prev_joint = shift_right(joint, e, t, joint_width);

        // Counterfactual inputs: each agent's query sees the joint action
        // with its own slot freed for enumeration.
        let cf_current = joint_actions_without_self(joint, cfg.n_agents, cfg.n_actions);
        let cf_next = joint_actions_without_self(&next_joint, cfg.n_agents, cfg.n_actions);
        let prev_joint_rep = repeat_per_agent(&prev_joint, joint_width, cfg.n_agents);
        let joint_rep = repeat_per_agent(joint, joint_width, cfg.n_agents);

        let q_eval_all = self.eval_critic.forward(
            tensor2::<TrainBackend>(&cf_current, n, joint_width, &self.device),
            tensor2::<TrainBackend>(&batch.s, n, cfg.state_dim, &self.device),
            tensor2::<TrainBackend>(&batch.o, n, cfg.obs_dim, &self.device),
            tensor2::<TrainBackend>(&batch.a_onehot, n, cfg.n_agents, &self.device),
            tensor2::<TrainBackend>(&prev_joint_rep, n, joint_width, &self.device),
        );
        let q_next_all = self.target_critic.forward(
            tensor2::<InferBackend>(&cf_next, n, joint_width, &self.device),
            tensor2::<InferBackend>(&batch.s_next, n, cfg.state_dim, &self.device),
            tensor2::<InferBackend>(&batch.o_next, n, cfg.obs_dim, &self.device),
            tensor2::<InferBackend>(&batch.a_onehot, n, cfg.n_agents, &self.device),
            tensor2::<InferBackend>(&joint_rep, n, joint_width, &self.device),
        );

        // Returned to the actor step unchanged, outside the gradient graph.
        let q_values: Vec<f32> = q_eval_all
            .clone()
            .detach()
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction");

        let action_mask = taken_action_mask(&batch.u, cfg.n_actions);
        let mask = tensor2::<TrainBackend>(&action_mask, n, cfg.n_actions, &self.device);
        let q_taken = (q_eval_all * mask).sum_dim(1).reshape([n as i32]);

        let q_next_data: Vec<f32> = q_next_all
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction");
        let q_next_taken: Vec<f32> = batch
            .u
            .iter()
            .enumerate()
            .map(|(i, &action)| q_next_data[i * cfg.n_actions + action])
            .collect();

        let targets = td_lambda_targets(
            &batch.r,
            &batch.terminated,
            &q_next_taken,
            e,
            t,
            cfg.n_agents,
            cfg.gamma,
            cfg.td_lambda,
        );
        let targets = Tensor::<TrainBackend, 1>::from_data(
            TensorData::from(targets.as_slice()),
            &self.device,
        );

        // Summed, not averaged: entry counts vary once callers mask
        // invalid timesteps.
        let td_error = targets - q_taken;
        let loss = (td_error.clone() * td_error).sum();
        let loss_val: f32 = loss
            .clone()
            .into_data()
            .to_vec::<f32>()
            .expect("f32 loss tensor extraction")[0];

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.eval_critic);
        self.eval_critic =
            self.critic_optimizer
                .step(self.config.critic_lr, self.eval_critic.clone(), grads);

        (q_values, loss_val)
    }

    /// Actor update from the critic's detached Q-values: policy gradient
    /// weighted by the counterfactual advantage.
    fn train_actor(&mut self, batch: &EpisodeBatch, q_values: &[f32], epsilon: f32) -> f32 {
        let cfg = &self.config;
        let (e, t) = (batch.n_episodes, batch.episode_len);
        let n = e * t * cfg.n_agents;

        // Each agent's previous own action: the whole per-timestep block
        // shifted one step later, zeros at t = 0.
        let prev_own = shift_right(&batch.u_onehot, e, t, cfg.n_agents * cfg.n_actions);

        let probs = self.actor.forward(
            tensor2::<TrainBackend>(&batch.o, n, cfg.obs_dim, &self.device),
            tensor2::<TrainBackend>(&batch.a_onehot, n, cfg.n_agents, &self.device),
            tensor2::<TrainBackend>(&prev_own, n, cfg.n_actions, &self.device),
        );
        let probs = smooth_probs(probs, epsilon, cfg.n_actions);

        let action_mask = taken_action_mask(&batch.u, cfg.n_actions);
        let mask = tensor2::<TrainBackend>(&action_mask, n, cfg.n_actions, &self.device);

        let pi_taken = (probs.clone() * mask.clone()).sum_dim(1).reshape([n as i32]);
        let log_pi_taken = pi_taken.log();

        let q_all = tensor2::<TrainBackend>(q_values, n, cfg.n_actions, &self.device);
        let q_taken = (q_all.clone() * mask).sum_dim(1).reshape([n as i32]);

        // The baseline is the expected Q under the agent's own current
        // policy; it and the advantage carry no gradient.
        let baseline = (q_all * probs).sum_dim(1).reshape([n as i32]).detach();
        let advantage = (q_taken - baseline).detach();

        let loss = -(advantage * log_pi_taken).sum();
        let loss_val: f32 = loss
            .clone()
            .into_data()
            .to_vec::<f32>()
            .expect("f32 loss tensor extraction")[0];

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.actor);
        self.actor = self
            .actor_optimizer
            .step(self.config.actor_lr, self.actor.clone(), grads);

        loss_val
    }

    /// Persist actor and eval-critic weights under deterministic
    /// filenames keyed by `train_step / save_cycle`.
    pub fn save_networks(&self, dir: &Path, train_step: usize) -> Result<(), CheckpointError> {
        let num = train_step / self.config.save_cycle;
        let recorder = DefaultRecorder::default();
        self.actor
            .clone()
            .valid()
            .save_file(dir.join(format!("{}_actor_params", num)), &recorder)
            .map_err(|e| CheckpointError::ModelSave(e.to_string()))?;
        self.eval_critic
            .clone()
            .valid()
            .save_file(dir.join(format!("{}_critic_params", num)), &recorder)
            .map_err(|e| CheckpointError::ModelSave(e.to_string()))?;
        Ok(())
    }

    /// Restore actor and eval-critic weights saved under cycle number
    /// `num`, then re-sync the target critic.
    pub fn load_networks(&mut self, dir: &Path, num: usize) -> Result<(), CheckpointError> {
        let recorder = DefaultRecorder::default();
        let cfg = &self.config;

        let actor: ActorNetwork<TrainBackend> =
            ActorNetworkConfig::new(cfg.obs_dim, cfg.n_agents, cfg.n_actions)
                .with_hidden_size(cfg.hidden_size)
                .init(&self.device)
                .load_file(
                    dir.join(format!("{}_actor_params", num)),
                    &recorder,
                    &self.device,
                )
                .map_err(|e| CheckpointError::ModelLoad(e.to_string()))?;
        let eval_critic: CriticNetwork<TrainBackend> =
            CriticNetworkConfig::new(cfg.obs_dim, cfg.state_dim, cfg.n_agents, cfg.n_actions)
                .with_hidden_size(cfg.hidden_size)
                .init(&self.device)
                .load_file(
                    dir.join(format!("{}_critic_params", num)),
                    &recorder,
                    &self.device,
                )
                .map_err(|e| CheckpointError::ModelLoad(e.to_string()))?;

        self.actor = actor;
        self.eval_critic = eval_critic;
        self.sync_target();
        Ok(())
    }
}

/// Blend uniform exploration mass into action probabilities and
/// renormalize over the action axis:
/// `π' = ((1-ε)·π + ε/n_actions) / Σ_a ((1-ε)·π + ε/n_actions)`.
/// The explicit renormalization keeps rows valid distributions even when
/// upstream masking has removed probability mass.
fn smooth_probs<B: Backend>(
    probs: Tensor<B, 2>,
    epsilon: f32,
    n_actions: usize,
) -> Tensor<B, 2> {
    let mixed = probs * (1.0 - epsilon) + epsilon / n_actions as f32;
    mixed.clone() / mixed.sum_dim(1)
}

/// One-hot mask over the taken actions, `[N, n_actions]` row-major.
fn taken_action_mask(u: &[usize], n_actions: usize) -> Vec<f32> {
    let mut mask = vec![0.0f32; u.len() * n_actions];
    for (i, &action) in u.iter().enumerate() {
        mask[i * n_actions + action] = 1.0;
    }
    mask
}

fn tensor2<B: Backend>(data: &[f32], rows: usize, cols: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_data(TensorData::from(data), device)
        .reshape([rows as i32, cols as i32])
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best_value = v;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> ComaConfig {
        ComaConfig {
            n_agents: 2,
            n_actions: 3,
            obs_dim: 4,
            state_dim: 6,
            hidden_size: 8,
            target_update_interval: 10,
            ..Default::default()
        }
    }

    /// Deterministic synthetic batch with actions cycling over the action
    /// space, a reward at the final timestep, and termination at the end.
    fn synthetic_batch(config: &ComaConfig, n_episodes: usize, episode_len: usize) -> EpisodeBatch {
        let base = n_episodes * episode_len;
        let per_agent = base * config.n_agents;

        let u: Vec<usize> = (0..per_agent).map(|i| i % config.n_actions).collect();
        let mut u_onehot = vec![0.0f32; per_agent * config.n_actions];
        for (i, &action) in u.iter().enumerate() {
            u_onehot[i * config.n_actions + action] = 1.0;
        }
        let mut a_onehot = vec![0.0f32; per_agent * config.n_agents];
        for i in 0..per_agent {
            a_onehot[i * config.n_agents + i % config.n_agents] = 1.0;
        }
        let mut r = vec![0.0f32; base];
        let mut terminated = vec![0.0f32; base];
        for e in 0..n_episodes {
            r[e * episode_len + episode_len - 1] = 1.0;
            terminated[e * episode_len + episode_len - 1] = 1.0;
        }

        let o: Vec<f32> = (0..per_agent * config.obs_dim)
            .map(|i| (i % 7) as f32 * 0.1)
            .collect();
        let s: Vec<f32> = (0..per_agent * config.state_dim)
            .map(|i| (i % 5) as f32 * 0.1)
            .collect();

        EpisodeBatch {
            o_next: o.clone(),
            s_next: s.clone(),
            o,
            s,
            u,
            r,
            u_onehot,
            terminated,
            a_onehot,
            n_episodes,
            episode_len,
        }
    }

    #[test]
    fn test_learn_returns_finite_losses() {
        let config = tiny_config();
        let mut learner = ComaLearner::new(config.clone());
        let batch = synthetic_batch(&config, 2, 4);

        let metrics = learner.learn(&batch, 4, 1, 0.9).unwrap();
        assert!(metrics.critic_loss.is_finite());
        assert!(metrics.actor_loss.is_finite());
    }

    #[test]
    fn test_learn_rejects_wrong_episode_len() {
        let config = tiny_config();
        let mut learner = ComaLearner::new(config.clone());
        let batch = synthetic_batch(&config, 1, 4);
        assert!(matches!(
            learner.learn(&batch, 5, 1, 0.9),
            Err(BatchError::EpisodeLength { .. })
        ));
    }

    #[test]
    fn test_learn_rejects_malformed_batch() {
        let config = tiny_config();
        let mut learner = ComaLearner::new(config.clone());
        let mut batch = synthetic_batch(&config, 1, 4);
        batch.s.truncate(batch.s.len() - 1);
        assert!(matches!(
            learner.learn(&batch, 4, 1, 0.9),
            Err(BatchError::ShapeMismatch { field: "s", .. })
        ));
    }

    #[test]
    fn test_choose_action_epsilon_one_is_greedy() {
        // The exploration branch fires when the draw is >= epsilon, so
        // epsilon = 1.0 never explores.
        let config = tiny_config();
        let mut learner = ComaLearner::new(config.clone());
        let obs = vec![0.3; config.obs_dim];
        let prev = vec![0.0; config.n_actions];

        let greedy = learner.choose_action(&obs, &prev, 0, 1.0, true);
        for _ in 0..20 {
            let action = learner.choose_action(&obs, &prev, 0, 1.0, false);
            assert_eq!(action, greedy);
        }
    }

    #[test]
    fn test_choose_action_epsilon_zero_explores() {
        // epsilon = 0.0 always takes the uniform-random branch.
        let config = tiny_config();
        let mut learner = ComaLearner::new(config.clone());
        let obs = vec![0.3; config.obs_dim];
        let prev = vec![0.0; config.n_actions];

        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(learner.choose_action(&obs, &prev, 1, 0.0, false));
        }
        assert!(
            seen.len() > 1,
            "expected several distinct actions, got {:?}",
            seen
        );
    }

    #[test]
    #[should_panic(expected = "observation length")]
    fn test_choose_action_rejects_wrong_obs_len() {
        let config = tiny_config();
        let mut learner = ComaLearner::new(config.clone());
        let obs = vec![0.0; config.obs_dim + 1];
        let prev = vec![0.0; config.n_actions];
        learner.choose_action(&obs, &prev, 0, 0.9, false);
    }

    fn critic_outputs(
        learner: &ComaLearner,
        eval: bool,
        n: usize,
        config: &ComaConfig,
    ) -> Vec<f32> {
        let device = &learner.device;
        let joint_width = config.n_agents * config.n_actions;
        let fixed = |dim: usize, scale: f32| -> Vec<f32> {
            (0..n * dim).map(|i| (i % 3) as f32 * scale).collect()
        };
        let out = if eval {
            learner
                .eval_critic
                .valid()
                .forward(
                    tensor2::<InferBackend>(&fixed(joint_width, 0.5), n, joint_width, device),
                    tensor2::<InferBackend>(&fixed(config.state_dim, 0.2), n, config.state_dim, device),
                    tensor2::<InferBackend>(&fixed(config.obs_dim, 0.3), n, config.obs_dim, device),
                    tensor2::<InferBackend>(&fixed(config.n_agents, 1.0), n, config.n_agents, device),
                    tensor2::<InferBackend>(&fixed(joint_width, 0.1), n, joint_width, device),
                )
        } else {
            learner
                .target_critic
                .forward(
                    tensor2::<InferBackend>(&fixed(joint_width, 0.5), n, joint_width, device),
                    tensor2::<InferBackend>(&fixed(config.state_dim, 0.2), n, config.state_dim, device),
                    tensor2::<InferBackend>(&fixed(config.obs_dim, 0.3), n, config.obs_dim, device),
                    tensor2::<InferBackend>(&fixed(config.n_agents, 1.0), n, config.n_agents, device),
                    tensor2::<InferBackend>(&fixed(joint_width, 0.1), n, joint_width, device),
                )
        };
        out.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_target_sync_after_interval() {
        let config = tiny_config();
        let mut learner = ComaLearner::new(config.clone());
        let batch = synthetic_batch(&config, 1, 4);

        // A non-multiple step trains the eval critic but leaves the
        // target untouched, so the two drift apart.
        learner.learn(&batch, 4, 1, 0.9).unwrap();
        let eval_out = critic_outputs(&learner, true, 3, &config);
        let target_out = critic_outputs(&learner, false, 3, &config);
        assert_ne!(eval_out, target_out);

        // A multiple of the interval copies weights verbatim.
        learner
            .learn(&batch, 4, config.target_update_interval, 0.9)
            .unwrap();
        let eval_out = critic_outputs(&learner, true, 3, &config);
        let target_out = critic_outputs(&learner, false, 3, &config);
        assert_eq!(eval_out, target_out);
    }

    #[test]
    fn test_smoothed_probs_sum_to_one() {
        let device: <InferBackend as Backend>::Device = Default::default();
        // Deliberately unnormalized rows, as after external masking.
        let raw = vec![0.2, 0.0, 0.3, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let probs = tensor2::<InferBackend>(&raw, 3, 3, &device);
        let smoothed = smooth_probs(probs, 0.9, 3);
        let data: Vec<f32> = smoothed.into_data().to_vec().unwrap();
        for row in data.chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6, "row sums to {}", sum);
            assert!(row.iter().all(|&p| p > 0.0));
        }
    }

    #[test]
    fn test_zero_reward_terminated_batch_critic_loss_shrinks() {
        // With zero rewards and immediate termination, every λ-return is
        // zero, so the critic loss is the squared norm of its own taken
        // Q-values and must shrink as training pulls them toward zero.
        let config = tiny_config();
        let mut learner = ComaLearner::new(config.clone());
        let mut batch = synthetic_batch(&config, 1, 3);
        batch.r.fill(0.0);
        batch.terminated.fill(1.0);

        let first = learner.learn(&batch, 3, 1, 0.9).unwrap().critic_loss;
        let mut last = first;
        for step in 2..60 {
            last = learner.learn(&batch, 3, step, 0.9).unwrap().critic_loss;
        }
        assert!(
            last < first,
            "critic loss did not shrink: first {} last {}",
            first,
            last
        );
    }

    #[test]
    fn test_save_and_load_networks_roundtrip() {
        let config = tiny_config();
        let learner = ComaLearner::new(config.clone());
        let dir = tempfile::tempdir().unwrap();

        learner
            .save_networks(dir.path(), 3 * config.save_cycle)
            .unwrap();

        let mut restored = ComaLearner::new(config.clone());
        restored.load_networks(dir.path(), 3).unwrap();

        let original_out = critic_outputs(&learner, true, 2, &config);
        let restored_out = critic_outputs(&restored, true, 2, &config);
        assert_eq!(original_out, restored_out);
    }
}
