use crate::coma::{ComaLearner, EpisodeBatch};
use crate::env::MultiAgentEnv;
use crate::error::BatchError;

/// Run one fixed-length episode and pack it into a single-episode batch.
///
/// Episodes always run for exactly `max_episode_len` timesteps so every
/// batch has a uniform length; the termination flag is recorded at the
/// step where the environment reports done and at the final step. The
/// trailing observation and state become the `o_next`/`s_next` views.
///
/// Returns the batch together with the accumulated episode reward.
pub fn rollout(
    env: &mut dyn MultiAgentEnv,
    learner: &mut ComaLearner,
    max_episode_len: usize,
    epsilon: f32,
    evaluate: bool,
) -> Result<(EpisodeBatch, f32), BatchError> {
    let config = learner.config().clone();
    let n_agents = config.n_agents;
    let n_actions = config.n_actions;

    env.reset();
    let mut last_action = vec![vec![0.0f32; n_actions]; n_agents];

    // One row per timestep, flattened across agents; one extra trailing
    // row for the next-timestep views.
    let mut obs_rows: Vec<Vec<f32>> = Vec::with_capacity(max_episode_len + 1);
    let mut state_rows: Vec<Vec<f32>> = Vec::with_capacity(max_episode_len + 1);

    let mut u = Vec::with_capacity(max_episode_len * n_agents);
    let mut u_onehot = Vec::with_capacity(max_episode_len * n_agents * n_actions);
    let mut a_onehot = Vec::with_capacity(max_episode_len * n_agents * n_agents);
    let mut r = Vec::with_capacity(max_episode_len);
    let mut terminated = Vec::with_capacity(max_episode_len);
    let mut episode_reward = 0.0f32;
    let mut finished = false;

    for t in 0..max_episode_len {
        let mut obs_row = Vec::with_capacity(n_agents * config.obs_dim);
        let state = env.full_state();
        let mut state_row = Vec::with_capacity(n_agents * config.state_dim);

        let mut joint_action = Vec::with_capacity(n_agents);
        for agent in 0..n_agents {
            let obs = env.agent_obs(agent);
            let action =
                learner.choose_action(&obs, &last_action[agent], agent, epsilon, evaluate);

            obs_row.extend_from_slice(&obs);
            state_row.extend_from_slice(&state);
            joint_action.push(action);

            u.push(action);
            for i in 0..n_actions {
                u_onehot.push(if i == action { 1.0 } else { 0.0 });
            }
            for i in 0..n_agents {
                a_onehot.push(if i == agent { 1.0 } else { 0.0 });
            }
            last_action[agent].fill(0.0);
            last_action[agent][action] = 1.0;
        }

        let (reward, done) = env.step(&joint_action);
        episode_reward += reward;
        r.push(reward);
        finished = finished || done;
        terminated.push(if finished || t == max_episode_len - 1 {
            1.0
        } else {
            0.0
        });

        obs_rows.push(obs_row);
        state_rows.push(state_row);
    }

    // Trailing observation closes the next-timestep views.
    let mut obs_row = Vec::with_capacity(n_agents * config.obs_dim);
    let state = env.full_state();
    let mut state_row = Vec::with_capacity(n_agents * config.state_dim);
    for agent in 0..n_agents {
        obs_row.extend_from_slice(&env.agent_obs(agent));
        state_row.extend_from_slice(&state);
    }
    obs_rows.push(obs_row);
    state_rows.push(state_row);

    let o: Vec<f32> = obs_rows[..max_episode_len].concat();
    let o_next: Vec<f32> = obs_rows[1..].concat();
    let s: Vec<f32> = state_rows[..max_episode_len].concat();
    let s_next: Vec<f32> = state_rows[1..].concat();

    let batch = EpisodeBatch {
        o,
        s,
        u,
        r,
        o_next,
        s_next,
        u_onehot,
        terminated,
        a_onehot,
        n_episodes: 1,
        episode_len: max_episode_len,
    };
    batch.validate(&config)?;
    Ok((batch, episode_reward))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComaConfig;
    use crate::env::GoalGrid;

    #[test]
    fn test_rollout_produces_valid_batch() {
        let config = ComaConfig {
            hidden_size: 8,
            ..Default::default()
        };
        let mut learner = ComaLearner::new(config.clone());
        let mut env = GoalGrid::new();

        let (batch, _reward) = rollout(&mut env, &mut learner, 4, 0.9, false).unwrap();
        assert_eq!(batch.n_episodes, 1);
        assert_eq!(batch.episode_len, 4);
        batch.validate(&config).unwrap();

        // Final timestep is always flagged terminated.
        assert_eq!(batch.terminated[3], 1.0);
        // One-hot actions agree with the action indices.
        for (i, &action) in batch.u.iter().enumerate() {
            assert_eq!(batch.u_onehot[i * config.n_actions + action], 1.0);
        }
    }

    #[test]
    fn test_rollout_next_views_are_shifted() {
        let config = ComaConfig {
            hidden_size: 8,
            ..Default::default()
        };
        let mut learner = ComaLearner::new(config.clone());
        let mut env = GoalGrid::new();

        let (batch, _) = rollout(&mut env, &mut learner, 3, 0.9, false).unwrap();
        let row = config.n_agents * config.obs_dim;
        // o_next at t lines up with o at t+1.
        assert_eq!(batch.o_next[..row], batch.o[row..2 * row]);
    }

    #[test]
    fn test_rollout_identity_onehots() {
        let config = ComaConfig {
            hidden_size: 8,
            ..Default::default()
        };
        let mut learner = ComaLearner::new(config.clone());
        let mut env = GoalGrid::new();

        let (batch, _) = rollout(&mut env, &mut learner, 2, 0.9, false).unwrap();
        for t in 0..2 {
            for agent in 0..config.n_agents {
                let base = (t * config.n_agents + agent) * config.n_agents;
                for i in 0..config.n_agents {
                    let expected = if i == agent { 1.0 } else { 0.0 };
                    assert_eq!(batch.a_onehot[base + i], expected);
                }
            }
        }
    }
}
