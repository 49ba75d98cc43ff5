//! Episode batch storage and the tensor-layout transforms feeding the
//! centralized critic: counterfactual joint-action masking and the
//! previous/next action shifts.

use crate::config::ComaConfig;
use crate::error::BatchError;

/// A stack of fixed-length episodes with named, flat, row-major fields.
///
/// All per-agent fields share the leading `(episodes, timesteps, agents)`
/// axes; `r` and `terminated` are per-timestep. Every episode in a batch
/// must have the same length — padding or truncation is the producer's
/// responsibility.
#[derive(Debug, Clone)]
pub struct EpisodeBatch {
    /// Local observations, `[E, T, A, obs_dim]`.
    pub o: Vec<f32>,
    /// Global state repeated per agent, `[E, T, A, state_dim]`.
    pub s: Vec<f32>,
    /// Chosen action indices, `[E, T, A]`.
    pub u: Vec<usize>,
    /// Shared rewards, `[E, T]`.
    pub r: Vec<f32>,
    /// Next-timestep observations, `[E, T, A, obs_dim]`.
    pub o_next: Vec<f32>,
    /// Next-timestep global state, `[E, T, A, state_dim]`.
    pub s_next: Vec<f32>,
    /// One-hot chosen actions, `[E, T, A, n_actions]`.
    pub u_onehot: Vec<f32>,
    /// Termination flags, `[E, T]`.
    pub terminated: Vec<f32>,
    /// Agent-identity one-hots, `[E, T, A, n_agents]`.
    pub a_onehot: Vec<f32>,
    pub n_episodes: usize,
    pub episode_len: usize,
}

impl EpisodeBatch {
    /// Check every field against the configured shapes. Any mismatch is a
    /// fatal configuration error.
    pub fn validate(&self, config: &ComaConfig) -> Result<(), BatchError> {
        if self.n_episodes == 0 || self.episode_len == 0 {
            return Err(BatchError::Empty);
        }
        let base = self.n_episodes * self.episode_len;
        let per_agent = base * config.n_agents;

        let checks: [(&'static str, usize, usize); 9] = [
            ("o", per_agent * config.obs_dim, self.o.len()),
            ("s", per_agent * config.state_dim, self.s.len()),
            ("u", per_agent, self.u.len()),
            ("r", base, self.r.len()),
            ("o_next", per_agent * config.obs_dim, self.o_next.len()),
            ("s_next", per_agent * config.state_dim, self.s_next.len()),
            ("u_onehot", per_agent * config.n_actions, self.u_onehot.len()),
            ("terminated", base, self.terminated.len()),
            ("a_onehot", per_agent * config.n_agents, self.a_onehot.len()),
        ];
        for (field, expected, actual) in checks {
            if expected != actual {
                return Err(BatchError::ShapeMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }

        for &action in &self.u {
            if action >= config.n_actions {
                return Err(BatchError::ActionOutOfRange {
                    action,
                    n_actions: config.n_actions,
                });
            }
        }
        Ok(())
    }

    /// Stack episodes along the episode axis. All batches must share the
    /// same episode length.
    pub fn concat(batches: Vec<EpisodeBatch>) -> Result<EpisodeBatch, BatchError> {
        let mut iter = batches.into_iter();
        let mut merged = iter.next().ok_or(BatchError::Empty)?;
        for batch in iter {
            if batch.episode_len != merged.episode_len {
                return Err(BatchError::EpisodeLength {
                    expected: merged.episode_len,
                    actual: batch.episode_len,
                });
            }
            merged.o.extend(batch.o);
            merged.s.extend(batch.s);
            merged.u.extend(batch.u);
            merged.r.extend(batch.r);
            merged.o_next.extend(batch.o_next);
            merged.s_next.extend(batch.s_next);
            merged.u_onehot.extend(batch.u_onehot);
            merged.terminated.extend(batch.terminated);
            merged.a_onehot.extend(batch.a_onehot);
            merged.n_episodes += batch.n_episodes;
        }
        Ok(merged)
    }
}

/// Produce, for every timestep row and every agent, a copy of the joint
/// one-hot action with that agent's own action slot zeroed.
///
/// `joint` is row-major `[rows, n_agents * n_actions]` (a `[E, T, A,
/// n_actions]` buffer is already in this layout with `rows = E * T`).
/// The output is `[rows * n_agents, n_agents * n_actions]`: row `i` of the
/// input fans out to `n_agents` consecutive output rows, the `a`-th of
/// which has `[a * n_actions, (a + 1) * n_actions)` zeroed. Each output
/// row is an independent copy; the input is never mutated.
pub fn joint_actions_without_self(
    joint: &[f32],
    n_agents: usize,
    n_actions: usize,
) -> Vec<f32> {
    let width = n_agents * n_actions;
    assert_eq!(joint.len() % width, 0, "joint action buffer misaligned");
    let rows = joint.len() / width;

    let mut out = Vec::with_capacity(rows * n_agents * width);
    for row in 0..rows {
        let src = &joint[row * width..(row + 1) * width];
        for agent in 0..n_agents {
            let start = out.len();
            out.extend_from_slice(src);
            let slot = start + agent * n_actions;
            out[slot..slot + n_actions].fill(0.0);
        }
    }
    out
}

/// Repeat each row once per agent so per-timestep data lines up with the
/// flattened `(episodes × timesteps × agents)` axis.
pub fn repeat_per_agent(data: &[f32], row_width: usize, n_agents: usize) -> Vec<f32> {
    assert_eq!(data.len() % row_width, 0, "row buffer misaligned");
    let rows = data.len() / row_width;
    let mut out = Vec::with_capacity(rows * n_agents * row_width);
    for row in 0..rows {
        let src = &data[row * row_width..(row + 1) * row_width];
        for _ in 0..n_agents {
            out.extend_from_slice(src);
        }
    }
    out
}

/// Shift timestep chunks one step later within each episode, filling
/// t = 0 with zeros: the previous-timestep view of `data`.
pub fn shift_right(data: &[f32], n_episodes: usize, episode_len: usize, chunk: usize) -> Vec<f32> {
    assert_eq!(data.len(), n_episodes * episode_len * chunk);
    let mut out = vec![0.0f32; data.len()];
    let episode_span = episode_len * chunk;
    for e in 0..n_episodes {
        let base = e * episode_span;
        out[base + chunk..base + episode_span]
            .copy_from_slice(&data[base..base + episode_span - chunk]);
    }
    out
}

/// Shift timestep chunks one step earlier within each episode, filling
/// t = T-1 with zeros: the next-timestep view of `data`.
pub fn shift_left(data: &[f32], n_episodes: usize, episode_len: usize, chunk: usize) -> Vec<f32> {
    assert_eq!(data.len(), n_episodes * episode_len * chunk);
    let mut out = vec![0.0f32; data.len()];
    let episode_span = episode_len * chunk;
    for e in 0..n_episodes {
        let base = e * episode_span;
        out[base..base + episode_span - chunk]
            .copy_from_slice(&data[base + chunk..base + episode_span]);
    }
    out
}
