//! TD(λ) return estimation for critic targets.

/// Compute λ-returns for every episode, timestep, and agent.
///
/// `r` and `terminated` are `[E, T]` (rewards and termination flags are
/// shared across agents); `q_next_taken` is `[E, T, A]`, the target
/// critic's Q-value of the taken action evaluated at the next timestep.
/// The result is `[E, T, A]`.
///
/// Per episode and agent, the full table of n-step returns is filled
/// backward from the final timestep:
///
/// ```text
/// G[t][1] = r[t] + γ · Q_target[t] · (1 - terminated[t])
/// G[t][n] = r[t] + γ · G[t+1][n-1]          for n > 1
/// ```
///
/// and blended with geometrically decaying weights, the longest return
/// absorbing the remaining weight mass so the coefficients sum to 1:
///
/// ```text
/// λ_return[t] = (1-λ) · Σ_{n=1}^{T-t-1} λ^{n-1} · G[t][n]
///             + λ^{T-t-1} · G[t][T-t]
/// ```
///
/// A set termination flag zeroes the bootstrap term, so reward-only
/// returns propagate to episode ends.
pub fn td_lambda_targets(
    r: &[f32],
    terminated: &[f32],
    q_next_taken: &[f32],
    n_episodes: usize,
    episode_len: usize,
    n_agents: usize,
    gamma: f32,
    td_lambda: f32,
) -> Vec<f32> {
    assert_eq!(r.len(), n_episodes * episode_len);
    assert_eq!(terminated.len(), n_episodes * episode_len);
    assert_eq!(q_next_taken.len(), n_episodes * episode_len * n_agents);

    let t_max = episode_len;
    let mut out = vec![0.0f32; q_next_taken.len()];

    for e in 0..n_episodes {
        for a in 0..n_agents {
            // n-step return table: g[t][n-1] holds the n-step return at t.
            let mut g = vec![vec![0.0f32; t_max]; t_max];
            for t in (0..t_max).rev() {
                let rt = r[e * t_max + t];
                let term = terminated[e * t_max + t];
                let q = q_next_taken[(e * t_max + t) * n_agents + a];
                g[t][0] = rt + gamma * q * (1.0 - term);
                for n in 2..=(t_max - t) {
                    g[t][n - 1] = rt + gamma * g[t + 1][n - 2];
                }
            }

            for t in 0..t_max {
                let horizon = t_max - t;
                let mut acc = 0.0f32;
                for n in 1..horizon {
                    acc += td_lambda.powi(n as i32 - 1) * g[t][n - 1];
                }
                out[(e * t_max + t) * n_agents + a] = (1.0 - td_lambda) * acc
                    + td_lambda.powi(horizon as i32 - 1) * g[t][horizon - 1];
            }
        }
    }
    out
}
