//! Multi-agent environment interface and a toy cooperative grid world.

mod goal_grid;

pub use goal_grid::{GoalGrid, GRID_CHANNELS, GRID_HEIGHT, GRID_WIDTH, OBS_WINDOW};

/// A cooperative multi-agent environment with per-agent partial
/// observations and a fully observable joint state.
///
/// Agents act simultaneously: `step` consumes one action index per agent
/// and returns a single shared reward plus a termination flag.
pub trait MultiAgentEnv {
    /// Reset the environment to its initial configuration.
    fn reset(&mut self);

    /// Local observation for one agent, flattened to `obs_dim` floats.
    fn agent_obs(&self, agent: usize) -> Vec<f32>;

    /// Global state visible to the centralized critic, flattened to
    /// `state_dim` floats.
    fn full_state(&self) -> Vec<f32>;

    /// Advance one timestep with the given joint action.
    /// Returns `(shared_reward, done)`.
    fn step(&mut self, joint_action: &[usize]) -> (f32, bool);

    fn n_agents(&self) -> usize;
    fn n_actions(&self) -> usize;
    fn obs_dim(&self) -> usize;
    fn state_dim(&self) -> usize;
}
