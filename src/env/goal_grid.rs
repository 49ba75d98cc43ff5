use super::MultiAgentEnv;

pub const GRID_WIDTH: usize = 10;
pub const GRID_HEIGHT: usize = 4;
pub const GRID_CHANNELS: usize = 3;
/// Side length of the square observation window around each agent.
pub const OBS_WINDOW: usize = 3;

const N_AGENTS: usize = 2;
const N_ACTIONS: usize = 5;

/// A small two-agent cooperative grid world.
///
/// Two agents start on the left edge of a 10×4 grid and must each occupy
/// one of the two goal cells on the right edge. Actions are
/// stay/up/down/left/right. The team receives a shared reward equal to
/// the number of goal cells currently covered, and the episode terminates
/// once both goals are covered at the same time.
///
/// The global state is the full grid with three feature channels
/// (one per agent plus the goal cells); each agent's observation is the
/// same three channels restricted to a 3×3 window centered on the agent.
pub struct GoalGrid {
    agents: [(i32, i32); N_AGENTS],
    goals: [(i32, i32); N_AGENTS],
}

impl GoalGrid {
    pub fn new() -> Self {
        let mut env = GoalGrid {
            agents: [(0, 0); N_AGENTS],
            goals: [
                (GRID_WIDTH as i32 - 1, 1),
                (GRID_WIDTH as i32 - 1, 2),
            ],
        };
        env.reset();
        env
    }

    fn in_bounds(x: i32, y: i32) -> bool {
        x >= 0 && x < GRID_WIDTH as i32 && y >= 0 && y < GRID_HEIGHT as i32
    }

    fn goals_covered(&self) -> usize {
        self.goals
            .iter()
            .filter(|g| self.agents.contains(g))
            .count()
    }
}

impl Default for GoalGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiAgentEnv for GoalGrid {
    fn reset(&mut self) {
        self.agents = [(0, 1), (0, 2)];
    }

    fn agent_obs(&self, agent: usize) -> Vec<f32> {
        assert!(agent < N_AGENTS, "agent index {} out of range", agent);
        let (ax, ay) = self.agents[agent];
        let half = OBS_WINDOW as i32 / 2;
        let window = OBS_WINDOW * OBS_WINDOW;
        let mut obs = vec![0.0f32; GRID_CHANNELS * window];

        for dy in -half..=half {
            for dx in -half..=half {
                let (x, y) = (ax + dx, ay + dy);
                let idx = ((dy + half) as usize) * OBS_WINDOW + (dx + half) as usize;
                if !Self::in_bounds(x, y) {
                    continue;
                }
                // Channel 0: other agents, channel 1: goals, channel 2: walkable cells
                for (i, &pos) in self.agents.iter().enumerate() {
                    if i != agent && pos == (x, y) {
                        obs[idx] = 1.0;
                    }
                }
                if self.goals.contains(&(x, y)) {
                    obs[window + idx] = 1.0;
                }
                obs[2 * window + idx] = 1.0;
            }
        }
        obs
    }

    fn full_state(&self) -> Vec<f32> {
        let plane = GRID_WIDTH * GRID_HEIGHT;
        let mut state = vec![0.0f32; GRID_CHANNELS * plane];
        for (i, &(x, y)) in self.agents.iter().enumerate() {
            state[i * plane + y as usize * GRID_WIDTH + x as usize] = 1.0;
        }
        for &(x, y) in &self.goals {
            state[2 * plane + y as usize * GRID_WIDTH + x as usize] = 1.0;
        }
        state
    }

    fn step(&mut self, joint_action: &[usize]) -> (f32, bool) {
        assert_eq!(
            joint_action.len(),
            N_AGENTS,
            "joint action must have one entry per agent"
        );

        for (i, &action) in joint_action.iter().enumerate() {
            let (dx, dy) = match action {
                0 => (0, 0),
                1 => (0, -1),
                2 => (0, 1),
                3 => (-1, 0),
                4 => (1, 0),
                other => panic!("action index {} out of range", other),
            };
            let (x, y) = self.agents[i];
            let (nx, ny) = (x + dx, y + dy);
            if Self::in_bounds(nx, ny) {
                self.agents[i] = (nx, ny);
            }
        }

        let covered = self.goals_covered();
        let done = covered == N_AGENTS;
        (covered as f32, done)
    }

    fn n_agents(&self) -> usize {
        N_AGENTS
    }

    fn n_actions(&self) -> usize {
        N_ACTIONS
    }

    fn obs_dim(&self) -> usize {
        GRID_CHANNELS * OBS_WINDOW * OBS_WINDOW
    }

    fn state_dim(&self) -> usize {
        GRID_CHANNELS * GRID_WIDTH * GRID_HEIGHT
    }
}
