use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::softmax;

/// Decentralized per-agent policy network.
///
/// ```text
/// Input:  concat(obs [obs_dim], agent one-hot [n_agents],
///                previous own action one-hot [n_actions])
/// FC1:    -> hidden_size, ReLU
/// FC2:    -> n_actions, softmax
/// ```
///
/// One network is shared by all agents; the agent-identity one-hot input
/// lets it condition on which agent is acting.
#[derive(Module, Debug)]
pub struct ActorNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct ActorNetworkConfig {
    pub obs_dim: usize,
    pub n_agents: usize,
    pub n_actions: usize,
    #[config(default = 32)]
    pub hidden_size: usize,
}

impl ActorNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ActorNetwork<B> {
        let input_dim = self.obs_dim + self.n_agents + self.n_actions;
        ActorNetwork {
            fc1: LinearConfig::new(input_dim, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.n_actions).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> ActorNetwork<B> {
    /// Forward pass over a flattened batch of agent queries.
    /// All inputs are `[N, ·]`; the output is `[N, n_actions]` of action
    /// probabilities summing to 1 per row.
    pub fn forward(
        &self,
        obs: Tensor<B, 2>,
        agent_onehot: Tensor<B, 2>,
        prev_action: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let x = Tensor::cat(vec![obs, agent_onehot, prev_action], 1);
        let x = self.relu.forward(self.fc1.forward(x));
        softmax(self.fc2.forward(x), 1)
    }
}

/// Centralized state-action value network.
///
/// ```text
/// Input:  concat(joint action without self [n_agents * n_actions],
///                global state [state_dim], obs [obs_dim],
///                agent one-hot [n_agents],
///                previous joint action [n_agents * n_actions])
/// FC1:    -> hidden_size, ReLU
/// FC2:    -> n_actions, linear
/// ```
///
/// The output row is the joint Q-value for every possible action of the
/// queried agent, with the other agents' actions held fixed. Two
/// instances exist at runtime: a trained eval critic and a frozen,
/// periodically synced target critic.
#[derive(Module, Debug)]
pub struct CriticNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct CriticNetworkConfig {
    pub obs_dim: usize,
    pub state_dim: usize,
    pub n_agents: usize,
    pub n_actions: usize,
    #[config(default = 32)]
    pub hidden_size: usize,
}

impl CriticNetworkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CriticNetwork<B> {
        let joint_dim = self.n_agents * self.n_actions;
        let input_dim =
            joint_dim + self.state_dim + self.obs_dim + self.n_agents + joint_dim;
        CriticNetwork {
            fc1: LinearConfig::new(input_dim, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.n_actions).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> CriticNetwork<B> {
    /// Forward pass over a flattened batch of agent queries.
    /// All inputs are `[N, ·]`; the output is `[N, n_actions]` Q-values.
    pub fn forward(
        &self,
        joint_action_without_self: Tensor<B, 2>,
        state: Tensor<B, 2>,
        obs: Tensor<B, 2>,
        agent_onehot: Tensor<B, 2>,
        prev_joint_action: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let x = Tensor::cat(
            vec![joint_action_without_self, state, obs, agent_onehot, prev_joint_action],
            1,
        );
        let x = self.relu.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }
}
