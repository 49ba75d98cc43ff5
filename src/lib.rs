//! # coma-rl
//!
//! Counterfactual Multi-Agent Policy Gradients (COMA) for cooperative
//! multi-agent reinforcement learning, built on the Burn ML framework.
//! Each agent runs a decentralized actor over its local observation while
//! a shared centralized critic scores joint actions against the full
//! environment state.
//!
//! ## Modules
//!
//! - [`coma`] — The algorithm: actor/critic networks, counterfactual
//!   masking, TD(λ) return estimation, and the learner
//! - [`env`] — Multi-agent environment trait and a toy grid world
//! - [`training`] — Episode rollout, training driver, metrics collection
//! - [`checkpoint`] — Model persistence keyed by training step
//! - [`config`] — TOML configuration loading and validation
//! - [`error`] — Structured error types

pub mod checkpoint;
pub mod coma;
pub mod config;
pub mod env;
pub mod error;
pub mod training;
