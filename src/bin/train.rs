use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use coma_rl::coma::ComaLearner;
use coma_rl::config::AppConfig;
use coma_rl::env::GoalGrid;
use coma_rl::training::Trainer;

/// Train a COMA multi-agent policy on the goal-grid environment.
#[derive(Parser)]
#[command(name = "train", about = "Train a COMA multi-agent policy")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Resume from the latest checkpoint in the checkpoint directory
    #[arg(long)]
    resume: bool,

    /// Override number of training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Override actor learning rate
    #[arg(long)]
    actor_lr: Option<f64>,

    /// Override critic learning rate
    #[arg(long)]
    critic_lr: Option<f64>,

    /// Print a config file with all defaults and exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let mut app_config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    if let Some(epochs) = cli.epochs {
        app_config.trainer.n_epochs = epochs;
    }
    if let Some(lr) = cli.actor_lr {
        app_config.coma.actor_lr = lr;
    }
    if let Some(lr) = cli.critic_lr {
        app_config.coma.critic_lr = lr;
    }
    app_config
        .validate()
        .context("validating configuration overrides")?;

    let mut learner = ComaLearner::new(app_config.coma.clone());
    let mut env = GoalGrid::new();
    let trainer = Trainer::new(app_config.trainer.clone(), app_config.coma.save_cycle);

    if cli.resume {
        match trainer.checkpointer().load_latest(&mut learner) {
            Ok(metadata) => println!("Resumed from train step {}", metadata.train_step),
            Err(e) => println!("No checkpoint found ({}), starting fresh", e),
        }
    }

    trainer
        .train(&mut env, &mut learner)
        .context("training run failed")?;

    let eval_reward = trainer
        .evaluate(&mut env, &mut learner, 10)
        .context("final evaluation failed")?;
    println!("Final greedy eval: average episode reward {:.2}", eval_reward);
    Ok(())
}
