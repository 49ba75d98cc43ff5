use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// COMA algorithm hyperparameters and problem shapes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ComaConfig {
    pub n_agents: usize,
    pub n_actions: usize,
    pub obs_dim: usize,
    pub state_dim: usize,
    pub hidden_size: usize,
    pub actor_lr: f64,
    pub critic_lr: f64,
    pub gamma: f32,
    pub td_lambda: f32,
    pub epsilon: f32,
    pub target_update_interval: usize,
    pub save_cycle: usize,
}

impl Default for ComaConfig {
    fn default() -> Self {
        ComaConfig {
            n_agents: 2,
            n_actions: 5,
            obs_dim: 27,
            state_dim: 120,
            hidden_size: 32,
            actor_lr: 5e-4,
            critic_lr: 5e-4,
            gamma: 0.99,
            td_lambda: 0.8,
            epsilon: 0.9,
            target_update_interval: 10,
            save_cycle: 100,
        }
    }
}

/// Training driver configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub n_epochs: usize,
    pub episodes_per_batch: usize,
    pub max_episode_len: usize,
    pub log_interval: usize,
    pub checkpoint_interval: usize,
    pub checkpoint_dir: PathBuf,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            n_epochs: 1000,
            episodes_per_batch: 1,
            max_episode_len: 200,
            log_interval: 10,
            checkpoint_interval: 100,
            checkpoint_dir: PathBuf::from("checkpoints"),
        }
    }
}

/// Top-level application configuration, loadable from TOML.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub coma: ComaConfig,
    pub trainer: TrainerConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            eprintln!(
                "Warning: config file '{}' not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coma.n_agents == 0 {
            return Err(ConfigError::Validation("coma.n_agents must be >= 1".into()));
        }
        if self.coma.n_actions == 0 {
            return Err(ConfigError::Validation(
                "coma.n_actions must be >= 1".into(),
            ));
        }
        if self.coma.obs_dim == 0 {
            return Err(ConfigError::Validation("coma.obs_dim must be >= 1".into()));
        }
        if self.coma.state_dim == 0 {
            return Err(ConfigError::Validation(
                "coma.state_dim must be >= 1".into(),
            ));
        }
        if self.coma.hidden_size == 0 {
            return Err(ConfigError::Validation(
                "coma.hidden_size must be >= 1".into(),
            ));
        }
        if self.coma.actor_lr <= 0.0 {
            return Err(ConfigError::Validation("coma.actor_lr must be > 0".into()));
        }
        if self.coma.critic_lr <= 0.0 {
            return Err(ConfigError::Validation("coma.critic_lr must be > 0".into()));
        }
        if self.coma.gamma < 0.0 || self.coma.gamma > 1.0 {
            return Err(ConfigError::Validation(
                "coma.gamma must be in [0, 1]".into(),
            ));
        }
        if self.coma.td_lambda < 0.0 || self.coma.td_lambda > 1.0 {
            return Err(ConfigError::Validation(
                "coma.td_lambda must be in [0, 1]".into(),
            ));
        }
        if self.coma.epsilon < 0.0 || self.coma.epsilon > 1.0 {
            return Err(ConfigError::Validation(
                "coma.epsilon must be in [0, 1]".into(),
            ));
        }
        if self.coma.target_update_interval == 0 {
            return Err(ConfigError::Validation(
                "coma.target_update_interval must be >= 1".into(),
            ));
        }
        if self.coma.save_cycle == 0 {
            return Err(ConfigError::Validation(
                "coma.save_cycle must be >= 1".into(),
            ));
        }
        if self.trainer.n_epochs == 0 {
            return Err(ConfigError::Validation(
                "trainer.n_epochs must be >= 1".into(),
            ));
        }
        if self.trainer.episodes_per_batch == 0 {
            return Err(ConfigError::Validation(
                "trainer.episodes_per_batch must be >= 1".into(),
            ));
        }
        if self.trainer.max_episode_len == 0 {
            return Err(ConfigError::Validation(
                "trainer.max_episode_len must be >= 1".into(),
            ));
        }
        if self.trainer.log_interval == 0 {
            return Err(ConfigError::Validation(
                "trainer.log_interval must be >= 1".into(),
            ));
        }
        if self.trainer.checkpoint_interval == 0 {
            return Err(ConfigError::Validation(
                "trainer.checkpoint_interval must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Generate a TOML string with all default values (useful for creating
    /// example config files).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&AppConfig::default()).expect("default config serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().expect("default config should be valid");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[coma]
actor_lr = 0.001
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!((config.coma.actor_lr - 0.001).abs() < 1e-9);
        // Other fields should be defaults
        assert!((config.coma.gamma - 0.99).abs() < 1e-6);
        assert_eq!(config.trainer.max_episode_len, 200);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        let default = AppConfig::default();
        assert!((config.coma.critic_lr - default.coma.critic_lr).abs() < 1e-9);
        assert_eq!(config.coma.n_agents, default.coma.n_agents);
    }

    #[test]
    fn test_validation_rejects_zero_agents() {
        let mut config = AppConfig::default();
        config.coma.n_agents = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_negative_lr() {
        let mut config = AppConfig::default();
        config.coma.critic_lr = -0.001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_invalid_gamma() {
        let mut config = AppConfig::default();
        config.coma.gamma = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_invalid_lambda() {
        let mut config = AppConfig::default();
        config.coma.td_lambda = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_target_interval() {
        let mut config = AppConfig::default();
        config.coma.target_update_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_save_cycle() {
        let mut config = AppConfig::default();
        config.coma.save_cycle = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AppConfig::load_or_default(Path::new("nonexistent_config.toml")).unwrap();
        assert_eq!(config.trainer.n_epochs, 1000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
[trainer]
max_episode_len = 50
"#
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.trainer.max_episode_len, 50);
        // Others are defaults
        assert!((config.coma.actor_lr - 5e-4).abs() < 1e-9);
    }

    #[test]
    fn test_default_toml_roundtrips() {
        let toml_str = AppConfig::default_toml();
        let config: AppConfig = toml::from_str(&toml_str).unwrap();
        config.validate().expect("roundtripped config should be valid");
    }
}
