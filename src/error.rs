use std::path::PathBuf;

/// Errors raised when a batch's contents disagree with the configured
/// shapes. These are programmer/configuration errors and are always fatal.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("batch field '{field}' has {actual} elements, expected {expected}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("batch contains no episodes")]
    Empty,

    #[error("episode length {actual} does not match expected length {expected}")]
    EpisodeLength { expected: usize, actual: usize },

    #[error("action index {action} out of range for {n_actions} actions")]
    ActionOutOfRange { action: usize, n_actions: usize },
}

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("failed to save model: {0}")]
    ModelSave(String),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("failed to read metadata from {path}: {source}")]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse metadata from {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no checkpoint found in {0}")]
    NoCheckpoint(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Errors that can occur in the training driver.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error(
        "environment shape mismatch: {field} is {actual} but the configuration says {expected}"
    )]
    EnvMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}
