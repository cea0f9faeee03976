use thiserror::Error;

use crate::generation::GenerationError;

#[derive(Error, Debug)]
pub enum EpicforgeError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Other error: {0}")]
    Other(String),
}
