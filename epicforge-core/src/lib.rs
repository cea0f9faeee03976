pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod hash;
pub mod models;
pub mod payload;
pub mod store;

pub use config::EpicforgeConfig;
pub use error::EpicforgeError;
pub use generation::{
    GeminiGenerationClient, GenerationBackend, GenerationConfig, GenerationError,
};
pub use hash::content_hash;
pub use payload::Payload;
pub use store::FeatureStore;
