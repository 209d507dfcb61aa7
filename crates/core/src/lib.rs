//! Shared types for kat: engine settings, decode errors and the
//! Kubernetes resource model produced by splitting rendered YAML.

pub mod config;
pub mod error;
pub mod resource;

pub use config::{load_dotenv, EngineSettings};
pub use error::*;
pub use resource::*;
