pub mod config;
pub mod error;
pub mod types;
pub mod vocabulary;

pub use config::{Config, PipelineConfig, RecencyWindow};
pub use error::{ErrorKind, HazardError, Result};
pub use types::*;
pub use vocabulary::{HAZARDS, LOCATIONS};
