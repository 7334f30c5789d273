use thiserror::Error;

use super::config::ConfigError;
use super::tasks::helix::FitError;
use crate::core::io::mrc::MrcError;
use crate::core::io::records::TraceFileError;
use crate::core::models::graph::GraphError;
use crate::core::models::volume::VolumeError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Volume error: {0}")]
    Volume(#[from] VolumeError),

    #[error("Failed to read or write a volume file: {0}")]
    Mrc(#[from] MrcError),

    #[error("Failed to read or write trace records: {0}")]
    TraceFile(#[from] TraceFileError),

    #[error("Graph consistency error: {0}")]
    Graph(#[from] GraphError),

    #[error("Helix fitting failed: {0}")]
    Fit(#[from] FitError),
}
