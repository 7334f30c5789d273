use catrace::engine::config::TracingConfig;
use std::path::PathBuf;

/// One structure to trace: where its maps live and where results go.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureJob {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

pub struct AppConfig {
    pub jobs: Vec<StructureJob>,
    pub keep_intermediates: bool,
    pub core_config: TracingConfig,
}
