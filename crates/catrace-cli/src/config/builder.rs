use super::file::FileConfig;
use super::models::{AppConfig, StructureJob};
use crate::cli::TraceArgs;
use crate::error::{CliError, Result};
use catrace::engine::config::TracingConfigBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves the configuration of a `trace` invocation.
///
/// Layers, from lowest to highest precedence: built-in defaults, the TOML
/// file, `-S` overrides, then dedicated command-line flags.
pub fn build_config(args: &TraceArgs) -> Result<AppConfig> {
    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let layered = file_config
        .apply_set_values(&args.set_values)?
        .into_tracing_config()?;

    let mut walk = layered.walk;
    if let Some(confidence) = args.min_start_confidence {
        walk.min_start_confidence = confidence;
    }
    if let Some(iterations) = args.max_iterations {
        walk.max_iterations = iterations;
    }

    let core_config = TracingConfigBuilder::new()
        .walk(walk)
        .refine(layered.refine)
        .mask(layered.mask)
        .helix(layered.helix)
        .use_mask(args.use_mask || layered.use_mask)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;
    debug!("Resolved tracing configuration: {:?}", core_config);

    Ok(AppConfig {
        jobs: plan_jobs(&args.inputs, args.output.as_deref())?,
        keep_intermediates: args.keep_intermediates,
        core_config,
    })
}

fn plan_jobs(inputs: &[PathBuf], output: Option<&Path>) -> Result<Vec<StructureJob>> {
    let mut jobs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let output_dir = match output {
            None => input.clone(),
            Some(root) if inputs.len() == 1 => root.to_path_buf(),
            Some(root) => {
                let name = input.file_name().ok_or_else(|| {
                    CliError::Argument(format!(
                        "Cannot derive an output directory name from '{}'",
                        input.display()
                    ))
                })?;
                root.join(name)
            }
        };
        jobs.push(StructureJob {
            input_dir: input.clone(),
            output_dir,
        });
    }

    let mut outputs: Vec<&Path> = jobs.iter().map(|job| job.output_dir.as_path()).collect();
    outputs.sort();
    if let Some(pair) = outputs.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(CliError::Argument(format!(
            "Several inputs would write to '{}'",
            pair[0].display()
        )));
    }
    Ok(jobs)
}
