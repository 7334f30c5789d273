use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Spencer Moritz, Jonas Pfab",
    version,
    about = "CATRACE CLI - Builds refined Ca backbone traces from predicted confidence maps.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of structures traced in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trace the backbone of one or more structures from their confidence maps.
    Trace(TraceArgs),
}

/// Arguments for the `trace` subcommand.
#[derive(Args, Debug, Clone)]
pub struct TraceArgs {
    // --- Core Arguments ---
    /// Directories holding the confidence maps of one structure each
    /// (ca_confidence.mrc, backbone_confidence.mrc, helix_confidence.mrc,
    /// sheet_confidence.mrc and optionally mask.mrc).
    #[arg(required = true, num_args = 1.., value_name = "DIR")]
    pub inputs: Vec<PathBuf>,

    /// Directory for the results. With several inputs, each structure gets a
    /// subdirectory named after its input directory. Defaults to writing next
    /// to the inputs.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Pipeline Overrides ---
    /// Zero Ca confidence outside the input mask before walking.
    #[arg(long)]
    pub use_mask: bool,

    /// Override the Ca confidence a new trace must start above.
    #[arg(long, value_name = "FLOAT")]
    pub min_start_confidence: Option<f32>,

    /// Override the iteration cap of each confidence walk.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Also write the raw walks and the final edge listing.
    #[arg(long)]
    pub keep_intermediates: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S helix.max-offset=1.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trace_accepts_several_inputs_and_overrides() {
        let cli = Cli::try_parse_from([
            "catrace",
            "-vv",
            "trace",
            "a",
            "b",
            "--use-mask",
            "-S",
            "walk.max-bfs-steps=6",
            "--min-start-confidence",
            "9.5",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Trace(args) = cli.command;
        assert_eq!(args.inputs, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert!(args.use_mask);
        assert_eq!(args.set_values, vec!["walk.max-bfs-steps=6".to_string()]);
        assert_eq!(args.min_start_confidence, Some(9.5));
        assert!(!args.keep_intermediates);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["catrace", "-q", "-v", "trace", "a"]).is_err());
    }
}
