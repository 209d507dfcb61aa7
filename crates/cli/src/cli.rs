use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Render Kubernetes manifests from Helm charts, Kustomize overlays, plain
/// YAML or any command.
///
/// The generator is picked by matching the target directory's files against
/// the configured rules, unless `--profile` names one explicitly.
#[derive(Parser, Debug)]
#[command(name = "kat", about = "Render Kubernetes manifests and watch for changes")]
pub struct CliArgs {
    /// Directory or file to render
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Path to config file (default: ~/.config/kat/config.yaml)
    #[arg(long, env = "KAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use this profile instead of rule-based detection
    #[arg(long, short = 'p')]
    pub profile: Option<String>,

    /// Re-render whenever a selected file changes
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Summary)]
    pub output: OutputFormat,

    /// List configured profiles and exit
    #[arg(long)]
    pub list_profiles: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per resource
    Summary,
    /// Rendered YAML stream
    Yaml,
    /// JSON array of decoded objects
    Json,
}

impl CliArgs {
    /// Log filter used when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
