use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "infragraph")]
#[command(version)]
#[command(about = "Declare the GCP stack and emit it for the provisioning engine", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the stack and write the engine document
    Synth(SynthArgs),

    /// Build the stack and report problems without writing anything
    Validate(StackArgs),

    /// Show creation waves and destroy order
    Plan(StackArgs),

    /// Compare a fresh build with the document on disk
    Diff(OutArgs),

    /// Print the document or its outputs
    Show(ShowArgs),

    /// Inspect resolved settings
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Stack overrides
// ============================================================================

/// Overrides shared by every command that builds the stack
#[derive(Args, Debug, Clone, Default)]
pub struct StackArgs {
    /// Settings file (default: <config dir>/stack.toml)
    #[arg(long, env = "INFRAGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cloud project identifier
    #[arg(long, env = "INFRAGRAPH_PROJECT_ID")]
    pub project: Option<String>,

    /// Region for regional resources
    #[arg(long, env = "INFRAGRAPH_REGION")]
    pub region: Option<String>,

    /// Where the engine keeps its state
    #[arg(long, value_enum, env = "INFRAGRAPH_BACKEND")]
    pub backend: Option<BackendArg>,

    /// Bucket for the gcs backend
    #[arg(long, env = "INFRAGRAPH_STATE_BUCKET")]
    pub state_bucket: Option<String>,

    /// Key prefix for the gcs backend
    #[arg(long, env = "INFRAGRAPH_STATE_PREFIX")]
    pub state_prefix: Option<String>,

    /// State file for the local backend
    #[arg(long, env = "INFRAGRAPH_STATE_PATH")]
    pub state_path: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Gcs,
    Local,
}

// ============================================================================
// Command arguments
// ============================================================================

#[derive(Args, Debug, Clone, Default)]
pub struct OutArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Output directory (default: ./infragraph.out)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SynthArgs {
    #[command(flatten)]
    pub target: OutArgs,

    /// Print the document instead of writing it
    #[arg(long)]
    pub stdout: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ShowArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// List outputs instead of printing the document
    #[arg(long)]
    pub outputs: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved settings as TOML
    Show(StackArgs),

    /// Print the default settings file location
    Path,
}
