//! Clap derive structures for the `fidlink` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fidlink -- drive fiducial channels and NIR shutters on remote controllers
#[derive(Debug, Parser)]
#[command(
    name = "fidlink",
    version,
    about = "Control fiducial illumination channels on petal controllers",
    long_about = "Selects a petal controller (discovered on the network or at a fixed\n\
        address), drives its fiducial channels, and reads their status.\n\n\
        Also runs the NIR shutter exercise against spectrograph controllers.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Controller profile to use
    #[arg(long, short = 'p', env = "FIDLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "FIDLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Request timeout in seconds (overrides the profile)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a sequence of fiducial steps in one session
    #[command(
        after_help = "Steps:\n  \
            select [NAME]           select the controller and switch all channels off\n  \
            on [LEVEL...]           turn on at the default duty, or at LEVEL\n  \
            off                     turn every channel off\n  \
            duty LEVEL... [--default]  set duty; --default keeps it as the new default\n  \
            status                  show channel state and level\n  \
            info                    show the controller's channel description\n\n\
            Example: fidlink run select on 20 status off"
    )]
    Run(RunArgs),

    /// Interactive step shell
    Shell,

    /// Broadcast one discovery query and list the answers
    Discover(DiscoverArgs),

    /// Exercise NIR shutters on one or more spectrographs
    ShutterTest(ShutterTestArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Steps and their arguments
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "STEP"
    )]
    pub steps: Vec<String>,
}

// ── Discover ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Service to look for (defaults to the profile's service)
    #[arg(long, short = 's')]
    pub service: Option<String>,

    /// Send the query here instead of the configured broadcast address
    #[arg(long)]
    pub target: Option<SocketAddr>,

    /// How long to collect answers (e.g. "2s", "500ms")
    #[arg(long, short = 'w', default_value = "1s", value_parser = humantime::parse_duration)]
    pub wait: Duration,
}

// ── Shutter test ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ShutterTestArgs {
    /// Spectrograph controllers, as NAME@HOST:PORT
    #[arg(required = true, num_args = 1.., value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Open/close cycles to run
    #[arg(long, short = 'n', default_value_t = 1)]
    pub cycles: u32,

    /// Time the shutters stay open each cycle
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub dwell: Duration,

    /// Ask before each cycle after the first
    #[arg(long)]
    pub confirm: bool,

    /// Skip configure/power/seal preparation
    #[arg(long)]
    pub skip_prepare: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create a config file (guided unless --defaults)
    Init {
        /// Write the starter config without prompting
        #[arg(long)]
        defaults: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display the resolved configuration
    Show,

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_keeps_hyphenated_step_arguments() {
        let cli = Cli::try_parse_from(["fidlink", "run", "duty", "5", "--default", "status"])
            .expect("parses");
        match cli.command {
            Command::Run(args) => assert_eq!(args.steps, ["duty", "5", "--default", "status"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
