//! Command dispatch: bridges CLI args to the core facade and output formatting.

pub mod config_cmd;
pub mod discover;
pub mod fiducials;
pub mod shutter;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a controller-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => fiducials::run(args, global).await,
        Command::Shell => fiducials::shell(global).await,
        Command::Discover(args) => discover::handle(args, global).await,
        Command::ShutterTest(args) => shutter::handle(args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
