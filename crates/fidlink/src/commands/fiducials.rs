//! `run` and `shell`: step sessions against the active profile's controller.

use dialoguer::Input;

use fidlink_core::Fiducials;

use crate::cli::{GlobalOpts, RunArgs};
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::session::{Session, parse_steps};

fn open_session(global: &GlobalOpts) -> Result<Session, CliError> {
    let cfg = config::load(global)?;
    let fiducial = config::resolve_fiducial_config(global, &cfg)?;
    Ok(Session::new(
        Fiducials::new(fiducial),
        global.output,
        output::should_color(global.color),
    ))
}

/// Parse every step up front, then execute them in order.
pub async fn run(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let steps = parse_steps(&args.steps)?;
    let mut session = open_session(global)?;

    let result = session.execute_all(steps).await;
    session.shutdown().await;
    result
}

/// Read step lines until `exit`, `quit` or end of input.
///
/// A failing line is reported and the shell keeps going.
pub async fn shell(global: &GlobalOpts) -> Result<(), CliError> {
    let mut session = open_session(global)?;
    eprintln!("fidlink shell: type steps (e.g. `select`, `on 20`, `status`), `exit` to leave");

    loop {
        let line: String = match Input::new()
            .with_prompt("fidlink")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                session.shutdown().await;
                return Err(e.into());
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let words: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
        let outcome = match parse_steps(&words) {
            Ok(steps) => session.execute_all(steps).await,
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            eprintln!("{:?}", miette::Report::new(e));
        }
    }

    session.shutdown().await;
    Ok(())
}
