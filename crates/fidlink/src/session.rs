//! Step sessions: parse `run`/`shell` words into steps and execute them
//! against one `Fiducials` facade.

use std::fmt;

use fidlink_core::{Duty, Fiducials};

use crate::cli::OutputFormat;
use crate::error::CliError;
use crate::output;

/// One operation on the fiducial facade.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Select(Option<String>),
    On(Option<Duty>),
    Off,
    Duty { duty: Duty, set_default: bool },
    Status,
    Info,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select(_) => f.write_str("select"),
            Self::On(_) => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Duty { .. } => f.write_str("duty"),
            Self::Status => f.write_str("status"),
            Self::Info => f.write_str("info"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Select,
    On,
    Off,
    Duty,
    Status,
    Info,
}

fn keyword(word: &str) -> Option<Keyword> {
    match word.to_ascii_lowercase().as_str() {
        "select" | "select_device" => Some(Keyword::Select),
        "on" | "set_fid_on" => Some(Keyword::On),
        "off" | "set_fid_off" => Some(Keyword::Off),
        "duty" | "duty_cycle" => Some(Keyword::Duty),
        "status" | "get_fid_status" => Some(Keyword::Status),
        "info" | "get_posfid_info" => Some(Keyword::Info),
        _ => None,
    }
}

fn step_err(reason: impl Into<String>) -> CliError {
    CliError::Step {
        reason: reason.into(),
    }
}

/// Collect the numeric arguments following a step, stopping at the next
/// keyword or flag.
fn levels<'a, I>(step: &str, words: &mut std::iter::Peekable<I>) -> Result<Vec<f64>, CliError>
where
    I: Iterator<Item = &'a String>,
{
    let mut out = Vec::new();
    while let Some(next) = words.peek() {
        if keyword(next).is_some() || next.as_str() == "--default" {
            break;
        }
        let value: f64 = next
            .parse()
            .map_err(|_| step_err(format!("{step}: '{next}' is not a number")))?;
        if !value.is_finite() {
            return Err(step_err(format!("{step}: '{next}' is not a finite level")));
        }
        out.push(value);
        words.next();
    }
    Ok(out)
}

fn to_duty(values: Vec<f64>) -> Option<Duty> {
    match values.len() {
        0 => None,
        1 => values.first().copied().map(Duty::Uniform),
        _ => Some(Duty::PerChannel(values)),
    }
}

/// Parse a flat word list such as `select PC61 on 20 status off`.
pub fn parse_steps(words: &[String]) -> Result<Vec<Step>, CliError> {
    let mut steps = Vec::new();
    let mut words = words.iter().peekable();

    while let Some(word) = words.next() {
        let Some(kw) = keyword(word) else {
            return Err(step_err(format!("unknown step '{word}'")));
        };
        let step = match kw {
            Keyword::Select => {
                let name = words
                    .next_if(|next| keyword(next).is_none() && !next.starts_with('-'))
                    .cloned();
                Step::Select(name)
            }
            Keyword::On => Step::On(to_duty(levels(word, &mut words)?)),
            Keyword::Off => Step::Off,
            Keyword::Duty => {
                let values = levels(word, &mut words)?;
                let set_default = words.next_if(|next| next.as_str() == "--default").is_some();
                let duty = to_duty(values).ok_or_else(|| step_err("duty needs at least one level"))?;
                Step::Duty { duty, set_default }
            }
            Keyword::Status => Step::Status,
            Keyword::Info => Step::Info,
        };
        steps.push(step);
    }

    if steps.is_empty() {
        return Err(step_err("no steps given"));
    }
    Ok(steps)
}

/// Executes steps on one facade and prints their results.
pub struct Session {
    fiducials: Fiducials,
    format: OutputFormat,
    color: bool,
}

impl Session {
    pub fn new(fiducials: Fiducials, format: OutputFormat, color: bool) -> Self {
        Self {
            fiducials,
            format,
            color,
        }
    }

    pub async fn execute(&mut self, step: Step) -> Result<(), CliError> {
        tracing::debug!(%step, "executing step");
        match step {
            Step::Select(name) => {
                self.fiducials.select_device(name.as_deref()).await?;
                let device = self.fiducials.selected_device().unwrap_or_default();
                output::print_done(&format!("selected {device}, all channels off"), self.color);
            }
            Step::On(level) => {
                self.fiducials.turn_on(level).await?;
                output::print_done("fiducials on", self.color);
            }
            Step::Off => {
                self.fiducials.turn_off().await?;
                output::print_done("fiducials off", self.color);
            }
            Step::Duty { duty, set_default } => {
                self.fiducials.level(duty, set_default).await?;
                let msg = if set_default {
                    "duty set and kept as default"
                } else {
                    "duty set"
                };
                output::print_done(msg, self.color);
            }
            Step::Status => {
                let report = self.fiducials.status().await?;
                output::print_output(&output::render_status(self.format, &report, self.color));
            }
            Step::Info => {
                let info = self.fiducials.channel_info().await?;
                let rendered = output::render_single(self.format, &info, |v| {
                    serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
                });
                output::print_output(&rendered);
            }
        }
        Ok(())
    }

    /// Execute every step in order, stopping at the first failure.
    pub async fn execute_all(&mut self, steps: Vec<Step>) -> Result<(), CliError> {
        for step in steps {
            self.execute(step).await?;
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        self.fiducials.shutdown().await;
    }
}
