//! Config subcommand handlers.

use std::collections::BTreeMap;

use dialoguer::{Input, Select};

use fidlink_config::ChannelColumns;
use fidlink_core::StaticAddress;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_list<T: std::str::FromStr>(field: &str, raw: &str) -> Result<Vec<T>, CliError> {
    raw.split([',', ' '])
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| CliError::Validation {
                field: field.into(),
                reason: format!("'{s}' is not a valid value"),
            })
        })
        .collect()
}

fn parse_address(raw: &str) -> Result<Option<StaticAddress>, CliError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let invalid = || CliError::Validation {
        field: "controller".into(),
        reason: format!("'{raw}' is not HOST:PORT"),
    };
    let (host, port) = raw.rsplit_once(':').ok_or_else(invalid)?;
    let port = port.parse().map_err(|_| invalid())?;
    Ok(Some(StaticAddress {
        host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
        port,
    }))
}

/// Ask for one profile interactively.
fn prompt_profile() -> Result<(String, Profile), CliError> {
    let name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()?;

    let device: String = Input::new()
        .with_prompt("Controller device name")
        .default("PC00".into())
        .interact_text()?;

    let kinds = ["simulator", "hardware"];
    let kind = Select::new()
        .with_prompt("Controller kind")
        .items(&kinds)
        .default(0)
        .interact()?;

    let service: String = Input::new()
        .with_prompt("Discovery service")
        .default("PetalControl".into())
        .interact_text()?;

    let address: String = Input::new()
        .with_prompt("Static address HOST:PORT (empty to discover)")
        .allow_empty(true)
        .interact_text()?;

    let ids: String = Input::new()
        .with_prompt("Channel ids")
        .default("1,2".into())
        .interact_text()?;
    let channel_ids: Vec<u32> = parse_list("channel_ids", &ids)?;

    let duty: String = Input::new()
        .with_prompt("Default duty per channel (empty for 100)")
        .allow_empty(true)
        .interact_text()?;
    let default_duty: Vec<f64> = parse_list("default_duty", &duty)?;

    let profile = Profile {
        device,
        controller_kind: kinds.get(kind).copied().unwrap_or("simulator").to_owned(),
        service,
        timeout: None,
        controller: parse_address(&address)?,
        channels: ChannelColumns {
            bus_ids: None,
            channel_ids,
            relative_levels: None,
            default_duty: (!default_duty.is_empty()).then_some(default_duty),
        },
    };

    // Fail before writing anything the loader would reject.
    config::profile_to_fiducial_config(&profile, &config::Config::default().defaults)?;
    Ok((name, profile))
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { defaults, force } => {
            let path = config::config_file(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let cfg = if defaults {
                Config::example()
            } else {
                eprintln!("fidlink configuration wizard");
                eprintln!("   Config path: {}\n", path.display());
                let (name, profile) = prompt_profile()?;
                let mut profiles = BTreeMap::new();
                profiles.insert(name.clone(), profile);
                Config {
                    default_profile: Some(name),
                    profiles,
                    ..Config::default()
                }
            };

            config::save_config_to(&cfg, &path)?;
            output::print_done(
                &format!("wrote {}", path.display()),
                output::should_color(global.color),
            );
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let rendered = output::render_single(global.output, &cfg, |c| {
                toml::to_string_pretty(c).unwrap_or_else(|e| format!("<unrenderable config: {e}>"))
            });
            output::print_output(&rendered);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_file(global).display().to_string());
            Ok(())
        }
    }
}
