//! CLI configuration: thin wrapper around `fidlink_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` overrides (--config,
//! --profile, --timeout).

use std::path::PathBuf;
use std::time::Duration;

use fidlink_core::FiducialConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use fidlink_config::{Config, Profile, profile_to_fiducial_config, save_config_to};

// ── CLI-specific helpers ────────────────────────────────────────────

/// The config file in effect: `--config` or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(fidlink_config::config_path)
}

/// Load config from the effective file plus environment overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(fidlink_config::load_config_from(&config_file(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Look up the active profile, listing the alternatives when it is missing.
pub fn active_profile<'a>(
    global: &GlobalOpts,
    config: &'a Config,
) -> Result<(String, &'a Profile), CliError> {
    let name = active_profile_name(global, config);
    match config.profiles.get(&name) {
        Some(profile) => Ok((name, profile)),
        None => Err(CliError::ProfileNotFound {
            name,
            available: crate::error::profile_list(config.profiles.keys()),
        }),
    }
}

/// Translate the active profile into a `FiducialConfig`.
///
/// `--timeout` takes priority over the profile value.
pub fn resolve_fiducial_config(
    global: &GlobalOpts,
    config: &Config,
) -> Result<FiducialConfig, CliError> {
    let (name, profile) = active_profile(global, config)?;
    let mut fiducial = profile_to_fiducial_config(profile, &config.defaults)?;
    if let Some(secs) = global.timeout {
        fiducial.timeout = Duration::from_secs(secs);
    }
    tracing::debug!(profile = %name, device = %fiducial.device, kind = %fiducial.kind, "resolved profile");
    Ok(fiducial)
}
