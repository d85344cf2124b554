//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use fidlink_config::ConfigError;
use fidlink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach {device}: {reason}")]
    #[diagnostic(
        code(fidlink::connection_failed),
        help(
            "Check that the controller is running and reachable.\n\
             Try: fidlink discover"
        )
    )]
    ConnectionFailed { device: String, reason: String },

    #[error("{device} was not discovered within {seconds}s")]
    #[diagnostic(
        code(fidlink::discovery_timeout),
        help(
            "No announcement for this device arrived.\n\
             Check the profile's device and service names, or set a static\n\
             controller address in the profile."
        )
    )]
    DiscoveryTimeout { device: String, seconds: u64 },

    // ── Protocol ─────────────────────────────────────────────────────
    #[error("Unexpected response from {device}: {message}")]
    #[diagnostic(
        code(fidlink::protocol_mismatch),
        help("Check that the profile's channel list matches the controller.")
    )]
    ProtocolMismatch { device: String, message: String },

    // ── Session ──────────────────────────────────────────────────────
    #[error("No controller selected; cannot {operation}")]
    #[diagnostic(
        code(fidlink::not_selected),
        help("Begin the step list with `select`, e.g.: fidlink run select status")
    )]
    NotSelected { operation: String },

    #[error("Invalid step: {reason}")]
    #[diagnostic(
        code(fidlink::step),
        help("Run: fidlink run --help for the list of steps")
    )]
    Step { reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fidlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fidlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: fidlink config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(fidlink::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(fidlink::config))]
    Config(Box<figment::Error>),

    #[error("Failed to write configuration: {0}")]
    #[diagnostic(code(fidlink::config_write))]
    ConfigWrite(#[from] toml::ser::Error),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Prompt failed: {0}")]
    #[diagnostic(
        code(fidlink::prompt),
        help("Interactive commands need a terminal.")
    )]
    Prompt(#[from] dialoguer::Error),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::DiscoveryTimeout { .. } => exit_code::TIMEOUT,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::NotSelected { .. }
            | Self::Step { .. }
            | Self::Validation { .. }
            | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Configuration { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
            CoreError::DiscoveryTimeout {
                device,
                timeout_secs,
            } => CliError::DiscoveryTimeout {
                device,
                seconds: timeout_secs,
            },
            CoreError::DeviceUnreachable { device, reason } => {
                CliError::ConnectionFailed { device, reason }
            }
            CoreError::ProtocolMismatch { device, message } => {
                CliError::ProtocolMismatch { device, message }
            }
            CoreError::NotConnected { operation } => CliError::NotSelected {
                operation: operation.into(),
            },
        }
    }
}

/// Comma-separated profile names, or "(none)".
pub(crate) fn profile_list<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_owned()).collect();
    if names.is_empty() {
        "(none)".to_owned()
    } else {
        names.join(", ")
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { profile, available } => CliError::ProfileNotFound {
                name: profile,
                available: profile_list(&available),
            },
            ConfigError::Serialization(e) => CliError::ConfigWrite(e),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Core(e) => e.into(),
        }
    }
}

impl From<fidlink_api::Error> for CliError {
    fn from(err: fidlink_api::Error) -> Self {
        CliError::ConnectionFailed {
            device: "discovery".into(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::DeviceUnreachable {
                    device: "PC61".into(),
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::DiscoveryTimeout {
                    device: "PC61".into(),
                    timeout_secs: 16,
                },
                exit_code::TIMEOUT,
            ),
            (
                CoreError::NotConnected { operation: "status" },
                exit_code::USAGE,
            ),
            (
                CoreError::ProtocolMismatch {
                    device: "PC61".into(),
                    message: "expected 2 channel values, received 1".into(),
                },
                exit_code::GENERAL,
            ),
        ];

        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn unknown_profile_is_not_found() {
        let err = CliError::from(ConfigError::UnknownProfile {
            profile: "lab".into(),
            available: vec!["default".into(), "bench".into()],
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert!(
            matches!(&err, CliError::ProfileNotFound { available, .. } if available == "default, bench"),
            "{err:?}"
        );
    }

    #[test]
    fn empty_profile_list_reads_none() {
        let err = CliError::from(ConfigError::UnknownProfile {
            profile: "lab".into(),
            available: Vec::new(),
        });
        assert!(
            matches!(&err, CliError::ProfileNotFound { available, .. } if available == "(none)"),
            "{err:?}"
        );
    }
}
