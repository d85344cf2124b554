//! Shared configuration for fidlink.
//!
//! TOML profiles layered with `FIDLINK_` environment overrides, and
//! translation of a profile into `fidlink_core::FiducialConfig`.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fidlink_core::{
    ChannelSet, ControllerKind, CoreError, DiscoverySettings, FiducialConfig, StaticAddress,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile {
        profile: String,
        available: Vec<String>,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// A starter config with one simulator profile.
    pub fn example() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "default".into(),
            Profile {
                device: "PC00".into(),
                controller_kind: default_controller_kind(),
                service: default_service(),
                timeout: None,
                controller: None,
                channels: ChannelColumns {
                    bus_ids: None,
                    channel_ids: vec![1, 2],
                    relative_levels: None,
                    default_duty: Some(vec![5.0, 5.0]),
                },
            },
        );
        Self {
            profiles,
            ..Self::default()
        }
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
                available: self.profiles.keys().cloned().collect(),
            })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Per-request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Bound on waiting for discovery, seconds.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,

    /// Address discovery queries are sent to.
    #[serde(default = "default_discovery_address")]
    pub discovery_address: IpAddr,

    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,

    /// Re-broadcast period once found, seconds.
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval: u64,

    /// How long each broadcast collects answers, milliseconds.
    #[serde(default = "default_listen_window_ms")]
    pub listen_window_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            wait_timeout: default_wait_timeout(),
            discovery_address: default_discovery_address(),
            discovery_port: default_discovery_port(),
            discovery_interval: default_discovery_interval(),
            listen_window_ms: default_listen_window_ms(),
        }
    }
}

impl Defaults {
    pub fn discovery_settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            target: SocketAddr::new(self.discovery_address, self.discovery_port),
            interval: Duration::from_secs(self.discovery_interval),
            listen_window: Duration::from_millis(self.listen_window_ms),
            wait_timeout: Duration::from_secs(self.wait_timeout),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_wait_timeout() -> u64 {
    16
}
fn default_discovery_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::BROADCAST)
}
fn default_discovery_port() -> u16 {
    30_500
}
fn default_discovery_interval() -> u64 {
    10
}
fn default_listen_window_ms() -> u64 {
    1000
}

/// A named fiducial controller profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Controller device name, e.g. "PC61".
    pub device: String,

    /// "simulator" or "hardware".
    #[serde(default = "default_controller_kind")]
    pub controller_kind: String,

    /// Discovery service name.
    #[serde(default = "default_service")]
    pub service: String,

    /// Override the request timeout, seconds.
    pub timeout: Option<u64>,

    /// Static address; omit to discover.
    pub controller: Option<StaticAddress>,

    pub channels: ChannelColumns,
}

fn default_controller_kind() -> String {
    "simulator".into()
}
fn default_service() -> String {
    "PetalControl".into()
}

/// Channel columns. Omitted columns are filled per channel with `can0`,
/// `1.0` and `100.0`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelColumns {
    pub bus_ids: Option<Vec<String>>,
    pub channel_ids: Vec<u32>,
    pub relative_levels: Option<Vec<f64>>,
    pub default_duty: Option<Vec<f64>>,
}

impl ChannelColumns {
    pub fn to_channel_set(&self) -> Result<ChannelSet, ConfigError> {
        let n = self.channel_ids.len();
        let set = ChannelSet::from_columns(
            self.bus_ids
                .clone()
                .unwrap_or_else(|| vec!["can0".into(); n]),
            self.channel_ids.clone(),
            self.relative_levels.clone().unwrap_or_else(|| vec![1.0; n]),
            self.default_duty.clone().unwrap_or_else(|| vec![100.0; n]),
        )?;
        Ok(set)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "fidlink", "fidlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fidlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// The layered provider stack: defaults, then the TOML file, then
/// `FIDLINK_` environment variables (`__` separates nesting levels).
pub fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FIDLINK_").split("__"))
}

/// Load the full Config from `path` and the environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `FiducialConfig` from a profile and the global defaults.
pub fn profile_to_fiducial_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<FiducialConfig, ConfigError> {
    if profile.device.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "device".into(),
            reason: "must not be empty".into(),
        });
    }
    if let Some(addr) = &profile.controller {
        if addr.host.trim().is_empty() || addr.port == 0 {
            return Err(ConfigError::Validation {
                field: "controller".into(),
                reason: format!("invalid address {}:{}", addr.host, addr.port),
            });
        }
    }

    let kind: ControllerKind = profile.controller_kind.parse()?;
    let channels = profile.channels.to_channel_set()?;
    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    let mut config = FiducialConfig::new(&profile.device, kind, &profile.service, channels)
        .with_discovery(defaults.discovery_settings())
        .with_timeout(timeout);
    config.controller.clone_from(&profile.controller);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "petal61"

[defaults]
timeout = 12
discovery_port = 31000

[profiles.petal61]
device = "PC61"
controller_kind = "fiposled"

[profiles.petal61.controller]
host = "10.0.0.61"
port = 33951

[profiles.petal61.channels]
channel_ids = [4840, 4841]
relative_levels = [1.0, 2.0]

[profiles.sim]
device = "SIM"
channels = { channel_ids = [1, 2, 3], default_duty = [5.0, 5.0, 5.0] }
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).expect("write sample");
        (dir, path)
    }

    #[test]
    fn loads_profiles_over_defaults() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).expect("load");

        assert_eq!(config.default_profile.as_deref(), Some("petal61"));
        assert_eq!(config.defaults.timeout, 12);
        assert_eq!(config.defaults.discovery_port, 31000);
        assert_eq!(config.defaults.wait_timeout, 16);
        assert_eq!(config.profiles.len(), 2);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn profile_translates_with_broadcast_columns() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).expect("load");
        let profile = config.profile("petal61").expect("profile");

        let fc = profile_to_fiducial_config(profile, &config.defaults).expect("translate");
        assert_eq!(fc.device, "PC61");
        assert_eq!(fc.kind, ControllerKind::Hardware);
        assert_eq!(fc.service, "PetalControl");
        assert_eq!(fc.timeout, Duration::from_secs(12));
        assert_eq!(fc.channels.bus_ids(), vec!["can0".to_owned(), "can0".to_owned()]);
        assert_eq!(fc.channels.relative_levels(), vec![1.0, 2.0]);
        assert_eq!(fc.channels.default_duty(), vec![100.0, 100.0]);
        assert_eq!(
            fc.controller,
            Some(StaticAddress {
                host: "10.0.0.61".into(),
                port: 33951
            })
        );
        assert_eq!(fc.discovery.target.port(), 31000);
    }

    #[test]
    fn unknown_profile_and_bad_kind_are_errors() {
        let (_dir, path) = write_sample();
        let mut config = load_config_from(&path).expect("load");

        match config.profile("nope") {
            Err(ConfigError::UnknownProfile { profile, available }) => {
                assert_eq!(profile, "nope");
                assert!(available.iter().any(|p| p == "sim"), "{available:?}");
            }
            other => panic!("expected UnknownProfile, got {other:?}"),
        }

        let sim = config.profiles.get_mut("sim").expect("sim profile");
        sim.controller_kind = "lamp".into();
        let err = profile_to_fiducial_config(sim, &config.defaults).expect_err("bad kind");
        assert!(matches!(
            err,
            ConfigError::Core(CoreError::Configuration { .. })
        ));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let columns = ChannelColumns {
            bus_ids: Some(vec!["can0".into()]),
            channel_ids: vec![1, 2],
            relative_levels: None,
            default_duty: None,
        };
        assert!(columns.to_channel_set().is_err());
    }

    #[test]
    fn saved_example_loads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        save_config_to(&Config::example(), &path).expect("save");

        let config = load_config_from(&path).expect("load");
        let profile = config.profile("default").expect("default profile");
        let fc = profile_to_fiducial_config(profile, &config.defaults).expect("translate");
        assert_eq!(fc.kind, ControllerKind::Simulator);
        assert_eq!(fc.channels.channel_ids(), vec![1, 2]);
    }
}
