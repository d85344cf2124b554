// ── Runtime configuration ──
//
// These types describe *what* to drive and *how* to reach it. They never
// touch disk: fidlink-config (or a test) builds a `FiducialConfig` and hands
// it to the facade, which keeps it immutable from then on.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;

use fidlink_api::discovery::DEFAULT_DISCOVERY_PORT;

use crate::error::CoreError;

// ── ControllerKind ───────────────────────────────────────────────────

/// Which channel controller variant the facade builds on selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ControllerKind {
    /// Petal controller reached over the network.
    Hardware,
    /// In-memory stand-in with the same contract.
    Simulator,
}

impl FromStr for ControllerKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulator" => Ok(Self::Simulator),
            "hardware" | "fiposled" | "bbb" => Ok(Self::Hardware),
            other => Err(CoreError::config(format!(
                "invalid controller kind '{other}' (expected 'simulator' or 'hardware')"
            ))),
        }
    }
}

// ── ChannelSet ───────────────────────────────────────────────────────

/// One physical fiducial or shutter line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Bus the channel is wired to (e.g. `can0`).
    pub bus_id: String,
    /// Unique within the controller.
    pub channel_id: u32,
    /// Raw device units per unit of logical duty. Always > 0.
    pub relative_level: f64,
    /// Duty percentage used by `turn_on` without an explicit level.
    pub default_duty: f64,
}

/// Ordered, validated set of channels driven by one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSet {
    channels: Vec<ChannelDescriptor>,
}

impl ChannelSet {
    /// Validate and wrap a list of descriptors.
    ///
    /// Rejects an empty list, duplicate channel ids, non-positive or
    /// non-finite relative levels, and non-finite default duties.
    pub fn new(channels: Vec<ChannelDescriptor>) -> Result<Self, CoreError> {
        if channels.is_empty() {
            return Err(CoreError::config("channel set is empty"));
        }

        let mut seen = HashSet::with_capacity(channels.len());
        for ch in &channels {
            if !seen.insert(ch.channel_id) {
                return Err(CoreError::config(format!(
                    "channel id {} appears more than once",
                    ch.channel_id
                )));
            }
            if !(ch.relative_level.is_finite() && ch.relative_level > 0.0) {
                return Err(CoreError::config(format!(
                    "channel {} relative level must be > 0, got {}",
                    ch.channel_id, ch.relative_level
                )));
            }
            if !ch.default_duty.is_finite() {
                return Err(CoreError::config(format!(
                    "channel {} default duty must be finite, got {}",
                    ch.channel_id, ch.default_duty
                )));
            }
        }

        Ok(Self { channels })
    }

    /// Build from parallel column lists, which must all have the same length.
    pub fn from_columns(
        bus_ids: Vec<String>,
        channel_ids: Vec<u32>,
        relative_levels: Vec<f64>,
        default_duty: Vec<f64>,
    ) -> Result<Self, CoreError> {
        let n = channel_ids.len();
        if bus_ids.len() != n || relative_levels.len() != n || default_duty.len() != n {
            return Err(CoreError::config(format!(
                "channel columns differ in length: {} bus ids, {n} channel ids, {} relative levels, {} default duties",
                bus_ids.len(),
                relative_levels.len(),
                default_duty.len()
            )));
        }

        let channels = bus_ids
            .into_iter()
            .zip(channel_ids)
            .zip(relative_levels)
            .zip(default_duty)
            .map(
                |(((bus_id, channel_id), relative_level), default_duty)| ChannelDescriptor {
                    bus_id,
                    channel_id,
                    relative_level,
                    default_duty,
                },
            )
            .collect();

        Self::new(channels)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChannelDescriptor> {
        self.channels.iter()
    }

    pub fn bus_ids(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.bus_id.clone()).collect()
    }

    pub fn channel_ids(&self) -> Vec<u32> {
        self.channels.iter().map(|c| c.channel_id).collect()
    }

    pub fn relative_levels(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.relative_level).collect()
    }

    pub fn default_duty(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.default_duty).collect()
    }

    /// Distinct bus ids in first-seen order.
    pub fn buses(&self) -> Vec<String> {
        let mut buses: Vec<String> = Vec::new();
        for ch in &self.channels {
            if !buses.contains(&ch.bus_id) {
                buses.push(ch.bus_id.clone());
            }
        }
        buses
    }
}

impl<'a> IntoIterator for &'a ChannelSet {
    type Item = &'a ChannelDescriptor;
    type IntoIter = std::slice::Iter<'a, ChannelDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter()
    }
}

// ── Reachability ─────────────────────────────────────────────────────

/// A controller address supplied up front; bypasses discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAddress {
    pub host: String,
    pub port: u16,
}

/// Tuning for the discovery agent and the connection wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Where queries are sent (limited broadcast by default).
    pub target: SocketAddr,
    /// Period between broadcasts once the device has been found.
    pub interval: Duration,
    /// How long each broadcast listens for answers.
    pub listen_window: Duration,
    /// Bound on waiting for an address before a call fails.
    pub wait_timeout: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            target: SocketAddr::from((Ipv4Addr::BROADCAST, DEFAULT_DISCOVERY_PORT)),
            interval: Duration::from_secs(10),
            listen_window: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(16),
        }
    }
}

// ── FiducialConfig ───────────────────────────────────────────────────

/// Everything the facade needs to select and drive a channel controller.
#[derive(Debug, Clone)]
pub struct FiducialConfig {
    /// Logical name of the controller (also its RPC object id).
    pub device: String,
    pub kind: ControllerKind,
    /// Discovery service name (e.g. `PetalControl`).
    pub service: String,
    pub channels: ChannelSet,
    /// Static address; `None` means discover.
    pub controller: Option<StaticAddress>,
    pub discovery: DiscoverySettings,
    /// Per-request transport timeout.
    pub timeout: Duration,
}

impl FiducialConfig {
    pub fn new(
        device: impl Into<String>,
        kind: ControllerKind,
        service: impl Into<String>,
        channels: ChannelSet,
    ) -> Self {
        Self {
            device: device.into(),
            kind,
            service: service.into(),
            channels,
            controller: None,
            discovery: DiscoverySettings::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_controller(mut self, host: impl Into<String>, port: u16) -> Self {
        self.controller = Some(StaticAddress {
            host: host.into(),
            port,
        });
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoverySettings) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
