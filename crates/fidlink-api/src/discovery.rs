//! UDP discovery seeker.
//!
//! Broadcasts a typed query (`stype`, `service`) and collects the
//! advertisements that come back within a listen window. Each advertiser
//! answers with one JSON object mapping device name to its record:
//!
//! ```json
//! { "PC61": { "uid": "81df0e9a-…", "node": "10.0.0.12", "port": 33951, "service": "PetalControl" } }
//! ```
//!
//! The seeker does no filtering beyond parsing; deciding which device is the
//! one of interest is the caller's job.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::Error;

/// Service-type marker carried by every query.
pub const SERVICE_TYPE: &str = "-dos-";

/// Port advertisers listen on for queries.
pub const DEFAULT_DISCOVERY_PORT: u16 = 30_500;

const DEFAULT_LISTEN_WINDOW: Duration = Duration::from_secs(1);
const MAX_DATAGRAM: usize = 8192;

// ── Wire types ──────────────────────────────────────────────────────

/// The broadcast query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekQuery {
    pub stype: String,
    pub service: String,
}

/// One device record from an advertiser's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    /// Identity token; changes when the controller process restarts.
    pub uid: String,
    /// Network address. Advertisers call this `node`.
    #[serde(alias = "node")]
    pub host: String,
    #[serde(deserialize_with = "port_from_any")]
    pub port: u16,
    pub service: String,
    #[serde(default)]
    pub stype: Option<String>,
}

/// An advertisement together with the device name it was published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub name: String,
    pub advertisement: Advertisement,
    pub source: SocketAddr,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u16),
    Text(String),
}

fn port_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(port) => Ok(port),
        PortRepr::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Parse one advertiser datagram into announcements.
///
/// Entries that are not device records (including an echo of our own
/// query) are skipped.
pub fn parse_announcements(datagram: &[u8], source: SocketAddr) -> Vec<Announcement> {
    let Ok(entries) = serde_json::from_slice::<BTreeMap<String, Value>>(datagram) else {
        trace!(%source, "ignoring non-JSON datagram");
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|(name, value)| {
            if !value.is_object() {
                return None;
            }
            match serde_json::from_value::<Advertisement>(value) {
                Ok(advertisement) => Some(Announcement {
                    name,
                    advertisement,
                    source,
                }),
                Err(e) => {
                    debug!(%source, device = %name, error = %e, "skipping malformed advertisement");
                    None
                }
            }
        })
        .collect()
}

// ── Seeker ──────────────────────────────────────────────────────────

/// Sends discovery queries for one service and gathers the answers.
#[derive(Debug, Clone)]
pub struct Seeker {
    query: SeekQuery,
    target: SocketAddr,
    listen_window: Duration,
}

impl Seeker {
    /// A seeker for `service`, broadcasting to the default discovery port.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            query: SeekQuery {
                stype: SERVICE_TYPE.into(),
                service: service.into(),
            },
            target: SocketAddr::from((Ipv4Addr::BROADCAST, DEFAULT_DISCOVERY_PORT)),
            listen_window: DEFAULT_LISTEN_WINDOW,
        }
    }

    /// Send queries to `target` instead of the limited broadcast address.
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn with_listen_window(mut self, window: Duration) -> Self {
        self.listen_window = window;
        self
    }

    pub fn service(&self) -> &str {
        &self.query.service
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Broadcast one query and return every announcement received before
    /// the listen window closes, in arrival order.
    pub async fn seek(&self) -> Result<Vec<Announcement>, Error> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;

        let payload = serde_json::to_vec(&self.query).map_err(|e| Error::InvalidRequest {
            message: format!("cannot encode discovery query: {e}"),
        })?;
        socket.send_to(&payload, self.target).await?;
        debug!(service = %self.query.service, target = %self.target, "discovery query sent");

        let deadline = Instant::now() + self.listen_window;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut found = Vec::new();

        loop {
            match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Err(_) => break,
                Ok(Err(e)) => {
                    debug!(error = %e, "discovery receive failed, closing window early");
                    break;
                }
                Ok(Ok((len, source))) => {
                    let Some(datagram) = buf.get(..len) else {
                        continue;
                    };
                    found.extend(parse_announcements(datagram, source));
                }
            }
        }

        debug!(count = found.len(), "discovery window closed");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000))
    }

    #[test]
    fn parses_node_alias_and_string_port() {
        let datagram = br#"{"PC61": {"uid": "u-1", "node": "10.0.0.12", "port": "33951", "service": "PetalControl", "stype": "-dos-"}}"#;
        let found = parse_announcements(datagram, source());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "PC61");
        assert_eq!(found[0].advertisement.host, "10.0.0.12");
        assert_eq!(found[0].advertisement.port, 33951);
    }

    #[test]
    fn skips_query_echo_and_garbage() {
        let echo = br#"{"stype": "-dos-", "service": "PetalControl"}"#;
        assert!(parse_announcements(echo, source()).is_empty());
        assert!(parse_announcements(b"\x00\x01not json", source()).is_empty());
    }

    #[test]
    fn skips_malformed_entries_but_keeps_good_ones() {
        let datagram = br#"{
            "PC60": {"uid": "u-0", "node": "10.0.0.11"},
            "PC61": {"uid": "u-1", "host": "10.0.0.12", "port": 33951, "service": "PetalControl"}
        }"#;
        let found = parse_announcements(datagram, source());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "PC61");
    }
}
