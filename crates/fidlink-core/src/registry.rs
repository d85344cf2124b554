// ── Device registry ──
//
// The one shared record of the controller of interest. All writes go
// through `watch::Sender::send_modify`/`send_if_modified`; readers take
// snapshots or wait on the channel for an address to appear.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use fidlink_api::Announcement;

/// Last known whereabouts of one remote device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub name: String,
    /// Identity token of the running controller process.
    pub uid: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Advertised service type marker, if any.
    pub service_tag: Option<String>,
    pub service: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub found: bool,
}

impl DeviceRecord {
    /// `(host, port)` once both are known.
    pub fn endpoint(&self) -> Option<(&str, u16)> {
        match (&self.host, self.port) {
            (Some(host), Some(port)) if self.found => Some((host.as_str(), port)),
            _ => None,
        }
    }
}

/// What applying one announcement did to the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// First sighting of the device.
    Found,
    /// Same controller process; fields refreshed.
    Refreshed,
    /// The uid changed, so the controller restarted.
    Restarted { previous_uid: Option<String> },
}

/// Watch-guarded holder of the single [`DeviceRecord`].
#[derive(Debug)]
pub struct DeviceRegistry {
    record: watch::Sender<DeviceRecord>,
}

impl DeviceRegistry {
    /// An empty record for `name`, to be filled by discovery.
    pub fn new(name: impl Into<String>, service: impl Into<String>) -> Self {
        let (record, _) = watch::channel(DeviceRecord {
            name: name.into(),
            service: service.into(),
            ..DeviceRecord::default()
        });
        Self { record }
    }

    /// A record pre-populated from a static address.
    ///
    /// The uid is a UUIDv5 of `name@host:port`, so it is stable across runs
    /// and changes only when the configured address does.
    pub fn with_static(
        name: impl Into<String>,
        service: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        let name = name.into();
        let host = host.into();
        let uid = Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            format!("{name}@{host}:{port}").as_bytes(),
        );
        let (record, _) = watch::channel(DeviceRecord {
            name,
            uid: Some(uid.to_string()),
            host: Some(host),
            port: Some(port),
            service_tag: None,
            service: service.into(),
            last_updated: Some(Utc::now()),
            found: true,
        });
        Self { record }
    }

    pub fn snapshot(&self) -> DeviceRecord {
        self.record.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceRecord> {
        self.record.subscribe()
    }

    /// Fold one matching announcement into the record.
    ///
    /// The caller has already checked the name and service.
    pub fn apply(&self, announcement: &Announcement) -> MatchOutcome {
        let ad = &announcement.advertisement;
        let mut outcome = MatchOutcome::Refreshed;
        self.record.send_modify(|record| {
            outcome = if !record.found {
                MatchOutcome::Found
            } else if record.uid.as_deref() != Some(ad.uid.as_str()) {
                MatchOutcome::Restarted {
                    previous_uid: record.uid.clone(),
                }
            } else {
                MatchOutcome::Refreshed
            };
            record.uid = Some(ad.uid.clone());
            record.host = Some(ad.host.clone());
            record.port = Some(ad.port);
            record.service_tag.clone_from(&ad.stype);
            record.last_updated = Some(Utc::now());
            record.found = true;
        });
        outcome
    }

    /// Wait until the record holds an address, bounded by `timeout`.
    ///
    /// Returns `None` if the bound expires first.
    pub async fn wait_for_endpoint(&self, timeout: Duration) -> Option<DeviceRecord> {
        let mut rx = self.record.subscribe();
        let wait = rx.wait_for(|record| record.endpoint().is_some());
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(record)) => Some((*record).clone()),
            // The sender lives in `self`, so a closed channel cannot happen here.
            Ok(Err(_)) | Err(_) => None,
        }
    }
}
