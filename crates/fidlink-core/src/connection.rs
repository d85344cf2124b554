// ── Connection manager ──
//
// Exclusive owner of the cached RPC handle for one device. The handle is
// tagged with the registry uid it was built for and rebuilt whenever that
// uid changes or a caller invalidates it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use fidlink_api::{RpcClient, TransportConfig};

use crate::error::CoreError;
use crate::registry::DeviceRegistry;

struct CachedHandle {
    client: RpcClient,
    uid: Option<String>,
}

pub struct ConnectionManager {
    registry: Arc<DeviceRegistry>,
    device: String,
    transport: TransportConfig,
    handle: Mutex<Option<CachedHandle>>,
    builds: AtomicU32,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        device: impl Into<String>,
        transport: TransportConfig,
    ) -> Self {
        Self {
            registry,
            device: device.into(),
            transport,
            handle: Mutex::new(None),
            builds: AtomicU32::new(0),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Return a usable handle, building one if needed.
    ///
    /// Waits up to `timeout` for the registry to hold an address.
    pub async fn ensure_connected(&self, timeout: Duration) -> Result<RpcClient, CoreError> {
        let mut cached = self.handle.lock().await;

        let current_uid = self.registry.snapshot().uid;
        if let Some(handle) = cached.as_ref() {
            if handle.uid == current_uid {
                return Ok(handle.client.clone());
            }
            debug!(
                device = %self.device,
                cached_uid = handle.uid.as_deref().unwrap_or("-"),
                current_uid = current_uid.as_deref().unwrap_or("-"),
                "discarding handle built for a previous controller"
            );
            *cached = None;
        }

        let record = self
            .registry
            .wait_for_endpoint(timeout)
            .await
            .ok_or_else(|| self.discovery_timeout(timeout))?;
        let Some((host, port)) = record.endpoint() else {
            return Err(self.discovery_timeout(timeout));
        };

        let client = RpcClient::endpoint_url(host, port)
            .and_then(|url| RpcClient::new(url, self.device.clone(), &self.transport))
            .map_err(|e| CoreError::DeviceUnreachable {
                device: self.device.clone(),
                reason: e.to_string(),
            })?;

        let builds = self.builds.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(device = %self.device, %host, port, builds, "built rpc handle");

        *cached = Some(CachedHandle {
            client: client.clone(),
            uid: record.uid.clone(),
        });
        Ok(client)
    }

    fn discovery_timeout(&self, timeout: Duration) -> CoreError {
        CoreError::DiscoveryTimeout {
            device: self.device.clone(),
            timeout_secs: whole_secs_rounded_up(timeout),
        }
    }

    /// Drop the cached handle; the next `ensure_connected` rebuilds it.
    pub async fn invalidate(&self) {
        if self.handle.lock().await.take().is_some() {
            debug!(device = %self.device, "rpc handle invalidated");
        }
    }

    /// Number of handle builds after the first.
    pub fn reconnect_count(&self) -> u32 {
        self.builds.load(Ordering::Relaxed).saturating_sub(1)
    }
}

fn whole_secs_rounded_up(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
