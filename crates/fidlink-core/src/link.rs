// ── Device link ──
//
// Bundles the registry, optional discovery agent, connection manager and
// invoker for one remote device.

use std::sync::Arc;
use std::time::Duration;

use tracing::Span;

use fidlink_api::{Seeker, TransportConfig};

use crate::config::{DiscoverySettings, StaticAddress};
use crate::connection::ConnectionManager;
use crate::discovery::DiscoveryAgent;
use crate::invoker::RemoteInvoker;
use crate::registry::DeviceRegistry;

// A static record already holds its address.
const STATIC_WAIT: Duration = Duration::from_secs(1);

/// How a link finds its device.
#[derive(Debug, Clone)]
pub enum Reachability {
    Static(StaticAddress),
    Discover(DiscoverySettings),
}

pub struct DeviceLink {
    registry: Arc<DeviceRegistry>,
    agent: Option<DiscoveryAgent>,
    invoker: RemoteInvoker,
}

impl DeviceLink {
    /// Build the link. Discovery, when used, starts immediately.
    pub fn open(
        device: &str,
        service: &str,
        reachability: Reachability,
        timeout: Duration,
        span: Span,
    ) -> Self {
        let transport = TransportConfig::with_timeout(timeout);
        let (registry, agent, wait_timeout) = match reachability {
            Reachability::Static(addr) => (
                Arc::new(DeviceRegistry::with_static(
                    device, service, addr.host, addr.port,
                )),
                None,
                STATIC_WAIT,
            ),
            Reachability::Discover(settings) => {
                let registry = Arc::new(DeviceRegistry::new(device, service));
                let seeker = Seeker::new(service)
                    .with_target(settings.target)
                    .with_listen_window(settings.listen_window);
                let agent =
                    DiscoveryAgent::new(Arc::clone(&registry), seeker, device, span.clone());
                agent.start(settings.interval);
                (registry, Some(agent), settings.wait_timeout)
            }
        };

        let connection = Arc::new(ConnectionManager::new(
            Arc::clone(&registry),
            device,
            transport,
        ));
        let invoker = RemoteInvoker::new(connection, wait_timeout, span);

        Self {
            registry,
            agent,
            invoker,
        }
    }

    /// A link to a device at a fixed address.
    pub fn connect_static(
        device: &str,
        service: &str,
        host: impl Into<String>,
        port: u16,
        timeout: Duration,
        span: Span,
    ) -> Self {
        Self::open(
            device,
            service,
            Reachability::Static(StaticAddress {
                host: host.into(),
                port,
            }),
            timeout,
            span,
        )
    }

    pub fn invoker(&self) -> &RemoteInvoker {
        &self.invoker
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn device(&self) -> &str {
        self.invoker.device()
    }

    pub fn reconnect_count(&self) -> u32 {
        self.invoker.connection().reconnect_count()
    }

    /// Stop discovery, if running, and wait for it.
    pub async fn shutdown(&self) {
        if let Some(agent) = &self.agent {
            agent.shutdown().await;
        }
    }
}
