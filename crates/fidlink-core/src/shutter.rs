// ── NIR shutter harness ──
//
// Drives the NIR shutters of several spectrograph controllers. Each
// spectrograph gets its own bounded queue and worker task, so commands to
// one device run in order while devices proceed in parallel.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use fidlink_api::{PowerAction, RemoteCommand, SealAction, ShutterAction};

use crate::error::CoreError;
use crate::link::DeviceLink;

/// Service name recorded for spectrograph links.
pub const SPECTROGRAPH_SERVICE: &str = "Spectrograph";

const NIR_SHUTTER: &str = "nir_shutter";
const POWER_ON: &str = "ON";
const SEAL_DEFLATED: &str = "DEFLATED";

// ── Target ───────────────────────────────────────────────────────────

/// A spectrograph controller address, written `name@host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpectrographTarget {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl FromStr for SpectrographTarget {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::config(format!("invalid spectrograph '{s}' (expected NAME@HOST:PORT)"));

        let (name, addr) = s.split_once('@').ok_or_else(invalid)?;
        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if name.is_empty() || host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;

        Ok(Self {
            name: name.to_owned(),
            host: host.to_owned(),
            port,
        })
    }
}

impl fmt::Display for SpectrographTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}@[{}]:{}", self.name, self.host, self.port)
        } else {
            write!(f, "{}@{}:{}", self.name, self.host, self.port)
        }
    }
}

// ── Spectrograph ─────────────────────────────────────────────────────

/// The subset of `get("mechanism")` the harness cares about.
#[derive(Debug, Clone, Deserialize)]
struct Mechanism {
    nir_shutter_power: String,
    nir_shutter_seal: String,
}

/// What `prepare` had to change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Preparation {
    pub powered_on: bool,
    pub deflated: bool,
}

/// One spectrograph controller behind a static-address link.
pub struct Spectrograph {
    target: SpectrographTarget,
    link: DeviceLink,
}

impl Spectrograph {
    pub fn connect(target: SpectrographTarget, timeout: Duration) -> Self {
        let span = info_span!("spectrograph", device = %target.name);
        let link = DeviceLink::connect_static(
            &target.name,
            SPECTROGRAPH_SERVICE,
            target.host.clone(),
            target.port,
            timeout,
            span,
        );
        Self { target, link }
    }

    pub fn target(&self) -> &SpectrographTarget {
        &self.target
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Configure the controller, then make sure the NIR shutter is powered
    /// and its seal deflated.
    pub async fn prepare(&self) -> Result<Preparation, CoreError> {
        let invoker = self.link.invoker();
        invoker.call(&RemoteCommand::Configure).await?;

        let mechanism: Mechanism = invoker
            .call_as(&RemoteCommand::Get {
                key: "mechanism".into(),
            })
            .await?;
        debug!(
            device = self.name(),
            power = %mechanism.nir_shutter_power,
            seal = %mechanism.nir_shutter_seal,
            "mechanism state"
        );

        let mut prep = Preparation::default();
        if mechanism.nir_shutter_power != POWER_ON {
            invoker
                .call(&RemoteCommand::Power {
                    device: NIR_SHUTTER.into(),
                    action: PowerAction::On,
                })
                .await?;
            prep.powered_on = true;
        }
        if mechanism.nir_shutter_seal != SEAL_DEFLATED {
            invoker
                .call(&RemoteCommand::Seal {
                    shutter: NIR_SHUTTER.into(),
                    action: SealAction::Deflate,
                })
                .await?;
            prep.deflated = true;
        }

        info!(device = self.name(), ?prep, "spectrograph prepared");
        Ok(prep)
    }

    pub async fn nir_shutter(&self, action: ShutterAction) -> Result<(), CoreError> {
        self.link
            .invoker()
            .call(&RemoteCommand::NirShutter { action })
            .await?;
        Ok(())
    }
}

// ── Worker ───────────────────────────────────────────────────────────

/// A queue plus the one task that drains it into a spectrograph.
pub struct ShutterWorker {
    name: String,
    tx: mpsc::Sender<ShutterAction>,
    handle: JoinHandle<()>,
}

impl ShutterWorker {
    pub fn spawn(spectrograph: Arc<Spectrograph>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<ShutterAction>(capacity.max(1));
        let name = spectrograph.name().to_owned();
        let span = info_span!("shutter_worker", device = %name);

        let handle = tokio::spawn(
            async move {
                while let Some(action) = rx.recv().await {
                    match spectrograph.nir_shutter(action).await {
                        Ok(()) => info!(%action, "nir shutter moved"),
                        Err(e) => warn!(%action, error = %e, "nir shutter command failed"),
                    }
                }
                debug!("queue closed");
            }
            .instrument(span),
        );

        Self { name, tx, handle }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue one action, waiting for room if the queue is full.
    pub async fn send(&self, action: ShutterAction) -> Result<(), CoreError> {
        self.tx
            .send(action)
            .await
            .map_err(|_| CoreError::DeviceUnreachable {
                device: self.name.clone(),
                reason: "shutter worker has stopped".into(),
            })
    }

    /// Close the queue and wait for queued actions to drain.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            warn!(device = %self.name, error = %e, "shutter worker panicked");
        }
    }
}

/// Workers for a set of spectrographs, driven together.
pub struct ShutterBank {
    workers: Vec<ShutterWorker>,
    span: Span,
}

impl ShutterBank {
    pub fn new(spectrographs: Vec<Arc<Spectrograph>>, capacity: usize) -> Self {
        let workers = spectrographs
            .into_iter()
            .map(|s| ShutterWorker::spawn(s, capacity))
            .collect();
        Self {
            workers,
            span: info_span!("shutter_bank"),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Enqueue `action` on every worker.
    pub async fn send_all(&self, action: ShutterAction) -> Result<(), CoreError> {
        debug!(parent: &self.span, %action, workers = self.workers.len(), "broadcasting");
        for worker in &self.workers {
            worker.send(action).await?;
        }
        Ok(())
    }

    /// Close every queue and join every worker.
    pub async fn shutdown(self) {
        for worker in self.workers {
            worker.shutdown().await;
        }
    }
}
