// ── Fiducials facade ──
//
// Front door for callers: picks the controller variant on selection,
// refuses work before a selection, and leaves a freshly selected
// controller with every channel off.

use serde_json::Value;
use tracing::{Span, error, info, info_span, warn};

use crate::channels::{ChannelController, Duty, HardwareChannels, SimulatorChannels, StatusReport};
use crate::config::{ControllerKind, FiducialConfig};
use crate::error::CoreError;
use crate::link::{DeviceLink, Reachability};

/// Fiducial channel control for one configured controller.
pub struct Fiducials {
    config: FiducialConfig,
    span: Span,
    controller: Option<ChannelController>,
}

impl Fiducials {
    /// A facade with no controller selected yet.
    pub fn new(config: FiducialConfig) -> Self {
        let span = info_span!("fiducials", device = %config.device, kind = %config.kind);
        Self {
            config,
            span,
            controller: None,
        }
    }

    /// Create and select the configured device in one step.
    pub async fn open(config: FiducialConfig) -> Result<Self, CoreError> {
        let mut fiducials = Self::new(config);
        fiducials.select_device(None).await?;
        Ok(fiducials)
    }

    pub fn config(&self) -> &FiducialConfig {
        &self.config
    }

    pub fn is_selected(&self) -> bool {
        self.controller.is_some()
    }

    /// Name of the selected device, if any.
    pub fn selected_device(&self) -> Option<&str> {
        self.controller.as_ref().map(ChannelController::device)
    }

    /// Build the controller for `name` (default: the configured device),
    /// switch every channel off and log its status.
    ///
    /// The turn-off failure propagates; the status read is only logged.
    /// A previous selection is shut down first.
    pub async fn select_device(&mut self, name: Option<&str>) -> Result<(), CoreError> {
        if let Some(previous) = self.controller.take() {
            previous.shutdown().await;
        }

        let device = name.unwrap_or(self.config.device.as_str()).to_owned();
        let span = info_span!(parent: &self.span, "controller", %device);
        let mut controller = match self.config.kind {
            ControllerKind::Simulator => ChannelController::Simulator(SimulatorChannels::new(
                device.clone(),
                self.config.channels.clone(),
            )),
            ControllerKind::Hardware => {
                let reachability = match &self.config.controller {
                    Some(addr) => Reachability::Static(addr.clone()),
                    None => Reachability::Discover(self.config.discovery.clone()),
                };
                let link = DeviceLink::open(
                    &device,
                    &self.config.service,
                    reachability,
                    self.config.timeout,
                    span.clone(),
                );
                ChannelController::Hardware(HardwareChannels::new(
                    link,
                    self.config.channels.clone(),
                ))
            }
        };

        if let Err(e) = controller.turn_off().await {
            error!(parent: &span, error = %e, "initial turn off failed");
            controller.shutdown().await;
            return Err(e);
        }
        match controller.status().await {
            Ok(report) => info!(parent: &span, ?report, "device status"),
            Err(e) => warn!(parent: &span, error = %e, "initial status read failed"),
        }

        info!(parent: &span, "controller selected");
        self.controller = Some(controller);
        Ok(())
    }

    fn selected(&mut self, operation: &'static str) -> Result<&mut ChannelController, CoreError> {
        if self.controller.is_none() {
            warn!(parent: &self.span, operation, "no controller selected");
        }
        self.controller
            .as_mut()
            .ok_or(CoreError::NotConnected { operation })
    }

    pub async fn turn_on(&mut self, level: Option<Duty>) -> Result<(), CoreError> {
        let result = self.selected("turn_on")?.turn_on(level).await;
        self.logged("turn_on", result)
    }

    pub async fn turn_off(&mut self) -> Result<(), CoreError> {
        let result = self.selected("turn_off")?.turn_off().await;
        self.logged("turn_off", result)
    }

    pub async fn level(&mut self, duty: Duty, set_default: bool) -> Result<(), CoreError> {
        let result = self.selected("level")?.level(duty, set_default).await;
        self.logged("level", result)
    }

    pub async fn status(&mut self) -> Result<StatusReport, CoreError> {
        let result = self.selected("status")?.status().await;
        self.logged("status", result)
    }

    pub async fn channel_info(&mut self) -> Result<Value, CoreError> {
        let result = self.selected("channel_info")?.channel_info().await;
        self.logged("channel_info", result)
    }

    fn logged<T>(
        &self,
        operation: &'static str,
        result: Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        result.inspect_err(|e| {
            warn!(parent: &self.span, operation, error = %e, "operation failed");
        })
    }

    /// Stop background discovery of the current selection.
    pub async fn shutdown(&mut self) {
        if let Some(controller) = &self.controller {
            controller.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::channels::ChannelState;
    use crate::config::ChannelSet;

    fn config(kind: ControllerKind) -> FiducialConfig {
        let channels = ChannelSet::from_columns(
            vec!["can0".into(); 2],
            vec![10, 11],
            vec![1.0; 2],
            vec![100.0; 2],
        )
        .expect("valid set");
        FiducialConfig::new("PC61", kind, "PetalControl", channels)
    }

    #[tokio::test]
    async fn operations_before_selection_are_not_connected() {
        let mut fiducials = Fiducials::new(config(ControllerKind::Simulator));

        assert!(matches!(
            fiducials.turn_on(None).await,
            Err(CoreError::NotConnected {
                operation: "turn_on"
            })
        ));
        assert!(matches!(
            fiducials.status().await,
            Err(CoreError::NotConnected { operation: "status" })
        ));
        assert!(matches!(
            fiducials.level(Duty::from(1.0), false).await,
            Err(CoreError::NotConnected { operation: "level" })
        ));
        assert!(!fiducials.is_selected());
    }

    #[tokio::test]
    async fn open_selects_and_leaves_channels_off() {
        let mut fiducials = Fiducials::open(config(ControllerKind::Simulator))
            .await
            .expect("simulator opens");

        assert_eq!(fiducials.selected_device(), Some("PC61"));
        let status = fiducials.status().await.expect("status");
        assert_eq!(status.state, vec![ChannelState::Off; 2]);

        fiducials.turn_on(None).await.expect("on");
        let status = fiducials.status().await.expect("status");
        assert_eq!(status.level, vec![100.0, 100.0]);
    }

    #[tokio::test]
    async fn select_device_can_rename() {
        let mut fiducials = Fiducials::new(config(ControllerKind::Simulator));
        fiducials
            .select_device(Some("PC62"))
            .await
            .expect("select");
        assert_eq!(fiducials.selected_device(), Some("PC62"));
    }

    /// Collects formatted log output.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn rejected_operation_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut fiducials = Fiducials::open(config(ControllerKind::Simulator))
            .await
            .expect("simulator opens");
        let err = fiducials
            .level(Duty::from(vec![1.0, 2.0, 3.0]), false)
            .await
            .expect_err("wrong length");
        assert!(matches!(err, CoreError::ProtocolMismatch { .. }));

        let logs = String::from_utf8(captured.0.lock().expect("log buffer").clone())
            .expect("utf-8 logs");
        assert!(logs.contains("operation failed"), "{logs}");
        assert!(logs.contains("operation=\"level\""), "{logs}");
    }
}
