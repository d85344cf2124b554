// ── Remote invoker ──
//
// Issues one typed remote command. A failed attempt forces a reconnect and
// is retried exactly once; a second failure is `DeviceUnreachable`.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Instrument, Span, debug, warn};

use fidlink_api::RemoteCommand;

use crate::connection::ConnectionManager;
use crate::error::CoreError;

pub struct RemoteInvoker {
    device: String,
    connection: Arc<ConnectionManager>,
    wait_timeout: Duration,
    span: Span,
}

impl RemoteInvoker {
    pub fn new(connection: Arc<ConnectionManager>, wait_timeout: Duration, span: Span) -> Self {
        Self {
            device: connection.device().to_owned(),
            connection,
            wait_timeout,
            span,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Issue `command` and return its raw result.
    pub async fn call(&self, command: &RemoteCommand) -> Result<Value, CoreError> {
        self.call_inner(command).instrument(self.span.clone()).await
    }

    /// Issue `command` and decode the result into `T`.
    ///
    /// A decode failure is a `ProtocolMismatch` and is not retried.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        command: &RemoteCommand,
    ) -> Result<T, CoreError> {
        let value = self.call(command).await?;
        serde_json::from_value(value).map_err(|e| CoreError::ProtocolMismatch {
            device: self.device.clone(),
            message: format!("unexpected {} result: {e}", command.name()),
        })
    }

    async fn call_inner(&self, command: &RemoteCommand) -> Result<Value, CoreError> {
        let name = command.name();
        command
            .validate()
            .map_err(|e| CoreError::ProtocolMismatch {
                device: self.device.clone(),
                message: e.to_string(),
            })?;

        let first = match self.connection.ensure_connected(self.wait_timeout).await {
            Ok(client) => client.call(command).await,
            // Nothing to retry against without an address.
            Err(e @ CoreError::DiscoveryTimeout { .. }) => return Err(e),
            Err(e) => {
                warn!(command = name, error = %e, "connect failed; retrying");
                return self.retry(command).await;
            }
        };

        match first {
            Ok(value) => {
                debug!(command = name, "remote call ok");
                Ok(value)
            }
            Err(e) => {
                warn!(command = name, error = %e, "remote call failed; reconnecting");
                self.retry(command).await
            }
        }
    }

    async fn retry(&self, command: &RemoteCommand) -> Result<Value, CoreError> {
        self.connection.invalidate().await;
        let client = self
            .connection
            .ensure_connected(self.wait_timeout)
            .await
            .map_err(|e| self.unreachable(e.to_string()))?;

        client.call(command).await.map_err(|e| {
            warn!(command = command.name(), error = %e, "retry failed");
            self.unreachable(e.to_string())
        })
    }

    fn unreachable(&self, reason: String) -> CoreError {
        CoreError::DeviceUnreachable {
            device: self.device.clone(),
            reason,
        }
    }
}
