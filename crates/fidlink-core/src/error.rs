// ── Core error types ──
//
// Device-level errors from fidlink-core. Consumers never see HTTP status
// codes or socket errors directly: the invoker folds wire failures into
// `DeviceUnreachable` after its single retry, and shape problems surface
// as `ProtocolMismatch`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Device {device} was not discovered within {timeout_secs}s")]
    DiscoveryTimeout { device: String, timeout_secs: u64 },

    #[error("Device {device} is unreachable: {reason}")]
    DeviceUnreachable { device: String, reason: String },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Protocol mismatch with {device}: {message}")]
    ProtocolMismatch { device: String, message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("No controller selected; cannot {operation}")]
    NotConnected { operation: &'static str },
}

impl CoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// A response or request carried the wrong number of channel entries.
    pub(crate) fn channel_count(device: &str, expected: usize, received: usize) -> Self {
        Self::ProtocolMismatch {
            device: device.to_owned(),
            message: format!("expected {expected} channel values, received {received}"),
        }
    }

    /// Returns `true` for failures that reached (or tried to reach) the
    /// network, as opposed to local validation or lifecycle errors.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryTimeout { .. } | Self::DeviceUnreachable { .. }
        )
    }
}
