use thiserror::Error;

/// Top-level error type for the `fidlink-api` crate.
///
/// Covers every failure mode of the wire layer: HTTP transport, the RPC
/// envelope, request validation, and the discovery socket. `fidlink-core`
/// maps these into device-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── RPC ─────────────────────────────────────────────────────────
    /// The remote object rejected the command, either with a non-2xx
    /// status or an `{"error": {...}}` envelope.
    #[error("Remote command '{command}' failed (HTTP {status}): {message}")]
    Remote {
        command: &'static str,
        status: u16,
        message: String,
    },

    /// Command arguments failed validation before anything was sent.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Discovery ───────────────────────────────────────────────────
    /// Discovery socket could not be bound or written.
    #[error("Discovery socket error: {0}")]
    Discovery(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            Self::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the request never left the client.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest { .. })
    }
}
