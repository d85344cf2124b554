// JSON RPC client
//
// Wraps `reqwest::Client` with object-scoped URL construction and envelope
// unwrapping. One `RpcClient` is one transport handle: it addresses a single
// remote object (the device name) at a single `host:port`.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::command::RemoteCommand;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Response envelope: `{"result": ...}` or `{"error": {"type", "message"}}`.
#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcFault>,
}

#[derive(Deserialize)]
struct RpcFault {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl RpcFault {
    fn describe(self) -> String {
        match (self.kind, self.message) {
            (Some(kind), Some(msg)) => format!("{kind}: {msg}"),
            (None, Some(msg)) => msg,
            (Some(kind), None) => kind,
            (None, None) => "unspecified remote error".into(),
        }
    }
}

/// HTTP/JSON client for one remote object.
///
/// Cheap to clone: the inner `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    base_url: Url,
    object: String,
    /// Request bound of `http`, when this client built it.
    timeout: Option<Duration>,
}

impl RpcClient {
    /// Create a client for `object` served at `base_url`.
    pub fn new(
        base_url: Url,
        object: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let mut client = Self::with_client(http, base_url, object);
        client.timeout = Some(transport.timeout);
        Ok(client)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, object: impl Into<String>) -> Self {
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            object: object.into(),
            timeout: None,
        }
    }

    /// Build the base URL for a controller reachable at `host:port`.
    pub fn endpoint_url(host: &str, port: u16) -> Result<Url, Error> {
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_owned()
        };
        Ok(Url::parse(&format!("http://{host}:{port}/"))?)
    }

    /// The remote object this client addresses.
    pub fn object(&self) -> &str {
        &self.object
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn command_url(&self, command: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("{}/{command}", self.object))?)
    }

    // ── Calls ────────────────────────────────────────────────────────

    /// Issue one command and return the unwrapped `result` value.
    pub async fn call(&self, command: &RemoteCommand) -> Result<Value, Error> {
        command.validate()?;
        let name = command.name();
        let url = self.command_url(name)?;
        debug!(command = name, %url, "rpc call");

        let resp = self
            .http
            .post(url)
            .json(&command.request())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        parse_envelope(name, resp)
            .await
            .map_err(|e| match e {
                Error::Transport(inner) => self.transport_error(inner),
                other => other,
            })
    }

    /// A reqwest timeout becomes `Error::Timeout` when the bound is known.
    fn transport_error(&self, err: reqwest::Error) -> Error {
        match self.timeout {
            Some(bound) if err.is_timeout() => Error::Timeout {
                timeout_secs: bound.as_secs() + u64::from(bound.subsec_nanos() > 0),
            },
            _ => Error::Transport(err),
        }
    }

    /// Issue one command and decode its result into `T`.
    pub async fn call_as<T: DeserializeOwned>(&self, command: &RemoteCommand) -> Result<T, Error> {
        let value = self.call(command).await?;
        serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: value.to_string(),
        })
    }
}

/// Unwrap the response envelope, turning HTTP and envelope errors into
/// `Error::Remote`.
async fn parse_envelope(command: &'static str, resp: reqwest::Response) -> Result<Value, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;
    trace!(command, status = status.as_u16(), body = %body, "rpc response");

    if !status.is_success() {
        let message = serde_json::from_str::<RpcResponse>(&body)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| body.trim().to_owned(), RpcFault::describe);
        return Err(Error::Remote {
            command,
            status: status.as_u16(),
            message,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    let envelope: RpcResponse =
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?;

    match envelope.error {
        Some(fault) => Err(Error::Remote {
            command,
            status: status.as_u16(),
            message: fault.describe(),
        }),
        None => Ok(envelope.result),
    }
}
