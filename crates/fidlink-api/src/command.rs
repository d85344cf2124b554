// Typed remote command set
//
// Every call the controllers accept is one variant of `RemoteCommand`.
// Each variant knows its wire name and how to lay out its positional and
// keyword arguments, and is validated before it is put on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::Error;

// ── Payloads ────────────────────────────────────────────────────────

/// Arguments of `set_channels`: one entry per channel in all three vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetChannelsRequest {
    pub bus_ids: Vec<String>,
    pub channel_ids: Vec<u32>,
    pub duty: Vec<f64>,
}

/// NIR shutter positions understood by spectrograph controllers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ShutterAction {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum PowerAction {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum SealAction {
    Inflate,
    Deflate,
}

/// Body of an RPC request: positional and keyword arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RpcRequest {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

// ── RemoteCommand ───────────────────────────────────────────────────

/// All remote operations a fidlink device link can issue.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RemoteCommand {
    // ── Petal controller (fiducials) ─────────────────────────────────
    /// Describe the physical channels found on the given buses.
    GetChannelInfo { bus_ids: Vec<String> },
    /// Raw level of every channel, keyed by channel id.
    GetStatus,
    SetChannels(SetChannelsRequest),

    // ── Spectrograph controller (shutters) ───────────────────────────
    Configure,
    Get { key: String },
    Power { device: String, action: PowerAction },
    Seal { shutter: String, action: SealAction },
    NirShutter { action: ShutterAction },
}

impl RemoteCommand {
    /// Wire name of the command, e.g. `"set_channels"`.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Check argument shapes before anything is sent.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::SetChannels(req) => {
                let n = req.channel_ids.len();
                if req.bus_ids.len() != n || req.duty.len() != n {
                    return Err(Error::InvalidRequest {
                        message: format!(
                            "set_channels needs one entry per channel: {} bus ids, {} channel ids, {} duty values",
                            req.bus_ids.len(),
                            n,
                            req.duty.len()
                        ),
                    });
                }
                if let Some(bad) = req.duty.iter().find(|d| !d.is_finite()) {
                    return Err(Error::InvalidRequest {
                        message: format!("set_channels duty must be finite, got {bad}"),
                    });
                }
                Ok(())
            }
            Self::Get { key } if key.is_empty() => Err(Error::InvalidRequest {
                message: "get needs a non-empty key".into(),
            }),
            _ => Ok(()),
        }
    }

    /// Lay out the command's arguments for the wire.
    pub fn request(&self) -> RpcRequest {
        let mut req = RpcRequest::default();
        match self {
            Self::GetChannelInfo { bus_ids } => req.args.push(json!(bus_ids)),
            Self::GetStatus | Self::Configure => {}
            Self::SetChannels(set) => {
                req.args.push(json!(set.bus_ids));
                req.args.push(json!(set.channel_ids));
                req.args.push(json!(set.duty));
            }
            Self::Get { key } => req.args.push(json!(key)),
            Self::Power { device, action } => {
                req.kwargs.insert("device".into(), json!(device));
                req.kwargs.insert("action".into(), json!(action.to_string()));
            }
            Self::Seal { shutter, action } => {
                req.kwargs.insert("shutter".into(), json!(shutter));
                req.kwargs.insert("action".into(), json!(action.to_string()));
            }
            Self::NirShutter { action } => req.args.push(json!(action)),
        }
        req
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_snake_case() {
        assert_eq!(RemoteCommand::GetStatus.name(), "get_status");
        assert_eq!(
            RemoteCommand::GetChannelInfo { bus_ids: vec![] }.name(),
            "get_channel_info"
        );
        assert_eq!(
            RemoteCommand::NirShutter {
                action: ShutterAction::Open
            }
            .name(),
            "nir_shutter"
        );
    }

    #[test]
    fn set_channels_rejects_ragged_vectors() {
        let cmd = RemoteCommand::SetChannels(SetChannelsRequest {
            bus_ids: vec!["can0".into(), "can0".into()],
            channel_ids: vec![10, 11],
            duty: vec![5.0],
        });
        assert!(cmd.validate().is_err_and(|e| e.is_invalid_request()));
    }

    #[test]
    fn set_channels_rejects_nan_duty() {
        let cmd = RemoteCommand::SetChannels(SetChannelsRequest {
            bus_ids: vec!["can0".into()],
            channel_ids: vec![10],
            duty: vec![f64::NAN],
        });
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn keyword_commands_use_kwargs() {
        let req = RemoteCommand::Power {
            device: "nir_shutter".into(),
            action: PowerAction::On,
        }
        .request();
        assert!(req.args.is_empty());
        assert_eq!(req.kwargs["device"], json!("nir_shutter"));
        assert_eq!(req.kwargs["action"], json!("on"));
    }

    #[test]
    fn shutter_action_parses_case_insensitively() {
        assert_eq!("OPEN".parse::<ShutterAction>().ok(), Some(ShutterAction::Open));
        assert_eq!(ShutterAction::Close.to_string(), "close");
    }
}
