// Hardware channel controller: a petal controller behind a device link.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use fidlink_api::{RemoteCommand, SetChannelsRequest};

use super::{ChannelState, Duty, StatusReport};
use crate::config::ChannelSet;
use crate::error::CoreError;
use crate::link::DeviceLink;

/// Raw value a controller reports for a channel it cannot read.
const RAW_UNKNOWN: f64 = -1.0;

pub struct HardwareChannels {
    link: DeviceLink,
    channels: ChannelSet,
    default_duty: Vec<f64>,
}

impl HardwareChannels {
    pub fn new(link: DeviceLink, channels: ChannelSet) -> Self {
        let default_duty = channels.default_duty();
        Self {
            link,
            channels,
            default_duty,
        }
    }

    pub fn device(&self) -> &str {
        self.link.device()
    }

    pub fn link(&self) -> &DeviceLink {
        &self.link
    }

    pub fn default_duty(&self) -> &[f64] {
        &self.default_duty
    }

    pub async fn turn_on(&mut self, level: Option<Duty>) -> Result<(), CoreError> {
        let duty = level.unwrap_or_else(|| Duty::PerChannel(self.default_duty.clone()));
        self.level(duty, false).await
    }

    pub async fn turn_off(&mut self) -> Result<(), CoreError> {
        self.level(Duty::Uniform(0.0), false).await
    }

    pub async fn level(&mut self, duty: Duty, set_default: bool) -> Result<(), CoreError> {
        let duty = duty.expand(self.channels.len(), self.device())?;
        if set_default {
            self.default_duty.clone_from(&duty);
        }

        debug!(device = self.device(), ?duty, set_default, "setting channel levels");
        let command = RemoteCommand::SetChannels(SetChannelsRequest {
            bus_ids: self.channels.bus_ids(),
            channel_ids: self.channels.channel_ids(),
            duty,
        });
        self.link.invoker().call(&command).await?;
        Ok(())
    }

    pub async fn status(&mut self) -> Result<StatusReport, CoreError> {
        let raw: HashMap<String, f64> = self
            .link
            .invoker()
            .call_as(&RemoteCommand::GetStatus)
            .await?;
        decode_status(self.device(), &self.channels, &self.default_duty, &raw)
    }

    pub async fn channel_info(&self) -> Result<Value, CoreError> {
        self.link
            .invoker()
            .call(&RemoteCommand::GetChannelInfo {
                bus_ids: self.channels.buses(),
            })
            .await
    }

    pub async fn shutdown(&self) {
        self.link.shutdown().await;
    }
}

/// Decode a `get_status` mapping into a report.
///
/// The mapping must hold exactly one raw value per channel. Channels the
/// mapping does not mention are skipped, so the report may be shorter than
/// the channel set.
#[allow(clippy::float_cmp)] // -1 and 0 are exact sentinels
pub fn decode_status(
    device: &str,
    channels: &ChannelSet,
    default_duty: &[f64],
    raw: &HashMap<String, f64>,
) -> Result<StatusReport, CoreError> {
    if raw.len() != channels.len() {
        return Err(CoreError::channel_count(device, channels.len(), raw.len()));
    }

    let mut report = StatusReport {
        devices: Vec::with_capacity(channels.len()),
        state: Vec::with_capacity(channels.len()),
        level: Vec::with_capacity(channels.len()),
        default: Vec::with_capacity(channels.len()),
    };

    for (i, ch) in channels.iter().enumerate() {
        let Some(&value) = raw.get(&ch.channel_id.to_string()) else {
            warn!(device, channel_id = ch.channel_id, "status does not report channel");
            continue;
        };

        let (state, level) = if value == RAW_UNKNOWN {
            (ChannelState::Unknown, 0.0)
        } else if value == 0.0 {
            (ChannelState::Off, 0.0)
        } else if value > 0.0 {
            (ChannelState::On, (value / ch.relative_level).trunc())
        } else {
            warn!(device, channel_id = ch.channel_id, value, "negative raw level");
            (ChannelState::Unknown, 0.0)
        };

        report.devices.push(ch.channel_id);
        report.state.push(state);
        report.level.push(level);
        report
            .default
            .push(default_duty.get(i).copied().unwrap_or(ch.default_duty));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn set(rel: Vec<f64>) -> ChannelSet {
        let n = rel.len();
        let ids = (0..n)
            .map(|i| 10 + u32::try_from(i).expect("small index"))
            .collect();
        ChannelSet::from_columns(vec!["can0".into(); n], ids, rel, vec![100.0; n])
            .expect("valid set")
    }

    fn raw(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
    }

    #[test]
    fn scales_by_relative_level() {
        let channels = set(vec![1.0, 2.0]);
        let report = decode_status(
            "PC61",
            &channels,
            &channels.default_duty(),
            &raw(&[("10", 50.0), ("11", 100.0)]),
        )
        .expect("decoded");

        assert_eq!(report.level, vec![50.0, 50.0]);
        assert_eq!(report.state, vec![ChannelState::On, ChannelState::On]);
        assert_eq!(report.devices, vec![10, 11]);
    }

    #[test]
    fn decodes_unknown_off_and_truncates() {
        let channels = set(vec![1.0, 1.0, 3.0]);
        let report = decode_status(
            "PC61",
            &channels,
            &channels.default_duty(),
            &raw(&[("10", -1.0), ("11", 0.0), ("12", 10.0)]),
        )
        .expect("decoded");

        assert_eq!(
            report.state,
            vec![ChannelState::Unknown, ChannelState::Off, ChannelState::On]
        );
        assert_eq!(report.level, vec![0.0, 0.0, 3.0]);
    }

    #[test]
    fn wrong_count_is_protocol_mismatch() {
        let channels = set(vec![1.0, 1.0]);
        let err = decode_status(
            "PC61",
            &channels,
            &channels.default_duty(),
            &raw(&[("10", 5.0)]),
        )
        .expect_err("count mismatch");

        assert!(
            matches!(err, CoreError::ProtocolMismatch { ref message, .. } if message == "expected 2 channel values, received 1")
        );
    }

    #[test]
    fn missing_channel_is_skipped() {
        let channels = set(vec![1.0, 1.0]);
        let report = decode_status(
            "PC61",
            &channels,
            &channels.default_duty(),
            &raw(&[("10", 5.0), ("99", 5.0)]),
        )
        .expect("decoded");

        assert_eq!(report.devices, vec![10]);
        assert_eq!(report.level, vec![5.0]);
        assert_eq!(report.default, vec![100.0]);
    }
}
