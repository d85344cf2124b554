//! Channel controllers.
//!
//! A [`ChannelController`] turns logical duty operations into remote calls
//! (hardware) or in-memory bookkeeping (simulator). Both variants report
//! status as a [`StatusReport`] with one entry per channel.

mod hardware;
mod simulator;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

pub use hardware::{HardwareChannels, decode_status};
pub use simulator::SimulatorChannels;

use crate::error::CoreError;

/// Duty magnitude at or below which a channel counts as off.
pub const ON_THRESHOLD: f64 = 1e-5;

// ── Duty ─────────────────────────────────────────────────────────────

/// A commanded duty: one value for every channel, or one per channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Duty {
    Uniform(f64),
    PerChannel(Vec<f64>),
}

impl Duty {
    /// Normalize to exactly `n` finite values.
    pub fn expand(self, n: usize, device: &str) -> Result<Vec<f64>, CoreError> {
        let values = match self {
            Self::Uniform(d) => vec![d; n],
            Self::PerChannel(v) if v.len() == n => v,
            Self::PerChannel(v) => return Err(CoreError::channel_count(device, n, v.len())),
        };
        if let Some(bad) = values.iter().find(|d| !d.is_finite()) {
            return Err(CoreError::ProtocolMismatch {
                device: device.to_owned(),
                message: format!("duty must be finite, got {bad}"),
            });
        }
        Ok(values)
    }
}

impl From<f64> for Duty {
    fn from(value: f64) -> Self {
        Self::Uniform(value)
    }
}

impl From<Vec<f64>> for Duty {
    fn from(values: Vec<f64>) -> Self {
        Self::PerChannel(values)
    }
}

impl From<&[f64]> for Duty {
    fn from(values: &[f64]) -> Self {
        Self::PerChannel(values.to_vec())
    }
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelState {
    Unknown,
    Off,
    On,
}

/// State of one channel, as a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStatus {
    pub channel_id: u32,
    pub state: ChannelState,
    pub level: f64,
    pub default: f64,
}

/// Column-oriented status of a controller's channels.
///
/// All four vectors have the same length and are aligned by index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub devices: Vec<u32>,
    pub state: Vec<ChannelState>,
    pub level: Vec<f64>,
    pub default: Vec<f64>,
}

impl StatusReport {
    /// Every channel off at level 0.
    pub fn all_off(devices: Vec<u32>, default: Vec<f64>) -> Self {
        let n = devices.len();
        Self {
            devices,
            state: vec![ChannelState::Off; n],
            level: vec![0.0; n],
            default,
        }
    }

    pub fn rows(&self) -> Vec<ChannelStatus> {
        self.devices
            .iter()
            .zip(&self.state)
            .zip(&self.level)
            .zip(&self.default)
            .map(|(((&channel_id, &state), &level), &default)| ChannelStatus {
                channel_id,
                state,
                level,
                default,
            })
            .collect()
    }

    pub fn any_on(&self) -> bool {
        self.state.contains(&ChannelState::On)
    }
}

// ── ChannelController ────────────────────────────────────────────────

/// The selected controller variant, chosen once from `ControllerKind`.
pub enum ChannelController {
    Hardware(HardwareChannels),
    Simulator(SimulatorChannels),
}

impl ChannelController {
    pub fn device(&self) -> &str {
        match self {
            Self::Hardware(c) => c.device(),
            Self::Simulator(c) => c.device(),
        }
    }

    /// Set every channel to `level`, or to its default duty when `None`.
    pub async fn turn_on(&mut self, level: Option<Duty>) -> Result<(), CoreError> {
        match self {
            Self::Hardware(c) => c.turn_on(level).await,
            Self::Simulator(c) => c.turn_on(level),
        }
    }

    pub async fn turn_off(&mut self) -> Result<(), CoreError> {
        match self {
            Self::Hardware(c) => c.turn_off().await,
            Self::Simulator(c) => c.turn_off(),
        }
    }

    /// Command `duty`, optionally adopting it as the new default.
    pub async fn level(&mut self, duty: Duty, set_default: bool) -> Result<(), CoreError> {
        match self {
            Self::Hardware(c) => c.level(duty, set_default).await,
            Self::Simulator(c) => c.level(duty, set_default),
        }
    }

    pub async fn status(&mut self) -> Result<StatusReport, CoreError> {
        match self {
            Self::Hardware(c) => c.status().await,
            Self::Simulator(c) => Ok(c.status()),
        }
    }

    /// Raw description of the physical channels behind the controller.
    pub async fn channel_info(&self) -> Result<Value, CoreError> {
        match self {
            Self::Hardware(c) => c.channel_info().await,
            Self::Simulator(c) => Ok(c.channel_info()),
        }
    }

    pub async fn shutdown(&self) {
        if let Self::Hardware(c) = self {
            c.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_duty_broadcasts() {
        assert_eq!(
            Duty::from(7.5).expand(3, "PC61").expect("uniform"),
            vec![7.5, 7.5, 7.5]
        );
    }

    #[test]
    fn per_channel_duty_must_match_count() {
        let err = Duty::from(vec![1.0, 2.0])
            .expand(3, "PC61")
            .expect_err("short vector");
        match err {
            CoreError::ProtocolMismatch { device, message } => {
                assert_eq!(device, "PC61");
                assert_eq!(message, "expected 3 channel values, received 2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_finite_duty_is_rejected() {
        for duty in [Duty::from(f64::NAN), Duty::from(vec![1.0, f64::INFINITY])] {
            let err = duty.expand(2, "PC61").expect_err("non-finite");
            assert!(
                matches!(&err, CoreError::ProtocolMismatch { message, .. } if message.contains("finite")),
                "{err:?}"
            );
        }
    }

    #[test]
    fn report_rows_align_columns() {
        let report = StatusReport {
            devices: vec![10, 11],
            state: vec![ChannelState::On, ChannelState::Unknown],
            level: vec![50.0, 0.0],
            default: vec![100.0, 100.0],
        };
        let rows = report.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].channel_id, 11);
        assert_eq!(rows[1].state, ChannelState::Unknown);
        assert!(report.any_on());
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChannelState::Unknown).expect("serialize"),
            "\"unknown\""
        );
        assert_eq!(ChannelState::On.to_string(), "on");
    }
}
