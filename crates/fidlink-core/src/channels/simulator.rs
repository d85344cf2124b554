// Simulated channel controller. Keeps the last commanded levels in memory.

use serde_json::{Value, json};
use tracing::debug;

use super::{ChannelState, Duty, ON_THRESHOLD, StatusReport};
use crate::config::ChannelSet;
use crate::error::CoreError;

pub struct SimulatorChannels {
    device: String,
    channels: ChannelSet,
    report: StatusReport,
}

impl SimulatorChannels {
    pub fn new(device: impl Into<String>, channels: ChannelSet) -> Self {
        let report = StatusReport::all_off(channels.channel_ids(), channels.default_duty());
        Self {
            device: device.into(),
            channels,
            report,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn turn_on(&mut self, level: Option<Duty>) -> Result<(), CoreError> {
        let duty = level.unwrap_or_else(|| Duty::PerChannel(self.report.default.clone()));
        self.level(duty, false)
    }

    pub fn turn_off(&mut self) -> Result<(), CoreError> {
        self.level(Duty::Uniform(0.0), false)
    }

    pub fn level(&mut self, duty: Duty, set_default: bool) -> Result<(), CoreError> {
        let duty = duty.expand(self.channels.len(), &self.device)?;

        for (i, &d) in duty.iter().enumerate() {
            let on = d.abs() > ON_THRESHOLD;
            self.report.state[i] = if on { ChannelState::On } else { ChannelState::Off };
            self.report.level[i] = if on { d } else { 0.0 };
        }
        if set_default {
            self.report.default.clone_from(&duty);
        }

        debug!(device = %self.device, ?duty, set_default, "simulated levels set");
        Ok(())
    }

    pub fn status(&self) -> StatusReport {
        self.report.clone()
    }

    /// Synthetic per-bus listing of the configured channels.
    pub fn channel_info(&self) -> Value {
        let mut info = serde_json::Map::new();
        for bus in self.channels.buses() {
            let ids: Vec<u32> = self
                .channels
                .iter()
                .filter(|c| c.bus_id == bus)
                .map(|c| c.channel_id)
                .collect();
            info.insert(bus, json!({ "channel_ids": ids, "simulated": true }));
        }
        Value::Object(info)
    }
}
