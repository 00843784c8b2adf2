//! Container-level alarm aggregation.
//!
//! A container's channels are reduced to one [`AlarmState`] per poll. A
//! container that is not running never alarms, whatever its readings.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::{strategy_for, ChannelReport};
use crate::registry::ContainerType;
use crate::thresholds::{Classification, Severity, ThresholdSet};

/// Operating status reported for a container.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Stopped,
    /// Also used for any status string not recognised
    #[default]
    #[serde(other)]
    Offline,
}

impl ContainerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Offline => "offline",
        }
    }
}

/// One container as delivered by the telemetry snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    /// Raw model string, e.g. `container-bd-d40-a1346`
    #[serde(rename = "type")]
    pub model: String,
    #[serde(default)]
    pub status: ContainerStatus,
    /// Latest raw telemetry
    #[serde(default)]
    pub last: Value,
    /// Thresholds embedded in the container payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdSet>,
}

impl Container {
    pub fn container_type(&self) -> Option<ContainerType> {
        ContainerType::from_model(&self.model)
    }

    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Running
    }
}

/// Alarm decision for one container and one poll.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct AlarmState {
    pub should_flash: bool,
    pub is_critically_high: bool,
}

impl AlarmState {
    pub const QUIET: AlarmState = AlarmState {
        should_flash: false,
        is_critically_high: false,
    };
}

impl From<Classification> for AlarmState {
    fn from(c: Classification) -> Self {
        Self {
            should_flash: c.should_flash,
            // Only the high side feeds audible alarms
            is_critically_high: c.is_critically_high,
        }
    }
}

impl BitOr for AlarmState {
    type Output = AlarmState;

    fn bitor(self, rhs: AlarmState) -> AlarmState {
        AlarmState {
            should_flash: self.should_flash || rhs.should_flash,
            is_critically_high: self.is_critically_high || rhs.is_critically_high,
        }
    }
}

/// Channels and combined state of one container.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerEvaluation {
    pub container_type: Option<ContainerType>,
    pub channels: Vec<ChannelReport>,
    pub state: AlarmState,
}

impl ContainerEvaluation {
    /// Most severe channel severity, `Unknown` when there are no channels.
    pub fn worst_severity(&self) -> Severity {
        self.channels
            .iter()
            .map(|c| c.classification.severity)
            .max_by_key(|s| s.rank())
            .unwrap_or_default()
    }
}

/// Classify every channel of a container and combine them.
///
/// Stopped and offline containers keep their channel values for display
/// but every channel is neutral and the state is quiet.
pub fn evaluate_container(container: &Container, thresholds: &ThresholdSet) -> ContainerEvaluation {
    let container_type = container.container_type();
    let Some(kind) = container_type else {
        return ContainerEvaluation {
            container_type,
            channels: Vec::new(),
            state: AlarmState::QUIET,
        };
    };

    let mut channels = strategy_for(kind).channels(&container.last, thresholds);

    if !container.is_running() {
        for channel in &mut channels {
            channel.classification = Classification::of(Severity::Neutral);
        }
        return ContainerEvaluation {
            container_type,
            channels,
            state: AlarmState::QUIET,
        };
    }

    let state = channels
        .iter()
        .map(|c| AlarmState::from(c.classification))
        .fold(AlarmState::QUIET, BitOr::bitor);

    ContainerEvaluation {
        container_type,
        channels,
        state,
    }
}

/// Combined alarm state of a container widget.
pub fn widget_alarm_state(container: &Container, thresholds: &ThresholdSet) -> AlarmState {
    evaluate_container(container, thresholds).state
}

/// Operator consent for audible alarms, held for the session only.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SoundConsent {
    #[default]
    Pending,
    Granted,
    Declined,
}

/// Whether the alarm sound should be playing.
pub fn should_beep<'a>(states: impl IntoIterator<Item = &'a AlarmState>, consent: SoundConsent) -> bool {
    consent == SoundConsent::Granted && states.into_iter().any(|s| s.is_critically_high)
}
