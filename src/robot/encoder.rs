use serde_json::{json, Value};

use super::{DriveSetpoint, ENCODER_TOPIC};
use crate::topic::{TickContext, Topic};

/// Cumulative wheel travel in meters.
///
/// Live runs integrate the commanded wheel speeds over each tick's delta.
/// Readings are never recomputed offline: simulation mode replays them.
#[derive(Debug)]
pub struct WheelEncoderTopic {
    setpoint: DriveSetpoint,
    left_m: f64,
    right_m: f64,
}

impl WheelEncoderTopic {
    pub fn new(setpoint: DriveSetpoint) -> Self {
        Self {
            setpoint,
            left_m: 0.0,
            right_m: 0.0,
        }
    }
}

impl Topic for WheelEncoderTopic {
    fn name(&self) -> &str {
        ENCODER_TOPIC
    }

    fn generate_messages_periodic(&mut self, tick: &TickContext<'_>) -> Value {
        let speeds = self.setpoint.get();
        self.left_m += speeds.left_mps * tick.delta;
        self.right_m += speeds.right_mps * tick.delta;
        json!({ "left_m": self.left_m, "right_m": self.right_m })
    }

    fn replace_message_with_log(&self) -> bool {
        true
    }
}
