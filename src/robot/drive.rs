use std::cell::Cell;
use tracing::{debug, info};

use super::{DriveSetpoint, OdometryReader, WheelSpeeds, DRIVE_SUBSCRIBER, ODOMETRY_TOPIC};
use crate::command::CommandBehavior;
use crate::message::MessageMap;
use crate::subscriber::Subscriber;

/// Motor controller. Applies the shared wheel speed setpoint every tick and
/// zeroes it on shutdown.
#[derive(Debug)]
pub struct DriveSubscriber {
    setpoint: DriveSetpoint,
    applied: WheelSpeeds,
    last_x_m: Option<f64>,
}

impl DriveSubscriber {
    pub fn new(setpoint: DriveSetpoint) -> Self {
        Self {
            setpoint,
            applied: WheelSpeeds::default(),
            last_x_m: None,
        }
    }

    pub fn applied(&self) -> WheelSpeeds {
        self.applied
    }

    fn track_pose(&mut self, messages: &MessageMap) {
        if let Some(pose) = messages.get(ODOMETRY_TOPIC) {
            self.last_x_m = pose.get_f64("x_m");
        }
    }
}

impl Subscriber for DriveSubscriber {
    fn name(&self) -> &str {
        DRIVE_SUBSCRIBER
    }

    fn subscriber_periodic(&mut self, messages: &MessageMap) {
        self.track_pose(messages);
        let speeds = self.setpoint.get();
        if speeds != self.applied {
            debug!(
                "Drive: wheels {:.3}/{:.3} m/s at x={:?}",
                speeds.left_mps, speeds.right_mps, self.last_x_m
            );
            self.applied = speeds;
        }
    }

    fn subscriber_periodic_sim(&mut self, messages: &MessageMap) {
        // no motors to drive offline
        self.track_pose(messages);
    }

    fn initialize_hardware(&mut self) -> bool {
        self.setpoint.stop();
        true
    }

    fn shutdown_hardware(&mut self) {
        info!("Drive: stopping motors");
        self.setpoint.stop();
        self.applied = WheelSpeeds::default();
    }
}

/// Drives straight at a fixed speed until the odometry path length has grown
/// by the target distance. A zero target completes on the first poll, which
/// makes [`DriveCommand::stop`] a one-tick stop.
#[derive(Debug)]
pub struct DriveCommand {
    setpoint: DriveSetpoint,
    odometry: OdometryReader,
    speed_mps: f64,
    distance_m: f64,
    start_distance_m: Cell<Option<f64>>,
}

impl DriveCommand {
    pub fn new(
        setpoint: DriveSetpoint,
        odometry: OdometryReader,
        speed_mps: f64,
        distance_m: f64,
    ) -> Self {
        Self {
            setpoint,
            odometry,
            speed_mps,
            distance_m,
            start_distance_m: Cell::new(None),
        }
    }

    pub fn stop(setpoint: DriveSetpoint, odometry: OdometryReader) -> Self {
        Self::new(setpoint, odometry, 0.0, 0.0)
    }

    pub fn travelled_m(&self) -> f64 {
        match (self.start_distance_m.get(), self.odometry.distance_m()) {
            (Some(start), Some(now)) => now - start,
            _ => 0.0,
        }
    }
}

impl CommandBehavior for DriveCommand {
    fn first_run_behavior(&mut self) {
        self.start_distance_m.set(self.odometry.distance_m());
        self.setpoint.forward(self.speed_mps);
    }

    fn periodic(&mut self) {
        self.setpoint.forward(self.speed_mps);
    }

    fn is_complete(&self) -> bool {
        if self.distance_m <= 0.0 {
            return true;
        }
        // odometry had not published yet when the drive started
        if self.start_distance_m.get().is_none() {
            self.start_distance_m.set(self.odometry.distance_m());
        }
        self.travelled_m() >= self.distance_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::robot::OdometryTopic;
    use crate::topic::TopicNode;
    use serde_json::json;

    fn odometry_message(distance_m: f64) -> Message {
        let payload = json!({ "distance_m": distance_m, "x_m": distance_m });
        Message::with_time_stamp(payload, 0.0).unwrap()
    }

    #[test]
    fn test_drive_command_completes_at_distance() {
        let mut node = TopicNode::new(OdometryTopic::new(0.3));
        let reader = OdometryReader::attach(&mut node);
        let inbox = node.subscribers()[0].clone();
        let setpoint = DriveSetpoint::default();

        inbox.store_messages(ODOMETRY_TOPIC, odometry_message(2.0));
        let mut command = DriveCommand::new(setpoint.clone(), reader, 0.5, 1.0);
        command.first_run_behavior();
        assert_eq!(setpoint.get().left_mps, 0.5);
        assert!(!command.is_complete());

        inbox.store_messages(ODOMETRY_TOPIC, odometry_message(2.5));
        assert!(!command.is_complete());
        inbox.store_messages(ODOMETRY_TOPIC, odometry_message(3.0));
        assert!(command.is_complete());
        assert_eq!(command.travelled_m(), 1.0);
    }

    #[test]
    fn test_stop_command_is_immediate() {
        let mut node = TopicNode::new(OdometryTopic::new(0.3));
        let reader = OdometryReader::attach(&mut node);
        let setpoint = DriveSetpoint::default();
        setpoint.forward(1.0);

        let mut command = DriveCommand::stop(setpoint.clone(), reader);
        command.first_run_behavior();
        assert!(command.is_complete());
        assert_eq!(setpoint.get(), WheelSpeeds::default());
    }

    #[test]
    fn test_drive_subscriber_stops_on_shutdown() {
        let setpoint = DriveSetpoint::default();
        let mut drive = DriveSubscriber::new(setpoint.clone());
        assert!(drive.initialize_hardware());

        setpoint.forward(0.4);
        drive.subscriber_periodic(&MessageMap::new());
        assert_eq!(drive.applied().right_mps, 0.4);

        drive.shutdown_hardware();
        assert_eq!(setpoint.get(), WheelSpeeds::default());
        assert_eq!(drive.applied(), WheelSpeeds::default());
    }
}
