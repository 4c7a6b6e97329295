//! A small differential-drive robot wired onto the scheduler.
//!
//! The wheel encoders stand in for real hardware: they integrate the
//! commanded wheel speeds and are always replayed from the log in
//! simulation mode. Odometry is recomputed from the encoders on every run,
//! so a replay exercises the same estimator code the live run did.

pub mod drive;
pub mod encoder;
pub mod odometry;

pub use drive::{DriveCommand, DriveSubscriber};
pub use encoder::WheelEncoderTopic;
pub use odometry::{OdometryReader, OdometryTopic};

use std::cell::Cell;
use std::rc::Rc;

use crate::command::{Command, DelayCommand, DynamicCommand};
use crate::scheduler::Scheduler;
use crate::subscriber::SubscriberNode;
use crate::topic::TopicNode;

/// Distance between the wheel contact points.
pub const WHEEL_BASE_M: f64 = 0.3;

pub const ENCODER_TOPIC: &str = "encoder";
pub const ODOMETRY_TOPIC: &str = "odometry";
pub const DRIVE_SUBSCRIBER: &str = "drive";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSpeeds {
    pub left_mps: f64,
    pub right_mps: f64,
}

/// Wheel speed command shared by the drive commands, the motor subscriber
/// and the simulated encoders.
#[derive(Debug, Clone, Default)]
pub struct DriveSetpoint {
    speeds: Rc<Cell<WheelSpeeds>>,
}

impl DriveSetpoint {
    pub fn set(&self, left_mps: f64, right_mps: f64) {
        self.speeds.set(WheelSpeeds {
            left_mps,
            right_mps,
        });
    }

    pub fn forward(&self, speed_mps: f64) {
        self.set(speed_mps, speed_mps);
    }

    pub fn stop(&self) {
        self.set(0.0, 0.0);
    }

    pub fn get(&self) -> WheelSpeeds {
        self.speeds.get()
    }
}

/// Register the demo robot's topics and subscriber and install its command
/// chain: drive forward one meter, stop, settle, then return halfway if the
/// robot ended up far enough out.
pub fn install_demo(scheduler: &mut Scheduler) -> DriveSetpoint {
    let setpoint = DriveSetpoint::default();

    let mut encoder = TopicNode::new(WheelEncoderTopic::new(setpoint.clone()));
    let mut odometry = TopicNode::new(OdometryTopic::new(WHEEL_BASE_M));
    let drive = SubscriberNode::new(DriveSubscriber::new(setpoint.clone()));

    encoder.add_subscriber(odometry.inbox());
    odometry.add_subscriber(drive.inbox());
    let reader = OdometryReader::attach(&mut odometry);

    // declared out of order on purpose; initialize sorts them
    scheduler.add_topics([odometry, encoder]);
    scheduler.add_subscriber(drive);

    let timer = scheduler.system_time();
    let far_out = reader.clone();

    let return_trip = Command::new(
        "drive back",
        DriveCommand::new(setpoint.clone(), reader.clone(), -0.5, 0.5),
    )
    .with_subscribers([DRIVE_SUBSCRIBER])
    .then(Command::new("stop after return", DriveCommand::stop(setpoint.clone(), reader.clone())));

    let branch = DynamicCommand::new("choose return")
        .option(return_trip, move || far_out.x_m().is_some_and(|x| x > 0.5))
        .option(Command::instant("hold position"), || true);

    let chain = Command::new(
        "drive forward",
        DriveCommand::new(setpoint.clone(), reader.clone(), 0.5, 1.0),
    )
    .with_subscribers([DRIVE_SUBSCRIBER])
    .then(Command::new("stop", DriveCommand::stop(setpoint.clone(), reader)))
    .then(DelayCommand::named("settle", 0.5, &timer).into())
    .then(branch.into());

    scheduler.set_command_group(chain);
    setpoint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setpoint_shared_between_clones() {
        let setpoint = DriveSetpoint::default();
        let motors = setpoint.clone();

        setpoint.forward(0.5);
        assert_eq!(motors.get(), WheelSpeeds { left_mps: 0.5, right_mps: 0.5 });

        motors.stop();
        assert_eq!(setpoint.get(), WheelSpeeds::default());
    }
}
