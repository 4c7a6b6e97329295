use serde_json::{json, Value};

use super::{ENCODER_TOPIC, ODOMETRY_TOPIC};
use crate::message::Inbox;
use crate::topic::{TickContext, Topic, TopicNode};

/// Differential-drive dead reckoning from the wheel encoders.
///
/// Publishes `x_m`, `y_m`, `heading_rad` and the absolute path length
/// `distance_m`. Until the first encoder reading arrives the pose stays at
/// the origin.
#[derive(Debug)]
pub struct OdometryTopic {
    wheel_base_m: f64,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    distance_m: f64,
    last_wheels: Option<(f64, f64)>,
}

impl OdometryTopic {
    pub fn new(wheel_base_m: f64) -> Self {
        Self {
            wheel_base_m,
            x_m: 0.0,
            y_m: 0.0,
            heading_rad: 0.0,
            distance_m: 0.0,
            last_wheels: None,
        }
    }

    fn integrate(&mut self, left_m: f64, right_m: f64) {
        let (last_left, last_right) = self.last_wheels.unwrap_or((left_m, right_m));
        let d_left = left_m - last_left;
        let d_right = right_m - last_right;
        self.last_wheels = Some((left_m, right_m));

        let d_center = (d_left + d_right) / 2.0;
        let d_heading = (d_right - d_left) / self.wheel_base_m;
        // midpoint heading over the step
        let mid_heading = self.heading_rad + d_heading / 2.0;

        self.x_m += d_center * mid_heading.cos();
        self.y_m += d_center * mid_heading.sin();
        self.heading_rad += d_heading;
        self.distance_m += d_center.abs();
    }
}

impl Topic for OdometryTopic {
    fn name(&self) -> &str {
        ODOMETRY_TOPIC
    }

    fn generate_messages_periodic(&mut self, tick: &TickContext<'_>) -> Value {
        if let Some(encoder) = tick.messages.get(ENCODER_TOPIC) {
            if let (Some(left_m), Some(right_m)) =
                (encoder.get_f64("left_m"), encoder.get_f64("right_m"))
            {
                self.integrate(left_m, right_m);
            }
        }
        json!({
            "x_m": self.x_m,
            "y_m": self.y_m,
            "heading_rad": self.heading_rad,
            "distance_m": self.distance_m,
        })
    }
}

/// Read access to the latest odometry for commands.
#[derive(Debug, Clone)]
pub struct OdometryReader {
    inbox: Inbox,
}

impl OdometryReader {
    /// Subscribe a fresh reader to `odometry`.
    pub fn attach(odometry: &mut TopicNode) -> Self {
        let inbox = Inbox::new(format!("{}.reader", odometry.name()));
        odometry.add_subscriber(&inbox);
        Self { inbox }
    }

    pub fn x_m(&self) -> Option<f64> {
        self.inbox.latest_f64(ODOMETRY_TOPIC, "x_m")
    }

    pub fn heading_rad(&self) -> Option<f64> {
        self.inbox.latest_f64(ODOMETRY_TOPIC, "heading_rad")
    }

    pub fn distance_m(&self) -> Option<f64> {
        self.inbox.latest_f64(ODOMETRY_TOPIC, "distance_m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, MessageMap};

    fn encoder_reading(left_m: f64, right_m: f64) -> MessageMap {
        let mut messages = MessageMap::new();
        messages.insert(
            ENCODER_TOPIC.to_string(),
            Message::with_time_stamp(json!({ "left_m": left_m, "right_m": right_m }), 0.0).unwrap(),
        );
        messages
    }

    fn step(odometry: &mut OdometryTopic, messages: &MessageMap) -> Value {
        odometry.generate_messages_periodic(&TickContext {
            now: 0.0,
            delta: 0.0,
            messages,
        })
    }

    #[test]
    fn test_straight_line() {
        let mut odometry = OdometryTopic::new(0.3);
        step(&mut odometry, &encoder_reading(0.0, 0.0));
        let pose = step(&mut odometry, &encoder_reading(1.0, 1.0));

        assert_eq!(pose["x_m"], json!(1.0));
        assert_eq!(pose["y_m"], json!(0.0));
        assert_eq!(pose["heading_rad"], json!(0.0));
        assert_eq!(pose["distance_m"], json!(1.0));
    }

    #[test]
    fn test_turn_in_place() {
        let mut odometry = OdometryTopic::new(0.5);
        step(&mut odometry, &encoder_reading(0.0, 0.0));
        let pose = step(&mut odometry, &encoder_reading(-0.25, 0.25));

        assert_eq!(pose["heading_rad"], json!(1.0));
        assert_eq!(pose["x_m"], json!(0.0));
        assert_eq!(pose["distance_m"], json!(0.0));
    }

    #[test]
    fn test_first_reading_sets_reference() {
        let mut odometry = OdometryTopic::new(0.3);
        // encoders that were not at zero when odometry started
        let pose = step(&mut odometry, &encoder_reading(5.0, 5.0));
        assert_eq!(pose["x_m"], json!(0.0));

        let pose = step(&mut odometry, &MessageMap::new());
        assert_eq!(pose["distance_m"], json!(0.0));
    }

    #[test]
    fn test_reader_sees_published_pose() {
        let mut node = TopicNode::new(OdometryTopic::new(0.3));
        let reader = OdometryReader::attach(&mut node);
        assert_eq!(reader.x_m(), None);

        node.publish_periodic(1.0).unwrap();
        assert_eq!(reader.x_m(), Some(0.0));
        assert_eq!(reader.heading_rad(), Some(0.0));
        assert_eq!(reader.distance_m(), Some(0.0));
    }
}
