use crate::topic::SystemTimeHandle;

/// Waits without blocking until the shared system time has advanced by the
/// configured number of seconds. Use this instead of a busy loop inside a
/// periodic step.
///
/// The timer must be the scheduler's own [`SystemTimeHandle`], which is what
/// lets a replayed run observe the same delays as the recorded one.
pub struct DelayCommand {
    name: String,
    delay_time_s: f64,
    timer: SystemTimeHandle,
    start_time: Option<f64>,
}

impl DelayCommand {
    pub fn new(delay_time_s: f64, timer: &SystemTimeHandle) -> Self {
        Self::named("Delay Command", delay_time_s, timer)
    }

    pub fn named(name: impl Into<String>, delay_time_s: f64, timer: &SystemTimeHandle) -> Self {
        Self {
            name: name.into(),
            delay_time_s,
            timer: timer.clone(),
            start_time: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delay_time_s(&self) -> f64 {
        self.delay_time_s
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub(crate) fn first_run_behavior(&mut self) {
        self.start_time = self.timer.reading();
    }

    pub(crate) fn is_complete(&mut self) -> bool {
        let Some(now) = self.timer.reading() else {
            return false;
        };
        // no time had been published when the delay started
        let start = *self.start_time.get_or_insert(now);
        now - start >= self.delay_time_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::topic::{SystemTimeTopic, TopicNode};

    fn time_topic() -> (TopicNode, SystemTimeHandle) {
        let mut topic = TopicNode::new(SystemTimeTopic::default());
        let handle = SystemTimeHandle::attach(&mut topic);
        (topic, handle)
    }

    #[test]
    fn test_delay_uses_only_the_shared_timer() {
        let (mut topic, timer) = time_topic();
        topic.publish_periodic(1000.0).unwrap();

        let mut delay: Command = DelayCommand::new(2.0, &timer).into();
        delay.first_run();
        assert!(!delay.is_complete());

        topic.publish_periodic(1001.0).unwrap();
        assert!(!delay.is_complete());

        topic.publish_periodic(1001.9).unwrap();
        assert!(!delay.is_complete());

        topic.publish_periodic(1002.0).unwrap();
        assert!(delay.is_complete());

        topic.publish_periodic(1003.5).unwrap();
        assert!(delay.is_complete());
    }

    #[test]
    fn test_delay_captures_start_lazily_without_reading() {
        let (mut topic, timer) = time_topic();

        let mut delay = DelayCommand::new(0.5, &timer);
        delay.first_run_behavior();
        assert_eq!(delay.start_time(), None);
        assert!(!delay.is_complete());

        topic.publish_periodic(10.0).unwrap();
        assert!(!delay.is_complete());
        assert_eq!(delay.start_time(), Some(10.0));

        topic.publish_periodic(10.5).unwrap();
        assert!(delay.is_complete());
    }

    #[test]
    fn test_zero_delay_completes_on_first_reading() {
        let (mut topic, timer) = time_topic();
        topic.publish_periodic(3.0).unwrap();

        let mut delay: Command = DelayCommand::new(0.0, &timer).into();
        delay.first_run();
        assert!(delay.is_complete());
    }
}
