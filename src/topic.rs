use core::fmt;
use serde_json::{json, Value};

use crate::error::{value_kind, ConfigError};
use crate::message::{Inbox, Message, MessageMap};

pub const SYSTEM_TIME_TOPIC: &str = "SystemTime";

/// What a topic's generator can see while producing the next payload.
#[derive(Debug)]
pub struct TickContext<'a> {
    /// Time of the current tick in seconds.
    pub now: f64,
    /// Seconds since this topic last published; zero on the first publish.
    pub delta: f64,
    /// Latest messages from the topics this one subscribes to. Upstream
    /// topics have already published for the current tick.
    pub messages: &'a MessageMap,
}

/// A periodic named producer of messages: sensor readings, estimates,
/// setpoints. Topics are also subscribers and may react to other topics'
/// data after every topic has published.
///
/// Anything that cannot be recomputed offline (a physical sensor read)
/// should return true from [`replace_message_with_log`](Topic::replace_message_with_log)
/// so that simulation mode replays the logged value instead.
pub trait Topic {
    fn name(&self) -> &str;

    /// Produce the next payload. Must not block. Must return a JSON object.
    fn generate_messages_periodic(&mut self, tick: &TickContext<'_>) -> Value;

    fn replace_message_with_log(&self) -> bool {
        false
    }

    fn subscriber_periodic(&mut self, _messages: &MessageMap) {}

    fn subscriber_periodic_sim(&mut self, messages: &MessageMap) {
        self.subscriber_periodic(messages);
    }

    fn initialize_hardware(&mut self) -> bool {
        true
    }

    fn shutdown_hardware(&mut self) {}
}

/// A registered topic with its subscriber list and publish timing.
pub struct TopicNode {
    topic: Box<dyn Topic>,
    inbox: Inbox,
    subscribers: Vec<Inbox>,
    message_body: Option<Message>,
    previous_time: Option<f64>,
    current_time: f64,
    delta_time_seconds: f64,
    is_sim: bool,
}

impl TopicNode {
    pub fn new(topic: impl Topic + 'static) -> Self {
        let inbox = Inbox::new(topic.name());
        Self {
            topic: Box::new(topic),
            inbox,
            subscribers: Vec::new(),
            message_body: None,
            previous_time: None,
            current_time: 0.0,
            delta_time_seconds: 0.0,
            is_sim: false,
        }
    }

    pub fn name(&self) -> &str {
        self.topic.name()
    }

    /// This topic's own inbox, for subscribing it to upstream topics.
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Register `inbox` for every future publish. There is no removal.
    pub fn add_subscriber(&mut self, inbox: &Inbox) {
        self.subscribers.push(inbox.clone());
    }

    pub fn subscribers(&self) -> &[Inbox] {
        &self.subscribers
    }

    pub fn replace_message_with_log(&self) -> bool {
        self.topic.replace_message_with_log()
    }

    /// Generate, wrap and distribute this tick's message.
    pub fn publish_periodic(&mut self, now: f64) -> Result<(Message, f64, f64), ConfigError> {
        let delta = self.previous_time.map_or(0.0, |previous| now - previous);
        let body = {
            let messages = self.inbox.messages();
            let tick = TickContext {
                now,
                delta,
                messages: &messages,
            };
            self.topic.generate_messages_periodic(&tick)
        };

        let message = match body {
            Value::Object(payload) => Message::from_payload(payload, now),
            other => {
                return Err(ConfigError::NonMappingPayload {
                    context: format!("Topic '{}'", self.name()),
                    found: value_kind(&other),
                })
            }
        };

        self.current_time = now;
        self.delta_time_seconds = delta;
        self.previous_time = Some(now);
        self.notify_subscribers(&message);
        self.message_body = Some(message.clone());

        Ok((message, now, delta))
    }

    /// Distribute a logged message exactly as a live publish would.
    pub fn publish_periodic_from_log(
        &mut self,
        message: Message,
        current_time: f64,
        delta_time_seconds: f64,
    ) -> (Message, f64, f64) {
        self.current_time = current_time;
        self.delta_time_seconds = delta_time_seconds;
        self.previous_time = Some(current_time);
        self.notify_subscribers(&message);
        self.message_body = Some(message.clone());

        (message, current_time, delta_time_seconds)
    }

    fn notify_subscribers(&self, message: &Message) {
        for inbox in &self.subscribers {
            inbox.store_messages(self.topic.name(), message.clone());
        }
    }

    /// The topic's own reaction step, run after every topic has published.
    pub fn periodic(&mut self) {
        let messages = self.inbox.messages();
        if self.is_sim {
            self.topic.subscriber_periodic_sim(&messages);
        } else {
            self.topic.subscriber_periodic(&messages);
        }
    }

    pub fn message(&self) -> Option<&Message> {
        self.message_body.as_ref()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn delta_time_seconds(&self) -> f64 {
        self.delta_time_seconds
    }

    pub fn initialize_hardware(&mut self) -> bool {
        self.topic.initialize_hardware()
    }

    pub fn shutdown_hardware(&mut self) {
        self.topic.shutdown_hardware();
    }

    pub fn set_simulation(&mut self, is_sim: bool) {
        self.is_sim = is_sim;
    }
}

impl fmt::Debug for TopicNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicNode")
            .field("name", &self.name())
            .field("subscribers", &self.subscribers.len())
            .field("message_body", &self.message_body)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TopicNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message_body {
            Some(message) => write!(f, "Topic: {} with message {}", self.name(), message),
            None => write!(f, "Topic: {} with no message", self.name()),
        }
    }
}

/// Publishes the tick time so that every time-dependent consumer reads the
/// same clock in live and replay runs. Always replayed from the log.
#[derive(Debug)]
pub struct SystemTimeTopic {
    name: String,
}

impl SystemTimeTopic {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for SystemTimeTopic {
    fn default() -> Self {
        Self::new(SYSTEM_TIME_TOPIC)
    }
}

impl Topic for SystemTimeTopic {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate_messages_periodic(&mut self, tick: &TickContext<'_>) -> Value {
        json!({ "Unix": tick.now, "DeltaTimeSeconds": tick.delta })
    }

    fn replace_message_with_log(&self) -> bool {
        true
    }
}

/// Read side of the scheduler's system time topic.
///
/// Handed out by [`Scheduler::system_time`](crate::Scheduler::system_time);
/// never build a second time source for commands.
#[derive(Debug, Clone)]
pub struct SystemTimeHandle {
    topic_name: String,
    inbox: Inbox,
}

impl SystemTimeHandle {
    pub(crate) fn attach(topic: &mut TopicNode) -> Self {
        let inbox = Inbox::new(format!("{}.reader", topic.name()));
        topic.add_subscriber(&inbox);
        Self {
            topic_name: topic.name().to_string(),
            inbox,
        }
    }

    /// Latest published Unix time, or `None` before the first publish.
    pub fn reading(&self) -> Option<f64> {
        self.inbox.latest_f64(&self.topic_name, "Unix")
    }

    pub fn delta(&self) -> Option<f64> {
        self.inbox.latest_f64(&self.topic_name, "DeltaTimeSeconds")
    }
}
