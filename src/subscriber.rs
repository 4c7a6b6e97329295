use crate::message::{Inbox, Message, MessageMap};

/// Something that only consumes topic data: a motor controller, a logger,
/// a display. Implementors receive the latest message of every topic they
/// are subscribed to once per tick, after all topics have published.
pub trait Subscriber {
    fn name(&self) -> &str;

    /// React to the freshly published messages.
    fn subscriber_periodic(&mut self, messages: &MessageMap);

    /// Simulation-mode step. Defaults to the normal step.
    fn subscriber_periodic_sim(&mut self, messages: &MessageMap) {
        self.subscriber_periodic(messages);
    }

    /// Returns false on any hardware failure.
    fn initialize_hardware(&mut self) -> bool {
        true
    }

    fn shutdown_hardware(&mut self) {}
}

/// A registered subscriber together with its inbox and mode flag.
pub struct SubscriberNode {
    subscriber: Box<dyn Subscriber>,
    inbox: Inbox,
    is_sim: bool,
}

impl SubscriberNode {
    pub fn new(subscriber: impl Subscriber + 'static) -> Self {
        let inbox = Inbox::new(subscriber.name());
        Self {
            subscriber: Box::new(subscriber),
            inbox,
            is_sim: false,
        }
    }

    pub fn name(&self) -> &str {
        self.subscriber.name()
    }

    /// Handle to pass to [`TopicNode::add_subscriber`](crate::TopicNode::add_subscriber).
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn store_messages(&self, topic_name: &str, message: Message) {
        self.inbox.store_messages(topic_name, message);
    }

    pub fn periodic(&mut self) {
        let messages = self.inbox.messages();
        if self.is_sim {
            self.subscriber.subscriber_periodic_sim(&messages);
        } else {
            self.subscriber.subscriber_periodic(&messages);
        }
    }

    pub fn initialize_hardware(&mut self) -> bool {
        self.subscriber.initialize_hardware()
    }

    pub fn shutdown_hardware(&mut self) {
        self.subscriber.shutdown_hardware();
    }

    pub fn set_simulation(&mut self, is_sim: bool) {
        self.is_sim = is_sim;
    }

    pub fn is_simulation(&self) -> bool {
        self.is_sim
    }
}

impl core::fmt::Debug for SubscriberNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriberNode")
            .field("name", &self.name())
            .field("is_sim", &self.is_sim)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Subscriber for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn subscriber_periodic(&mut self, _messages: &MessageMap) {
            self.calls.borrow_mut().push("normal");
        }

        fn subscriber_periodic_sim(&mut self, _messages: &MessageMap) {
            self.calls.borrow_mut().push("sim");
        }
    }

    struct Plain;

    impl Subscriber for Plain {
        fn name(&self) -> &str {
            "plain"
        }

        fn subscriber_periodic(&mut self, _messages: &MessageMap) {}
    }

    #[test]
    fn test_subscriber_store_messages() {
        let node = SubscriberNode::new(Plain);
        let message = Message::new(json!({"test": "test"})).unwrap();
        node.store_messages("test_topic", message);
        assert!(node.inbox().messages().contains_key("test_topic"));
    }

    #[test]
    fn test_subscriber_periodic_dispatches_on_mode() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut node = SubscriberNode::new(Recorder {
            calls: Rc::clone(&calls),
        });

        node.periodic();
        node.set_simulation(true);
        node.periodic();

        assert_eq!(*calls.borrow(), vec!["normal", "sim"]);
    }

    #[test]
    fn test_default_hardware_init_succeeds() {
        let mut node = SubscriberNode::new(Plain);
        assert!(node.initialize_hardware());
        assert_eq!(node.name(), "plain");
    }
}
