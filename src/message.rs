use core::fmt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::clock::unix_now;
use crate::error::{value_kind, ConfigError};

/// Field name to value mapping carried by a [`Message`].
pub type Payload = Map<String, Value>;

/// Latest message per topic name, as seen by one subscriber.
pub type MessageMap = IndexMap<String, Message>;

/// A payload and the time it was created. Never mutated once built; the next
/// tick supersedes it with a fresh message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    payload: Payload,
    time_stamp: f64,
}

impl Message {
    /// Stamp `value` with the current wall-clock time.
    pub fn new(value: Value) -> Result<Self, ConfigError> {
        Self::with_time_stamp(value, unix_now())
    }

    pub fn with_time_stamp(value: Value, time_stamp: f64) -> Result<Self, ConfigError> {
        match value {
            Value::Object(payload) => Ok(Self::from_payload(payload, time_stamp)),
            other => Err(ConfigError::NonMappingPayload {
                context: "Message".into(),
                found: value_kind(&other),
            }),
        }
    }

    pub fn from_payload(payload: Payload, time_stamp: f64) -> Self {
        Self {
            payload,
            time_stamp,
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn time_stamp(&self) -> f64 {
        self.time_stamp
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.payload.get(field).and_then(Value::as_f64)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message: {} at time {}",
            Value::Object(self.payload.clone()),
            self.time_stamp
        )
    }
}

#[derive(Debug)]
struct InboxInner {
    owner: String,
    messages: RefCell<MessageMap>,
}

/// Shared handle to the message map of one subscriber.
///
/// Topics hold clones of the inboxes they publish into; the owning
/// subscriber reads the same map during its periodic step. Identity (not the
/// owner name) decides which node an inbox belongs to.
#[derive(Debug, Clone)]
pub struct Inbox {
    inner: Rc<InboxInner>,
}

impl Inbox {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(InboxInner {
                owner: owner.into(),
                messages: RefCell::new(MessageMap::new()),
            }),
        }
    }

    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    /// Overwrite the entry for `topic_name`. Only the latest value is kept.
    pub fn store_messages(&self, topic_name: &str, message: Message) {
        self.inner
            .messages
            .borrow_mut()
            .insert(topic_name.to_string(), message);
    }

    pub fn latest(&self, topic_name: &str) -> Option<Message> {
        self.inner.messages.borrow().get(topic_name).cloned()
    }

    /// Read one numeric field of the latest message from `topic_name`.
    pub fn latest_f64(&self, topic_name: &str, field: &str) -> Option<f64> {
        self.inner
            .messages
            .borrow()
            .get(topic_name)
            .and_then(|message| message.get_f64(field))
    }

    pub fn messages(&self) -> Ref<'_, MessageMap> {
        self.inner.messages.borrow()
    }

    pub fn len(&self) -> usize {
        self.inner.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.messages.borrow().is_empty()
    }

    pub fn same_as(&self, other: &Inbox) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_requires_mapping() {
        assert!(Message::new(json!({"encoder_1": 0})).is_ok());

        let err = Message::new(json!(42)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonMappingPayload { found: "number", .. }
        ));
        assert!(Message::new(json!(["a", "b"])).is_err());
        assert!(Message::new(Value::Null).is_err());
    }

    #[test]
    fn test_message_display() {
        let message = Message::with_time_stamp(json!({"test": "test"}), 2.5).unwrap();
        assert_eq!(
            message.to_string(),
            "Message: {\"test\":\"test\"} at time 2.5"
        );
    }

    #[test]
    fn test_inbox_keeps_latest_only() {
        let inbox = Inbox::new("drive");
        let first = Message::with_time_stamp(json!({"x": 1.0}), 1.0).unwrap();
        let second = Message::with_time_stamp(json!({"x": 2.0}), 2.0).unwrap();

        inbox.store_messages("odometry", first);
        inbox.store_messages("odometry", second.clone());

        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox.latest("odometry"), Some(second));
        assert_eq!(inbox.latest_f64("odometry", "x"), Some(2.0));
        assert_eq!(inbox.latest("encoder"), None);
    }

    #[test]
    fn test_inbox_identity() {
        let a = Inbox::new("same");
        let b = Inbox::new("same");
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
    }
}
