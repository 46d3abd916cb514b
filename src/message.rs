use std::collections::BTreeMap;
use std::time::Duration;

use crate::frame::Frame;

pub const DESTINATION: &str = "destination";
pub const MESSAGE_ID: &str = "message-id";
pub const CORRELATION_ID: &str = "correlation-id";
pub const REPLY_TO: &str = "reply-to";
pub const PERSISTENT: &str = "persistent";
pub const SUBSCRIPTION: &str = "subscription";
pub const ACK: &str = "ack";
pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_LENGTH: &str = "content-length";
/// ActiveMQ scheduled delivery delay, in milliseconds.
pub const SCHEDULED_DELAY: &str = "AMQ_SCHEDULED_DELAY";

/// An application message: named headers plus a body.
///
/// Build one to pass to [`Client::send`](crate::Client::send), or receive one
/// in a subscription handler. Header keys are unique here; when an inbound
/// frame repeats a key, the first value is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Builder-style destination setter.
    pub fn to(mut self, destination: impl Into<String>) -> Self {
        self.set_destination(destination);
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as UTF-8, lossily.
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn remove_header(&mut self, key: &str) -> Option<String> {
        self.headers.remove(key)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn destination(&self) -> Option<&str> {
        self.header(DESTINATION)
    }

    pub fn set_destination(&mut self, destination: impl Into<String>) {
        self.set_header(DESTINATION, destination);
    }

    pub fn id(&self) -> Option<&str> {
        self.header(MESSAGE_ID)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.set_header(MESSAGE_ID, id);
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.header(CORRELATION_ID)
    }

    pub fn set_correlation_id(&mut self, id: impl Into<String>) {
        self.set_header(CORRELATION_ID, id);
    }

    pub fn reply_to(&self) -> Option<&str> {
        self.header(REPLY_TO)
    }

    pub fn set_reply_to(&mut self, destination: impl Into<String>) {
        self.set_header(REPLY_TO, destination);
    }

    /// Messages are non-persistent unless the header says exactly `true`.
    pub fn persistent(&self) -> bool {
        self.header(PERSISTENT) == Some("true")
    }

    pub fn set_persistent(&mut self, persistent: bool) {
        self.set_header(PERSISTENT, if persistent { "true" } else { "false" });
    }

    /// Ask the broker to hold the message back for `delay` (whole ms).
    pub fn set_delay(&mut self, delay: Duration) {
        self.set_header(SCHEDULED_DELAY, delay.as_millis().to_string());
    }

    pub fn delay(&self) -> Option<Duration> {
        self.header(SCHEDULED_DELAY)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
    }

    /// Delivery tag the broker attached for ACK/NACK.
    pub fn ack_tag(&self) -> Option<&str> {
        self.header(ACK)
    }

    pub fn subscription(&self) -> Option<&str> {
        self.header(SUBSCRIPTION)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        let mut headers = BTreeMap::new();
        for (k, v) in frame.headers {
            headers.entry(k).or_insert(v);
        }
        Self {
            headers,
            body: frame.body,
        }
    }
}
