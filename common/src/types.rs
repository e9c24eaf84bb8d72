use serde::Serialize;

use crate::topics::Topic;

/// Wi-Fi association state as reported by the network collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    ConnectionLost,
    NoNetworkAvailable,
    ConnectFailed,
    Other(i32),
}

impl ConnectivityState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Events delivered by the MQTT transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingEvent {
    Connected,
    Disconnected,
    Subscribed,
    Unsubscribed,
    Published,
    DataReceived { topic: String, payload: Vec<u8> },
    Error(String),
    Other(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: Topic,
    pub payload: String,
    pub retain: bool,
}

impl Publication {
    pub fn retained(topic: Topic, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            retain: true,
        }
    }

    pub fn flag(topic: Topic, value: bool) -> Self {
        Self::retained(topic, flag_payload(value))
    }
}

pub fn flag_payload(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineState {
    pub presence: bool,
    pub emergency: bool,
    pub load_confirmed: bool,
}

impl LineState {
    /// Value reported on the bucket topic: a confirmed load counts as present.
    pub fn bucket_reported(&self) -> bool {
        self.load_confirmed || self.presence
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LineSnapshot {
    pub line: String,
    pub bucket: bool,
    #[serde(rename = "loadConfirmed")]
    pub load_confirmed: bool,
    pub emergency: bool,
    pub temperature: Option<i32>,
    pub humidity: Option<i32>,
    #[serde(rename = "wifiConnected")]
    pub wifi_connected: bool,
}
