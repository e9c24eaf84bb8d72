use log::{info, warn};

use crate::{
    config::NetworkConfig,
    topics::{LineTopics, Topic, PAYLOAD_OFFLINE, PAYLOAD_ONLINE},
    types::{LineSnapshot, LineState, Publication},
};

pub const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

/// Connection parameters handed to the MQTT transport at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub client_id: String,
    pub will_topic: String,
    pub will_payload: &'static str,
    pub will_retain: bool,
    pub keep_alive_secs: u16,
}

impl SessionOptions {
    pub fn new(topics: &LineTopics, network: &NetworkConfig) -> Self {
        Self {
            client_id: network.client_id.clone(),
            will_topic: topics.last_will().to_string(),
            will_payload: PAYLOAD_OFFLINE,
            will_retain: true,
            keep_alive_secs: network.keep_alive_secs,
        }
    }
}

/// Full retained state republished on every fresh broker connection.
pub fn resync_publications(state: &LineState) -> [Publication; 3] {
    [
        Publication::retained(Topic::Status, PAYLOAD_ONLINE),
        Publication::flag(Topic::Bucket, state.bucket_reported()),
        Publication::flag(Topic::Finding, state.emergency),
    ]
}

pub fn log_inbound(topic: &str, payload: &[u8], snapshot: &LineSnapshot) {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return;
    }

    info!(
        "mqtt data received on {}: {}",
        topic,
        String::from_utf8_lossy(payload)
    );
    match serde_json::to_string(snapshot) {
        Ok(body) => info!("line state: {body}"),
        Err(err) => warn!("line state serialization failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::LineConfig;

    #[test]
    fn resync_reports_confirmed_load_as_bucket() {
        let state = LineState {
            presence: false,
            emergency: true,
            load_confirmed: true,
        };

        let publications = resync_publications(&state);

        assert_eq!(
            publications,
            [
                Publication::retained(Topic::Status, "online"),
                Publication::retained(Topic::Bucket, "1"),
                Publication::retained(Topic::Finding, "1"),
            ]
        );
    }

    #[test]
    fn session_uses_retained_offline_will_on_status() {
        let line = LineConfig {
            topic_prefix: "raptorfx02".to_string(),
            line_code: "LT02".to_string(),
            hostname: "Raptor LT02".to_string(),
        };
        let network = NetworkConfig::default();
        let session = SessionOptions::new(&LineTopics::new(&line), &network);

        assert_eq!(session.will_topic, "raptorfx02/LT02/status");
        assert_eq!(session.will_payload, "offline");
        assert!(session.will_retain);
        assert_eq!(session.keep_alive_secs, 10);
    }
}
