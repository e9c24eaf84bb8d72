use std::{
    sync::OnceLock,
    time::{Duration, Instant},
};

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, QoS};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

use line_common::{
    ConnectivityState, LineNode, LinkError, MessagingEvent, NodeConfig, Publisher,
};

use crate::sim;

const LOOP_PERIOD_MS: u64 = 5;

struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), LinkError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())
            .map_err(|err| LinkError::Publish {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), LinkError> {
        self.client
            .try_subscribe(filter, QoS::AtLeastOnce)
            .map_err(|err| LinkError::Subscribe {
                filter: filter.to_string(),
                reason: err.to_string(),
            })
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut node = LineNode::new(load_config());
    let session = node.session_options();
    let network = node.config().network.clone();

    let mut mqtt_options =
        MqttOptions::new(session.client_id.clone(), network.mqtt_host, network.mqtt_port);
    mqtt_options.set_keep_alive(Duration::from_secs(session.keep_alive_secs.into()));
    mqtt_options.set_last_will(LastWill::new(
        session.will_topic.clone(),
        session.will_payload,
        QoS::AtLeastOnce,
        session.will_retain,
    ));
    if !network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(network.mqtt_user, network.mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 32);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    spawn_mqtt_loop(eventloop, events_tx);

    let mut publisher = MqttPublisher { client: mqtt };
    let mut io = sim::line_io();
    let mut link = ConnectivityState::Connecting;

    info!(
        "line node started (simulated peripherals), publishing under {}",
        node.topics().namespace()
    );

    let mut interval = tokio::time::interval(Duration::from_millis(LOOP_PERIOD_MS));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("shutting down line node");
                break;
            }
        }

        while let Ok(event) = events_rx.try_recv() {
            link = link_after(link, &event);
            node.handle_event(event, &mut publisher);
        }

        node.poll(monotonic_ms(), link, &mut io, &mut publisher);
    }

    Ok(())
}

fn load_config() -> NodeConfig {
    let mut config = NodeConfig::default();

    config.network.mqtt_host =
        std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    if let Some(port) = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.network.mqtt_port = port;
    }

    if let Ok(user) = std::env::var("MQTT_USER") {
        config.network.mqtt_user = user;
        config.network.mqtt_pass = std::env::var("MQTT_PASS").unwrap_or_default();
    }

    if let Ok(line_code) = std::env::var("LINE_CODE") {
        config.network.client_id = format!("line-node-{line_code}");
        config.line.line_code = line_code;
    }

    config
}

fn spawn_mqtt_loop(mut eventloop: EventLoop, events: UnboundedSender<MessagingEvent>) {
    tokio::spawn(async move {
        loop {
            let event = match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => MessagingEvent::Connected,
                Ok(Event::Incoming(Incoming::Disconnect)) => MessagingEvent::Disconnected,
                Ok(Event::Incoming(Incoming::SubAck(_))) => MessagingEvent::Subscribed,
                Ok(Event::Incoming(Incoming::UnsubAck(_))) => MessagingEvent::Unsubscribed,
                Ok(Event::Incoming(Incoming::PubAck(_))) => MessagingEvent::Published,
                Ok(Event::Incoming(Incoming::Publish(message))) => MessagingEvent::DataReceived {
                    topic: message.topic,
                    payload: message.payload.to_vec(),
                },
                Ok(_) => continue,
                Err(err) => {
                    warn!("line node mqtt poll error: {err}");
                    let delivered = events.send(MessagingEvent::Error(err.to_string())).is_ok()
                        && events.send(MessagingEvent::Disconnected).is_ok();
                    if !delivered {
                        break;
                    }
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
            };

            if events.send(event).is_err() {
                break;
            }
        }
    });
}

/// The broker link stands in for Wi-Fi association on the host.
fn link_after(current: ConnectivityState, event: &MessagingEvent) -> ConnectivityState {
    match event {
        MessagingEvent::Connected => ConnectivityState::Connected,
        MessagingEvent::Disconnected if current.is_connected() => {
            ConnectivityState::ConnectionLost
        }
        MessagingEvent::Disconnected => ConnectivityState::ConnectFailed,
        _ => current,
    }
}

pub(crate) fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_link_drives_connectivity() {
        let link = link_after(ConnectivityState::Connecting, &MessagingEvent::Disconnected);
        assert_eq!(link, ConnectivityState::ConnectFailed);

        let link = link_after(link, &MessagingEvent::Connected);
        assert_eq!(link, ConnectivityState::Connected);

        let link = link_after(link, &MessagingEvent::Published);
        assert_eq!(link, ConnectivityState::Connected);

        let link = link_after(link, &MessagingEvent::Disconnected);
        assert_eq!(link, ConnectivityState::ConnectionLost);
    }
}
