use log::{debug, info, warn};

use crate::{
    climate::ClimateSampler,
    config::NodeConfig,
    connectivity::ConnectivityMonitor,
    find_button::FindButtonMonitor,
    io::{ClimateSensor, DigitalInput, Indicator, LineIo, Publisher, RangeSensor},
    load_button::LoadButtonMonitor,
    messaging::{self, SessionOptions},
    presence::PresenceDetector,
    topics::LineTopics,
    types::{ConnectivityState, LineSnapshot, LineState, MessagingEvent, Publication},
};

/// Everything one line node knows, polled from a single loop.
#[derive(Debug, Clone)]
pub struct LineNode {
    config: NodeConfig,
    topics: LineTopics,
    state: LineState,
    connectivity: ConnectivityMonitor,
    presence: PresenceDetector,
    climate: ClimateSampler,
    find_button: FindButtonMonitor,
    load_button: LoadButtonMonitor,
}

impl LineNode {
    pub fn new(mut config: NodeConfig) -> Self {
        config.sanitize();
        let topics = LineTopics::new(&config.line);
        let monitors = &config.monitors;

        Self {
            topics,
            state: LineState::default(),
            connectivity: ConnectivityMonitor::new(),
            presence: PresenceDetector::new(monitors.presence_interval_ms),
            climate: ClimateSampler::new(monitors.climate_interval_ms),
            find_button: FindButtonMonitor::new(),
            load_button: LoadButtonMonitor::new(monitors.load_hold_ms),
            config,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn topics(&self) -> &LineTopics {
        &self.topics
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.current()
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::new(&self.topics, &self.config.network)
    }

    pub fn snapshot(&self) -> LineSnapshot {
        LineSnapshot {
            line: self.config.line.line_code.clone(),
            bucket: self.state.presence,
            load_confirmed: self.state.load_confirmed,
            emergency: self.state.emergency,
            temperature: self.climate.temperature(),
            humidity: self.climate.humidity(),
            wifi_connected: self.connectivity.is_connected(),
        }
    }

    /// One pass of the main loop. Monitors rate-limit themselves, so this can
    /// be called as often as the loop spins.
    pub fn poll<R, C, F, L, I, P>(
        &mut self,
        now_ms: u64,
        link: ConnectivityState,
        io: &mut LineIo<R, C, F, L, I>,
        publisher: &mut P,
    ) where
        R: RangeSensor,
        C: ClimateSensor,
        F: DigitalInput,
        L: DigitalInput,
        I: Indicator,
        P: Publisher,
    {
        self.connectivity.observe(link);

        let LineIo {
            ranger,
            climate,
            find_button,
            load_button,
            indicator,
        } = io;
        let state = &mut self.state;

        let mut publications = Vec::new();
        publications.extend(self.presence.poll(now_ms, ranger, state));
        publications.extend(self.climate.poll(now_ms, climate));
        publications.extend(self.find_button.poll(find_button, indicator, state));
        publications.extend(self.load_button.poll(now_ms, load_button, state));

        for publication in &publications {
            if self.connectivity.is_connected() {
                self.send(publisher, publication);
            } else {
                debug!(
                    "offline, dropping {} = {}",
                    self.topics.path(publication.topic),
                    publication.payload
                );
            }
        }
    }

    pub fn handle_event<P: Publisher>(&mut self, event: MessagingEvent, publisher: &mut P) {
        match event {
            MessagingEvent::Connected => {
                info!("mqtt connected");
                for publication in &messaging::resync_publications(&self.state) {
                    self.send(publisher, publication);
                }

                if self.config.network.subscribe_commands {
                    let filter = self.topics.command_filter();
                    if let Err(err) = publisher.subscribe(filter) {
                        warn!("{err}");
                    }
                }
            }
            MessagingEvent::Disconnected => info!("mqtt disconnected"),
            MessagingEvent::Subscribed => info!("mqtt subscribed"),
            MessagingEvent::Unsubscribed => info!("mqtt unsubscribed"),
            MessagingEvent::Published => debug!("mqtt published"),
            MessagingEvent::DataReceived { topic, payload } => {
                messaging::log_inbound(&topic, &payload, &self.snapshot());
            }
            MessagingEvent::Error(message) => warn!("mqtt error: {message}"),
            MessagingEvent::Other(label) => info!("other mqtt event: {label}"),
        }
    }

    fn send<P: Publisher>(&self, publisher: &mut P, publication: &Publication) {
        let topic = self.topics.path(publication.topic);
        if let Err(err) =
            publisher.publish(topic, publication.payload.as_bytes(), publication.retain)
        {
            warn!("{err}");
        }
    }
}
