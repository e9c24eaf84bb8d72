use core::convert::TryInto;
use std::{
    sync::mpsc::{self, Sender},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context};
use dht_sensor::dht22;
use embedded_svc::{
    mqtt::client::{Details, EventPayload, QoS},
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, AnyOutputPin, IOPin, Input, InputOutput, Output, OutputPin, PinDriver, Pull},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    log::EspLogger,
    mqtt::client::{EspMqttClient, EspMqttConnection, LwtConfiguration, MqttClientConfiguration},
    nvs::EspDefaultNvsPartition,
    sys::EspError,
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};

use line_common::{
    config::{LineConfig, NetworkConfig},
    ClimateSensor, ConnectivityState, DigitalInput, FrameCache, Indicator, LineIo, LineNode,
    LinkError, MessagingEvent, NodeConfig, Publisher, RangeSensor, SensorError, SessionOptions,
};

const PIN_EMERGENCY_BUTTON: i32 = 26;
const PIN_LOAD_BUTTON: i32 = 25;
const PIN_LED: i32 = 12;
const PIN_TRIGGER: i32 = 14;
const PIN_ECHO: i32 = 27;
const PIN_DHT: i32 = 13;

// HC-SR04 timing, same constants as the common Arduino ping libraries.
const US_ROUNDTRIP_CM: u32 = 57;
const ECHO_START_TIMEOUT_US: i64 = 5_800;

const DHT_MIN_READ_INTERVAL_MS: u64 = 2_000;

const WATCHDOG_TIMEOUT_SEC: u32 = 90;
const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;
const WIFI_RECONNECT_INTERVAL_MS: u64 = 5_000;
const WIFI_RESTART_GRACE_MS: u64 = 300_000;

struct Hcsr04 {
    trigger: PinDriver<'static, AnyOutputPin, Output>,
    echo: PinDriver<'static, AnyIOPin, Input>,
    max_echo_us: i64,
}

impl Hcsr04 {
    fn new(trigger: AnyOutputPin, echo: AnyIOPin, max_distance_cm: u32) -> anyhow::Result<Self> {
        let mut trigger = PinDriver::output(trigger)?;
        trigger.set_low()?;
        let echo = PinDriver::input(echo)?;

        info!(
            "HC-SR04 ready (trigger GPIO{}, echo GPIO{}, max {} cm)",
            PIN_TRIGGER, PIN_ECHO, max_distance_cm
        );

        Ok(Self {
            trigger,
            echo,
            max_echo_us: i64::from(max_distance_cm * US_ROUNDTRIP_CM + US_ROUNDTRIP_CM / 2),
        })
    }

    fn fire_trigger(&mut self) -> Result<(), SensorError> {
        let bus = |err: EspError| SensorError::Bus(format!("{err:?}"));
        self.trigger.set_low().map_err(bus)?;
        Ets::delay_us(4);
        self.trigger.set_high().map_err(bus)?;
        Ets::delay_us(10);
        self.trigger.set_low().map_err(bus)
    }
}

impl RangeSensor for Hcsr04 {
    fn ping_cm(&mut self) -> Result<u32, SensorError> {
        if self.echo.is_high() {
            return Err(SensorError::Bus("echo line still high".to_string()));
        }

        self.fire_trigger()?;

        let fired_at = now_us();
        while self.echo.is_low() {
            if now_us() - fired_at > ECHO_START_TIMEOUT_US {
                return Err(SensorError::EchoTimeout(ECHO_START_TIMEOUT_US as u32));
            }
        }

        let echo_at = now_us();
        while self.echo.is_high() {
            if now_us() - echo_at > self.max_echo_us {
                // Out of range reads as no echo.
                return Ok(0);
            }
        }

        let width_us = (now_us() - echo_at) as u32;
        Ok(((width_us + US_ROUNDTRIP_CM / 2) / US_ROUNDTRIP_CM).max(1))
    }
}

struct Dht22Sensor {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
    frames: FrameCache,
}

impl Dht22Sensor {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;

        Ok(Self {
            pin,
            delay: Ets,
            frames: FrameCache::new(DHT_MIN_READ_INTERVAL_MS),
        })
    }

    /// Temperature and humidity come from one DHT22 frame.
    fn sample(&mut self) -> Result<(f32, f32), SensorError> {
        let Self { pin, delay, frames } = self;

        frames.get_or_read(monotonic_ms(), || {
            pin.set_high()
                .map_err(|err| SensorError::Bus(format!("{err:?}")))?;

            dht22::blocking::read(delay, pin)
                .map(|reading| (reading.temperature, reading.relative_humidity))
                .map_err(|err| SensorError::Bus(format!("DHT22 on GPIO{PIN_DHT}: {err:?}")))
        })
    }
}

impl ClimateSensor for Dht22Sensor {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.sample().map(|(temperature, _)| temperature)
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.sample().map(|(_, humidity)| humidity)
    }
}

struct EspButton(PinDriver<'static, AnyIOPin, Input>);

impl EspButton {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut driver = PinDriver::input(pin)?;
        driver.set_pull(Pull::Up)?;
        Ok(Self(driver))
    }
}

impl DigitalInput for EspButton {
    fn is_high(&mut self) -> bool {
        self.0.is_high()
    }
}

struct EspLed(PinDriver<'static, AnyOutputPin, Output>);

impl EspLed {
    fn new(pin: AnyOutputPin) -> anyhow::Result<Self> {
        let mut driver = PinDriver::output(pin)?;
        driver.set_low()?;
        Ok(Self(driver))
    }
}

impl Indicator for EspLed {
    fn set(&mut self, on: bool) {
        let result = if on {
            self.0.set_high()
        } else {
            self.0.set_low()
        };
        if let Err(err) = result {
            warn!("failed to drive LED on GPIO{PIN_LED}: {err:?}");
        }
    }
}

struct EspPublisher {
    client: EspMqttClient<'static>,
}

impl Publisher for EspPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), LinkError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .map(|_| ())
            .map_err(|err| LinkError::Publish {
                topic: topic.to_string(),
                reason: format!("{err:?}"),
            })
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), LinkError> {
        self.client
            .subscribe(filter, QoS::AtLeastOnce)
            .map(|_| ())
            .map_err(|err| LinkError::Subscribe {
                filter: filter.to_string(),
                reason: format!("{err:?}"),
            })
    }
}

/// Observes station association and re-associates while it is down.
struct WifiLink {
    has_credentials: bool,
    ever_connected: bool,
    disconnected_since_ms: Option<u64>,
    last_attempt_ms: u64,
}

impl WifiLink {
    fn new(has_credentials: bool) -> Self {
        Self {
            has_credentials,
            ever_connected: false,
            disconnected_since_ms: None,
            last_attempt_ms: 0,
        }
    }

    fn status(&mut self, now_ms: u64) -> ConnectivityState {
        if is_wifi_station_connected() {
            self.ever_connected = true;
            self.disconnected_since_ms = None;
            return ConnectivityState::Connected;
        }

        if !self.has_credentials {
            return ConnectivityState::NoNetworkAvailable;
        }

        let since = *self.disconnected_since_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(since) >= WIFI_RESTART_GRACE_MS {
            warn!(
                "wifi disconnected for {}s; restarting device for recovery",
                WIFI_RESTART_GRACE_MS / 1000
            );
            thread::sleep(Duration::from_millis(100));
            unsafe { esp_idf_svc::sys::esp_restart() };
        }

        if now_ms.saturating_sub(self.last_attempt_ms) >= WIFI_RECONNECT_INTERVAL_MS {
            self.last_attempt_ms = now_ms;
            let rc = unsafe { esp_idf_svc::sys::esp_wifi_connect() };
            if rc != esp_idf_svc::sys::ESP_OK {
                warn!("wifi reconnect request failed: esp_err_t={rc}");
                return ConnectivityState::Other(rc);
            }
        }

        if self.ever_connected {
            ConnectivityState::ConnectionLost
        } else {
            ConnectivityState::ConnectFailed
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let mut node = LineNode::new(NodeConfig::default());
    let line = node.config().line.clone();
    let network = node.config().network.clone();
    let monitors = node.config().monitors.clone();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals { modem, pins, .. } = Peripherals::take()?;

    let mut io = LineIo {
        ranger: Hcsr04::new(
            pins.gpio14.downgrade_output(),
            pins.gpio27.downgrade(),
            monitors.ranger_max_distance_cm,
        )
        .context("failed to initialize ultrasonic ranger")?,
        climate: Dht22Sensor::new(pins.gpio13.downgrade())
            .context("failed to initialize DHT22")?,
        find_button: EspButton::new(pins.gpio26.downgrade())
            .with_context(|| format!("failed to initialize button on GPIO{PIN_EMERGENCY_BUTTON}"))?,
        load_button: EspButton::new(pins.gpio25.downgrade())
            .with_context(|| format!("failed to initialize button on GPIO{PIN_LOAD_BUTTON}"))?,
        indicator: EspLed::new(pins.gpio12.downgrade_output())
            .with_context(|| format!("failed to initialize LED on GPIO{PIN_LED}"))?,
    };

    let wifi = connect_wifi(modem, sys_loop, nvs_partition, &line, &network)
        .context("wifi startup failed")?;
    disable_wifi_power_save();

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;
    add_current_task_to_watchdog()?;

    let session = node.session_options();
    let (client, conn) = create_mqtt_client(&network, &session)?;
    let (events_tx, events_rx) = mpsc::channel();
    spawn_mqtt_receiver(conn, events_tx)?;

    let mut publisher = EspPublisher { client };
    let mut link = WifiLink::new(network.has_station_credentials());

    info!("line node started, publishing under {}", node.topics().namespace());

    // Keep the driver alive for the program lifetime.
    let _wifi = wifi;

    loop {
        feed_watchdog();
        let now_ms = monotonic_ms();
        let state = link.status(now_ms);

        while let Ok(event) = events_rx.try_recv() {
            node.handle_event(event, &mut publisher);
        }

        node.poll(now_ms, state, &mut io, &mut publisher);
        thread::sleep(Duration::from_millis(1));
    }
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    line: &LineConfig,
    network: &NetworkConfig,
) -> anyhow::Result<EspWifi<'static>> {
    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;

    if let Err(err) = esp_wifi.sta_netif_mut().set_hostname(&line.hostname) {
        warn!("failed to set hostname `{}`: {err:?}", line.hostname);
    }

    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    if !network.has_station_credentials() {
        warn!("wifi credentials missing; running without network");
        return Ok(esp_wifi);
    }

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("connecting to wifi `{}`...", network.wifi_ssid);

    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                info!("wifi associated on attempt {attempt}");
                return Ok(esp_wifi);
            }
            Err(err) => {
                warn!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS} failed: {err:#}")
            }
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    warn!("wifi unavailable after {WIFI_CONNECT_ATTEMPTS} attempts; sensors keep running offline");
    Ok(esp_wifi)
}

fn create_mqtt_client(
    network: &NetworkConfig,
    session: &SessionOptions,
) -> anyhow::Result<(EspMqttClient<'static>, EspMqttConnection)> {
    let url = format!("mqtt://{}:{}", network.mqtt_host, network.mqtt_port);

    let conf = MqttClientConfiguration {
        client_id: Some(session.client_id.as_str()),
        keep_alive_interval: Some(Duration::from_secs(session.keep_alive_secs.into())),
        lwt: Some(LwtConfiguration {
            topic: session.will_topic.as_str(),
            payload: session.will_payload.as_bytes(),
            qos: QoS::AtLeastOnce,
            retain: session.will_retain,
        }),
        username: if network.mqtt_user.is_empty() {
            None
        } else {
            Some(network.mqtt_user.as_str())
        },
        password: if network.mqtt_pass.is_empty() {
            None
        } else {
            Some(network.mqtt_pass.as_str())
        },
        ..Default::default()
    };

    EspMqttClient::new(url.as_str(), &conf)
        .with_context(|| format!("failed to create mqtt client for {url}"))
}

fn spawn_mqtt_receiver(
    mut conn: EspMqttConnection,
    events: Sender<MessagingEvent>,
) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("mqtt-rx".into())
        .stack_size(8 * 1024)
        .spawn(move || loop {
            match conn.next() {
                Ok(event) => {
                    let Some(message) = messaging_event(event.payload()) else {
                        continue;
                    };
                    if events.send(message).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!("mqtt receive loop error: {err:?}");
                    thread::sleep(Duration::from_secs(2));
                }
            }
        })
        .context("failed to spawn mqtt receiver thread")?;

    Ok(())
}

fn messaging_event(payload: EventPayload<'_, EspError>) -> Option<MessagingEvent> {
    let event = match payload {
        EventPayload::Connected(_) => MessagingEvent::Connected,
        EventPayload::Disconnected => MessagingEvent::Disconnected,
        EventPayload::Subscribed(_) => MessagingEvent::Subscribed,
        EventPayload::Unsubscribed(_) => MessagingEvent::Unsubscribed,
        EventPayload::Published(_) => MessagingEvent::Published,
        EventPayload::Received {
            topic,
            data,
            details,
            ..
        } => {
            // Only complete payloads are reported.
            if !matches!(details, Details::Complete) {
                return None;
            }
            MessagingEvent::DataReceived {
                topic: topic.unwrap_or_default().to_string(),
                payload: data.to_vec(),
            }
        }
        EventPayload::Error(err) => MessagingEvent::Error(format!("{err:?}")),
        EventPayload::BeforeConnect => MessagingEvent::Other("before-connect"),
        EventPayload::Deleted(_) => MessagingEvent::Other("deleted"),
        #[allow(unreachable_patterns)]
        _ => MessagingEvent::Other("unknown"),
    };
    Some(event)
}

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc == esp_idf_svc::sys::ESP_OK {
        info!("wifi power save disabled");
    } else {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}

fn is_wifi_station_connected() -> bool {
    let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
    rc == esp_idf_svc::sys::ESP_OK
}

fn now_us() -> i64 {
    unsafe { esp_idf_svc::sys::esp_timer_get_time() }
}

fn monotonic_ms() -> u64 {
    u64::try_from(now_us() / 1_000).unwrap_or_default()
}
