use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineConfig {
    pub topic_prefix: String,
    pub line_code: String,
    pub hostname: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        let line_code = option_env!("LINE_CODE").unwrap_or("line2");
        Self {
            topic_prefix: "raptorfx02".to_string(),
            line_code: line_code.to_string(),
            hostname: format!("Raptor LT02 {line_code}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    pub presence_interval_ms: u64,
    pub climate_interval_ms: u64,
    pub load_hold_ms: u64,
    pub ranger_max_distance_cm: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            presence_interval_ms: 500,
            climate_interval_ms: 3_000,
            load_hold_ms: 100,
            ranger_max_distance_cm: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
    pub keep_alive_secs: u16,
    /// The namespace status filter is only subscribed when this is set.
    pub subscribe_commands: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: option_env!("WIFI_SSID").unwrap_or("CHANGE_ME").to_string(),
            wifi_pass: option_env!("WIFI_PASS").unwrap_or("CHANGE_ME").to_string(),
            mqtt_host: option_env!("MQTT_HOST")
                .unwrap_or("192.168.1.100")
                .to_string(),
            mqtt_port: option_env!("MQTT_PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(1883),
            mqtt_user: option_env!("MQTT_USER").unwrap_or_default().to_string(),
            mqtt_pass: option_env!("MQTT_PASS").unwrap_or_default().to_string(),
            client_id: format!(
                "line-node-{}",
                option_env!("LINE_CODE").unwrap_or("line2")
            ),
            keep_alive_secs: 10,
            subscribe_commands: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    pub line: LineConfig,
    pub monitors: MonitorConfig,
    pub network: NetworkConfig,
}

impl MonitorConfig {
    pub fn sanitize(&mut self) {
        self.presence_interval_ms = self.presence_interval_ms.clamp(50, 60_000);
        self.climate_interval_ms = self.climate_interval_ms.clamp(2_000, 600_000);
        self.load_hold_ms = self.load_hold_ms.clamp(10, 10_000);
        self.ranger_max_distance_cm = self.ranger_max_distance_cm.clamp(2, 400);
    }
}

impl NetworkConfig {
    pub fn sanitize(&mut self) {
        if self.mqtt_port == 0 {
            self.mqtt_port = 1883;
        }
        self.keep_alive_secs = self.keep_alive_secs.clamp(5, 300);
    }

    pub fn has_station_credentials(&self) -> bool {
        let ssid = self.wifi_ssid.trim();
        !ssid.is_empty() && ssid != "CHANGE_ME"
    }
}

impl NodeConfig {
    pub fn sanitize(&mut self) {
        self.monitors.sanitize();
        self.network.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_line_firmware_timing() {
        let config = MonitorConfig::default();

        assert_eq!(config.presence_interval_ms, 500);
        assert_eq!(config.climate_interval_ms, 3_000);
        assert_eq!(config.load_hold_ms, 100);
        assert_eq!(config.ranger_max_distance_cm, 30);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut config = NodeConfig::default();
        config.monitors.presence_interval_ms = 0;
        config.monitors.climate_interval_ms = 100;
        config.network.mqtt_port = 0;
        config.network.keep_alive_secs = 0;

        config.sanitize();

        assert_eq!(config.monitors.presence_interval_ms, 50);
        assert_eq!(config.monitors.climate_interval_ms, 2_000);
        assert_eq!(config.network.mqtt_port, 1883);
        assert_eq!(config.network.keep_alive_secs, 5);
    }

    #[test]
    fn placeholder_ssid_is_not_a_credential() {
        let mut network = NetworkConfig {
            wifi_ssid: "CHANGE_ME".to_string(),
            ..NetworkConfig::default()
        };
        assert!(!network.has_station_credentials());

        network.wifi_ssid = "  plant-floor ".to_string();
        assert!(network.has_station_credentials());
    }

    #[test]
    fn config_survives_json_round_trip() {
        let config = NodeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: NodeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, config);
    }
}
