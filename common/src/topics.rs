use crate::config::LineConfig;

pub const TOPIC_SUFFIX_STATUS: &str = "status";
pub const TOPIC_SUFFIX_BUCKET: &str = "bucket";
pub const TOPIC_SUFFIX_FINDING: &str = "finding";
pub const TOPIC_SUFFIX_TEMPERATURE: &str = "temperature";
pub const TOPIC_SUFFIX_HUMIDITY: &str = "humidity";

pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Status,
    Bucket,
    Finding,
    Temperature,
    Humidity,
}

impl Topic {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Status => TOPIC_SUFFIX_STATUS,
            Self::Bucket => TOPIC_SUFFIX_BUCKET,
            Self::Finding => TOPIC_SUFFIX_FINDING,
            Self::Temperature => TOPIC_SUFFIX_TEMPERATURE,
            Self::Humidity => TOPIC_SUFFIX_HUMIDITY,
        }
    }
}

/// Fully qualified topic paths for one line, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTopics {
    namespace: String,
    status: String,
    bucket: String,
    finding: String,
    temperature: String,
    humidity: String,
    command_filter: String,
}

impl LineTopics {
    pub fn new(line: &LineConfig) -> Self {
        let namespace = format!(
            "{}/{}",
            line.topic_prefix.trim_end_matches('/'),
            line.line_code
        );
        let path = |topic: Topic| format!("{namespace}/{}", topic.suffix());

        Self {
            status: path(Topic::Status),
            bucket: path(Topic::Bucket),
            finding: path(Topic::Finding),
            temperature: path(Topic::Temperature),
            humidity: path(Topic::Humidity),
            command_filter: format!(
                "{}/{}",
                line.topic_prefix.trim_end_matches('/'),
                TOPIC_SUFFIX_STATUS
            ),
            namespace,
        }
    }

    pub fn path(&self, topic: Topic) -> &str {
        match topic {
            Topic::Status => &self.status,
            Topic::Bucket => &self.bucket,
            Topic::Finding => &self.finding,
            Topic::Temperature => &self.temperature,
            Topic::Humidity => &self.humidity,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn last_will(&self) -> &str {
        &self.status
    }

    pub fn command_filter(&self) -> &str {
        &self.command_filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_live_under_line_namespace() {
        let line = LineConfig {
            topic_prefix: "raptorfx02/".to_string(),
            line_code: "LT02".to_string(),
            hostname: "Raptor LT02".to_string(),
        };
        let topics = LineTopics::new(&line);

        assert_eq!(topics.namespace(), "raptorfx02/LT02");
        assert_eq!(topics.path(Topic::Status), "raptorfx02/LT02/status");
        assert_eq!(topics.path(Topic::Bucket), "raptorfx02/LT02/bucket");
        assert_eq!(topics.path(Topic::Finding), "raptorfx02/LT02/finding");
        assert_eq!(
            topics.path(Topic::Temperature),
            "raptorfx02/LT02/temperature"
        );
        assert_eq!(topics.path(Topic::Humidity), "raptorfx02/LT02/humidity");
        assert_eq!(topics.last_will(), "raptorfx02/LT02/status");
        assert_eq!(topics.command_filter(), "raptorfx02/status");
    }
}
