use log::{info, warn};

use crate::{
    error::SensorError,
    io::ClimateSensor,
    topics::Topic,
    types::Publication,
};

/// Last integer published for one quantity; `None` until the first good read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RoundedValue(Option<i32>);

impl RoundedValue {
    fn update(&mut self, reading: Result<f32, SensorError>, label: &str) -> Option<i32> {
        let value = match reading {
            Ok(value) if value.is_nan() => {
                warn!("DHT: failed to read {label}: {}", SensorError::NotANumber);
                return None;
            }
            Ok(value) => value.round() as i32,
            Err(err) => {
                warn!("DHT: failed to read {label}: {err}");
                return None;
            }
        };

        if self.0 == Some(value) {
            return None;
        }

        self.0 = Some(value);
        Some(value)
    }
}

/// One temperature/humidity frame shared by the two independent reads.
///
/// The sensor needs a quiet period between transfers, so within
/// `min_interval_ms` of the last transfer the cached outcome is returned,
/// failures included.
#[derive(Debug, Clone)]
pub struct FrameCache {
    min_interval_ms: u64,
    last: Option<(u64, Result<(f32, f32), SensorError>)>,
}

impl FrameCache {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last: None,
        }
    }

    pub fn get_or_read<F>(&mut self, now_ms: u64, read: F) -> Result<(f32, f32), SensorError>
    where
        F: FnOnce() -> Result<(f32, f32), SensorError>,
    {
        if let Some((taken_at_ms, frame)) = &self.last {
            if now_ms.saturating_sub(*taken_at_ms) < self.min_interval_ms {
                return frame.clone();
            }
        }

        let frame = read();
        self.last = Some((now_ms, frame.clone()));
        frame
    }
}

#[derive(Debug, Clone)]
pub struct ClimateSampler {
    interval_ms: u64,
    last_poll_ms: u64,
    temperature: RoundedValue,
    humidity: RoundedValue,
}

impl ClimateSampler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_poll_ms: 0,
            temperature: RoundedValue::default(),
            humidity: RoundedValue::default(),
        }
    }

    pub fn temperature(&self) -> Option<i32> {
        self.temperature.0
    }

    pub fn humidity(&self) -> Option<i32> {
        self.humidity.0
    }

    pub fn poll<C: ClimateSensor>(&mut self, now_ms: u64, sensor: &mut C) -> Vec<Publication> {
        let mut publications = Vec::new();
        if now_ms.saturating_sub(self.last_poll_ms) < self.interval_ms {
            return publications;
        }
        self.last_poll_ms = now_ms;

        if let Some(temperature) = self
            .temperature
            .update(sensor.read_temperature(), "temperature")
        {
            info!("temperature: {temperature}");
            publications.push(Publication::retained(
                Topic::Temperature,
                temperature.to_string(),
            ));
        }

        if let Some(humidity) = self.humidity.update(sensor.read_humidity(), "humidity") {
            info!("humidity: {humidity}");
            publications.push(Publication::retained(
                Topic::Humidity,
                humidity.to_string(),
            ));
        }

        publications
    }
}
