//! Simulated line peripherals for running the node on a workstation.
//!
//! A bucket sits in front of the ranger for 8 s of every 20 s cycle. The
//! operator confirms the load 2 s after the bucket leaves, and the find button
//! is held for 2 s every 45 s.

use tracing::info;

use line_common::{ClimateSensor, DigitalInput, Indicator, LineIo, RangeSensor, SensorError};

use crate::host::monotonic_ms;

const BUCKET_CYCLE_MS: u64 = 20_000;
const BUCKET_DWELL_MS: u64 = 8_000;
const CLEAR_DISTANCE_CM: u32 = 18;
const DHT_FAILURE_EVERY: u32 = 11;
const CLIMATE_PERIOD_MS: f32 = 600_000.0;

pub type SimIo = LineIo<SimRanger, SimClimate, SimButton, SimButton, LogIndicator>;

pub fn line_io() -> SimIo {
    LineIo {
        ranger: SimRanger,
        climate: SimClimate::default(),
        find_button: SimButton::new(45_000, 30_000, 32_000),
        load_button: SimButton::new(BUCKET_CYCLE_MS, 10_000, 10_400),
        indicator: LogIndicator,
    }
}

pub struct SimRanger;

impl RangeSensor for SimRanger {
    fn ping_cm(&mut self) -> Result<u32, SensorError> {
        if monotonic_ms() % BUCKET_CYCLE_MS < BUCKET_DWELL_MS {
            Ok(0)
        } else {
            Ok(CLEAR_DISTANCE_CM)
        }
    }
}

#[derive(Default)]
pub struct SimClimate {
    reads: u32,
}

impl SimClimate {
    fn next_read(&mut self) -> Result<f32, SensorError> {
        self.reads = self.reads.wrapping_add(1);
        if self.reads % DHT_FAILURE_EVERY == 0 {
            return Err(SensorError::Checksum);
        }
        Ok((monotonic_ms() as f32 / CLIMATE_PERIOD_MS * core::f32::consts::TAU).sin())
    }
}

impl ClimateSensor for SimClimate {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.next_read().map(|wave| 26.0 + wave * 1.5)
    }

    fn read_humidity(&mut self) -> Result<f32, SensorError> {
        self.next_read().map(|wave| 60.0 + wave * 4.0)
    }
}

/// Pull-up button held low for `[pressed_from_ms, pressed_until_ms)` of each period.
pub struct SimButton {
    period_ms: u64,
    pressed_from_ms: u64,
    pressed_until_ms: u64,
}

impl SimButton {
    fn new(period_ms: u64, pressed_from_ms: u64, pressed_until_ms: u64) -> Self {
        Self {
            period_ms,
            pressed_from_ms,
            pressed_until_ms,
        }
    }

    fn is_pressed_at(&self, now_ms: u64) -> bool {
        let phase = now_ms % self.period_ms;
        (self.pressed_from_ms..self.pressed_until_ms).contains(&phase)
    }
}

impl DigitalInput for SimButton {
    fn is_high(&mut self) -> bool {
        !self.is_pressed_at(monotonic_ms())
    }
}

pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        info!("indicator led {}", if on { "on" } else { "off" });
    }
}
