//! Hardware and transport boundaries.
//!
//! The monitors only see these traits. The ESP build implements them with
//! esp-idf-hal pin drivers and the esp-mqtt client; the host build and the
//! tests implement them with simulations and recording fakes.

use crate::error::{LinkError, SensorError};

/// Ultrasonic ranging. `Ok(0)` and `Err(_)` both mean "no echo".
pub trait RangeSensor {
    fn ping_cm(&mut self) -> Result<u32, SensorError>;
}

/// Temperature (°C) and relative humidity (%) readings, read independently.
pub trait ClimateSensor {
    fn read_temperature(&mut self) -> Result<f32, SensorError>;
    fn read_humidity(&mut self) -> Result<f32, SensorError>;
}

/// Raw electrical level of a button pin (pull-up wiring, pressed = low).
pub trait DigitalInput {
    fn is_high(&mut self) -> bool;
}

pub trait Indicator {
    fn set(&mut self, on: bool);
}

/// MQTT publish side. QoS is fixed at "at least once" by implementations.
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), LinkError>;
    fn subscribe(&mut self, filter: &str) -> Result<(), LinkError>;
}

/// Every peripheral the line node polls.
pub struct LineIo<R, C, F, L, I> {
    pub ranger: R,
    pub climate: C,
    pub find_button: F,
    pub load_button: L,
    pub indicator: I,
}
