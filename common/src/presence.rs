use log::{debug, info};

use crate::{
    io::RangeSensor,
    topics::Topic,
    types::{LineState, Publication},
};

/// Turns ultrasonic pings into bucket presence edges.
///
/// A bucket in front of the sensor swallows the echo, so a missing echo
/// (zero distance or a failed ping) is what marks the bucket as present.
#[derive(Debug, Clone)]
pub struct PresenceDetector {
    interval_ms: u64,
    last_poll_ms: u64,
}

impl PresenceDetector {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_poll_ms: 0,
        }
    }

    pub fn poll<R: RangeSensor>(
        &mut self,
        now_ms: u64,
        ranger: &mut R,
        state: &mut LineState,
    ) -> Option<Publication> {
        if now_ms.saturating_sub(self.last_poll_ms) < self.interval_ms {
            return None;
        }
        self.last_poll_ms = now_ms;

        let present = match ranger.ping_cm() {
            Ok(distance_cm) => distance_cm == 0,
            Err(err) => {
                debug!("ranging failed ({err}); treating as no echo");
                true
            }
        };

        Self::apply(present, state)
    }

    fn apply(present: bool, state: &mut LineState) -> Option<Publication> {
        if present == state.presence {
            return None;
        }

        state.presence = present;
        state.load_confirmed = false;
        info!("bucket status changed: {}", u8::from(present));

        Some(Publication::flag(Topic::Bucket, present))
    }
}
