use log::info;

use crate::{
    io::DigitalInput,
    topics::Topic,
    types::{LineState, Publication},
};

/// Operator "load confirmed" button.
///
/// Only armed while no bucket is detected and no confirmation is pending.
/// The button must be held continuously for longer than `hold_ms`; releasing
/// early, or the monitor being disarmed, restarts the hold.
#[derive(Debug, Clone)]
pub struct LoadButtonMonitor {
    hold_ms: u64,
    pressed_at_ms: Option<u64>,
}

impl LoadButtonMonitor {
    pub fn new(hold_ms: u64) -> Self {
        Self {
            hold_ms,
            pressed_at_ms: None,
        }
    }

    #[cfg(test)]
    fn is_pending(&self) -> bool {
        self.pressed_at_ms.is_some()
    }

    pub fn poll<B: DigitalInput>(
        &mut self,
        now_ms: u64,
        button: &mut B,
        state: &mut LineState,
    ) -> Option<Publication> {
        if state.presence || state.load_confirmed {
            self.pressed_at_ms = None;
            return None;
        }

        if button.is_high() {
            self.pressed_at_ms = None;
            return None;
        }

        let pressed_at = *self.pressed_at_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(pressed_at) <= self.hold_ms {
            return None;
        }

        state.load_confirmed = true;
        self.pressed_at_ms = None;
        info!("bucket loaded");

        Some(Publication::flag(Topic::Bucket, true))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    struct Held(bool);

    impl DigitalInput for Held {
        fn is_high(&mut self) -> bool {
            !self.0
        }
    }

    #[test]
    fn confirms_after_hold_strictly_longer_than_threshold() {
        let mut monitor = LoadButtonMonitor::new(100);
        let mut state = LineState::default();
        let mut button = Held(true);

        assert!(monitor.poll(1_000, &mut button, &mut state).is_none());
        assert!(monitor.poll(1_100, &mut button, &mut state).is_none());
        assert!(!state.load_confirmed);

        let publication = monitor.poll(1_101, &mut button, &mut state);

        assert_eq!(publication, Some(Publication::flag(Topic::Bucket, true)));
        assert!(state.load_confirmed);
    }

    #[test]
    fn early_release_restarts_hold() {
        let mut monitor = LoadButtonMonitor::new(100);
        let mut state = LineState::default();

        monitor.poll(1_000, &mut Held(true), &mut state);
        monitor.poll(1_090, &mut Held(true), &mut state);
        monitor.poll(1_095, &mut Held(false), &mut state);
        assert!(!monitor.is_pending());

        assert!(monitor.poll(1_150, &mut Held(true), &mut state).is_none());
        assert!(monitor.poll(1_200, &mut Held(true), &mut state).is_none());
        assert!(!state.load_confirmed);
        assert!(monitor.poll(1_251, &mut Held(true), &mut state).is_some());
    }

    #[test]
    fn disarmed_while_bucket_present() {
        let mut monitor = LoadButtonMonitor::new(100);
        let mut state = LineState {
            presence: true,
            ..LineState::default()
        };
        let mut button = Held(true);

        for now_ms in (0..1_000).step_by(50) {
            assert!(monitor.poll(now_ms, &mut button, &mut state).is_none());
        }
        assert!(!state.load_confirmed);
        assert!(!monitor.is_pending());
    }

    #[test]
    fn confirmation_is_absorbing() {
        let mut monitor = LoadButtonMonitor::new(100);
        let mut state = LineState::default();
        let mut button = Held(true);

        monitor.poll(0, &mut button, &mut state);
        assert!(monitor.poll(101, &mut button, &mut state).is_some());

        for now_ms in (150..2_000).step_by(50) {
            assert!(monitor.poll(now_ms, &mut button, &mut state).is_none());
        }
    }

    #[test]
    fn hold_interrupted_by_bucket_does_not_carry_over() {
        let mut monitor = LoadButtonMonitor::new(100);
        let mut state = LineState::default();
        let mut button = Held(true);

        monitor.poll(0, &mut button, &mut state);
        state.presence = true;
        monitor.poll(60, &mut button, &mut state);
        state.presence = false;

        assert!(monitor.poll(120, &mut button, &mut state).is_none());
        assert!(monitor.poll(220, &mut button, &mut state).is_none());
        assert!(monitor.poll(221, &mut button, &mut state).is_some());
    }
}
