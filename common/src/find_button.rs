use log::info;

use crate::{
    io::{DigitalInput, Indicator},
    topics::Topic,
    types::{LineState, Publication},
};

/// Emergency ("find") button. Sampled every loop pass with no debounce
/// window: each raw level change is a state change.
#[derive(Debug, Clone, Default)]
pub struct FindButtonMonitor;

impl FindButtonMonitor {
    pub fn new() -> Self {
        Self
    }

    pub fn poll<B: DigitalInput, I: Indicator>(
        &mut self,
        button: &mut B,
        indicator: &mut I,
        state: &mut LineState,
    ) -> Option<Publication> {
        let asserted = !button.is_high();
        if asserted == state.emergency {
            return None;
        }

        state.emergency = asserted;
        info!("emergency status changed: {}", u8::from(asserted));
        indicator.set(asserted);

        Some(Publication::flag(Topic::Finding, asserted))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;

    use super::*;

    struct Levels(VecDeque<bool>);

    impl DigitalInput for Levels {
        fn is_high(&mut self) -> bool {
            self.0.pop_front().unwrap_or(true)
        }
    }

    #[derive(Default)]
    struct Led(Vec<bool>);

    impl Indicator for Led {
        fn set(&mut self, on: bool) {
            self.0.push(on);
        }
    }

    #[test]
    fn press_and_release_publish_and_drive_led() {
        let mut monitor = FindButtonMonitor::new();
        let mut state = LineState::default();
        let mut button = Levels([true, false, false, true].into_iter().collect());
        let mut led = Led::default();

        let published: Vec<_> = (0..4)
            .filter_map(|_| monitor.poll(&mut button, &mut led, &mut state))
            .collect();

        assert_eq!(
            published,
            vec![
                Publication::flag(Topic::Finding, true),
                Publication::flag(Topic::Finding, false),
            ]
        );
        assert_eq!(led.0, vec![true, false]);
        assert!(!state.emergency);
    }

    #[test]
    fn contact_bounce_is_published_verbatim() {
        // Bouncing contacts produce one publication per raw transition.
        let mut monitor = FindButtonMonitor::new();
        let mut state = LineState::default();
        let mut button = Levels([false, true, false, true, false].into_iter().collect());
        let mut led = Led::default();

        let count = (0..5)
            .filter_map(|_| monitor.poll(&mut button, &mut led, &mut state))
            .count();

        assert_eq!(count, 5);
        assert!(state.emergency);
    }
}
