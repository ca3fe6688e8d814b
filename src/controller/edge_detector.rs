use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Logical controls tracked for rising edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    ToggleConfig,
    SaveConfig,
    StopMotion,
    ResumeMotion,
    Mute,
    PlayPause,
}

/// Result of feeding one level sample into the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub control: ControlId,
    pub fired: bool,
}

/// Converts level samples into one-shot rising edges, per control
///
/// A control fires once when it goes from released to pressed and stays
/// quiet for as long as it is held. There is no shared timer: a single
/// pressed sample is enough to fire.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    states: HashMap<ControlId, bool>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, control: ControlId, level: bool) -> EdgeEvent {
        let was_pressed = self.states.entry(control).or_insert(false);
        let fired = level && !*was_pressed;
        *was_pressed = level;

        if fired {
            debug!("Rising edge on {:?}", control);
        }
        EdgeEvent { control, fired }
    }

    pub fn edge(&mut self, control: ControlId, level: bool) -> bool {
        self.observe(control, level).fired
    }
}

/// Cardinal pad directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    Up,
    Down,
    Left,
    Right,
}

impl PadDirection {
    /// Direction of a pad tuple; centered and diagonal tuples have none
    pub fn from_hat(hat: (i8, i8)) -> Option<Self> {
        match hat {
            (0, 1) => Some(PadDirection::Up),
            (0, -1) => Some(PadDirection::Down),
            (-1, 0) => Some(PadDirection::Left),
            (1, 0) => Some(PadDirection::Right),
            _ => None,
        }
    }
}

/// How a pad change is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadGate {
    /// Every change is accepted
    Immediate,
    /// Changes closer than the interval to the last accepted one are dropped
    Debounced(Duration),
}

/// Change detector over the whole pad tuple
///
/// The previous tuple always advances, so a change rejected by the debounce
/// gate is consumed rather than retried on the next tick.
#[derive(Debug, Default)]
pub struct PadChangeDetector {
    previous: (i8, i8),
    last_accepted: Option<Instant>,
}

impl PadChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new tuple when it differs from the previous one and passes the gate
    pub fn transition(&mut self, hat: (i8, i8), now: Instant, gate: PadGate) -> Option<(i8, i8)> {
        let changed = hat != self.previous;
        self.previous = hat;
        if !changed {
            return None;
        }

        match gate {
            PadGate::Immediate => Some(hat),
            PadGate::Debounced(interval) => {
                let open = match self.last_accepted {
                    Some(last) => now.saturating_duration_since(last) > interval,
                    None => true,
                };
                if open {
                    self.last_accepted = Some(now);
                    Some(hat)
                } else {
                    debug!("Pad change {:?} dropped by debounce", hat);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fires_once_per_press() {
        let mut edges = EdgeDetector::new();
        assert!(edges.edge(ControlId::Mute, true));
        assert!(!edges.edge(ControlId::Mute, true));
        assert!(!edges.edge(ControlId::Mute, true));
        assert!(!edges.edge(ControlId::Mute, false));
        assert!(edges.edge(ControlId::Mute, true));
    }

    #[test]
    fn controls_are_independent() {
        let mut edges = EdgeDetector::new();
        assert!(edges.edge(ControlId::Mute, true));
        assert!(edges.edge(ControlId::PlayPause, true));
        assert!(!edges.edge(ControlId::Mute, true));
        assert!(!edges.edge(ControlId::PlayPause, true));
        assert!(edges.edge(ControlId::ToggleConfig, true));
    }

    #[test]
    fn observe_reports_control() {
        let mut edges = EdgeDetector::new();
        let event = edges.observe(ControlId::SaveConfig, true);
        assert_eq!(
            event,
            EdgeEvent {
                control: ControlId::SaveConfig,
                fired: true
            }
        );
    }

    #[test]
    fn pad_directions() {
        assert_eq!(PadDirection::from_hat((0, 1)), Some(PadDirection::Up));
        assert_eq!(PadDirection::from_hat((0, -1)), Some(PadDirection::Down));
        assert_eq!(PadDirection::from_hat((-1, 0)), Some(PadDirection::Left));
        assert_eq!(PadDirection::from_hat((1, 0)), Some(PadDirection::Right));
        assert_eq!(PadDirection::from_hat((0, 0)), None);
        assert_eq!(PadDirection::from_hat((1, 1)), None);
    }

    #[test]
    fn immediate_gate_accepts_every_change() {
        let mut pad = PadChangeDetector::new();
        let now = Instant::now();
        assert_eq!(pad.transition((0, 1), now, PadGate::Immediate), Some((0, 1)));
        assert_eq!(pad.transition((0, 1), now, PadGate::Immediate), None);
        assert_eq!(pad.transition((0, 0), now, PadGate::Immediate), Some((0, 0)));
        assert_eq!(pad.transition((0, 1), now, PadGate::Immediate), Some((0, 1)));
    }

    #[test]
    fn debounced_gate_drops_fast_changes() {
        let gate = PadGate::Debounced(Duration::from_millis(180));
        let start = Instant::now();
        let mut pad = PadChangeDetector::new();

        // first change is always accepted
        assert_eq!(pad.transition((1, 0), start, gate), Some((1, 0)));
        // release 50ms later is consumed by the debounce
        let t1 = start + Duration::from_millis(50);
        assert_eq!(pad.transition((0, 0), t1, gate), None);
        // the rejected tuple still became the previous one
        assert_eq!(pad.transition((0, 0), t1, gate), None);
        // exactly at the interval is still too early
        let t2 = start + Duration::from_millis(180);
        assert_eq!(pad.transition((1, 0), t2, gate), None);
        // past the interval the next change goes through
        let t3 = start + Duration::from_millis(181);
        assert_eq!(pad.transition((0, 0), t3, gate), Some((0, 0)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_held_press_fires_exactly_once(repeats in 0usize..500) {
            let mut edges = EdgeDetector::new();
            let mut fired = 0;
            for _ in 0..=repeats {
                if edges.edge(ControlId::ToggleConfig, true) {
                    fired += 1;
                }
            }
            prop_assert_eq!(fired, 1);
        }

        #[test]
        fn prop_edges_count_presses(levels in proptest::collection::vec(any::<bool>(), 0..300)) {
            let mut edges = EdgeDetector::new();
            let mut previous = false;
            let mut expected = 0;
            let mut fired = 0;
            for level in levels {
                if level && !previous {
                    expected += 1;
                }
                previous = level;
                if edges.edge(ControlId::StopMotion, level) {
                    fired += 1;
                }
            }
            prop_assert_eq!(fired, expected);
        }
    }
}
