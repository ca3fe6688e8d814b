use super::engine::TickOutput;
use super::mode::ModeController;
use super::{Action, CLICK_RIGHT, KEY_MUTE, KEY_PLAY_PAUSE};
use crate::config::Params;
use crate::controller::{ControlId, DeviceSnapshot, EdgeDetector, InputConditioner, PadDirection};
use tracing::{debug, info};

/// Turns interpreted input into actions
///
/// Owns the two flags that only matter in normal mode: whether stick
/// motion is forwarded, and whether a drag is in progress.
#[derive(Debug)]
pub struct ActionDispatcher {
    motion_active: bool,
    dragging: bool,
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self {
            motion_active: true,
            dragging: false,
        }
    }

    pub fn motion_active(&self) -> bool {
        self.motion_active
    }

    pub fn dragging(&self) -> bool {
        self.dragging
    }

    /// Applies one accepted pad direction to the configuration menu
    ///
    /// Up and down move the selection, right and left step the selected
    /// parameter.
    pub fn dispatch_config(
        &self,
        direction: PadDirection,
        modes: &mut ModeController,
        params: &mut Params,
        out: &mut TickOutput,
    ) {
        match direction {
            PadDirection::Up => {
                let selection = modes.select_next();
                debug!("Selected config item {}", selection);
            }
            PadDirection::Down => {
                let selection = modes.select_previous();
                debug!("Selected config item {}", selection);
            }
            PadDirection::Left | PadDirection::Right => {
                let item = modes.selected();
                let current = params.value_of(item.name).unwrap_or(item.min);
                let value = item.apply_step(current, direction == PadDirection::Right);
                if params.set_value(item.name, value) {
                    out.actions.push(Action::AdjustParameter {
                        name: item.name,
                        value,
                    });
                    out.notes.push(format!("{} → {}", item.name, item.format(value)));
                }
            }
        }
    }

    /// Normal mode handling for one connected tick
    ///
    /// Order: stop, resume, mute and play edges, then the pad key tap, then
    /// motion, right click and drag.
    pub fn dispatch_normal(
        &mut self,
        snapshot: &DeviceSnapshot,
        pad_change: Option<(i8, i8)>,
        edges: &mut EdgeDetector,
        conditioner: &mut InputConditioner,
        params: &Params,
        out: &mut TickOutput,
    ) {
        if edges.edge(ControlId::StopMotion, snapshot.button(params.btn_stop_mouse)) {
            self.motion_active = false;
            info!("Pointer motion stopped");
            out.notes.push("MOUSE STOPPED".to_string());
        }
        if edges.edge(ControlId::ResumeMotion, snapshot.button(params.btn_resume_mouse)) {
            self.motion_active = true;
            info!("Pointer motion resumed");
            out.notes.push("MOUSE RESUMED".to_string());
        }
        if edges.edge(ControlId::Mute, snapshot.button(params.btn_mute)) {
            out.actions.push(Action::KeyTap { code: KEY_MUTE });
            out.notes.push("MUTE".to_string());
        }
        if edges.edge(ControlId::PlayPause, snapshot.button(params.btn_play_pause)) {
            out.actions.push(Action::KeyTap {
                code: KEY_PLAY_PAUSE,
            });
            out.notes.push("PLAY/PAUSE".to_string());
        }

        if let Some(direction) = pad_change.and_then(PadDirection::from_hat) {
            let code = match direction {
                PadDirection::Up => params.hat_up_key,
                PadDirection::Down => params.hat_down_key,
                PadDirection::Right => params.hat_right_key,
                PadDirection::Left => params.hat_left_key,
            };
            out.actions.push(Action::KeyTap { code });
        }

        if !(self.motion_active && snapshot.is_connected()) {
            return;
        }

        let (dx, dy) = conditioner.step(
            snapshot.axis(params.mouse_x_axis) as f64,
            snapshot.axis(params.mouse_y_axis) as f64,
            params,
        );
        if dx != 0 || dy != 0 {
            out.actions.push(Action::Move { dx, dy });
        }

        // level triggered, repeats every tick while held
        if snapshot.button(params.btn_right_click) {
            out.actions.push(Action::Click { code: CLICK_RIGHT });
        }

        let drag_held = snapshot.button(params.btn_left_drag);
        if drag_held && !self.dragging {
            self.dragging = true;
            out.actions.push(Action::DragBegin);
        } else if !drag_held && self.dragging {
            self.dragging = false;
            out.actions.push(Action::DragEnd);
        }
    }

    /// Ends an active drag, used when the loop stops
    pub fn release_drag(&mut self) -> Option<Action> {
        if self.dragging {
            self.dragging = false;
            Some(Action::DragEnd)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(buttons: &[usize], axes: (f32, f32), hat: (i8, i8)) -> DeviceSnapshot {
        let mut pressed = vec![false; 11];
        for &b in buttons {
            pressed[b] = true;
        }
        DeviceSnapshot {
            connected: true,
            name: Some("Test Pad".to_string()),
            axes: vec![axes.0, axes.1, 0.0, 0.0],
            buttons: pressed,
            hat,
        }
    }

    struct Harness {
        dispatcher: ActionDispatcher,
        edges: EdgeDetector,
        conditioner: InputConditioner,
        params: Params,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                dispatcher: ActionDispatcher::new(),
                edges: EdgeDetector::new(),
                conditioner: InputConditioner::new(),
                params: Params::default(),
            }
        }

        fn tick(&mut self, snapshot: &DeviceSnapshot, pad: Option<(i8, i8)>) -> TickOutput {
            let mut out = TickOutput::default();
            self.dispatcher.dispatch_normal(
                snapshot,
                pad,
                &mut self.edges,
                &mut self.conditioner,
                &self.params,
                &mut out,
            );
            out
        }
    }

    #[test]
    fn drag_begins_and_ends_once() {
        let mut h = Harness::new();
        let held = connected(&[0], (0.0, 0.0), (0, 0));
        let released = connected(&[], (0.0, 0.0), (0, 0));

        assert_eq!(h.tick(&held, None).actions, vec![Action::DragBegin]);
        assert!(h.tick(&held, None).actions.is_empty());
        assert!(h.tick(&held, None).actions.is_empty());
        assert_eq!(h.tick(&released, None).actions, vec![Action::DragEnd]);
        assert!(h.tick(&released, None).actions.is_empty());
    }

    #[test]
    fn right_click_repeats_while_held() {
        let mut h = Harness::new();
        let held = connected(&[1], (0.0, 0.0), (0, 0));
        for _ in 0..3 {
            assert_eq!(
                h.tick(&held, None).actions,
                vec![Action::Click { code: CLICK_RIGHT }]
            );
        }
    }

    #[test]
    fn media_keys_fire_on_rising_edge() {
        let mut h = Harness::new();
        let both = connected(&[2, 3], (0.0, 0.0), (0, 0));
        let out = h.tick(&both, None);
        assert_eq!(
            out.actions,
            vec![
                Action::KeyTap { code: KEY_MUTE },
                Action::KeyTap {
                    code: KEY_PLAY_PAUSE
                }
            ]
        );
        assert_eq!(out.notes, vec!["MUTE", "PLAY/PAUSE"]);
        assert!(h.tick(&both, None).actions.is_empty());
    }

    #[test]
    fn pad_changes_tap_mapped_keys() {
        let mut h = Harness::new();
        let idle = connected(&[], (0.0, 0.0), (0, 0));
        assert_eq!(
            h.tick(&idle, Some((0, 1))).actions,
            vec![Action::KeyTap { code: 115 }]
        );
        assert_eq!(
            h.tick(&idle, Some((-1, 0))).actions,
            vec![Action::KeyTap { code: 165 }]
        );
        assert!(h.tick(&idle, Some((0, 0))).actions.is_empty());
        assert!(h.tick(&idle, Some((1, 1))).actions.is_empty());
    }

    #[test]
    fn stopped_motion_freezes_velocity() {
        let mut h = Harness::new();
        let push = connected(&[], (0.5, 0.0), (0, 0));
        assert_eq!(h.tick(&push, None).actions, vec![Action::Move { dx: 3, dy: 0 }]);
        let before = h.conditioner.velocity();

        let stop = connected(&[6], (0.5, 0.0), (0, 0));
        let out = h.tick(&stop, None);
        assert!(out.actions.is_empty());
        assert_eq!(out.notes, vec!["MOUSE STOPPED"]);
        assert!(!h.dispatcher.motion_active());
        assert_eq!(h.conditioner.velocity(), before);

        let resume = connected(&[5], (0.5, 0.0), (0, 0));
        let out = h.tick(&resume, None);
        assert!(h.dispatcher.motion_active());
        assert_eq!(out.notes, vec!["MOUSE RESUMED"]);
        assert!(matches!(out.actions[0], Action::Move { .. }));
    }

    #[test]
    fn max_velocity_steps_and_clamps() {
        let dispatcher = ActionDispatcher::new();
        let mut modes = ModeController::new();
        let mut params = Params::default();
        modes.select_next();
        modes.select_next();
        assert_eq!(modes.selected().name, "max_velocity");

        let mut out = TickOutput::default();
        dispatcher.dispatch_config(PadDirection::Right, &mut modes, &mut params, &mut out);
        assert_eq!(params.max_velocity, 14.0);
        assert_eq!(out.notes, vec!["max_velocity → 14"]);

        for _ in 0..10 {
            dispatcher.dispatch_config(PadDirection::Left, &mut modes, &mut params, &mut out);
        }
        assert_eq!(params.max_velocity, 4.0);

        for _ in 0..10 {
            dispatcher.dispatch_config(PadDirection::Left, &mut modes, &mut params, &mut out);
        }
        assert_eq!(params.max_velocity, 1.0);
    }

    #[test]
    fn config_navigation_wraps() {
        let dispatcher = ActionDispatcher::new();
        let mut modes = ModeController::new();
        let mut params = Params::default();
        let mut out = TickOutput::default();

        dispatcher.dispatch_config(PadDirection::Down, &mut modes, &mut params, &mut out);
        assert_eq!(modes.selected().name, "acceleration");
        dispatcher.dispatch_config(PadDirection::Up, &mut modes, &mut params, &mut out);
        assert_eq!(modes.selected().name, "sensitivity");
        assert!(out.actions.is_empty());
    }

    #[test]
    fn release_drag_only_when_dragging() {
        let mut h = Harness::new();
        assert_eq!(h.dispatcher.release_drag(), None);
        h.tick(&connected(&[0], (0.0, 0.0), (0, 0)), None);
        assert!(h.dispatcher.dragging());
        assert_eq!(h.dispatcher.release_drag(), Some(Action::DragEnd));
        assert!(!h.dispatcher.dragging());
    }
}
