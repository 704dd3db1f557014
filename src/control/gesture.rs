use std::time::{Duration, Instant};

use crate::control::mapping::{clamp, value_to_angle, KnobSweep, ParamRange};
use crate::control::throttle::{UpdateThrottle, DEFAULT_INTERVAL};

/*
Gesture Tracking
================

A drag session on a continuous control looks like this:

  start ──→ move ──→ move ──→ ... ──→ end | cancel
    │         │                          │
    │         └─ value updated on every  └─ final value emitted
    │            sample; emitted only       unconditionally
    │            when the throttle is open
    └─ snapshot {pointer, value}

Every move is computed from the *start* snapshot, not from the previous move,
so rounding never accumulates and dropping samples loses nothing.

Travel is measured in normalized space:

  t = clamp(t_start + delta · sensitivity / reference_span, 0, 1)

With `reference_span = 200` a 200 px drag covers the whole range. On a
linear range this is `value_start + delta · sensitivity · (max - min) / 200`;
on a log range equal travel multiplies the value by an equal ratio.

Direction:

  knob, vertical slider    delta = origin - pointer    (screen y grows down,
                                                        so up = larger)
  horizontal slider        delta = pointer - origin

Only one pointer drives a control: the pointer that started the drag owns
it until end or cancel, other touch points are ignored.
*/

/// Slow knob variant found on some panels.
pub const FINE_SENSITIVITY: f64 = 0.5;
/// Pixels of travel that sweep the full range at sensitivity 1.0.
pub const DEFAULT_REFERENCE_SPAN: f64 = 200.0;

/// A single pointer or touch reading, already reduced to one coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub id: u64,
    pub x: f64,
    pub y: f64,
}

impl PointerSample {
    /// Mouse input always uses pointer id 0.
    pub fn mouse(x: f64, y: f64) -> Self {
        Self { id: 0, x, y }
    }

    pub fn touch(id: u64, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Rotary control driven by vertical drag.
    Knob,
    Slider(Orientation),
}

/// Tunables shared by every continuous control on a panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSettings {
    pub sensitivity: f64,
    pub reference_span: f64,
    pub throttle_interval: Duration,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            reference_span: DEFAULT_REFERENCE_SPAN,
            throttle_interval: DEFAULT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragOrigin {
    pub pointer: f64,
    pub value_at_start: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    pub range: ParamRange,
    pub current_value: f64,
    pub is_dragging: bool,
    pub drag_origin: Option<DragOrigin>,
    pointer_id: Option<u64>,
}

/// One knob or slider: its state, its drag session and its update throttle.
#[derive(Debug, Clone)]
pub struct Control {
    kind: ControlKind,
    settings: GestureSettings,
    state: ControlState,
    throttle: UpdateThrottle<f64>,
}

impl Control {
    pub fn new(range: ParamRange, kind: ControlKind, initial: f64, settings: GestureSettings) -> Self {
        Self {
            kind,
            settings,
            state: ControlState {
                range,
                current_value: range.clamp(initial),
                is_dragging: false,
                drag_origin: None,
                pointer_id: None,
            },
            throttle: UpdateThrottle::new(settings.throttle_interval),
        }
    }

    pub fn knob(range: ParamRange, initial: f64, settings: GestureSettings) -> Self {
        Self::new(range, ControlKind::Knob, initial, settings)
    }

    pub fn slider(
        range: ParamRange,
        orientation: Orientation,
        initial: f64,
        settings: GestureSettings,
    ) -> Self {
        Self::new(range, ControlKind::Slider(orientation), initial, settings)
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn value(&self) -> f64 {
        self.state.current_value
    }

    pub fn is_dragging(&self) -> bool {
        self.state.is_dragging
    }

    /// Current value in [0, 1] along the control's scale.
    pub fn normalized(&self) -> f64 {
        self.state.range.normalize(self.state.current_value)
    }

    pub fn angle(&self, sweep: KnobSweep) -> f64 {
        value_to_angle(self.state.current_value, &self.state.range, sweep)
    }

    fn coordinate(&self, sample: PointerSample) -> f64 {
        match self.kind {
            ControlKind::Knob | ControlKind::Slider(Orientation::Vertical) => sample.y,
            ControlKind::Slider(Orientation::Horizontal) => sample.x,
        }
    }

    pub fn on_drag_start(&mut self, sample: PointerSample, now: Instant) {
        if self.state.is_dragging {
            tracing::debug!(
                pointer = sample.id,
                owner = ?self.state.pointer_id,
                "drag start while already dragging, ignored"
            );
            return;
        }

        self.state.is_dragging = true;
        self.state.pointer_id = Some(sample.id);
        self.state.drag_origin = Some(DragOrigin {
            pointer: self.coordinate(sample),
            value_at_start: self.state.current_value,
        });
        self.throttle.reset();
        // Start the window at the press so the first move is rate limited too.
        self.throttle.flush(self.state.current_value, now);
    }

    /// Updates the value from the drag delta. Returns the value when the
    /// throttle lets it through to the audio side.
    pub fn on_drag_move(&mut self, sample: PointerSample, now: Instant) -> Option<f64> {
        if !self.state.is_dragging || self.state.pointer_id != Some(sample.id) {
            return None;
        }
        let origin = self.state.drag_origin?;

        let position = self.coordinate(sample);
        let delta = match self.kind {
            ControlKind::Knob | ControlKind::Slider(Orientation::Vertical) => {
                origin.pointer - position
            }
            ControlKind::Slider(Orientation::Horizontal) => position - origin.pointer,
        };

        let range = self.state.range;
        let start = range.normalize(origin.value_at_start);
        let travel = delta * self.settings.sensitivity / self.settings.reference_span;
        let value = range.denormalize(clamp(start + travel, 0.0, 1.0));

        self.state.current_value = value;
        self.throttle.submit(value, now)
    }

    /// Ends the drag and returns the final value, bypassing the throttle.
    pub fn on_drag_end(&mut self, now: Instant) -> Option<f64> {
        if !self.state.is_dragging {
            return None;
        }
        self.state.is_dragging = false;
        self.state.drag_origin = None;
        self.state.pointer_id = None;
        Some(self.throttle.flush(self.state.current_value, now))
    }

    /// Touch-cancel and friends behave exactly like a normal end.
    pub fn on_drag_cancel(&mut self, now: Instant) -> Option<f64> {
        self.on_drag_end(now)
    }

    /// Programmatic change (preset load, keyboard). Ignored mid-drag.
    pub fn set_value(&mut self, value: f64) -> f64 {
        if !self.state.is_dragging && value.is_finite() {
            self.state.current_value = self.state.range.clamp(value);
        }
        self.state.current_value
    }

    /// Moves the control by a fraction of its full travel.
    pub fn nudge(&mut self, fraction: f64) -> f64 {
        let range = self.state.range;
        let t = clamp(self.normalized() + fraction, 0.0, 1.0);
        self.set_value(range.denormalize(t))
    }
}

/// Events emitted by a momentary press control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressEvent<T> {
    On(T),
    Off(T),
}

/// A momentary button (note pad). Unlike knobs it tracks the pointer only
/// while it is over the button: leaving with the button held is an
/// implicit release, so a pad can never stay stuck down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressControl<T> {
    target: T,
    pressed: bool,
}

impl<T: Copy> PressControl<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            pressed: false,
        }
    }

    pub fn target(&self) -> T {
        self.target
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn press(&mut self) -> Option<PressEvent<T>> {
        if self.pressed {
            return None;
        }
        self.pressed = true;
        Some(PressEvent::On(self.target))
    }

    /// Pointer up over the button always releases.
    pub fn release(&mut self) -> PressEvent<T> {
        self.pressed = false;
        PressEvent::Off(self.target)
    }

    pub fn leave(&mut self) -> Option<PressEvent<T>> {
        if !self.pressed {
            return None;
        }
        Some(self.release())
    }

    pub fn cancel(&mut self) -> PressEvent<T> {
        self.release()
    }
}

/// Latching on/off switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    on: bool,
}

impl Toggle {
    pub fn new(on: bool) -> Self {
        Self { on }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn flip(&mut self) -> bool {
        self.on = !self.on;
        self.on
    }

    /// Returns the new state only when it changed.
    pub fn set(&mut self, on: bool) -> Option<bool> {
        if self.on == on {
            return None;
        }
        self.on = on;
        Some(on)
    }
}
