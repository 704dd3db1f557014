//! Turning pointer gestures into bounded, rate-limited parameter values.
//!
//! Everything here is plain data plus methods: no timers, no callbacks. The
//! host feeds pointer samples and timestamps in, and forwards whatever
//! values come out to the parameter store / audio graph.

/// Drag sessions for knobs and sliders, plus press and toggle controls.
pub mod gesture;
/// Pure range, scale, angle and gain conversions.
pub mod mapping;
/// At-most-one-update-per-interval gate.
pub mod throttle;

pub use gesture::{
    Control, ControlKind, ControlState, GestureSettings, Orientation, PointerSample, PressControl,
    PressEvent, Toggle,
};
pub use mapping::{KnobSweep, ParamRange, Scale, Unit};
pub use throttle::UpdateThrottle;
