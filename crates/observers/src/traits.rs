//! Capability traits for reusable observers.
//!
//! These traits abstract over controller-specific event and action types, so an
//! observer can be written once against the capabilities it needs.
//!
//! # Event traits
//!
//! - [`HasClock`] — events that carry the simulation clock
//!
//! # Action traits
//!
//! - [`CanStopEarly`] — actions that can signal early termination
//! - [`CanSetTargetTime`] — actions that can request a step landing on a time
//!
//! # Example
//!
//! ```rust
//! use twine_core::Observer;
//! use twine_observers::traits::{CanStopEarly, HasClock};
//! use uom::si::{f64::Time, time::second};
//!
//! struct StopAfter {
//!     time: Time,
//! }
//!
//! impl<E: HasClock, A: CanStopEarly> Observer<E, A> for StopAfter {
//!     fn observe(&mut self, event: &E) -> Option<A> {
//!         (event.clock().time() >= self.time).then(A::stop_early)
//!     }
//! }
//!
//! let _ = StopAfter { time: Time::new::<second>(10.0) };
//! ```

use twine_core::transient::SimulationClock;
use twine_transient::{Action, Event};
use uom::si::f64::Time;

/// An event that carries the simulation clock.
pub trait HasClock {
    /// Returns the clock as it stands when the event is emitted.
    fn clock(&self) -> &SimulationClock;
}

/// An action type that can signal early termination.
pub trait CanStopEarly {
    /// Returns the action that stops the run early.
    fn stop_early() -> Self;
}

/// An action type that can ask the controller to land a step on a time.
pub trait CanSetTargetTime {
    /// Returns the action that sets the target time.
    fn set_target_time(time: Time) -> Self;
}

impl HasClock for Event<'_> {
    fn clock(&self) -> &SimulationClock {
        Event::clock(self)
    }
}

impl CanStopEarly for Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}

impl CanSetTargetTime for Action {
    fn set_target_time(time: Time) -> Self {
        Self::SetTargetTime(time)
    }
}
