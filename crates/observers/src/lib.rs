//! Reusable observers for the Twine framework.
//!
//! This crate provides [`Observer`] implementations and capability traits that
//! work with the transient time loop in `twine-transient`.
//!
//! # Modules
//!
//! - [`traits`] — Capability traits for reusable observers
//!   ([`HasClock`], [`CanStopEarly`], [`CanSetTargetTime`])
//!
//! # Observers
//!
//! - [`WallClockLimit`] — stops a run once a wall-clock budget is spent
//! - [`StepHistory`] — records accepted, rejected, and repeated steps
//!
//! Observers combine with closures through [`Observer`]'s blanket impl:
//!
//! ```rust
//! use std::time::Duration;
//!
//! use twine_core::Observer;
//! use twine_observers::{StepHistory, WallClockLimit};
//! use twine_transient::{Action, Event};
//!
//! let mut limit = WallClockLimit::new(Duration::from_secs(600));
//! let mut history = StepHistory::new();
//! let _observer = move |event: &Event<'_>| -> Option<Action> {
//!     history.observe(event);
//!     limit.observe(event)
//! };
//! ```
//!
//! [`Observer`]: twine_core::Observer
//! [`HasClock`]: traits::HasClock
//! [`CanStopEarly`]: traits::CanStopEarly
//! [`CanSetTargetTime`]: traits::CanSetTargetTime

pub mod traits;

mod history;
mod wall_clock;

pub use history::{StepHistory, StepKind, StepRecord};
pub use wall_clock::WallClockLimit;
