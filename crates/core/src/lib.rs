//! Core traits and types for the Twine framework.
//!
//! This crate defines the shared abstractions that the transient controller,
//! observers, and user problems build on:
//!
//! - [`Observer`] — receives solver events and optionally returns control actions
//! - [`transient::SimulationClock`] — the authoritative temporal position of a run
//! - [`transient::TimeIncrement`] — a strictly positive step size
//! - [`transient::TransientProblem`], [`transient::TimeIntegrator`],
//!   [`transient::CoupledSubsystems`], [`transient::TopologyUpdate`] — the
//!   capabilities a time loop consumes from the system being simulated

mod observer;

pub mod transient;

pub use observer::Observer;
