//! Abstractions for transient (time-dependent) simulation.
//!
//! A time loop advances a [`SimulationClock`] by solving a nonlinear problem at
//! each step. The loop itself never sees the discretization: it works through
//! the capability traits defined here.
//!
//! - [`TransientProblem`] — the nonlinear solve and the solution field it owns
//! - [`TimeIntegrator`] — proposes step sizes and learns from accepted or
//!   rejected steps
//! - [`CoupledSubsystems`] — subsystems exchanged with at step begin and end,
//!   with snapshot/restore for fixed-point iteration and rejection
//! - [`TopologyUpdate`] — discrete changes to the discretization that force a
//!   step to be repeated
//!
//! The unit type `()` implements [`CoupledSubsystems`] and [`TopologyUpdate`]
//! for systems without coupling or evolving topology.

mod clock;
mod integrator;
mod problem;
mod subsystems;
mod time_increment;
mod topology;

pub use clock::{ClockError, SimulationClock};
pub use integrator::TimeIntegrator;
pub use problem::{ExecPoint, TransientProblem};
pub use subsystems::{CoupledSubsystems, Phase};
pub use time_increment::{TimeIncrement, TimeIncrementError};
pub use topology::TopologyUpdate;
