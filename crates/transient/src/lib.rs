//! Transient time-loop control for coupled simulations.
//!
//! This crate drives a [`TransientProblem`] forward in time. Each step is
//! sized by a [`StepSizer`], solved by [`Picard`] (optionally as a
//! fixed-point iteration with coupled subsystems), and then accepted,
//! rejected and retried with a smaller step, or repeated after a topology
//! change. A [`Monitor`] decides when the run ends.
//!
//! # Example
//!
//! ```ignore
//! use twine_transient::{Config, ConstantDt, Start, System, solve_unobserved};
//!
//! let config = Config::from_file("transient.toml")?;
//! let mut system = System::new(problem, ConstantDt::from_config(&config));
//!
//! let solution = solve_unobserved(&mut system, &config, Start::Cold)?;
//! println!("{:?} at t = {:?}", solution.status, solution.clock.time());
//! ```
//!
//! [`TransientProblem`]: twine_core::transient::TransientProblem

mod action;
mod checkpoint;
mod config;
mod constant_dt;
mod error;
mod event;
mod monitor;
mod options;
mod picard;
mod solution;
mod step_sizer;
mod time_loop;

#[cfg(test)]
mod test_utils;

pub use action::Action;
pub use checkpoint::{
    Checkpoint, CheckpointError, ClockRecord, ControlRecord, JsonFileCheckpoint, RecoverableState,
    STATE_VERSION, StepSizerRecord,
};
pub use config::{
    Config, ConfigError, PicardConfig, SteadyStateConfig, StepNegotiation, StepPolicy,
    TopologyConfig,
};
pub use constant_dt::ConstantDt;
pub use error::Error;
pub use event::Event;
pub use monitor::{
    Monitor, SteadyStateTracker, StepReport, Transition, l2_norm, relative_difference,
};
pub use options::{Options, OptionsError};
pub use picard::{
    ConvergenceOutcome, CouplingState, IterationContext, Picard, TopologyRepeats,
    picard_converged, relax,
};
pub use solution::{Solution, Status};
pub use step_sizer::{Constrained, StepSizer};
pub use time_loop::{Start, System, solve, solve_unobserved};
