use serde::{Deserialize, Serialize};
use tracing::info;
use twine_core::transient::SimulationClock;
use uom::si::time::second;

use crate::{Config, Status};

/// The last transition taken by the time loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// No step has been attempted yet.
    Started,
    Accepted,
    Rejected,
    TopologyRepeat,
}

/// Tracks how much the solution changes between accepted steps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SteadyStateTracker {
    /// Relative change over the last accepted step.
    pub solution_diff_norm: f64,

    /// Norm of the solution at the last steady-state check.
    pub previous_solution_norm: f64,
}

/// What the monitor needs to know about the loop.
#[derive(Debug, Clone, Copy)]
pub struct StepReport<'a> {
    pub clock: &'a SimulationClock,
    pub transition: Transition,

    /// Whether the last attempt's solve and subsystems converged.
    pub last_solve_converged: bool,
    pub stop_requested: bool,
    pub termination_requested: bool,
    pub solution: &'a [f64],
}

/// Decides when the time loop stops.
#[derive(Debug, Clone)]
pub struct Monitor<'c> {
    config: &'c Config,
    tracker: SteadyStateTracker,
}

/// Returns the Euclidean norm of a slice.
#[must_use]
pub fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Returns `‖current - old‖ / ‖current‖`, or the absolute difference norm
/// when `current` is zero.
#[must_use]
pub fn relative_difference(current: &[f64], old: &[f64]) -> f64 {
    let diff = current
        .iter()
        .zip(old)
        .map(|(c, o)| (c - o) * (c - o))
        .sum::<f64>()
        .sqrt();
    let norm = l2_norm(current);
    if norm > 0.0 { diff / norm } else { diff }
}

impl<'c> Monitor<'c> {
    #[must_use]
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            tracker: SteadyStateTracker::default(),
        }
    }

    /// Returns the steady-state tracker.
    #[must_use]
    pub fn tracker(&self) -> &SteadyStateTracker {
        &self.tracker
    }

    /// Records the change over an accepted step and returns it.
    pub fn record_step(&mut self, current: &[f64], old: &[f64]) -> f64 {
        self.tracker.solution_diff_norm = relative_difference(current, old);
        self.tracker.solution_diff_norm
    }

    /// Checks every stop condition and returns the first that fires.
    ///
    /// Conditions are checked in priority order: external stop, steady state,
    /// step count, end time, then failed solve with abort configured.
    /// Steady state is only checked after an accepted step and once the time
    /// is past the activation time.
    pub fn check(&mut self, report: &StepReport<'_>) -> Option<Status> {
        let clock = report.clock;
        let mut stop = None;

        if report.stop_requested {
            stop = Some(Status::StoppedByObserver);
        } else if report.termination_requested {
            stop = Some(Status::TerminationRequested);
        }

        if report.transition == Transition::Accepted {
            if let Some(steady) = self.config.steady_state() {
                if clock.time() > steady.start_time() {
                    if self.tracker.solution_diff_norm < steady.tolerance() {
                        if stop.is_none() {
                            info!(
                                step = clock.step(),
                                change = self.tracker.solution_diff_norm,
                                "steady state detected"
                            );
                        }
                        stop = stop.or(Some(Status::SteadyState));
                    } else {
                        self.tracker.previous_solution_norm = l2_norm(report.solution);
                    }
                }
            }
        }

        if clock.step() > self.config.num_steps() {
            stop = stop.or(Some(Status::MaxSteps));
        }

        let time = clock.time().get::<second>();
        let end = self.config.end_time().get::<second>();
        let tol = self.config.step_policy().tolerance().get::<second>();
        if time > end || (time - end).abs() <= tol {
            stop = stop.or(Some(Status::EndTime));
        }

        if self.config.abort_on_solve_fail() && !report.last_solve_converged {
            stop = stop.or(Some(Status::SolveFailed));
        }

        stop
    }

    /// Returns `true` if no stop condition fires.
    pub fn should_continue(&mut self, report: &StepReport<'_>) -> bool {
        self.check(report).is_none()
    }

    pub(crate) fn restore(&mut self, tracker: SteadyStateTracker) {
        self.tracker = tracker;
    }
}
