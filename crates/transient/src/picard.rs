use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use twine_core::transient::{
    CoupledSubsystems, ExecPoint, Phase, SimulationClock, TopologyUpdate, TransientProblem,
};

use crate::{Error, Event, PicardConfig, TopologyConfig};

/// Fixed-point iteration bookkeeping for the current step.
///
/// Reset once at the start of every step by [`Picard::run_step`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouplingState {
    /// Index of the current sub-iteration.
    pub iteration: usize,
    pub converged: bool,

    /// Residual norm before the first sub-iteration, used as the denominator
    /// of the relative convergence test.
    pub initial_norm: f64,
    pub begin_norm: f64,
    pub end_norm: f64,
}

/// Topology-change repeats of the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyRepeats {
    /// Number of topology changes seen during this step.
    pub count: usize,

    /// `true` if the last solve changed the topology and must be repeated.
    pub pending: bool,
}

/// The result of one solve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceOutcome {
    pub solve_converged: bool,
    pub subsystems_converged: bool,
    pub topology_changed: bool,
}

/// Whether a sub-iteration starts a step or continues one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationContext {
    /// The first solve of a step.
    FirstOfStep,

    /// A repeated solve of the same step. Relaxation applies.
    Continuation,
}

/// Runs the coupled solve of each step.
///
/// With `max_iterations == 1` each step is solved once. With more, the
/// subsystem exchange and the solve are repeated until the residual norms
/// pass the Picard test or the iterations run out. Subsystem state is rolled
/// back to the start of the step before every repeat.
#[derive(Debug, Clone)]
pub struct Picard<'c> {
    config: &'c PicardConfig,
    topology: &'c TopologyConfig,
    state: CouplingState,
    repeats: TopologyRepeats,
    relaxed_dofs: Vec<usize>,
}

impl ConvergenceOutcome {
    /// Returns `true` if both the solve and the subsystems converged.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.solve_converged && self.subsystems_converged
    }

    /// Returns `true` if the step can be accepted.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.converged() && !self.topology_changed
    }

    fn failed_begin_exchange() -> Self {
        Self {
            solve_converged: false,
            subsystems_converged: false,
            topology_changed: false,
        }
    }
}

impl Default for ConvergenceOutcome {
    fn default() -> Self {
        Self {
            solve_converged: true,
            subsystems_converged: true,
            topology_changed: false,
        }
    }
}

impl CouplingState {
    /// Returns the larger of the begin and end residual norms.
    #[must_use]
    pub fn max_norm(&self) -> f64 {
        self.begin_norm.max(self.end_norm)
    }
}

/// Tests the Picard convergence criterion.
///
/// Converged when `max(begin, end) < abs_tol` or
/// `max(begin, end) / initial < rel_tol`.
///
/// ```
/// use twine_transient::picard_converged;
///
/// assert!(picard_converged(10.0, 0.1, 0.05, 0.1, 1e-50));
/// assert!(!picard_converged(10.0, 5.0, 6.0, 0.1, 1e-50));
/// ```
#[must_use]
pub fn picard_converged(initial: f64, begin: f64, end: f64, rel_tol: f64, abs_tol: f64) -> bool {
    let norm = begin.max(end);
    norm < abs_tol || norm / initial < rel_tol
}

/// Blends a new solution with the previous one at the given indices.
///
/// Each entry becomes `old * (1 - factor) + new * factor`. Indices outside
/// either slice are ignored.
pub fn relax(solution: &mut [f64], previous: &[f64], dofs: &[usize], factor: f64) {
    for &i in dofs {
        if let (Some(new), Some(&old)) = (solution.get_mut(i), previous.get(i)) {
            *new = old * (1.0 - factor) + *new * factor;
        }
    }
}

impl<'c> Picard<'c> {
    #[must_use]
    pub fn new(config: &'c PicardConfig, topology: &'c TopologyConfig) -> Self {
        Self {
            config,
            topology,
            state: CouplingState::default(),
            repeats: TopologyRepeats::default(),
            relaxed_dofs: Vec::new(),
        }
    }

    /// Returns the coupling state of the current step.
    #[must_use]
    pub fn coupling(&self) -> &CouplingState {
        &self.state
    }

    /// Returns the topology repeats of the current step.
    #[must_use]
    pub fn repeats(&self) -> TopologyRepeats {
        self.repeats
    }

    /// Solves the step of size `clock.dt()` starting from `clock.time_old()`.
    ///
    /// Subsystems are snapshotted before the first sub-iteration and restored
    /// before each later one. Sub-iteration stops early when a solve or
    /// exchange fails, when the topology changes, or when the Picard test
    /// passes.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator fails. Non-convergence is reported
    /// through the returned [`ConvergenceOutcome`].
    pub fn run_step<P, C, U, N>(
        &mut self,
        clock: &mut SimulationClock,
        problem: &mut P,
        subsystems: &mut C,
        topology: &mut U,
        notify: &mut N,
    ) -> Result<ConvergenceOutcome, Error>
    where
        P: TransientProblem,
        C: CoupledSubsystems,
        U: TopologyUpdate,
        N: FnMut(&Event<'_>),
    {
        self.state.iteration = 0;
        self.state.converged = false;

        for phase in Phase::ALL {
            subsystems.snapshot(phase).map_err(Error::subsystems)?;
        }

        let mut outcome = ConvergenceOutcome::default();
        while self.state.iteration < self.config.max_iterations() {
            let context = if self.state.iteration == 0 {
                IterationContext::FirstOfStep
            } else {
                for phase in Phase::ALL {
                    subsystems.restore(phase).map_err(Error::subsystems)?;
                }
                IterationContext::Continuation
            };

            outcome = self.run_iteration(context, clock, problem, subsystems, topology, notify)?;
            if !outcome.converged() || outcome.topology_changed || self.state.converged {
                break;
            }
            self.state.iteration += 1;
        }

        Ok(outcome)
    }

    /// Runs a single sub-iteration.
    ///
    /// Drivers that repeat a step themselves call this directly, passing
    /// [`IterationContext::Continuation`] for every solve after the first so
    /// relaxation applies.
    ///
    /// With sub-iteration enabled, [`Event::PicardIteration`] is sent once per
    /// call, however the iteration ends. Norms not measured by an iteration
    /// that ended early keep their previous values.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator fails.
    pub fn run_iteration<P, C, U, N>(
        &mut self,
        context: IterationContext,
        clock: &mut SimulationClock,
        problem: &mut P,
        subsystems: &mut C,
        topology: &mut U,
        notify: &mut N,
    ) -> Result<ConvergenceOutcome, Error>
    where
        P: TransientProblem,
        C: CoupledSubsystems,
        U: TopologyUpdate,
        N: FnMut(&Event<'_>),
    {
        let outcome = self.iterate(context, clock, problem, subsystems, topology)?;
        if self.config.is_enabled() {
            notify(&Event::PicardIteration {
                clock,
                coupling: &self.state,
            });
        }
        Ok(outcome)
    }

    fn iterate<P, C, U>(
        &mut self,
        context: IterationContext,
        clock: &mut SimulationClock,
        problem: &mut P,
        subsystems: &mut C,
        topology: &mut U,
    ) -> Result<ConvergenceOutcome, Error>
    where
        P: TransientProblem,
        C: CoupledSubsystems,
        U: TopologyUpdate,
    {
        let sub_iterating = self.config.is_enabled();
        let single = !sub_iterating;

        clock.advance();

        if context == IterationContext::FirstOfStep {
            problem
                .execute(ExecPoint::TimestepBegin, clock)
                .map_err(Error::problem)?;
        }

        if sub_iterating {
            info!(step = clock.step(), iteration = self.state.iteration, "Picard iteration");
            if context == IterationContext::FirstOfStep {
                self.state.initial_norm = problem.residual_norm(clock).map_err(Error::problem)?;
                debug!(norm = self.state.initial_norm, "initial residual");
            }
        }

        if !subsystems
            .exchange(Phase::Begin, clock, single)
            .map_err(Error::subsystems)?
        {
            warn!(step = clock.step(), "begin-of-step subsystems did not converge");
            return Ok(ConvergenceOutcome::failed_begin_exchange());
        }

        if self.topology.update_at_step_begin() {
            topology.update(clock).map_err(Error::topology)?;
        }

        if sub_iterating {
            self.state.begin_norm = problem.residual_norm(clock).map_err(Error::problem)?;
        }

        let relaxing = context == IterationContext::Continuation && self.config.relaxes();
        let previous = if relaxing {
            self.relaxed_dofs = if self.config.relaxed_variables().is_empty() {
                (0..problem.solution().len()).collect()
            } else {
                problem.dof_indices(self.config.relaxed_variables())
            };
            Some(problem.solution().to_vec())
        } else {
            None
        };

        let mut outcome = ConvergenceOutcome {
            solve_converged: problem.solve(clock).map_err(Error::problem)?,
            ..ConvergenceOutcome::default()
        };

        if let Some(previous) = previous {
            relax(
                problem.solution_mut(),
                &previous,
                &self.relaxed_dofs,
                self.config.relaxation_factor(),
            );
        }

        if !outcome.solve_converged {
            warn!(step = clock.step(), dt = ?clock.dt(), "solve did not converge");
            problem
                .output(ExecPoint::Failed, clock)
                .map_err(Error::problem)?;
            return Ok(outcome);
        }

        if self.repeats.count < self.topology.max_updates()
            && topology.update(clock).map_err(Error::topology)?
        {
            self.repeats.count += 1;
            self.repeats.pending = true;
            outcome.topology_changed = true;
            info!(
                step = clock.step(),
                repeat = self.repeats.count,
                "topology changed during solve"
            );
            return Ok(outcome);
        }
        self.repeats.pending = false;

        problem
            .execute(ExecPoint::TimestepEnd, clock)
            .map_err(Error::problem)?;

        outcome.subsystems_converged = subsystems
            .exchange(Phase::End, clock, single)
            .map_err(Error::subsystems)?;
        if !outcome.subsystems_converged {
            warn!(step = clock.step(), "end-of-step subsystems did not converge");
            return Ok(outcome);
        }

        if sub_iterating {
            self.state.end_norm = problem.residual_norm(clock).map_err(Error::problem)?;
            if picard_converged(
                self.state.initial_norm,
                self.state.begin_norm,
                self.state.end_norm,
                self.config.rel_tol(),
                self.config.abs_tol(),
            ) {
                self.state.converged = true;
                info!(
                    step = clock.step(),
                    iterations = self.state.iteration + 1,
                    norm = self.state.max_norm(),
                    "Picard converged"
                );
            }
        }

        Ok(outcome)
    }

    /// Clears the Picard flag at the end of a step attempt.
    pub(crate) fn end_step(&mut self) {
        self.state.converged = false;
    }

    /// Resets the topology repeats after an accepted step.
    pub(crate) fn reset_repeats(&mut self) {
        self.repeats = TopologyRepeats::default();
    }

    pub(crate) fn restore(&mut self, state: CouplingState, repeats: TopologyRepeats) {
        self.state = state;
        self.repeats = repeats;
    }
}
