//! Shared fixtures for time loop tests.

use std::{collections::VecDeque, convert::Infallible};

use twine_core::transient::{
    CoupledSubsystems, ExecPoint, Phase, SimulationClock, TimeIntegrator, TopologyUpdate,
    TransientProblem,
};
use uom::si::{f64::Time, time::second};

/// Exponential relaxation of a scalar toward a target.
///
/// Solves fail for steps larger than `max_stable_dt`, standing in for a
/// nonlinear solve that diverges on large steps.
#[derive(Debug, Clone)]
pub(crate) struct Decay {
    pub solution: Vec<f64>,
    pub old: Vec<f64>,
    pub target: f64,
    pub max_stable_dt: f64,
    /// Overrides the solve result with a fixed value.
    pub solve_to: Option<f64>,
    /// Residual norms returned in order, then 1.0.
    pub residuals: VecDeque<f64>,
    pub terminate_after_solves: Option<usize>,
    pub solves: usize,
    pub residual_calls: usize,
    pub advances: usize,
    pub restores: usize,
    pub executed: Vec<ExecPoint>,
    pub outputs: Vec<ExecPoint>,
}

impl Decay {
    pub fn new(initial: f64, target: f64) -> Self {
        Self {
            solution: vec![initial],
            old: vec![initial],
            target,
            max_stable_dt: f64::INFINITY,
            solve_to: None,
            residuals: VecDeque::new(),
            terminate_after_solves: None,
            solves: 0,
            residual_calls: 0,
            advances: 0,
            restores: 0,
            executed: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_residuals(self, norms: &[f64]) -> Self {
        Self {
            residuals: norms.iter().copied().collect(),
            ..self
        }
    }

    pub fn with_max_stable_dt(self, max_stable_dt: f64) -> Self {
        Self {
            max_stable_dt,
            ..self
        }
    }

    pub fn count_outputs(&self, point: ExecPoint) -> usize {
        self.outputs.iter().filter(|&&p| p == point).count()
    }
}

impl TransientProblem for Decay {
    type Error = Infallible;

    fn solve(&mut self, clock: &SimulationClock) -> Result<bool, Self::Error> {
        self.solves += 1;

        let dt = clock.dt().get::<second>();
        if dt > self.max_stable_dt {
            return Ok(false);
        }

        self.solution = match self.solve_to {
            Some(value) => vec![value; self.old.len()],
            None => self
                .old
                .iter()
                .map(|old| old + (self.target - old) * (1.0 - (-dt).exp()))
                .collect(),
        };
        Ok(true)
    }

    fn residual_norm(&mut self, _clock: &SimulationClock) -> Result<f64, Self::Error> {
        self.residual_calls += 1;
        Ok(self.residuals.pop_front().unwrap_or(1.0))
    }

    fn solution(&self) -> &[f64] {
        &self.solution
    }

    fn solution_mut(&mut self) -> &mut [f64] {
        &mut self.solution
    }

    fn old_solution(&self) -> &[f64] {
        &self.old
    }

    fn advance_state(&mut self) -> Result<(), Self::Error> {
        self.advances += 1;
        self.old.clone_from(&self.solution);
        Ok(())
    }

    fn restore_solution(&mut self) -> Result<(), Self::Error> {
        self.restores += 1;
        self.solution.clone_from(&self.old);
        Ok(())
    }

    fn execute(&mut self, point: ExecPoint, _clock: &SimulationClock) -> Result<(), Self::Error> {
        self.executed.push(point);
        Ok(())
    }

    fn output(&mut self, point: ExecPoint, _clock: &SimulationClock) -> Result<(), Self::Error> {
        self.outputs.push(point);
        Ok(())
    }

    fn termination_requested(&self) -> bool {
        self.terminate_after_solves
            .is_some_and(|limit| self.solves >= limit)
    }
}

/// A coupled subsystem whose state is a counter bumped by every exchange.
#[derive(Debug, Default)]
pub(crate) struct Relay {
    pub value: i64,
    pub saved: i64,
    /// Number of begin exchanges that report non-convergence.
    pub diverge_begin: usize,
    pub min_step: Option<f64>,
    pub exchanges: usize,
    pub snapshots: usize,
    pub restores: usize,
    pub finished: usize,
    pub advanced: usize,
}

impl CoupledSubsystems for Relay {
    type Error = Infallible;

    fn exchange(
        &mut self,
        phase: Phase,
        _clock: &SimulationClock,
        _allow_single_iteration: bool,
    ) -> Result<bool, Self::Error> {
        self.exchanges += 1;
        self.value += 1;
        if phase == Phase::Begin && self.diverge_begin > 0 {
            self.diverge_begin -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn snapshot(&mut self, _phase: Phase) -> Result<(), Self::Error> {
        self.snapshots += 1;
        self.saved = self.value;
        Ok(())
    }

    fn restore(&mut self, _phase: Phase) -> Result<(), Self::Error> {
        self.restores += 1;
        self.value = self.saved;
        Ok(())
    }

    fn minimum_acceptable_step(&self, phase: Phase) -> Option<Time> {
        match phase {
            Phase::Begin => self.min_step.map(Time::new::<second>),
            Phase::End => None,
        }
    }

    fn finish_step(&mut self, _phase: Phase) -> Result<(), Self::Error> {
        self.finished += 1;
        Ok(())
    }

    fn advance_step(&mut self, _phase: Phase) -> Result<(), Self::Error> {
        self.advanced += 1;
        Ok(())
    }
}

/// A topology that changes a fixed number of times.
#[derive(Debug)]
pub(crate) struct Cracks {
    remaining: usize,
    pub calls: usize,
}

impl Cracks {
    pub fn new(changes: usize) -> Self {
        Self {
            remaining: changes,
            calls: 0,
        }
    }
}

impl TopologyUpdate for Cracks {
    type Error = Infallible;

    fn update(&mut self, _clock: &SimulationClock) -> Result<bool, Self::Error> {
        self.calls += 1;
        if self.remaining > 0 {
            self.remaining -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Proposes a step that doubles on every call.
#[derive(Debug)]
pub(crate) struct Doubling {
    pub next: f64,
    pub proposals: usize,
}

impl TimeIntegrator for Doubling {
    type Error = Infallible;

    fn propose_step(&mut self, _clock: &SimulationClock) -> Result<Time, Self::Error> {
        self.proposals += 1;
        let dt = self.next;
        self.next *= 2.0;
        Ok(Time::new::<second>(dt))
    }
}
