use super::SimulationClock;

/// Points in a time step at which a problem may execute user objects or
/// produce output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecPoint {
    /// Once, before the first step.
    Initial,

    /// At the start of each step, before the begin exchange.
    TimestepBegin,

    /// After a converged solve, or after an accepted step for output.
    TimestepEnd,

    /// After a solve that did not converge.
    Failed,

    /// Once, when the run is finalized.
    Final,
}

/// The nonlinear problem solved at each time step.
///
/// A `TransientProblem` owns the solution field and performs the solve for
/// the step described by a [`SimulationClock`]. Non-convergence is an ordinary
/// outcome (`Ok(false)`) that the time loop answers by cutting the step; an
/// `Err` is a hard failure that aborts the run.
///
/// The solution is exposed as flat slices so the time loop can apply Picard
/// relaxation and measure how far the solution moved between steps without
/// knowing how the field is discretized.
pub trait TransientProblem {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Solves the nonlinear problem at `clock.time()` with step `clock.dt()`.
    ///
    /// Returns whether the solve converged.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the solve fails in a way that retrying with
    /// a smaller step cannot fix.
    fn solve(&mut self, clock: &SimulationClock) -> Result<bool, Self::Error>;

    /// Computes the global residual norm for the current solution.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the residual cannot be evaluated.
    fn residual_norm(&mut self, clock: &SimulationClock) -> Result<f64, Self::Error>;

    /// Returns the current solution.
    fn solution(&self) -> &[f64];

    /// Returns the current solution for in-place modification.
    fn solution_mut(&mut self) -> &mut [f64];

    /// Returns the solution at the last accepted step.
    fn old_solution(&self) -> &[f64];

    /// Makes the current solution the old solution after a step is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the state cannot be advanced.
    fn advance_state(&mut self) -> Result<(), Self::Error>;

    /// Resets the current solution to the old solution after a step is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the state cannot be restored.
    fn restore_solution(&mut self) -> Result<(), Self::Error>;

    /// Returns the solution indices belonging to the named variables.
    ///
    /// The default treats the solution as a single unnamed field and returns
    /// every index regardless of `variables`.
    fn dof_indices(&self, variables: &[String]) -> Vec<usize> {
        let _ = variables;
        (0..self.solution().len()).collect()
    }

    /// Executes user objects at the given point of the step.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if execution fails.
    fn execute(&mut self, _point: ExecPoint, _clock: &SimulationClock) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Produces output at the given point of the step.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if output fails.
    fn output(&mut self, _point: ExecPoint, _clock: &SimulationClock) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Returns `true` if the problem asks the run to stop at the next
    /// opportunity (a wall-clock limit, a user abort, ...).
    fn termination_requested(&self) -> bool {
        false
    }
}
