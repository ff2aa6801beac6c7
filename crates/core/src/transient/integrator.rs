use uom::si::f64::Time;

use super::SimulationClock;

/// Proposes step sizes for a time loop.
///
/// A `TimeIntegrator` owns the step-size estimate of a time-integration
/// scheme. The time loop asks it for a preferred step, constrains that
/// proposal, and reports back whether the step was accepted or rejected so
/// the estimate can grow or shrink.
///
/// A rejected step must lead to a smaller proposal. The time loop enforces
/// this even for integrators that ignore [`reject_step`](Self::reject_step).
pub trait TimeIntegrator {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Proposes the size of the next step.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if no step can be proposed.
    fn propose_step(&mut self, clock: &SimulationClock) -> Result<Time, Self::Error>;

    /// Notifies the integrator that the step described by `clock` was accepted.
    fn accept_step(&mut self, _clock: &SimulationClock) {}

    /// Notifies the integrator that the step described by `clock` was rejected.
    fn reject_step(&mut self, _clock: &SimulationClock) {}
}
