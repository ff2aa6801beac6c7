use std::convert::Infallible;

use super::SimulationClock;

/// Discrete changes to the discretization discovered during a step.
///
/// After a converged solve the time loop asks for a topology update (for
/// example, advancing a crack front through the mesh). If the topology
/// changed, the just-computed solution is invalid and the same step is solved
/// again, up to a configured number of repeats.
pub trait TopologyUpdate {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Updates the topology for the step described by `clock`.
    ///
    /// Returns whether the topology changed.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the update fails.
    fn update(&mut self, clock: &SimulationClock) -> Result<bool, Self::Error>;
}

/// Static topology: updates never change anything.
impl TopologyUpdate for () {
    type Error = Infallible;

    fn update(&mut self, _clock: &SimulationClock) -> Result<bool, Self::Error> {
        Ok(false)
    }
}
