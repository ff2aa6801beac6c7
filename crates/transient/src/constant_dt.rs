use std::convert::Infallible;

use twine_core::transient::{SimulationClock, TimeIntegrator};
use uom::si::f64::Time;

use crate::Config;

/// A time integrator that proposes a fixed step.
///
/// A rejected step cuts the proposal by the cutback factor. Each accepted
/// step grows it by the growth factor, never past the configured step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantDt {
    dt: Time,
    current: Time,
    cutback_factor: f64,
    growth_factor: f64,
}

impl ConstantDt {
    /// Creates an integrator proposing `dt`, halving on rejection and
    /// doubling back on acceptance.
    #[must_use]
    pub fn new(dt: Time) -> Self {
        Self {
            dt,
            current: dt,
            cutback_factor: 0.5,
            growth_factor: 2.0,
        }
    }

    /// Creates an integrator from the step and factors of a config.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            cutback_factor: config.step_policy().cutback_factor(),
            growth_factor: config.growth_factor(),
            ..Self::new(config.default_dt())
        }
    }

    /// Returns the step the next attempt will propose.
    #[must_use]
    pub fn current(&self) -> Time {
        self.current
    }
}

impl TimeIntegrator for ConstantDt {
    type Error = Infallible;

    fn propose_step(&mut self, _clock: &SimulationClock) -> Result<Time, Self::Error> {
        Ok(self.current)
    }

    fn accept_step(&mut self, _clock: &SimulationClock) {
        let grown = self.current * self.growth_factor;
        self.current = if grown < self.dt { grown } else { self.dt };
    }

    fn reject_step(&mut self, clock: &SimulationClock) {
        self.current = clock.dt() * self.cutback_factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::time::second;

    use crate::Options;

    #[test]
    fn cuts_back_and_recovers() {
        let s = Time::new::<second>;
        let mut clock = SimulationClock::new(s(0.0));
        clock.start(s(1.0));
        let mut dt = ConstantDt::new(s(1.0));

        dt.reject_step(&clock);
        assert_relative_eq!(dt.current().get::<second>(), 0.5);

        clock.set_step_size(s(0.5));
        dt.reject_step(&clock);
        assert_relative_eq!(dt.current().get::<second>(), 0.25);

        dt.accept_step(&clock);
        assert_relative_eq!(dt.current().get::<second>(), 0.5);
        dt.accept_step(&clock);
        dt.accept_step(&clock);
        assert_relative_eq!(dt.current().get::<second>(), 1.0);
    }

    #[test]
    fn uses_config_step_and_factors() {
        let config = Config::try_from(Options {
            dt: Some(0.2),
            cutback_factor: 0.1,
            growth_factor: 1.5,
            ..Options::default()
        })
        .unwrap();
        let mut dt = ConstantDt::from_config(&config);
        let s = Time::new::<second>;
        let mut clock = SimulationClock::new(s(0.0));
        clock.start(s(0.2));

        dt.reject_step(&clock);
        assert_relative_eq!(dt.current().get::<second>(), 0.02, epsilon = 1e-15);
        dt.accept_step(&clock);
        assert_relative_eq!(dt.current().get::<second>(), 0.03, epsilon = 1e-15);
    }
}
