use std::time::{Duration, Instant};

use tracing::warn;
use twine_core::Observer;

use crate::traits::{CanStopEarly, HasClock};

/// Stops a run once a wall-clock budget is spent.
///
/// The budget starts counting at construction. The first event observed after
/// it runs out returns a stop action, and every later event does the same.
#[derive(Debug, Clone, Copy)]
pub struct WallClockLimit {
    started: Instant,
    budget: Duration,
    exceeded: bool,
}

impl WallClockLimit {
    /// Creates a limit that starts counting now.
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self::starting_at(Instant::now(), budget)
    }

    /// Creates a limit that counts from `started`.
    #[must_use]
    pub fn starting_at(started: Instant, budget: Duration) -> Self {
        Self {
            started,
            budget,
            exceeded: false,
        }
    }

    /// Returns whether the budget has been reported as exceeded.
    #[must_use]
    pub fn exceeded(&self) -> bool {
        self.exceeded
    }
}

impl<E: HasClock, A: CanStopEarly> Observer<E, A> for WallClockLimit {
    fn observe(&mut self, event: &E) -> Option<A> {
        if !self.exceeded && self.started.elapsed() >= self.budget {
            self.exceeded = true;
            warn!(
                budget = ?self.budget,
                step = event.clock().step(),
                "wall-clock budget exhausted, stopping"
            );
        }
        self.exceeded.then(A::stop_early)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use twine_core::transient::SimulationClock;
    use twine_transient::{Action, Event};
    use uom::si::{f64::Time, time::second};

    fn accepted(clock: &SimulationClock) -> Event<'_> {
        Event::StepAccepted {
            clock,
            relative_change: 0.1,
        }
    }

    #[test]
    fn keeps_running_within_budget() {
        let clock = SimulationClock::new(Time::new::<second>(0.0));
        let mut limit = WallClockLimit::new(Duration::from_secs(3600));

        let action: Option<Action> = limit.observe(&accepted(&clock));
        assert_eq!(action, None);
        assert!(!limit.exceeded());
    }

    #[test]
    fn stops_once_budget_is_spent() {
        let clock = SimulationClock::new(Time::new::<second>(0.0));
        let mut limit = WallClockLimit::new(Duration::ZERO);

        let action: Option<Action> = limit.observe(&accepted(&clock));
        assert_eq!(action, Some(Action::StopEarly));
        assert!(limit.exceeded());

        let again: Option<Action> = limit.observe(&accepted(&clock));
        assert_eq!(again, Some(Action::StopEarly));
    }
}
