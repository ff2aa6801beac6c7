use twine_core::Observer;
use twine_transient::{Action, Event};
use uom::si::{f64::Time, time::second};

/// What happened to a step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Accepted,
    Rejected,
    TopologyRepeat,
}

/// A single recorded transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    pub kind: StepKind,
    pub step: usize,
    /// Clock time after the transition.
    pub time: Time,
    /// The step size that was attempted.
    pub dt: Time,
}

/// Records every step transition of a transient run.
///
/// Picard iterations are ignored. The observer never returns an action.
#[derive(Debug, Clone, Default)]
pub struct StepHistory {
    records: Vec<StepRecord>,
}

impl StepHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded transitions in order.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Returns the clock times of accepted steps, in seconds.
    #[must_use]
    pub fn accepted_times(&self) -> Vec<f64> {
        self.records
            .iter()
            .filter(|record| record.kind == StepKind::Accepted)
            .map(|record| record.time.get::<second>())
            .collect()
    }

    /// Returns how many transitions of `kind` were recorded.
    #[must_use]
    pub fn count(&self, kind: StepKind) -> usize {
        self.records
            .iter()
            .filter(|record| record.kind == kind)
            .count()
    }
}

impl Observer<Event<'_>, Action> for StepHistory {
    fn observe(&mut self, event: &Event<'_>) -> Option<Action> {
        let (kind, dt) = match *event {
            Event::StepAccepted { clock, .. } => (StepKind::Accepted, clock.dt()),
            Event::StepRejected { failed_dt, .. } => (StepKind::Rejected, failed_dt),
            Event::TopologyRepeat { clock, .. } => (StepKind::TopologyRepeat, clock.dt()),
            Event::PicardIteration { .. } => return None,
        };
        let clock = event.clock();
        self.records.push(StepRecord {
            kind,
            step: clock.step(),
            time: clock.time(),
            dt,
        });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use twine_core::transient::SimulationClock;
    use twine_transient::{ConvergenceOutcome, CouplingState};

    fn s(value: f64) -> Time {
        Time::new::<second>(value)
    }

    #[test]
    fn records_transitions_in_order() {
        let mut clock = SimulationClock::new(s(0.0));
        clock.start(s(0.5));
        let mut history = StepHistory::new();

        clock.advance();
        clock.accept();
        history.observe(&Event::StepAccepted {
            clock: &clock,
            relative_change: 1.0,
        });

        history.observe(&Event::StepRejected {
            clock: &clock,
            failed_dt: s(0.5),
            outcome: ConvergenceOutcome {
                solve_converged: false,
                ..ConvergenceOutcome::default()
            },
        });

        history.observe(&Event::PicardIteration {
            clock: &clock,
            coupling: &CouplingState::default(),
        });

        assert_eq!(history.records().len(), 2);
        assert_eq!(history.count(StepKind::Accepted), 1);
        assert_eq!(history.count(StepKind::Rejected), 1);
        assert_eq!(history.count(StepKind::TopologyRepeat), 0);

        let rejected = history.records()[1];
        assert_eq!(rejected.kind, StepKind::Rejected);
        assert_relative_eq!(rejected.dt.get::<second>(), 0.5);
    }

    #[test]
    fn accepted_times_skip_other_transitions() {
        let mut clock = SimulationClock::new(s(0.0));
        clock.start(s(1.0));
        let mut history = StepHistory::new();

        for _ in 0..2 {
            clock.advance();
            clock.accept();
            history.observe(&Event::StepAccepted {
                clock: &clock,
                relative_change: 0.0,
            });
            history.observe(&Event::TopologyRepeat {
                clock: &clock,
                repeat: 1,
            });
        }

        let times = history.accepted_times();
        assert_eq!(times.len(), 2);
        assert_relative_eq!(times[0], 1.0);
        assert_relative_eq!(times[1], 2.0);
    }
}
