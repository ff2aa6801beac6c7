use thiserror::Error;
use uom::si::{f64::Time, time::second};

/// The temporal position of a transient run.
///
/// A `SimulationClock` tracks the time of the step being attempted (`time`),
/// the time of the last accepted step (`time_old`), the index of the step being
/// attempted, and the current and previous step sizes.
///
/// The clock is owned by the time loop and handed to collaborators by shared
/// reference. Its mutating methods mirror the transitions of a step:
///
/// - [`set_step_size`](Self::set_step_size) records the constrained size.
/// - [`advance`](Self::advance) provisionally moves `time` to `time_old + dt`.
/// - [`accept`](Self::accept) commits the step.
/// - [`rollback`](Self::rollback) discards a provisional step.
///
/// `time_old <= time` holds at all times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    time: Time,
    time_old: Time,
    step: usize,
    dt: Time,
    dt_old: Time,
}

/// Errors that can occur when rebuilding a clock from stored values.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ClockError {
    #[error("time_old ({time_old} s) is after time ({time} s)")]
    TimeReversed { time: f64, time_old: f64 },

    #[error("clock values must be finite")]
    NotFinite,
}

impl SimulationClock {
    /// Creates a clock at `start` with step index zero and no step size.
    #[must_use]
    pub fn new(start: Time) -> Self {
        let zero = Time::new::<second>(0.0);
        Self {
            time: start,
            time_old: start,
            step: 0,
            dt: zero,
            dt_old: zero,
        }
    }

    /// Rebuilds a clock from previously stored values.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TimeReversed`] if `time_old > time`, or
    /// [`ClockError::NotFinite`] if any value is NaN or infinite.
    pub fn from_parts(
        time: Time,
        time_old: Time,
        step: usize,
        dt: Time,
        dt_old: Time,
    ) -> Result<Self, ClockError> {
        let values = [time, time_old, dt, dt_old].map(|t| t.get::<second>());
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ClockError::NotFinite);
        }
        if time_old > time {
            return Err(ClockError::TimeReversed {
                time: values[0],
                time_old: values[1],
            });
        }

        Ok(Self {
            time,
            time_old,
            step,
            dt,
            dt_old,
        })
    }

    /// Returns the time of the step being attempted.
    #[must_use]
    pub fn time(&self) -> Time {
        self.time
    }

    /// Returns the time of the last accepted step.
    #[must_use]
    pub fn time_old(&self) -> Time {
        self.time_old
    }

    /// Returns the index of the step being attempted.
    #[must_use]
    pub fn step(&self) -> usize {
        self.step
    }

    /// Returns the current step size.
    #[must_use]
    pub fn dt(&self) -> Time {
        self.dt
    }

    /// Returns the step size used before the current one.
    #[must_use]
    pub fn dt_old(&self) -> Time {
        self.dt_old
    }

    /// Records a new step size, shifting the current one into `dt_old`.
    pub fn set_step_size(&mut self, dt: Time) {
        self.dt_old = self.dt;
        self.dt = dt;
    }

    /// Marks the previous step size as equal to the current one.
    ///
    /// Used when resuming, where no new step size is proposed.
    pub fn carry_step_size(&mut self) {
        self.dt_old = self.dt;
    }

    /// Provisionally moves `time` to `time_old + dt`.
    pub fn advance(&mut self) {
        self.time = self.time_old + self.dt;
    }

    /// Commits the provisional step: `time_old` catches up and the step index
    /// is incremented.
    pub fn accept(&mut self) {
        self.time_old = self.time;
        self.step += 1;
    }

    /// Discards the provisional step by moving `time` back to `time_old`.
    pub fn rollback(&mut self) {
        self.time = self.time_old;
    }

    /// Starts the first step of a cold start with the given step size.
    pub fn start(&mut self, dt: Time) {
        self.set_step_size(dt);
        self.step = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn s(value: f64) -> Time {
        Time::new::<second>(value)
    }

    #[test]
    fn new_clock_is_at_start() {
        let clock = SimulationClock::new(s(2.0));

        assert_eq!(clock.time(), s(2.0));
        assert_eq!(clock.time_old(), s(2.0));
        assert_eq!(clock.step(), 0);
        assert_eq!(clock.dt(), s(0.0));
    }

    #[test]
    fn advance_then_accept_moves_both_times() {
        let mut clock = SimulationClock::new(s(0.0));
        clock.start(s(0.5));

        clock.advance();
        assert_relative_eq!(clock.time().get::<second>(), 0.5);
        assert_relative_eq!(clock.time_old().get::<second>(), 0.0);

        clock.accept();
        assert_relative_eq!(clock.time_old().get::<second>(), 0.5);
        assert_eq!(clock.step(), 2);
    }

    #[test]
    fn rollback_restores_time_exactly() {
        let mut clock = SimulationClock::new(s(1.0));
        clock.start(s(0.3));
        clock.advance();
        clock.rollback();

        assert_eq!(clock.time(), clock.time_old());
        assert_eq!(clock.step(), 1);
    }

    #[test]
    fn set_step_size_shifts_previous() {
        let mut clock = SimulationClock::new(s(0.0));
        clock.set_step_size(s(1.0));
        clock.set_step_size(s(2.0));

        assert_eq!(clock.dt(), s(2.0));
        assert_eq!(clock.dt_old(), s(1.0));
    }

    #[test]
    fn from_parts_rejects_reversed_time() {
        let err = SimulationClock::from_parts(s(1.0), s(2.0), 3, s(0.1), s(0.1)).unwrap_err();
        assert!(matches!(err, ClockError::TimeReversed { .. }));
    }

    #[test]
    fn from_parts_rejects_nan() {
        let err = SimulationClock::from_parts(s(f64::NAN), s(0.0), 1, s(0.1), s(0.1)).unwrap_err();
        assert_eq!(err, ClockError::NotFinite);
    }
}
