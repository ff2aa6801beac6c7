use std::{fmt, ops::Add};

use thiserror::Error;
use uom::{
    Conversion,
    si::{
        f64::Time,
        time::{self, second},
    },
};

/// A unit-safe, strictly positive step size.
///
/// A time loop can only make progress with a positive step, so proposals from
/// a [`TimeIntegrator`](super::TimeIntegrator) pass through `TimeIncrement`
/// before the first step is taken. Zero, negative, and non-finite values are
/// rejected.
///
/// ```
/// use twine_core::transient::TimeIncrement;
/// use uom::si::time::second;
///
/// let dt = TimeIncrement::new::<second>(0.25).unwrap();
/// assert_eq!(dt.seconds(), 0.25);
///
/// assert!(TimeIncrement::new::<second>(0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeIncrement(Time);

/// Error returned when constructing an invalid [`TimeIncrement`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimeIncrementError {
    #[error("time increment must be greater than zero, got {0} s")]
    NotPositive(f64),

    #[error("time increment must be finite, got {0} s")]
    NotFinite(f64),
}

impl TimeIncrement {
    /// Constructs a `TimeIncrement` from a value in the unit `U`.
    ///
    /// # Errors
    ///
    /// Returns [`TimeIncrementError`] if the value is not strictly positive
    /// and finite.
    pub fn new<U>(value: f64) -> Result<Self, TimeIncrementError>
    where
        U: time::Unit + Conversion<f64, T = f64>,
    {
        Self::from_time(Time::new::<U>(value))
    }

    /// Constructs a `TimeIncrement` from an existing [`Time`].
    ///
    /// # Errors
    ///
    /// Returns [`TimeIncrementError`] if the time is not strictly positive
    /// and finite.
    pub fn from_time(time: Time) -> Result<Self, TimeIncrementError> {
        let seconds = time.get::<second>();
        if !seconds.is_finite() {
            Err(TimeIncrementError::NotFinite(seconds))
        } else if seconds > 0.0 {
            Ok(Self(time))
        } else {
            Err(TimeIncrementError::NotPositive(seconds))
        }
    }

    /// Returns the increment in seconds.
    #[must_use]
    pub fn seconds(&self) -> f64 {
        self.0.get::<second>()
    }

    /// Returns the increment scaled by a positive factor.
    ///
    /// # Errors
    ///
    /// Returns [`TimeIncrementError`] if the scaled value is not strictly
    /// positive and finite.
    pub fn scaled(self, factor: f64) -> Result<Self, TimeIncrementError> {
        Self::from_time(self.0 * factor)
    }

    /// Returns the smaller of two increments.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if other.0 < self.0 { other } else { self }
    }

    /// Consumes the increment and returns the underlying [`Time`].
    #[must_use]
    pub fn into_inner(self) -> Time {
        self.0
    }
}

impl TryFrom<Time> for TimeIncrement {
    type Error = TimeIncrementError;

    fn try_from(time: Time) -> Result<Self, Self::Error> {
        Self::from_time(time)
    }
}

impl From<TimeIncrement> for Time {
    fn from(increment: TimeIncrement) -> Self {
        increment.0
    }
}

/// Advances a [`Time`] by an increment.
impl Add<TimeIncrement> for Time {
    type Output = Time;

    fn add(self, rhs: TimeIncrement) -> Self::Output {
        self + rhs.0
    }
}

impl fmt::Display for TimeIncrement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} s", self.seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::time::minute;

    #[test]
    fn converts_units() {
        let dt = TimeIncrement::new::<minute>(1.5).unwrap();
        assert_relative_eq!(dt.seconds(), 90.0);
    }

    #[test]
    fn adds_to_a_time() {
        let t = Time::new::<second>(5.0);
        let dt = TimeIncrement::new::<second>(2.0).unwrap();
        assert_relative_eq!((t + dt).get::<second>(), 7.0);
    }

    #[test]
    fn zero_increment_fails() {
        assert_eq!(
            TimeIncrement::new::<second>(0.0),
            Err(TimeIncrementError::NotPositive(0.0))
        );
    }

    #[test]
    fn negative_increment_fails() {
        assert!(TimeIncrement::new::<minute>(-1.0).is_err());
    }

    #[test]
    fn infinite_increment_fails() {
        assert!(matches!(
            TimeIncrement::new::<second>(f64::INFINITY),
            Err(TimeIncrementError::NotFinite(_))
        ));
    }

    #[test]
    fn scaling_keeps_positivity() {
        let dt = TimeIncrement::new::<second>(2.0).unwrap();
        assert_relative_eq!(dt.scaled(0.5).unwrap().seconds(), 1.0);
        assert!(dt.scaled(0.0).is_err());
    }

    #[test]
    fn min_picks_smaller() {
        let a = TimeIncrement::new::<second>(2.0).unwrap();
        let b = TimeIncrement::new::<second>(3.0).unwrap();
        assert_eq!(a.min(b), a);
        assert_eq!(b.min(a), a);
    }

    #[test]
    fn displays_in_seconds() {
        let dt = TimeIncrement::new::<minute>(1.0).unwrap();
        assert_eq!(dt.to_string(), "60 s");
    }
}
