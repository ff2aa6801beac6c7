use tracing::{debug, info, warn};
use twine_core::transient::{
    CoupledSubsystems, Phase, SimulationClock, TimeIncrement, TimeIntegrator,
};
use uom::si::{f64::Time, time::second};

use crate::{Error, StepNegotiation, StepPolicy, checkpoint::StepSizerRecord};

/// Chooses the size of each step.
///
/// A step size is produced in two stages. [`propose`](Self::propose) asks the
/// integrator for its preferred size (or reuses the previous size during
/// start-up steps), and [`constrain`](Self::constrain) applies the step
/// bounds, lands steps on sync and target times, and negotiates with coupled
/// subsystems.
#[derive(Debug, Clone)]
pub struct StepSizer<'c> {
    policy: &'c StepPolicy,
    end_time: Time,
    verbose: bool,
    target_time: Option<Time>,
    unconstrained_dt: Time,
    at_sync_point: bool,
    rejected_dt: Option<Time>,
}

/// A constrained step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constrained {
    pub dt: Time,

    /// `true` if the step was shortened to land on a sync, target, or end time.
    pub at_sync_point: bool,
}

/// What last limited a constrained step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limit {
    Proposal,
    Bounds,
    Cutback,
    SyncTime,
    EndTime,
    TargetTime,
    Subsystem,
}

impl<'c> StepSizer<'c> {
    /// Creates a step sizer for a run ending at `end_time`.
    #[must_use]
    pub fn new(policy: &'c StepPolicy, end_time: Time, verbose: bool) -> Self {
        Self {
            policy,
            end_time,
            verbose,
            target_time: None,
            unconstrained_dt: Time::new::<second>(0.0),
            at_sync_point: false,
            rejected_dt: None,
        }
    }

    /// Computes the initial step of a cold start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInitialStep`] if the integrator proposes a step
    /// that is zero, negative, or not finite, since no progress could be made.
    pub fn initial_step<T: TimeIntegrator>(
        &mut self,
        integrator: &mut T,
        clock: &SimulationClock,
    ) -> Result<TimeIncrement, Error> {
        let dt = integrator.propose_step(clock).map_err(Error::integrator)?;
        self.unconstrained_dt = dt;
        Ok(TimeIncrement::from_time(dt)?)
    }

    /// Returns the step size the next attempt would like to take.
    ///
    /// Until the configured number of start-up steps has elapsed, the current
    /// step size is reused unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integrator`] if the integrator fails.
    pub fn propose<T: TimeIntegrator>(
        &self,
        integrator: &mut T,
        clock: &SimulationClock,
    ) -> Result<Time, Error> {
        if clock.step() > self.policy.startup_steps() {
            integrator.propose_step(clock).map_err(Error::integrator)
        } else {
            Ok(clock.dt())
        }
    }

    /// Applies every step-size constraint to a proposal.
    ///
    /// The step is measured from `clock.time_old()`.
    pub fn constrain<C: CoupledSubsystems>(
        &mut self,
        proposal: Time,
        clock: &SimulationClock,
        subsystems: &C,
    ) -> Constrained {
        let time = clock.time_old();
        let tol = self.policy.tolerance();
        self.unconstrained_dt = proposal;

        let mut limit = Limit::Proposal;
        let mut dt = proposal;
        if dt > self.policy.dt_max() {
            dt = self.policy.dt_max();
            limit = Limit::Bounds;
        } else if dt < self.policy.dt_min() {
            dt = self.policy.dt_min();
            limit = Limit::Bounds;
        }

        // A retry must be strictly smaller than the step that failed.
        if let Some(rejected) = self.rejected_dt.take() {
            if dt >= rejected {
                let cut = rejected * self.policy.cutback_factor();
                dt = if cut > self.policy.dt_min() {
                    cut
                } else {
                    self.policy.dt_min()
                };
                limit = Limit::Cutback;
            }
        }

        let mut at_sync_point = false;
        let landings = [
            (self.next_sync_time(time), Limit::SyncTime),
            (Some(self.end_time), Limit::EndTime),
            (self.target_time, Limit::TargetTime),
        ];
        for (target, reason) in landings {
            let Some(target) = target else { continue };
            if target > time + tol && time + dt + tol >= target {
                dt = target - time;
                at_sync_point = true;
                limit = reason;
            }
        }

        let negotiation = self.policy.negotiation();
        if negotiation != StepNegotiation::ParentWins {
            for phase in Phase::ALL {
                let Some(sub_dt) = subsystems.minimum_acceptable_step(phase) else {
                    continue;
                };
                let overrides =
                    negotiation == StepNegotiation::SubsystemWins && phase == Phase::Begin;
                if overrides || sub_dt < dt {
                    dt = sub_dt;
                    at_sync_point = false;
                    limit = Limit::Subsystem;
                }
            }
        }

        self.at_sync_point = at_sync_point;
        self.log_constraint(clock, dt, limit);

        Constrained { dt, at_sync_point }
    }

    /// Proposes and constrains the next step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integrator`] if the integrator fails.
    pub fn next_step<T: TimeIntegrator, C: CoupledSubsystems>(
        &mut self,
        integrator: &mut T,
        subsystems: &C,
        clock: &SimulationClock,
    ) -> Result<Constrained, Error> {
        let proposal = self.propose(integrator, clock)?;
        Ok(self.constrain(proposal, clock, subsystems))
    }

    /// Records a failed attempt of size `clock.dt()`.
    ///
    /// The integrator is notified first so it can shrink its estimate. The
    /// next constrained step is then guaranteed to be smaller unless a
    /// subsystem renegotiates it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MinimumStepReached`] if the failed step was already at
    /// or below `dt_min` and the policy aborts there. Otherwise the retry stays
    /// at `dt_min`.
    pub fn reject<T: TimeIntegrator>(
        &mut self,
        integrator: &mut T,
        clock: &SimulationClock,
    ) -> Result<(), Error> {
        integrator.reject_step(clock);

        let dt = clock.dt();
        if dt <= self.policy.dt_min() {
            if self.policy.abort_at_dt_min() {
                return Err(Error::MinimumStepReached {
                    dt: dt.get::<second>(),
                });
            }
            warn!(
                step = clock.step(),
                dt = dt.get::<second>(),
                "step failed at dt_min, retrying at dt_min"
            );
        }

        self.rejected_dt = Some(dt);
        Ok(())
    }

    /// Records a successful step.
    pub fn accept<T: TimeIntegrator>(&mut self, integrator: &mut T, clock: &SimulationClock) {
        integrator.accept_step(clock);
    }

    /// Requests that a future step land exactly on `time`.
    pub fn set_target_time(&mut self, time: Time) {
        self.target_time = Some(time);
    }

    /// Returns the requested target time, if any.
    #[must_use]
    pub fn target_time(&self) -> Option<Time> {
        self.target_time
    }

    /// Returns the most recent proposal before constraints were applied.
    #[must_use]
    pub fn unconstrained_dt(&self) -> Time {
        self.unconstrained_dt
    }

    /// Returns `true` if the last constrained step lands on a sync point.
    #[must_use]
    pub fn at_sync_point(&self) -> bool {
        self.at_sync_point
    }

    pub(crate) fn record(&self) -> StepSizerRecord {
        StepSizerRecord {
            unconstrained_dt: self.unconstrained_dt.get::<second>(),
            at_sync_point: self.at_sync_point,
            target_time: self.target_time.map(|t| t.get::<second>()),
            rejected_dt: self.rejected_dt.map(|t| t.get::<second>()),
        }
    }

    pub(crate) fn restore(&mut self, record: &StepSizerRecord) {
        self.unconstrained_dt = Time::new::<second>(record.unconstrained_dt);
        self.at_sync_point = record.at_sync_point;
        self.target_time = record.target_time.map(Time::new::<second>);
        self.rejected_dt = record.rejected_dt.map(Time::new::<second>);
    }

    fn next_sync_time(&self, time: Time) -> Option<Time> {
        let threshold = time + self.policy.tolerance();
        self.policy
            .sync_times()
            .iter()
            .copied()
            .find(|&sync| sync > threshold)
    }

    fn log_constraint(&self, clock: &SimulationClock, dt: Time, limit: Limit) {
        let step = clock.step();
        let proposed = self.unconstrained_dt.get::<second>();
        let dt = dt.get::<second>();
        match limit {
            Limit::Cutback => {
                warn!(step, proposed, dt, "retry step did not shrink, cutting back");
            }
            _ if self.verbose => {
                info!(step, proposed, dt, limit = ?limit, "constrained step size");
            }
            _ => {
                debug!(step, proposed, dt, limit = ?limit, "constrained step size");
            }
        }
    }
}
