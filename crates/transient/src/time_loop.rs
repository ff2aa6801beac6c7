use tracing::{info, warn};
use twine_core::{
    Observer,
    transient::{
        CoupledSubsystems, ExecPoint, Phase, SimulationClock, TimeIntegrator, TopologyUpdate,
        TransientProblem,
    },
};
use uom::si::{f64::Time, time::second};

use crate::{
    Action, Checkpoint, Config, ConvergenceOutcome, Error, Event, Monitor, Picard,
    RecoverableState, STATE_VERSION, Solution, Status, StepReport, StepSizer, Transition,
    checkpoint::{ClockRecord, ControlRecord},
};

/// The collaborators driven by the time loop.
///
/// Subsystems and topology updates are optional and default to `()`.
#[derive(Debug, Clone)]
pub struct System<P, T, C = (), U = ()> {
    pub problem: P,
    pub integrator: T,
    pub subsystems: C,
    pub topology: U,
}

impl<P, T> System<P, T> {
    /// Creates a system with no coupled subsystems or topology updates.
    pub fn new(problem: P, integrator: T) -> Self {
        Self {
            problem,
            integrator,
            subsystems: (),
            topology: (),
        }
    }
}

impl<P, T, C, U> System<P, T, C, U> {
    /// Replaces the coupled subsystems.
    pub fn with_subsystems<C2>(self, subsystems: C2) -> System<P, T, C2, U> {
        System {
            problem: self.problem,
            integrator: self.integrator,
            subsystems,
            topology: self.topology,
        }
    }

    /// Replaces the topology update.
    pub fn with_topology<U2>(self, topology: U2) -> System<P, T, C, U2> {
        System {
            problem: self.problem,
            integrator: self.integrator,
            subsystems: self.subsystems,
            topology,
        }
    }
}

/// How a run begins.
#[derive(Debug, Clone)]
pub enum Start {
    /// Start at the configured start time with a fresh initial step.
    Cold,

    /// Continue from a saved state without recomputing the step size.
    Resume(RecoverableState),
}

/// Runs a transient simulation to completion.
///
/// # Algorithm
///
/// 1. Initialize: emit initial output, then either cold-start (advance the
///    problem state and take the integrator's initial step) or restore a
///    saved state.
/// 2. Loop:
///    - Unless this is the first pass, accept, reject, or repeat the last
///      attempt depending on its outcome.
///    - Ask the [`Monitor`] whether to stop.
///    - Propose and constrain the next step with the [`StepSizer`].
///    - Solve the step with [`Picard`].
///    - Save the recoverable state to `checkpoint`.
/// 3. Finalize: emit final output unless `half_transient` is set.
///
/// # Observer
///
/// The observer receives an [`Event`] for every transition and Picard
/// iteration. [`Action::StopEarly`] ends the run at the top of the next loop
/// pass. [`Action::SetTargetTime`] makes a later step land on that time.
///
/// # Errors
///
/// Returns an error for a non-positive initial step, an inconsistent resume
/// state, a failed step at `dt_min` when `abort_at_dt_min` is set, too many
/// consecutive rejections, a checkpoint failure, or any collaborator error. A
/// solve that merely fails to converge rejects the step and is retried.
pub fn solve<P, T, C, U, K, Obs>(
    system: &mut System<P, T, C, U>,
    config: &Config,
    start: Start,
    checkpoint: &mut K,
    observer: Obs,
) -> Result<Solution, Error>
where
    P: TransientProblem,
    T: TimeIntegrator,
    C: CoupledSubsystems,
    U: TopologyUpdate,
    K: Checkpoint,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let mut time_loop = TimeLoop::new(config, observer);
    time_loop.initialize(system, start)?;
    let status = time_loop.run(system, checkpoint)?;
    time_loop.finalize(system, status)?;
    Ok(time_loop.into_solution(status))
}

/// Runs a transient simulation without observation or checkpoints.
///
/// # Errors
///
/// See [`solve`].
pub fn solve_unobserved<P, T, C, U>(
    system: &mut System<P, T, C, U>,
    config: &Config,
    start: Start,
) -> Result<Solution, Error>
where
    P: TransientProblem,
    T: TimeIntegrator,
    C: CoupledSubsystems,
    U: TopologyUpdate,
{
    solve(system, config, start, &mut (), ())
}

/// Observer actions collected since the top of the loop.
#[derive(Debug, Default)]
struct Pending {
    stop: bool,
    target_time: Option<Time>,
}

impl Pending {
    fn apply(&mut self, action: Option<Action>) {
        match action {
            Some(Action::StopEarly) => self.stop = true,
            Some(Action::SetTargetTime(time)) => self.target_time = Some(time),
            None => {}
        }
    }
}

struct TimeLoop<'c, Obs> {
    config: &'c Config,
    clock: SimulationClock,
    sizer: StepSizer<'c>,
    picard: Picard<'c>,
    monitor: Monitor<'c>,
    observer: Obs,
    pending: Pending,
    first: bool,
    outcome: ConvergenceOutcome,
    transition: Transition,
    consecutive_rejections: usize,
    accepted_steps: usize,
    rejected_steps: usize,
    topology_repeats: usize,
}

impl<'c, Obs> TimeLoop<'c, Obs>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    fn new(config: &'c Config, observer: Obs) -> Self {
        Self {
            config,
            clock: SimulationClock::new(config.start_time()),
            sizer: StepSizer::new(config.step_policy(), config.end_time(), config.verbose()),
            picard: Picard::new(config.picard(), config.topology()),
            monitor: Monitor::new(config),
            observer,
            pending: Pending::default(),
            first: true,
            outcome: ConvergenceOutcome::default(),
            transition: Transition::Started,
            consecutive_rejections: 0,
            accepted_steps: 0,
            rejected_steps: 0,
            topology_repeats: 0,
        }
    }

    fn initialize<P, T, C, U>(
        &mut self,
        system: &mut System<P, T, C, U>,
        start: Start,
    ) -> Result<(), Error>
    where
        P: TransientProblem,
        T: TimeIntegrator,
    {
        system
            .problem
            .execute(ExecPoint::Initial, &self.clock)
            .map_err(Error::problem)?;

        match start {
            Start::Cold => {
                let dt = self
                    .sizer
                    .initial_step(&mut system.integrator, &self.clock)?;
                system.problem.advance_state().map_err(Error::problem)?;
                self.clock.start(dt.into_inner());
                info!(
                    start = self.clock.time().get::<second>(),
                    end = self.config.end_time().get::<second>(),
                    dt = dt.seconds(),
                    "starting transient run"
                );
            }
            Start::Resume(state) => {
                self.restore(&state)?;
                self.clock.carry_step_size();
                info!(
                    step = self.clock.step(),
                    time = self.clock.time().get::<second>(),
                    "resuming transient run"
                );
            }
        }

        system
            .problem
            .output(ExecPoint::Initial, &self.clock)
            .map_err(Error::problem)
    }

    fn run<P, T, C, U, K>(
        &mut self,
        system: &mut System<P, T, C, U>,
        checkpoint: &mut K,
    ) -> Result<Status, Error>
    where
        P: TransientProblem,
        T: TimeIntegrator,
        C: CoupledSubsystems,
        U: TopologyUpdate,
        K: Checkpoint,
    {
        loop {
            if !self.first {
                self.increment_or_reject(system)?;
            }
            self.first = false;

            if let Some(time) = self.pending.target_time.take() {
                self.sizer.set_target_time(time);
            }

            let report = StepReport {
                clock: &self.clock,
                transition: self.transition,
                last_solve_converged: self.outcome.converged(),
                stop_requested: self.pending.stop,
                termination_requested: system.problem.termination_requested(),
                solution: system.problem.solution(),
            };
            if let Some(status) = self.monitor.check(&report) {
                return Ok(status);
            }

            let step = self
                .sizer
                .next_step(&mut system.integrator, &system.subsystems, &self.clock)?;
            self.clock.set_step_size(step.dt);

            let observer = &mut self.observer;
            let pending = &mut self.pending;
            self.outcome = self.picard.run_step(
                &mut self.clock,
                &mut system.problem,
                &mut system.subsystems,
                &mut system.topology,
                &mut |event: &Event<'_>| pending.apply(observer.observe(event)),
            )?;

            self.end_step(system)?;
            checkpoint.save(&self.state())?;
        }
    }

    fn end_step<P, T, C, U>(&mut self, system: &mut System<P, T, C, U>) -> Result<(), Error>
    where
        P: TransientProblem,
    {
        self.clock.advance();
        self.picard.end_step();

        if self.outcome.converged() && !self.picard.repeats().pending {
            system
                .problem
                .output(ExecPoint::TimestepEnd, &self.clock)
                .map_err(Error::problem)?;
        }
        Ok(())
    }

    fn increment_or_reject<P, T, C, U>(
        &mut self,
        system: &mut System<P, T, C, U>,
    ) -> Result<(), Error>
    where
        P: TransientProblem,
        T: TimeIntegrator,
        C: CoupledSubsystems,
    {
        if !self.outcome.converged() {
            return self.reject(system);
        }

        if self.picard.repeats().pending {
            self.clock.rollback();
            self.transition = Transition::TopologyRepeat;
            self.topology_repeats += 1;

            let repeat = self.picard.repeats().count;
            info!(step = self.clock.step(), repeat, "repeating step");
            self.pending
                .apply(self.observer.observe(&Event::TopologyRepeat {
                    clock: &self.clock,
                    repeat,
                }));
            return Ok(());
        }

        self.accept(system)
    }

    fn accept<P, T, C, U>(&mut self, system: &mut System<P, T, C, U>) -> Result<(), Error>
    where
        P: TransientProblem,
        T: TimeIntegrator,
        C: CoupledSubsystems,
    {
        let change = self
            .monitor
            .record_step(system.problem.solution(), system.problem.old_solution());

        self.clock.accept();
        self.picard.reset_repeats();
        system.problem.advance_state().map_err(Error::problem)?;
        self.sizer.accept(&mut system.integrator, &self.clock);

        if self.config.picard().is_enabled() {
            for phase in Phase::ALL {
                system
                    .subsystems
                    .finish_step(phase)
                    .map_err(Error::subsystems)?;
            }
        }
        for phase in Phase::ALL {
            system
                .subsystems
                .advance_step(phase)
                .map_err(Error::subsystems)?;
        }

        self.transition = Transition::Accepted;
        self.consecutive_rejections = 0;
        self.accepted_steps += 1;

        info!(
            step = self.clock.step() - 1,
            time = self.clock.time().get::<second>(),
            dt = self.clock.dt().get::<second>(),
            change,
            "step accepted"
        );
        self.pending
            .apply(self.observer.observe(&Event::StepAccepted {
                clock: &self.clock,
                relative_change: change,
            }));
        Ok(())
    }

    fn reject<P, T, C, U>(&mut self, system: &mut System<P, T, C, U>) -> Result<(), Error>
    where
        P: TransientProblem,
        T: TimeIntegrator,
        C: CoupledSubsystems,
    {
        for phase in Phase::ALL {
            system
                .subsystems
                .restore(phase)
                .map_err(Error::subsystems)?;
        }
        system.problem.restore_solution().map_err(Error::problem)?;

        let failed_dt = self.clock.dt();
        if !self.config.abort_on_solve_fail() {
            self.sizer.reject(&mut system.integrator, &self.clock)?;
        }
        self.clock.rollback();

        self.transition = Transition::Rejected;
        self.rejected_steps += 1;
        self.consecutive_rejections += 1;

        warn!(
            step = self.clock.step(),
            time = self.clock.time().get::<second>(),
            dt = failed_dt.get::<second>(),
            "step rejected"
        );

        if let Some(max) = self.config.max_consecutive_rejections() {
            if self.consecutive_rejections > max {
                return Err(Error::TooManyRejections {
                    count: self.consecutive_rejections,
                });
            }
        }

        self.pending
            .apply(self.observer.observe(&Event::StepRejected {
                clock: &self.clock,
                failed_dt,
                outcome: self.outcome,
            }));
        Ok(())
    }

    fn finalize<P, T, C, U>(
        &mut self,
        system: &mut System<P, T, C, U>,
        status: Status,
    ) -> Result<(), Error>
    where
        P: TransientProblem,
    {
        info!(
            status = ?status,
            step = self.clock.step(),
            time = self.clock.time().get::<second>(),
            accepted = self.accepted_steps,
            rejected = self.rejected_steps,
            "transient run finished"
        );

        if self.config.half_transient() {
            return Ok(());
        }

        system
            .problem
            .output(ExecPoint::Final, &self.clock)
            .map_err(Error::problem)?;
        system
            .problem
            .execute(ExecPoint::Final, &self.clock)
            .map_err(Error::problem)
    }

    fn state(&self) -> RecoverableState {
        RecoverableState {
            version: STATE_VERSION,
            clock: ClockRecord::capture(&self.clock),
            step_sizer: self.sizer.record(),
            coupling: *self.picard.coupling(),
            topology: self.picard.repeats(),
            steady_state: *self.monitor.tracker(),
            control: ControlRecord {
                first: self.first,
                last_solve_converged: self.outcome.solve_converged,
                subsystems_converged: self.outcome.subsystems_converged,
                last_transition: self.transition,
            },
        }
    }

    fn restore(&mut self, state: &RecoverableState) -> Result<(), Error> {
        state.check_version()?;

        let clock = state
            .clock
            .to_clock()
            .map_err(|err| Error::InconsistentState(err.to_string()))?;
        if clock.step() == 0 {
            return Err(Error::InconsistentState(
                "resumed step index must be at least one".into(),
            ));
        }

        self.clock = clock;
        self.sizer.restore(&state.step_sizer);
        self.picard.restore(state.coupling, state.topology);
        self.monitor.restore(state.steady_state);
        self.first = state.control.first;
        self.outcome = ConvergenceOutcome {
            solve_converged: state.control.last_solve_converged,
            subsystems_converged: state.control.subsystems_converged,
            topology_changed: state.topology.pending,
        };
        self.transition = state.control.last_transition;
        Ok(())
    }

    fn into_solution(self, status: Status) -> Solution {
        // The last transition has already been applied.
        let mut state = self.state();
        state.control.first = true;
        Solution {
            status,
            clock: self.clock,
            accepted_steps: self.accepted_steps,
            rejected_steps: self.rejected_steps,
            topology_repeats: self.topology_repeats,
            state,
        }
    }
}
