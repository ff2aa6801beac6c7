use serde::Deserialize;
use thiserror::Error;
use uom::si::{f64::Time, time::second};

use crate::Options;

/// Validated configuration for a transient run.
///
/// A `Config` is built once from [`Options`] and never changes during the
/// run. All validation happens at construction, so the time loop can rely on
/// every value being in range.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    start_time: Time,
    end_time: Time,
    num_steps: usize,
    default_dt: Time,
    growth_factor: f64,
    step: StepPolicy,
    picard: PicardConfig,
    steady_state: Option<SteadyStateConfig>,
    topology: TopologyConfig,
    abort_on_solve_fail: bool,
    max_consecutive_rejections: Option<usize>,
    half_transient: bool,
    verbose: bool,
}

/// Errors that can occur when validating a transient config.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("relaxation factor must be in (0, 2), got {0}")]
    RelaxationFactor(f64),

    #[error("end time must be finite and after the start time")]
    TimeHorizon,

    #[error("dt_min must be positive and no larger than dt_max")]
    StepBounds,

    #[error("timestep tolerance must be finite and non-negative")]
    TimestepTolerance,

    #[error("sync times must be finite")]
    SyncTime,

    #[error("steady-state tolerance must be finite and non-negative")]
    SteadyStateTolerance,

    #[error("Picard iteration count must be at least one")]
    PicardIterations,

    #[error("Picard tolerances must be finite and non-negative")]
    PicardTolerance,

    #[error("cutback factor must be in (0, 1), got {0}")]
    CutbackFactor(f64),

    #[error("growth factor must be finite and at least one, got {0}")]
    GrowthFactor(f64),

    #[error("num_steps must be at least one")]
    NumSteps,
}

/// How the top-level step size is negotiated with coupled subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepNegotiation {
    /// Take the smallest of the top-level and subsystem steps.
    #[default]
    Minimum,

    /// Use the begin-phase subsystem step even if it is larger.
    SubsystemWins,

    /// Ignore subsystem steps.
    ParentWins,
}

/// Constraints on the step size.
#[derive(Debug, Clone, PartialEq)]
pub struct StepPolicy {
    dt_min: Time,
    dt_max: Time,
    tolerance: Time,
    sync_times: Vec<Time>,
    startup_steps: usize,
    negotiation: StepNegotiation,
    cutback_factor: f64,
    abort_at_dt_min: bool,
}

/// Fixed-point (Picard) iteration settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PicardConfig {
    max_iterations: usize,
    rel_tol: f64,
    abs_tol: f64,
    relaxation_factor: f64,
    relaxed_variables: Vec<String>,
}

/// Steady-state detection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteadyStateConfig {
    tolerance: f64,
    start_time: Time,
}

/// Topology update settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyConfig {
    max_updates: usize,
    update_at_step_begin: bool,
}

impl Default for Config {
    fn default() -> Self {
        // Known-good defaults, unwrap is safe
        Self::try_from(Options::default()).unwrap()
    }
}

impl TryFrom<Options> for Config {
    type Error = ConfigError;

    fn try_from(options: Options) -> Result<Self, Self::Error> {
        let start = options.start_time;
        let end = options.end_time.unwrap_or(1.0e30);
        if !start.is_finite() || !end.is_finite() || end <= start {
            return Err(ConfigError::TimeHorizon);
        }
        if options.num_steps == Some(0) {
            return Err(ConfigError::NumSteps);
        }

        let default_dt = match (options.dt, options.end_time, options.num_steps) {
            (Some(dt), _, _) => dt,
            (None, Some(end), Some(steps)) => (end - start) / steps as f64,
            (None, _, _) => 1.0,
        };

        let mut end_time = end;
        let mut num_steps = options.num_steps.unwrap_or(usize::MAX);
        if options.half_transient {
            end_time = start + 0.5 * (end - start);
            num_steps = (num_steps / 2).max(1);
        }

        if !options.growth_factor.is_finite() || options.growth_factor < 1.0 {
            return Err(ConfigError::GrowthFactor(options.growth_factor));
        }

        let negotiation = if options.use_multiapp_dt {
            StepNegotiation::SubsystemWins
        } else {
            options.step_negotiation
        };

        let step = StepPolicy::new(
            seconds(options.dt_min),
            seconds(options.dt_max),
            seconds(options.timestep_tolerance),
            options.sync_times.iter().copied().map(seconds).collect(),
        )?
        .with_startup_steps(options.startup_steps)
        .with_negotiation(negotiation)
        .with_abort_at_dt_min(options.abort_at_dt_min)
        .with_cutback_factor(options.cutback_factor)?;

        let picard = PicardConfig::new(
            options.picard_max_iterations,
            options.picard_rel_tol,
            options.picard_abs_tol,
            options.relaxation_factor,
        )?
        .with_relaxed_variables(options.relaxed_variables);

        let steady_state = if options.steady_state_detection {
            Some(SteadyStateConfig::new(
                options.steady_state_tolerance,
                seconds(options.steady_state_start_time),
            )?)
        } else {
            None
        };

        Ok(Self {
            start_time: seconds(start),
            end_time: seconds(end_time),
            num_steps,
            default_dt: seconds(default_dt),
            growth_factor: options.growth_factor,
            step,
            picard,
            steady_state,
            topology: TopologyConfig::new(
                options.max_topology_updates,
                options.update_topology_at_step_begin,
            ),
            abort_on_solve_fail: options.abort_on_solve_fail,
            max_consecutive_rejections: options.max_consecutive_rejections,
            half_transient: options.half_transient,
            verbose: options.verbose,
        })
    }
}

impl Config {
    /// Returns the start time of the run.
    #[must_use]
    pub fn start_time(&self) -> Time {
        self.start_time
    }

    /// Returns the end time of the run (already halved in half-transient mode).
    #[must_use]
    pub fn end_time(&self) -> Time {
        self.end_time
    }

    /// Returns the maximum number of steps.
    #[must_use]
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Returns the step size used by the default [`ConstantDt`](crate::ConstantDt).
    #[must_use]
    pub fn default_dt(&self) -> Time {
        self.default_dt
    }

    /// Returns the factor by which [`ConstantDt`](crate::ConstantDt) grows
    /// after an accepted step.
    #[must_use]
    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    /// Returns the step-size constraints.
    #[must_use]
    pub fn step_policy(&self) -> &StepPolicy {
        &self.step
    }

    /// Returns the Picard iteration settings.
    #[must_use]
    pub fn picard(&self) -> &PicardConfig {
        &self.picard
    }

    /// Returns the steady-state settings, or `None` if detection is off.
    #[must_use]
    pub fn steady_state(&self) -> Option<&SteadyStateConfig> {
        self.steady_state.as_ref()
    }

    /// Returns the topology update settings.
    #[must_use]
    pub fn topology(&self) -> &TopologyConfig {
        &self.topology
    }

    /// Returns `true` if an unconverged solve stops the run instead of
    /// cutting the step.
    #[must_use]
    pub fn abort_on_solve_fail(&self) -> bool {
        self.abort_on_solve_fail
    }

    /// Returns the limit on consecutive rejected steps, if any.
    #[must_use]
    pub fn max_consecutive_rejections(&self) -> Option<usize> {
        self.max_consecutive_rejections
    }

    /// Returns `true` if this run is the first half of a two-stage run.
    #[must_use]
    pub fn half_transient(&self) -> bool {
        self.half_transient
    }

    /// Returns `true` if step-size diagnostics are logged at info level.
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

impl StepPolicy {
    /// Creates a step policy with validated bounds.
    ///
    /// Sync times are sorted and deduplicated. Start-up steps default to
    /// zero, negotiation to [`StepNegotiation::Minimum`], and the cutback
    /// factor to one half. A failure at `dt_min` is retried at `dt_min`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounds or tolerance are invalid, or if a sync
    /// time is not finite.
    pub fn new(
        dt_min: Time,
        dt_max: Time,
        tolerance: Time,
        mut sync_times: Vec<Time>,
    ) -> Result<Self, ConfigError> {
        let (min, max) = (dt_min.get::<second>(), dt_max.get::<second>());
        if !min.is_finite() || min <= 0.0 || max.is_nan() || max < min {
            return Err(ConfigError::StepBounds);
        }
        let tol = tolerance.get::<second>();
        if !tol.is_finite() || tol < 0.0 {
            return Err(ConfigError::TimestepTolerance);
        }
        if sync_times.iter().any(|t| !t.get::<second>().is_finite()) {
            return Err(ConfigError::SyncTime);
        }

        sync_times.sort_by(|a, b| a.get::<second>().total_cmp(&b.get::<second>()));
        sync_times.dedup();

        Ok(Self {
            dt_min,
            dt_max,
            tolerance,
            sync_times,
            startup_steps: 0,
            negotiation: StepNegotiation::Minimum,
            cutback_factor: 0.5,
            abort_at_dt_min: false,
        })
    }

    /// Sets the number of start-up steps that reuse the previous step size.
    #[must_use]
    pub fn with_startup_steps(self, startup_steps: usize) -> Self {
        Self {
            startup_steps,
            ..self
        }
    }

    /// Sets how the step size is negotiated with coupled subsystems.
    #[must_use]
    pub fn with_negotiation(self, negotiation: StepNegotiation) -> Self {
        Self {
            negotiation,
            ..self
        }
    }

    /// Sets the factor applied to a retried step that did not shrink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CutbackFactor`] unless the factor is in (0, 1).
    pub fn with_cutback_factor(self, cutback_factor: f64) -> Result<Self, ConfigError> {
        if !(cutback_factor > 0.0 && cutback_factor < 1.0) {
            return Err(ConfigError::CutbackFactor(cutback_factor));
        }
        Ok(Self {
            cutback_factor,
            ..self
        })
    }

    /// Makes a failure at `dt_min` end the run with an error.
    #[must_use]
    pub fn with_abort_at_dt_min(self, abort_at_dt_min: bool) -> Self {
        Self {
            abort_at_dt_min,
            ..self
        }
    }

    #[must_use]
    pub fn dt_min(&self) -> Time {
        self.dt_min
    }

    #[must_use]
    pub fn dt_max(&self) -> Time {
        self.dt_max
    }

    /// Returns the tolerance for landing on sync times and the end time.
    #[must_use]
    pub fn tolerance(&self) -> Time {
        self.tolerance
    }

    /// Returns the sync times in ascending order.
    #[must_use]
    pub fn sync_times(&self) -> &[Time] {
        &self.sync_times
    }

    #[must_use]
    pub fn startup_steps(&self) -> usize {
        self.startup_steps
    }

    #[must_use]
    pub fn negotiation(&self) -> StepNegotiation {
        self.negotiation
    }

    #[must_use]
    pub fn cutback_factor(&self) -> f64 {
        self.cutback_factor
    }

    #[must_use]
    pub fn abort_at_dt_min(&self) -> bool {
        self.abort_at_dt_min
    }
}

impl PicardConfig {
    /// Creates Picard settings with validated tolerances and relaxation.
    ///
    /// `max_iterations == 1` disables sub-iteration.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iterations` is zero, a tolerance is negative
    /// or not finite, or the relaxation factor is outside (0, 2).
    pub fn new(
        max_iterations: usize,
        rel_tol: f64,
        abs_tol: f64,
        relaxation_factor: f64,
    ) -> Result<Self, ConfigError> {
        if max_iterations == 0 {
            return Err(ConfigError::PicardIterations);
        }
        if !rel_tol.is_finite() || rel_tol < 0.0 || !abs_tol.is_finite() || abs_tol < 0.0 {
            return Err(ConfigError::PicardTolerance);
        }
        if !(relaxation_factor > 0.0 && relaxation_factor < 2.0) {
            return Err(ConfigError::RelaxationFactor(relaxation_factor));
        }

        Ok(Self {
            max_iterations,
            rel_tol,
            abs_tol,
            relaxation_factor,
            relaxed_variables: Vec::new(),
        })
    }

    /// Restricts relaxation to the named variables.
    ///
    /// An empty list relaxes the whole solution.
    #[must_use]
    pub fn with_relaxed_variables(self, relaxed_variables: Vec<String>) -> Self {
        Self {
            relaxed_variables,
            ..self
        }
    }

    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    #[must_use]
    pub fn rel_tol(&self) -> f64 {
        self.rel_tol
    }

    #[must_use]
    pub fn abs_tol(&self) -> f64 {
        self.abs_tol
    }

    #[must_use]
    pub fn relaxation_factor(&self) -> f64 {
        self.relaxation_factor
    }

    #[must_use]
    pub fn relaxed_variables(&self) -> &[String] {
        &self.relaxed_variables
    }

    /// Returns `true` if each step may be solved more than once.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.max_iterations > 1
    }

    /// Returns `true` if sub-iterations blend old and new solutions.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn relaxes(&self) -> bool {
        self.relaxation_factor != 1.0
    }
}

impl Default for PicardConfig {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(1, 1e-8, 1e-50, 1.0).unwrap()
    }
}

impl SteadyStateConfig {
    /// Creates steady-state settings.
    ///
    /// Detection only runs once the simulation time exceeds `start_time`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SteadyStateTolerance`] if the tolerance is
    /// negative or not finite.
    pub fn new(tolerance: f64, start_time: Time) -> Result<Self, ConfigError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::SteadyStateTolerance);
        }
        Ok(Self {
            tolerance,
            start_time,
        })
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[must_use]
    pub fn start_time(&self) -> Time {
        self.start_time
    }
}

impl TopologyConfig {
    /// Creates topology settings allowing `max_updates` changes per step.
    #[must_use]
    pub fn new(max_updates: usize, update_at_step_begin: bool) -> Self {
        Self {
            max_updates,
            update_at_step_begin,
        }
    }

    /// Returns the maximum number of topology changes per step.
    #[must_use]
    pub fn max_updates(&self) -> usize {
        self.max_updates
    }

    /// Returns `true` if the topology is also updated at the start of a step.
    #[must_use]
    pub fn update_at_step_begin(&self) -> bool {
        self.update_at_step_begin
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self::new(usize::MAX, false)
    }
}

fn seconds(value: f64) -> Time {
    Time::new::<second>(value)
}
