use std::{fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::{Config, ConfigError, StepNegotiation};

/// Raw transient options as read from a configuration file.
///
/// Times are in seconds. Every field has a default, and legacy option names
/// are accepted as aliases, so existing input files load unchanged.
/// Convert to a [`Config`] to validate:
///
/// ```
/// use twine_transient::{Config, Options};
///
/// let options = Options::from_toml_str(
///     r#"
///     end_time = 10.0
///     dt = 0.5
///     trans_ss_check = true
///     ss_check_tol = 1e-6
///     "#,
/// )
/// .unwrap();
///
/// let config = Config::try_from(options).unwrap();
/// assert_eq!(config.steady_state().unwrap().tolerance(), 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub dt: Option<f64>,
    #[serde(alias = "dtmin")]
    pub dt_min: f64,
    #[serde(alias = "dtmax")]
    pub dt_max: f64,
    pub num_steps: Option<usize>,
    #[serde(alias = "n_startup_steps")]
    pub startup_steps: usize,
    pub timestep_tolerance: f64,
    pub sync_times: Vec<f64>,

    #[serde(alias = "trans_ss_check")]
    pub steady_state_detection: bool,
    #[serde(alias = "ss_check_tol")]
    pub steady_state_tolerance: f64,
    #[serde(alias = "ss_tmin")]
    pub steady_state_start_time: f64,

    pub abort_on_solve_fail: bool,
    pub step_negotiation: StepNegotiation,
    /// Legacy switch for [`StepNegotiation::SubsystemWins`].
    pub use_multiapp_dt: bool,
    pub cutback_factor: f64,
    pub growth_factor: f64,
    pub max_consecutive_rejections: Option<usize>,
    pub abort_at_dt_min: bool,

    #[serde(alias = "picard_max_its")]
    pub picard_max_iterations: usize,
    pub picard_rel_tol: f64,
    pub picard_abs_tol: f64,
    pub relaxation_factor: f64,
    pub relaxed_variables: Vec<String>,

    #[serde(alias = "max_xfem_update")]
    pub max_topology_updates: usize,
    #[serde(alias = "update_xfem_at_timestep_begin")]
    pub update_topology_at_step_begin: bool,

    pub half_transient: bool,
    pub verbose: bool,
}

/// Errors that can occur when loading options.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read options file")]
    Io(#[from] io::Error),

    #[error("failed to parse options")]
    Toml(#[from] toml::de::Error),

    #[error("invalid options: {0}")]
    Invalid(#[from] ConfigError),
}

impl Default for Options {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: None,
            dt: None,
            dt_min: 2.0e-14,
            dt_max: 1.0e30,
            num_steps: None,
            startup_steps: 0,
            timestep_tolerance: 2.0e-14,
            sync_times: Vec::new(),
            steady_state_detection: false,
            steady_state_tolerance: 1.0e-8,
            steady_state_start_time: 0.0,
            abort_on_solve_fail: false,
            step_negotiation: StepNegotiation::Minimum,
            use_multiapp_dt: false,
            cutback_factor: 0.5,
            growth_factor: 2.0,
            max_consecutive_rejections: None,
            abort_at_dt_min: false,
            picard_max_iterations: 1,
            picard_rel_tol: 1.0e-8,
            picard_abs_tol: 1.0e-50,
            relaxation_factor: 1.0,
            relaxed_variables: Vec::new(),
            max_topology_updates: usize::MAX,
            update_topology_at_step_begin: false,
            half_transient: false,
            verbose: false,
        }
    }
}

impl Options {
    /// Parses options from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Toml`] for malformed input or unknown keys.
    pub fn from_toml_str(input: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(input)?)
    }

    /// Reads options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::Io`] if the file cannot be read, or
    /// [`OptionsError::Toml`] if it cannot be parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

impl Config {
    /// Parses and validates a config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionsError`] if parsing or validation fails.
    pub fn from_toml_str(input: &str) -> Result<Self, OptionsError> {
        Ok(Self::try_from(Options::from_toml_str(input)?)?)
    }

    /// Reads and validates a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionsError`] if reading, parsing, or validation fails.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        Ok(Self::try_from(Options::from_file(path)?)?)
    }
}
