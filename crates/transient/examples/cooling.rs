//! Newton cooling of a lumped body, driven by the transient time loop.
//!
//! # Usage
//!
//! ```text
//! cargo run --example cooling
//! RUST_LOG=twine_transient=debug cargo run --example cooling
//! ```
//!
//! The body starts at 90 °C in a 20 °C room and cools with a time constant of
//! 60 s. The run stops when the temperature stops changing, and the
//! recoverable state is written to a JSON checkpoint after every step.

use std::{convert::Infallible, error::Error};

use tracing::info;
use tracing_subscriber::EnvFilter;
use twine_core::transient::{SimulationClock, TransientProblem};
use twine_transient::{
    Action, Config, ConstantDt, Event, JsonFileCheckpoint, Start, System, solve,
};
use uom::si::{f64::Time, time::second};

const CONFIG: &str = r"
end_time = 3600.0
dt = 5.0
dt_max = 120.0
growth_factor = 1.5
sync_times = [300.0, 600.0]
steady_state_detection = true
steady_state_tolerance = 1e-6
";

/// Backward-Euler cooling toward a fixed ambient temperature.
struct Cooling {
    temperature: Vec<f64>,
    old: Vec<f64>,
    ambient: f64,
    time_constant: f64,
}

impl TransientProblem for Cooling {
    type Error = Infallible;

    fn solve(&mut self, clock: &SimulationClock) -> Result<bool, Self::Error> {
        let rate = clock.dt().get::<second>() / self.time_constant;
        self.temperature[0] = (self.old[0] + rate * self.ambient) / (1.0 + rate);
        Ok(true)
    }

    fn residual_norm(&mut self, _clock: &SimulationClock) -> Result<f64, Self::Error> {
        Ok(0.0)
    }

    fn solution(&self) -> &[f64] {
        &self.temperature
    }

    fn solution_mut(&mut self) -> &mut [f64] {
        &mut self.temperature
    }

    fn old_solution(&self) -> &[f64] {
        &self.old
    }

    fn advance_state(&mut self) -> Result<(), Self::Error> {
        self.old.clone_from(&self.temperature);
        Ok(())
    }

    fn restore_solution(&mut self) -> Result<(), Self::Error> {
        self.temperature.clone_from(&self.old);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_toml_str(CONFIG)?;
    let problem = Cooling {
        temperature: vec![90.0],
        old: vec![90.0],
        ambient: 20.0,
        time_constant: 60.0,
    };
    let mut system = System::new(problem, ConstantDt::from_config(&config));

    let path = std::env::temp_dir().join("twine-cooling.json");
    let mut checkpoint = JsonFileCheckpoint::new(&path);

    let observer = |event: &Event<'_>| -> Option<Action> {
        if let Event::StepAccepted { clock, .. } = event {
            if clock.time() > Time::new::<second>(1800.0) {
                return Some(Action::StopEarly);
            }
        }
        None
    };

    let solution = solve(&mut system, &config, Start::Cold, &mut checkpoint, observer)?;

    info!(
        status = ?solution.status,
        time = solution.clock.time().get::<second>(),
        steps = solution.accepted_steps,
        temperature = system.problem.temperature[0],
        checkpoint = %path.display(),
        "cooling finished"
    );
    Ok(())
}
