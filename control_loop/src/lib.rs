#![allow(non_snake_case)]

//! One control cycle: telemetry in, command out.

#[macro_use]
extern crate log;

mod config;
pub use config::{ConfigError, ControllerConfig, Fallback, CONFIG_FILE};

mod messages;
pub use messages::{Command, Telemetry};

use controller::{estimate_state, Mpc, MpcError, MpcResult};
use prelude::*;
use track::{FitError, Point};

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("invalid telemetry: {0}")]
    InvalidTelemetry(String),
    #[error("cannot fit the reference: {0}")]
    Fit(#[from] FitError),
    #[error(transparent)]
    Mpc(#[from] MpcError),
}

/// What a cycle produced.
#[derive(Debug)]
pub enum Cycle {
    Solved(Command),
    /// The solve failed and the fallback command was emitted instead.
    Fallback { command: Command, reason: MpcError },
    /// Nothing can be derived from the telemetry and no command is emitted.
    Skipped(CycleError),
}

impl Cycle {
    pub fn command(&self) -> Option<&Command> {
        match self {
            Cycle::Solved(c) => Some(c),
            Cycle::Fallback { command, .. } => Some(command),
            Cycle::Skipped(_) => None,
        }
    }
}

pub struct ControlLoop {
    mpc: Mpc,
    fallback: Fallback,
    previous: Option<Command>,
}

impl ControlLoop {
    pub fn new(config: ControllerConfig) -> Result<ControlLoop, ConfigError> {
        config.validate()?;
        let mpc = Mpc::new(config.mpc).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(ControlLoop {
            mpc,
            fallback: config.fallback,
            previous: None,
        })
    }

    pub fn mpc(&self) -> &Mpc {
        &self.mpc
    }

    /// Last command emitted, solved or fallback.
    pub fn previous(&self) -> Option<&Command> {
        self.previous.as_ref()
    }

    /// Runs one cycle. Never fails: problems are reported through the returned `Cycle`.
    pub fn step(&mut self, telemetry: &Telemetry) -> Cycle {
        let _guard = flame::start_guard("control cycle");

        let cycle = match self.plan(telemetry) {
            Ok(command) => Cycle::Solved(command),
            Err(CycleError::Mpc(e @ MpcError::Solver(_))) => {
                let command = self.fallback_command();
                warn!(
                    "{}, falling back to steer {:.4}, throttle {:.4}",
                    e, command.steering_angle, command.throttle
                );
                Cycle::Fallback { command, reason: e }
            }
            Err(e) => {
                warn!("skipping cycle: {}", e);
                Cycle::Skipped(e)
            }
        };

        if let Some(command) = cycle.command() {
            self.previous = Some(command.clone());
        }
        cycle
    }

    /// Transforms, fits, estimates, solves and scales the result into a command.
    fn plan(&self, telemetry: &Telemetry) -> Result<Command, CycleError> {
        telemetry.validate()?;

        let waypoints = track::to_vehicle_frame(&telemetry.waypoints(), &telemetry.pose());
        let curve = track::fit(&waypoints)?;
        let state = estimate_state(&curve, telemetry.speed);
        debug!(
            "state is {:.4}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
            state.x, state.y, state.psi, state.v, state.cte, state.epsi
        );

        let res = self.mpc.solve(&state, &curve)?;
        let command = self.command(&res, &waypoints);

        info!(
            "cycle done [cost={:.4}, cte={:.4}, steer={:.4}, throttle={:.4}]",
            res.cost, res.cte, command.steering_angle, command.throttle
        );
        Ok(command)
    }

    fn command(&self, res: &MpcResult, waypoints: &[Point]) -> Command {
        let steering_max = self.mpc.config().bounds.steering_max;
        Command {
            steering_angle: clamp(res.steering_angle / steering_max, -1.0, 1.0),
            throttle: res.throttle,
            mpc_x: res.predicted_xs.clone(),
            mpc_y: res.predicted_ys.clone(),
            next_x: waypoints.iter().map(|p| p.x).collect(),
            next_y: waypoints.iter().map(|p| p.y).collect(),
        }
    }

    fn fallback_command(&self) -> Command {
        let brake = self.mpc.config().bounds.acceleration_min;
        match (self.fallback, &self.previous) {
            (Fallback::HoldPrevious, Some(previous)) => {
                Command::actuation(previous.steering_angle, previous.throttle)
            }
            (Fallback::HoldPrevious, None) => Command::actuation(0.0, brake),
            (Fallback::Brake { throttle }, _) => Command::actuation(0.0, throttle),
        }
    }
}
