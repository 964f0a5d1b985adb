// Ignore this lint otherwise many warnings are generated for common mathematical notation
#![allow(non_snake_case)]

#[macro_use]
extern crate log;

mod config;
mod flame_merge;
mod reference;

use log::Level::Debug;
use std::thread;
use std::time::{Duration, Instant};

use control_loop::{ControlLoop, ControllerConfig, Cycle, Telemetry};
use control_model::{Actuator, KinematicBicycle, State};
use prelude::*;
use track::Point;

use config::SimulatorConfig;
use reference::ReferenceLoop;

fn main() {
    env_logger::init();

    let sim_config = SimulatorConfig::load();
    let controller_config = ControllerConfig::load(&sim_config.controller_config)
        .expect("unable to load controller configuration");

    run(&sim_config, controller_config);

    if let Some(path) = &sim_config.flame_graph {
        if let Err(e) = flame_merge::write_flame(path) {
            error!("unable to write flame graph to {}: {}", path, e);
        }
    }
}

fn run(sim_config: &SimulatorConfig, controller_config: ControllerConfig) {
    let mut control_loop =
        ControlLoop::new(controller_config).expect("invalid controller configuration");
    let steering_max = control_loop.mpc().config().bounds.steering_max;
    let model = KinematicBicycle::new(control_loop.mpc().config().Lf);

    let reference = ReferenceLoop::generate(&sim_config.reference);
    let (start, heading) = reference.start();
    let mut vehicle = State {
        x: start.x,
        y: start.y,
        psi: heading,
        v: sim_config.initial_speed,
        ..State::default()
    };

    let dt = sim_config.control_dt;
    let sub_dt = dt / sim_config.substeps as float;
    let n_steps = (sim_config.t / dt) as usize;
    let dt_duration = Duration::from_secs_f64(dt);

    let mut controller_stats = stats::OnlineStats::new();
    let mut distance_stats = stats::OnlineStats::new();
    let (mut n_fallback, mut n_skipped) = (0, 0);
    let mut actuator = Actuator::default();

    for i in 0..n_steps {
        let step_start = Instant::now();

        // Add noise to measurement
        let position = Point {
            x: vehicle.x + randn() * sim_config.noise.position,
            y: vehicle.y + randn() * sim_config.noise.position,
        };
        let waypoints = reference.lookahead(position, sim_config.lookahead);
        let telemetry = Telemetry {
            ptsx: waypoints.iter().map(|p| p.x).collect(),
            ptsy: waypoints.iter().map(|p| p.y).collect(),
            x: position.x,
            y: position.y,
            psi: vehicle.psi + randn() * sim_config.noise.heading,
            speed: vehicle.v + randn() * sim_config.noise.speed,
        };

        let controller_start = Instant::now();
        let cycle = control_loop.step(&telemetry);
        let controller_millis = controller_start.elapsed().as_secs_f64() * 1e3;
        controller_stats.add(controller_millis);

        match &cycle {
            Cycle::Solved(command) => {
                if log_enabled!(Debug) {
                    let predicted: Vec<_> = command
                        .mpc_x
                        .iter()
                        .zip(&command.mpc_y)
                        .map(|(&x, &y)| Point { x, y })
                        .collect();
                    let world = track::to_world_frame(&predicted, &telemetry.pose());
                    if let Some(end) = world.last() {
                        debug!("predicted horizon ends at ({:.2}, {:.2})", end.x, end.y);
                    }
                }
            }
            Cycle::Fallback { .. } => n_fallback += 1,
            Cycle::Skipped(_) => n_skipped += 1,
        }
        // A skipped cycle leaves the previous actuation applied
        if let Some(command) = cycle.command() {
            actuator = Actuator {
                delta: command.steering_angle * steering_max,
                a: command.throttle,
            };
        }

        for _ in 0..sim_config.substeps {
            vehicle = model.step_kinematics(sub_dt, &vehicle, &actuator);
        }

        let distance = reference.distance(Point {
            x: vehicle.x,
            y: vehicle.y,
        });
        distance_stats.add(distance);

        debug!("Controller took {:.1} ms", controller_millis);
        debug!(
            "t {:.2} State ({:.2}, {:.2}, {:.3}, {:.2}) distance {:.3}",
            i as float * dt,
            vehicle.x,
            vehicle.y,
            vehicle.psi,
            vehicle.v,
            distance
        );

        let step_elapsed = step_start.elapsed();
        if let Some(step_remaining) = dt_duration.checked_sub(step_elapsed) {
            if sim_config.real_time {
                thread::sleep(step_remaining);
            }
        } else if sim_config.real_time {
            warn!(
                "step missed deadline. took {:.1}ms.",
                step_elapsed.as_secs_f64() * 1e3
            );
        }
    }

    info!(
        "{} cycles, {} fallbacks, {} skipped",
        n_steps, n_fallback, n_skipped
    );
    println!(
        "Controller time (mean/ms, stdev/ms): {:.2}, {:.2}",
        controller_stats.mean(),
        controller_stats.stddev()
    );
    println!(
        "Distance from reference (mean/m, stdev/m): {:.3}, {:.3}",
        distance_stats.mean(),
        distance_stats.stddev()
    );
}
