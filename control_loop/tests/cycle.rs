use approx::assert_abs_diff_eq;

use control_loop::{ControlLoop, ControllerConfig, Cycle, CycleError, Fallback, Telemetry};
use controller::MpcError;
use track::FitError;

fn config() -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.mpc.solver.max_time = 30.0;
    config.mpc.solver.max_iter = 300;
    config
}

/// Waypoints at distances `ds` along the vehicle's heading, offset sideways by `offset(d)`.
fn telemetry(ds: &[f64], offset: impl Fn(f64) -> f64) -> Telemetry {
    let (x, y, psi): (f64, f64, f64) = (10.0, 5.0, 0.5);
    let (s, c) = psi.sin_cos();
    Telemetry {
        ptsx: ds.iter().map(|&d| x + d * c - offset(d) * s).collect(),
        ptsy: ds.iter().map(|&d| y + d * s + offset(d) * c).collect(),
        x,
        y,
        psi,
        speed: 10.0,
    }
}

const DS: [f64; 6] = [0.0, 5.0, 10.0, 15.0, 20.0, 25.0];

#[test]
fn straight_road() {
    let mut c = ControlLoop::new(config()).unwrap();
    let cycle = c.step(&telemetry(&DS, |_| 0.0));

    let command = match &cycle {
        Cycle::Solved(command) => command,
        other => panic!("unexpected {:?}", other),
    };
    assert!(command.steering_angle.abs() < 1e-2, "{}", command.steering_angle);
    assert!(command.throttle > 0.0);
    assert_eq!(command.mpc_x.len(), 24);

    // Reference echoed in the vehicle frame
    assert_eq!(command.next_x.len(), DS.len());
    for (x, d) in command.next_x.iter().zip(&DS) {
        assert_abs_diff_eq!(*x, *d, epsilon = 1e-9);
    }
    for y in &command.next_y {
        assert_abs_diff_eq!(*y, 0.0, epsilon = 1e-9);
    }
    assert_eq!(c.previous(), Some(command));
}

#[test]
fn road_bending_left_steers_left() {
    let mut c = ControlLoop::new(config()).unwrap();
    let cycle = c.step(&telemetry(&DS, |d| 0.15 * d + 0.002 * d * d));
    match cycle {
        Cycle::Solved(command) => {
            assert!(command.steering_angle < 0.0, "{}", command.steering_angle);
            assert!(command.steering_angle >= -1.0);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn road_bending_right_steers_right() {
    let mut c = ControlLoop::new(config()).unwrap();
    let cycle = c.step(&telemetry(&DS, |d| -0.5 - 0.1 * d));
    match cycle {
        Cycle::Solved(command) => {
            assert!(command.steering_angle > 0.0, "{}", command.steering_angle);
            assert!(command.steering_angle <= 1.0);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn three_points_emit_nothing() {
    let mut c = ControlLoop::new(config()).unwrap();
    let first = c.step(&telemetry(&DS, |_| 0.0));
    assert!(matches!(first, Cycle::Solved(_)));
    let previous = c.previous().cloned();

    let cycle = c.step(&telemetry(&DS[..3], |_| 0.0));
    match &cycle {
        Cycle::Skipped(CycleError::Fit(FitError::TooFewPoints { got, required })) => {
            assert_eq!(*got, 3);
            assert_eq!(*required, 4);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(cycle.command().is_none());
    assert_eq!(c.previous().cloned(), previous);
}

#[test]
fn malformed_telemetry_is_skipped() {
    let mut c = ControlLoop::new(config()).unwrap();

    let mut t = telemetry(&DS, |_| 0.0);
    t.ptsy.pop();
    assert!(matches!(c.step(&t), Cycle::Skipped(CycleError::InvalidTelemetry(_))));

    let mut t = telemetry(&DS, |_| 0.0);
    t.speed = std::f64::NAN;
    assert!(matches!(c.step(&t), Cycle::Skipped(CycleError::InvalidTelemetry(_))));

    // Every waypoint at the same x cannot be fitted
    let t = Telemetry {
        ptsx: vec![1.0; 5],
        ptsy: vec![0.0, 1.0, 2.0, 3.0, 4.0],
        speed: 5.0,
        ..Telemetry::default()
    };
    assert!(matches!(
        c.step(&t),
        Cycle::Skipped(CycleError::Fit(FitError::Singular))
    ));
    assert!(c.previous().is_none());
}

#[test]
fn failed_solve_falls_back() {
    let mut config = config();
    config.mpc.solver.max_time = 1e-12;
    config.fallback = Fallback::Brake { throttle: -0.25 };
    let mut c = ControlLoop::new(config).unwrap();

    let cycle = c.step(&telemetry(&DS, |d| 0.1 * d));
    match &cycle {
        Cycle::Fallback { command, reason } => {
            assert!(matches!(reason, MpcError::Solver(_)));
            assert_eq!(command.steering_angle, 0.0);
            assert_eq!(command.throttle, -0.25);
            assert!(command.mpc_x.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(c.previous(), cycle.command());
}

#[test]
fn unconverged_solve_falls_back() {
    let mut config = config();
    config.mpc.solver.max_iter = 1;
    let mut c = ControlLoop::new(config).unwrap();

    match c.step(&telemetry(&DS, |d| 0.1 * d)) {
        Cycle::Fallback { command, reason } => {
            assert!(matches!(reason, MpcError::Solver(s) if !s.is_success()));
            assert_eq!(command.steering_angle, 0.0);
            assert!(command.mpc_x.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
}
