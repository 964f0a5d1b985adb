use prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: float,
    pub y: float,
}

/// Position and counter-clockwise heading of the vehicle in the world frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: float,
    pub y: float,
    pub psi: float,
}

/// Moves world frame points into the frame of a vehicle at `pose`.
///
/// Points are translated so the vehicle is at the origin then rotated by `-psi` so the vehicle
/// faces along +x. Order and count are preserved.
pub fn to_vehicle_frame(points: &[Point], pose: &Pose) -> Vec<Point> {
    let (sin, cos) = (-pose.psi).sin_cos();
    points
        .iter()
        .map(|p| {
            let x = p.x - pose.x;
            let y = p.y - pose.y;
            Point {
                x: x * cos - y * sin,
                y: x * sin + y * cos,
            }
        })
        .collect()
}

/// Inverse of `to_vehicle_frame`.
pub fn to_world_frame(points: &[Point], pose: &Pose) -> Vec<Point> {
    let (sin, cos) = pose.psi.sin_cos();
    points
        .iter()
        .map(|p| Point {
            x: p.x * cos - p.y * sin + pose.x,
            y: p.x * sin + p.y * cos + pose.y,
        })
        .collect()
}
