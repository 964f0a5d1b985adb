use prelude::*;
use track::Point;

use crate::config::ReferenceConfig;

/// Closed loop of waypoints, driven counter-clockwise.
pub struct ReferenceLoop {
    waypoints: Vec<Point>,
}

impl ReferenceLoop {
    pub fn generate(config: &ReferenceConfig) -> ReferenceLoop {
        let n = config.n_waypoints;
        let waypoints = (0..n)
            .map(|i| {
                let theta = 2.0 * PI * i as float / n as float;
                let r = 1.0 + config.wobble * (config.lobes as float * theta).sin();
                Point {
                    x: config.radius_x * r * theta.cos(),
                    y: config.radius_y * r * theta.sin(),
                }
            })
            .collect();
        ReferenceLoop { waypoints }
    }

    pub fn waypoints(&self) -> &[Point] {
        &self.waypoints
    }

    /// Start pose on the first waypoint, heading towards the second.
    pub fn start(&self) -> (Point, float) {
        let (a, b) = (self.waypoints[0], self.waypoints[1]);
        (a, float::atan2(b.y - a.y, b.x - a.x))
    }

    fn nearest(&self, p: Point) -> usize {
        let mut best = (0, INFINITY);
        for (i, w) in self.waypoints.iter().enumerate() {
            let d = (w.x - p.x).hypot(w.y - p.y);
            if d < best.1 {
                best = (i, d);
            }
        }
        best.0
    }

    /// `n` consecutive waypoints starting from the one nearest `p`.
    pub fn lookahead(&self, p: Point, n: usize) -> Vec<Point> {
        let start = self.nearest(p);
        (0..n)
            .map(|i| self.waypoints[(start + i) % self.waypoints.len()])
            .collect()
    }

    /// Distance from `p` to the nearest segment of the loop.
    pub fn distance(&self, p: Point) -> float {
        let len = self.waypoints.len();
        let i = self.nearest(p);
        let prev = self.waypoints[(i + len - 1) % len];
        let next = self.waypoints[(i + 1) % len];
        let w = self.waypoints[i];
        min(segment_distance(prev, w, p), segment_distance(w, next, p))
    }
}

fn segment_distance(a: Point, b: Point, p: Point) -> float {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        clamp(((p.x - a.x) * dx + (p.y - a.y) * dy) / len2, 0.0, 1.0)
    } else {
        0.0
    };
    (a.x + t * dx - p.x).hypot(a.y + t * dy - p.y)
}
