use control_model::State;
use prelude::*;
use track::ReferenceCurve;

/// Initial control state of a vehicle sitting at the origin of its own frame, heading along +x.
pub fn estimate(curve: &ReferenceCurve, speed: float) -> State {
    State {
        x: 0.0,
        y: 0.0,
        psi: 0.0,
        v: speed,
        cte: curve.eval(0.0),
        epsi: -curve.desired_psi(0.0),
    }
}
