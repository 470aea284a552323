// Differential-drive inverse kinematics
// Converts a commanded (linear, angular) body velocity into left/right wheel angular velocities.

use serde::Serialize;
use std::fmt;

use super::params::ControllerParams;

/// Angular velocity per wheel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WheelCommand {
    pub left: f64,
    pub right: f64,
}

impl WheelCommand {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

impl fmt::Display for WheelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(wl: {:.2}, wr: {:.2})", self.left, self.right)
    }
}

/// Convert body velocities to wheel angular velocities
///
/// # Arguments
/// * `linear` - Forward speed (distance units per tick)
/// * `angular` - Turn rate; positive spins the left wheel faster than the right
///
/// No clamping happens here; actuator limits belong to the transmission layer.
pub fn to_wheel_speeds(linear: f64, angular: f64, params: &ControllerParams) -> WheelCommand {
    let half_track = angular * params.axle_length / 2.0;

    WheelCommand {
        left: (linear + half_track) / params.wheel_radius,
        right: (linear - half_track) / params.wheel_radius,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn params(wheel_radius: f64, axle_length: f64) -> ControllerParams {
        ControllerParams {
            wheel_radius,
            axle_length,
            ..ControllerParams::default()
        }
    }

    #[test]
    fn test_zero_velocity() {
        let wheels = to_wheel_speeds(0.0, 0.0, &params(3.0, 10.0));
        assert_eq!(wheels, WheelCommand::zero());
    }

    #[test]
    fn test_straight_line() {
        // r = 3, v = 15 -> both wheels 5
        let wheels = to_wheel_speeds(15.0, 0.0, &params(3.0, 10.0));
        assert!((wheels.left - 5.0).abs() < EPSILON);
        assert!((wheels.right - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_pivot_turn() {
        // Pure rotation spins the wheels in opposite directions
        let wheels = to_wheel_speeds(0.0, 2.0, &params(3.0, 10.0));
        println!("Pivot: {}", wheels);
        assert!(wheels.left > 0.0 && wheels.right < 0.0);
        assert!((wheels.left + wheels.right).abs() < EPSILON);
    }

    #[test]
    fn test_wheel_difference_matches_turn_rate() {
        // left - right = angular * l / r for every combination
        for &(linear, angular) in &[(0.0, 1.0), (12.5, -3.0), (-4.0, 0.25), (70.0, 40.0)] {
            for &(r, l) in &[(3.0, 10.0), (0.5, 1.0), (7.0, 22.0)] {
                let wheels = to_wheel_speeds(linear, angular, &params(r, l));
                let expected = angular * l / r;
                assert!(
                    (wheels.left - wheels.right - expected).abs() < 1e-6,
                    "linear={} angular={} r={} l={}",
                    linear,
                    angular,
                    r,
                    l
                );
            }
        }
    }

    #[test]
    fn test_no_clamping() {
        let wheels = to_wheel_speeds(3000.0, 0.0, &params(1.0, 10.0));
        assert_eq!(wheels.left, 3000.0);
    }
}
