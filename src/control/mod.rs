// Motion control for differential-drive robots
//
// Provides:
// - Potential-field controller (goal attraction, neighbour repulsion, heading law)
// - Differential-drive inverse kinematics (body velocity -> wheel velocities)
// - Per-tick orchestration across a fleet of robots

pub mod field;
pub mod kinematics;
mod motion;
mod params;

pub use field::{FieldOutput, ForceVector, PotentialField};
pub use kinematics::{to_wheel_speeds, WheelCommand};
pub use motion::{Fleet, MotionController, MotionError};
pub use params::{ControllerMode, ControllerParams};
