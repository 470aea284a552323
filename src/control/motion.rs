// Per-tick orchestration of the field controller and the wheel kinematics
//
// Owns the per-robot force and wheel-command buffers. They are sized once at
// construction and overwritten in place on every tick.

use tracing::debug;

use super::field::{ForceVector, PotentialField};
use super::kinematics::{to_wheel_speeds, WheelCommand};
use super::params::{ControllerMode, ControllerParams};
use crate::config::ConfigError;
use crate::messages::{Goal, Pose};

/// Error types for a control tick
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MotionError {
    #[error("Expected {expected} poses, got {got}")]
    PoseCount { expected: usize, got: usize },

    #[error("Expected {expected} goals, got {got}")]
    GoalCount { expected: usize, got: usize },
}

/// Whether robots see each other as obstacles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fleet {
    /// One robot, no neighbour set
    Single,
    /// Every robot is repelled by all the others
    Multiple,
}

pub struct MotionController {
    mode: ControllerMode,
    fleet: Fleet,
    field: PotentialField,
    forces: Vec<ForceVector>,
    commands: Vec<WheelCommand>,
}

impl MotionController {
    /// Controller for a single robot
    pub fn single(mode: ControllerMode, params: ControllerParams) -> Result<Self, ConfigError> {
        Self::build(mode, params, Fleet::Single, 1)
    }

    /// Controller for `robot_count` robots that repel each other
    pub fn multiple(
        mode: ControllerMode,
        params: ControllerParams,
        robot_count: usize,
    ) -> Result<Self, ConfigError> {
        Self::build(mode, params, Fleet::Multiple, robot_count)
    }

    /// Pick the single-robot variant for one robot, the multi-robot one otherwise
    pub fn for_fleet(
        mode: ControllerMode,
        params: ControllerParams,
        robot_count: usize,
    ) -> Result<Self, ConfigError> {
        if robot_count == 1 {
            Self::single(mode, params)
        } else {
            Self::multiple(mode, params, robot_count)
        }
    }

    fn build(
        mode: ControllerMode,
        params: ControllerParams,
        fleet: Fleet,
        robot_count: usize,
    ) -> Result<Self, ConfigError> {
        params.validate()?;

        Ok(Self {
            mode,
            fleet,
            field: PotentialField::new(params),
            forces: vec![ForceVector::zero(); robot_count],
            commands: vec![WheelCommand::zero(); robot_count],
        })
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    pub fn fleet(&self) -> Fleet {
        self.fleet
    }

    pub fn robot_count(&self) -> usize {
        self.commands.len()
    }

    /// Net forces from the last tick, indexed like the poses
    pub fn forces(&self) -> &[ForceVector] {
        &self.forces
    }

    /// Wheel commands from the last tick, indexed like the poses
    pub fn commands(&self) -> &[WheelCommand] {
        &self.commands
    }

    /// Run one control tick over every robot
    pub fn tick(&mut self, poses: &[Pose], goals: &[Goal]) -> Result<&[WheelCommand], MotionError> {
        let expected = self.robot_count();
        if poses.len() != expected {
            return Err(MotionError::PoseCount {
                expected,
                got: poses.len(),
            });
        }
        if goals.len() != expected {
            return Err(MotionError::GoalCount {
                expected,
                got: goals.len(),
            });
        }

        for k in 0..expected {
            let output = match (self.mode, self.fleet) {
                (ControllerMode::MimcVadoc, Fleet::Single) => {
                    self.field.evaluate(&poses[k], &goals[k], std::iter::empty())
                }
                (ControllerMode::MimcVadoc, Fleet::Multiple) => {
                    let neighbors = poses
                        .iter()
                        .enumerate()
                        .filter(|&(i, _)| i != k)
                        .map(|(_, pose)| pose);
                    self.field.evaluate(&poses[k], &goals[k], neighbors)
                }
            };

            self.forces[k] = output.force;
            self.commands[k] = to_wheel_speeds(output.linear, output.angular, self.field.params());

            debug!(
                "Robot {}: v={:.2}, w={:.2} -> {}",
                k, output.linear, output.angular, self.commands[k]
            );
        }

        Ok(&self.commands)
    }

    /// Single-robot convenience: one pose, one goal, one command
    pub fn step(&mut self, pose: &Pose, goal: &Goal) -> Result<WheelCommand, MotionError> {
        let commands = self.tick(std::slice::from_ref(pose), std::slice::from_ref(goal))?;
        Ok(commands[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn params() -> ControllerParams {
        ControllerParams::default()
    }

    #[test]
    fn test_robot_at_goal_stays_still() {
        // Robot at (100, 100, 0), goal identical, d0 = 20
        let mut controller = MotionController::single(ControllerMode::MimcVadoc, params()).unwrap();
        let pose = Pose::new(100.0, 100.0, 0.0);
        let wheels = controller.step(&pose, &pose).unwrap();
        assert_eq!(wheels.left, 0.0);
        assert_eq!(wheels.right, 0.0);
    }

    #[test]
    fn test_single_robot_drives_to_goal() {
        let mut controller = MotionController::single(ControllerMode::MimcVadoc, params()).unwrap();
        let pose = Pose::new(100.0, 100.0, 0.0);
        let goal = Pose::new(400.0, 100.0, 0.0);

        let wheels = controller.step(&pose, &goal).unwrap();
        println!("Drive forward: {}", wheels);
        // Facing the goal: straight line, no turn
        assert!(wheels.left > 0.0);
        assert!((wheels.left - wheels.right).abs() < EPSILON);
        assert!(controller.forces()[0].fx > 0.0);
    }

    #[test]
    fn test_collision_course_repels_both() {
        // Head-on, inside L0, each heading for the other's side
        let poses = [Pose::new(100.0, 100.0, 0.0), Pose::new(130.0, 110.0, std::f64::consts::PI)];
        let goals = [Pose::new(400.0, 100.0, 0.0), Pose::new(-200.0, 110.0, std::f64::consts::PI)];

        let mut repelled =
            MotionController::multiple(ControllerMode::MimcVadoc, params(), 2).unwrap();
        repelled.tick(&poses, &goals).unwrap();

        let no_repulsion = ControllerParams {
            k_repel: 0.0,
            ..params()
        };
        let mut baseline =
            MotionController::multiple(ControllerMode::MimcVadoc, no_repulsion, 2).unwrap();
        baseline.tick(&poses, &goals).unwrap();

        let push_a = repelled.forces()[0] - baseline.forces()[0];
        let push_b = repelled.forces()[1] - baseline.forces()[1];
        println!("push on a: {:?}, push on b: {:?}", push_a, push_b);

        assert!(!push_a.is_zero() && !push_b.is_zero());
        // Equal and opposite, sideways component included
        assert!(push_a.fx < 0.0 && push_b.fx > 0.0);
        assert!(push_a.fy * push_b.fy < 0.0);
        assert!((push_a.fx + push_b.fx).abs() < 1e-6);
        assert!((push_a.fy + push_b.fy).abs() < 1e-6);
    }

    #[test]
    fn test_single_fleet_ignores_other_robots() {
        let mut controller = MotionController::single(ControllerMode::MimcVadoc, params()).unwrap();
        assert_eq!(controller.fleet(), Fleet::Single);
        let err = controller.tick(&[Pose::default(), Pose::default()], &[Pose::default()]);
        assert_eq!(err, Err(MotionError::PoseCount { expected: 1, got: 2 }));
    }

    #[test]
    fn test_multiple_with_one_robot_has_no_repulsion() {
        let pose = Pose::new(50.0, 50.0, 0.0);
        let goal = Pose::new(300.0, 50.0, 0.0);

        let mut multi = MotionController::multiple(ControllerMode::MimcVadoc, params(), 1).unwrap();
        let mut single = MotionController::single(ControllerMode::MimcVadoc, params()).unwrap();

        let a = multi.tick(&[pose], &[goal]).unwrap()[0];
        let b = single.step(&pose, &goal).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_multiple_with_no_robots() {
        let mut controller = MotionController::multiple(ControllerMode::MimcVadoc, params(), 0).unwrap();
        assert!(controller.tick(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_goal_count_mismatch() {
        let mut controller = MotionController::multiple(ControllerMode::MimcVadoc, params(), 2).unwrap();
        let poses = [Pose::default(), Pose::new(200.0, 0.0, 0.0)];
        let err = controller.tick(&poses, &[Pose::default()]);
        assert_eq!(err, Err(MotionError::GoalCount { expected: 2, got: 1 }));
    }

    #[test]
    fn test_buffers_are_reused() {
        let mut controller = MotionController::multiple(ControllerMode::MimcVadoc, params(), 2).unwrap();
        let before = controller.commands().as_ptr();
        let poses = [Pose::new(0.0, 0.0, 0.0), Pose::new(300.0, 300.0, 1.0)];
        let goals = [Pose::new(100.0, 0.0, 0.0), Pose::new(0.0, 0.0, 0.0)];
        controller.tick(&poses, &goals).unwrap();
        controller.tick(&poses, &goals).unwrap();
        assert_eq!(before, controller.commands().as_ptr());
        assert_eq!(controller.commands().len(), 2);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let bad = ControllerParams {
            axle_length: -1.0,
            ..params()
        };
        assert!(MotionController::for_fleet(ControllerMode::MimcVadoc, bad, 3).is_err());
    }
}
