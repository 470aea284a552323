// Artificial potential field controller (MIMC-VADOC)
//
// Linear law (MIMC): goal attraction minus neighbour repulsion, projected onto the heading.
// Angular law (VADOC): chord distance between the heading and a reference direction,
// signed by the shortest turn toward that reference.
//
// Frame: image coordinates, y grows downward. Headings follow the mathematical convention,
// so every y-difference is negated before it enters a force or a bearing.

use serde::Serialize;
use std::ops::{Add, Sub};

use super::params::ControllerParams;
use crate::messages::{Goal, Pose};

/// Below this distance to the goal the dead-zone radius is doubled to damp arrival oscillation
pub const ARRIVAL_RADIUS: f64 = 30.0;

/// Weight on the x-offset when measuring neighbour distance; biases avoidance sideways
const REPULSION_X_WEIGHT: f64 = 1.2;

/// Net potential-field force on one robot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ForceVector {
    pub fx: f64,
    pub fy: f64,
}

impl ForceVector {
    pub const fn new(fx: f64, fy: f64) -> Self {
        Self { fx, fy }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn magnitude(&self) -> f64 {
        self.fx.hypot(self.fy)
    }

    pub fn is_zero(&self) -> bool {
        self.fx == 0.0 && self.fy == 0.0
    }
}

impl Add for ForceVector {
    type Output = ForceVector;

    fn add(self, rhs: ForceVector) -> ForceVector {
        ForceVector::new(self.fx + rhs.fx, self.fy + rhs.fy)
    }
}

impl Sub for ForceVector {
    type Output = ForceVector;

    fn sub(self, rhs: ForceVector) -> ForceVector {
        ForceVector::new(self.fx - rhs.fx, self.fy - rhs.fy)
    }
}

/// Result of evaluating the field for one robot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldOutput {
    pub force: ForceVector,
    pub linear: f64,
    pub angular: f64,
}

/// Wrap an angle into `(-PI, PI]`
pub fn wrap_angle(angle: f64) -> f64 {
    angle.sin().atan2(angle.cos())
}

/// Distance between the unit vectors at angles `a` and `b` (equals `2|sin((a-b)/2)|`)
pub fn chord_distance(a: f64, b: f64) -> f64 {
    (b.cos() - a.cos()).hypot(b.sin() - a.sin())
}

/// Sign of the shortest turn that carries `reference` onto `heading`.
///
/// Zero when the two directions coincide.
pub fn turn_sign(heading: f64, reference: f64) -> f64 {
    let delta = wrap_angle(heading - reference);
    if delta > 0.0 {
        1.0
    } else if delta < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Bearing from `pose` to `goal` in the mathematical convention
pub fn bearing_to(pose: &Pose, goal: &Goal) -> f64 {
    (-(goal.y - pose.y)).atan2(goal.x - pose.x)
}

/// Potential-field controller for one parameter set
#[derive(Debug, Clone, Copy)]
pub struct PotentialField {
    params: ControllerParams,
}

impl PotentialField {
    pub fn new(params: ControllerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ControllerParams {
        &self.params
    }

    /// Dead-zone radius in effect at `distance` from the goal
    pub fn effective_dead_zone(&self, distance: f64) -> f64 {
        if distance < ARRIVAL_RADIUS {
            self.params.dead_zone * 2.0
        } else {
            self.params.dead_zone
        }
    }

    /// Square-root tempered spring toward the goal; zero inside the dead-zone
    pub fn attraction(&self, pose: &Pose, goal: &Goal) -> ForceVector {
        let distance = pose.distance_to(goal);
        let dead_zone = self.effective_dead_zone(distance);

        if distance <= dead_zone {
            return ForceVector::zero();
        }

        let gain = self.params.k_attract / distance.sqrt() * (distance - dead_zone);
        ForceVector::new(
            gain * (goal.x - pose.x) / distance,
            -gain * (goal.y - pose.y) / distance,
        )
    }

    /// Summed inverse-cube push from every neighbour inside the repulsion radius.
    ///
    /// The returned vector points toward the neighbours; it is subtracted from the attraction.
    pub fn repulsion<'a, I>(&self, pose: &Pose, neighbors: I) -> ForceVector
    where
        I: IntoIterator<Item = &'a Pose>,
    {
        let radius = self.params.repulsion_radius;

        neighbors
            .into_iter()
            .fold(ForceVector::zero(), |total, neighbor| {
                let dx = neighbor.x - pose.x;
                let dy = neighbor.y - pose.y;
                let spread = (REPULSION_X_WEIGHT * dx * dx + dy * dy).sqrt();

                // Coincident markers carry no direction to push along
                if spread >= radius || spread == 0.0 {
                    return total;
                }

                let magnitude =
                    self.params.k_repel / spread.powi(3) * (1.0 / spread - 1.0 / radius);
                total + ForceVector::new(magnitude * dx, -magnitude * dy)
            })
    }

    /// Forward speed from projecting the heading onto the saturated force.
    ///
    /// Never negative: a force behind the robot stops it instead of reversing.
    pub fn linear_speed(&self, pose: &Pose, force: &ForceVector) -> f64 {
        let scale = 1.0 + force.magnitude();
        let projection =
            pose.heading.cos() * force.fx / scale + pose.heading.sin() * force.fy / scale;

        if projection >= 0.0 {
            projection * self.params.max_linear_speed
        } else {
            0.0
        }
    }

    /// Turn command toward the goal bearing, or toward the goal heading once inside the dead-zone
    pub fn angular_command(&self, pose: &Pose, goal: &Goal, inside_dead_zone: bool) -> f64 {
        let reference = if inside_dead_zone {
            goal.heading
        } else {
            bearing_to(pose, goal)
        };

        self.params.k_angular
            * chord_distance(pose.heading, reference)
            * turn_sign(pose.heading, reference)
    }

    /// Full field evaluation for one robot against its neighbours
    pub fn evaluate<'a, I>(&self, pose: &Pose, goal: &Goal, neighbors: I) -> FieldOutput
    where
        I: IntoIterator<Item = &'a Pose>,
    {
        let distance = pose.distance_to(goal);
        let inside_dead_zone = distance <= self.effective_dead_zone(distance);

        let force = self.attraction(pose, goal) - self.repulsion(pose, neighbors);

        FieldOutput {
            force,
            linear: self.linear_speed(pose, &force),
            angular: self.angular_command(pose, goal, inside_dead_zone),
        }
    }
}
