// Controller parameters and controller mode selection

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Controllers available for differential robots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ControllerMode {
    /// Potential-field linear law (MIMC) with chord-distance heading control (VADOC)
    #[default]
    MimcVadoc,
}

impl ControllerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerMode::MimcVadoc => "MIMC-VADOC",
        }
    }
}

impl FromStr for ControllerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MIMC-VADOC" => Ok(ControllerMode::MimcVadoc),
            other => Err(ConfigError::UnknownControllerMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for ControllerMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gains and geometry for the potential-field controller.
///
/// Distances are in image units (pixels). The controller never mutates these.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ControllerParams {
    /// Wheel radius `r`
    pub wheel_radius: f64,
    /// Distance between the wheels `l`
    pub axle_length: f64,
    /// Attraction gain `ks`
    pub k_attract: f64,
    /// Attraction dead-zone radius `d0`
    pub dead_zone: f64,
    /// Angular gain `kw`
    pub k_angular: f64,
    /// Linear speed ceiling `U_max`
    pub max_linear_speed: f64,
    /// Repulsion gain `kr`
    pub k_repel: f64,
    /// Repulsion radius `L0`
    pub repulsion_radius: f64,
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            wheel_radius: 3.0,
            axle_length: 10.0,
            k_attract: 10.0,
            dead_zone: 20.0,
            k_angular: 40.0,
            max_linear_speed: 15.0,
            k_repel: 500_000_000.0,
            repulsion_radius: 50.0,
        }
    }
}

impl ControllerParams {
    /// Reject geometry that would divide by zero or invert the control law
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("wheel_radius", self.wheel_radius),
            ("axle_length", self.axle_length),
            ("repulsion_radius", self.repulsion_radius),
        ];
        for (name, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be positive and finite, got {}", value),
                });
            }
        }

        let non_negative = [
            ("k_attract", self.k_attract),
            ("dead_zone", self.dead_zone),
            ("k_angular", self.k_angular),
            ("max_linear_speed", self.max_linear_speed),
            ("k_repel", self.k_repel),
        ];
        for (name, value) in non_negative {
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be non-negative and finite, got {}", value),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("MIMC-VADOC".parse::<ControllerMode>().unwrap(), ControllerMode::MimcVadoc);
        assert!(matches!(
            "DYNAMIC-FEEDBACK".parse::<ControllerMode>(),
            Err(ConfigError::UnknownControllerMode(name)) if name == "DYNAMIC-FEEDBACK"
        ));
    }

    #[test]
    fn test_default_params_are_valid() {
        assert!(ControllerParams::default().validate().is_ok());
    }

    #[test]
    fn test_zero_wheel_radius_rejected() {
        let params = ControllerParams {
            wheel_radius: 0.0,
            ..ControllerParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidParameter { name: "wheel_radius", .. })
        ));
    }

    #[test]
    fn test_nan_gain_rejected() {
        let params = ControllerParams {
            k_angular: f64::NAN,
            ..ControllerParams::default()
        };
        assert!(params.validate().is_err());
    }
}
