// Timeouts, topics, and the settings file
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::channel::{Destination, Topology};
use crate::control::{ControllerMode, ControllerParams};
use crate::messages::Goal;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 30;

// Pose feed timeout for watchdog
pub const POSE_TIMEOUT: Duration = Duration::from_millis(500);

// How long a channel receive waits for a datagram
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

// Zenoh topics
pub const TOPIC_POSES: &str = "ucorobot/state/poses"; // pose estimator output
pub const TOPIC_WHEELS: &str = "ucorobot/rt/wheels"; // computed wheel commands
pub const TOPIC_HEALTH: &str = "ucorobot/state/health"; // health status

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

// Environment overrides, e.g. UCOROBOT__CHANNEL__BIND=0.0.0.0:44444
const ENV_PREFIX: &str = "UCOROBOT";

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Non-existent controller mode: {0}")]
    UnknownControllerMode(String),

    #[error("Non-existent UDP connection mode: {0}")]
    UnknownTopology(String),

    #[error("Invalid controller parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("No robots configured")]
    NoRobots,

    #[error("Expected {expected} initial goals (one per robot), got {got}")]
    GoalCount { expected: usize, got: usize },

    #[error("{topology} mode needs {expected} destinations, got {got}")]
    DestinationCount {
        topology: Topology,
        expected: usize,
        got: usize,
    },

    #[error("LISTENER mode is only available for one robot connection ({robots} robots, {destinations} destinations)")]
    ListenerFanout { robots: usize, destinations: usize },

    #[error("MASTER mode forwards one pose per peer: {peers} peers but only {robots} robots")]
    PeerCount { robots: usize, peers: usize },

    #[error("Invalid bind endpoint {0:?} (expected host:port)")]
    InvalidBind(String),

    #[error("Cannot resolve destination {0}")]
    Unresolvable(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Marker IDs, one per robot; index k is robot k everywhere
    pub robot_ids: Vec<u32>,
    #[serde(default)]
    pub controller: ControllerSettings,
    pub goals: GoalSettings,
    pub channel: ChannelSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControllerSettings {
    #[serde(default)]
    pub mode: ControllerMode,
    #[serde(default)]
    pub params: ControllerParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalSettings {
    /// `[x, y, heading_degrees]` per robot
    pub initial: Vec<[f64; 3]>,
    /// Optional choreography file; without it the initial goals are held
    pub schedule: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSettings {
    pub topology: Topology,
    /// Local endpoint, `host:port`
    pub bind: String,
    /// Robot (DIRECT, LISTENER) or station (MASTER) addresses
    pub peers: Vec<String>,
    /// Destination port; defaults to the bind port
    pub peer_port: Option<u16>,
}

impl Settings {
    /// Load from a TOML file plus environment overrides, then validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Attempting to load configuration from {}", path.display());

        let settings: Settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .and_then(|config| config.try_deserialize())
            .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

        settings.validate()?;
        info!(
            "Loaded configuration: {} robots, {} controller, {} channel",
            settings.robot_count(),
            settings.controller.mode,
            settings.channel.topology
        );
        Ok(settings)
    }

    pub fn robot_count(&self) -> usize {
        self.robot_ids.len()
    }

    /// Cross-field checks the deserializer cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let robots = self.robot_count();
        if robots == 0 {
            return Err(ConfigError::NoRobots);
        }
        if self.goals.initial.len() != robots {
            return Err(ConfigError::GoalCount {
                expected: robots,
                got: self.goals.initial.len(),
            });
        }

        self.controller.params.validate()?;

        let peers = self.channel.peers.len();
        self.channel.topology.check_destinations(robots, peers)?;
        if self.channel.topology == Topology::Master && peers > robots {
            return Err(ConfigError::PeerCount { robots, peers });
        }

        self.bind_port().map(|_| ())
    }

    pub fn initial_goals(&self) -> Vec<Goal> {
        self.goals
            .initial
            .iter()
            .map(|&[x, y, heading_deg]| Goal::from_degrees(x, y, heading_deg))
            .collect()
    }

    fn bind_port(&self) -> Result<u16, ConfigError> {
        self.channel
            .bind
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .ok_or_else(|| ConfigError::InvalidBind(self.channel.bind.clone()))
    }

    /// Destination table in peer order
    pub fn destinations(&self) -> Result<Vec<Destination>, ConfigError> {
        let port = match self.channel.peer_port {
            Some(port) => port,
            None => self.bind_port()?,
        };

        Ok(self
            .channel
            .peers
            .iter()
            .map(|address| Destination::new(address.clone(), port))
            .collect())
    }
}
