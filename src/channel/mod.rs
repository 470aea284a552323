// UDP command channel
//
// One socket, bound once, fanning payloads out to a fixed destination table.
// Delivery is best effort: a failed send is reported and the batch carries on.

pub mod codec;

use serde::Deserialize;
use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, RECEIVE_TIMEOUT};
use crate::control::WheelCommand;
use crate::messages::Pose;
pub use codec::{DecodeError, Frame};

/// Largest datagram we expect to read
const RECEIVE_BUFFER_SIZE: usize = 512;

/// Addressing schemes for the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Topology {
    /// PC to robot, one destination per robot, wheel frames
    Direct,
    /// PC to PC, one destination per peer station, pose frames
    Master,
    /// PC to PC, exactly one destination, wheel frames
    Listener,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Direct => "DIRECT",
            Topology::Master => "MASTER",
            Topology::Listener => "LISTENER",
        }
    }

    /// Destination-count rules for this topology
    pub fn check_destinations(&self, robots: usize, destinations: usize) -> Result<(), ConfigError> {
        match self {
            Topology::Direct if destinations != robots => Err(ConfigError::DestinationCount {
                topology: *self,
                expected: robots,
                got: destinations,
            }),
            Topology::Master if destinations == 0 => Err(ConfigError::DestinationCount {
                topology: *self,
                expected: 1,
                got: 0,
            }),
            Topology::Listener if robots != 1 || destinations != 1 => {
                Err(ConfigError::ListenerFanout {
                    robots,
                    destinations,
                })
            }
            _ => Ok(()),
        }
    }
}

impl FromStr for Topology {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DIRECT" => Ok(Topology::Direct),
            "MASTER" => Ok(Topology::Master),
            "LISTENER" => Ok(Topology::Listener),
            other => Err(ConfigError::UnknownTopology(other.to_string())),
        }
    }
}

impl TryFrom<String> for Topology {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network endpoint in the destination table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub address: String,
    pub port: u16,
}

impl Destination {
    pub fn new(address: String, port: u16) -> Self {
        Self { address, port }
    }

    fn resolve(&self) -> Result<SocketAddr, ConfigError> {
        (self.address.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ConfigError::Unresolvable(self.to_string()))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Error types for the channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{topology} mode does not carry {payload} frames")]
    PayloadMismatch {
        topology: Topology,
        payload: &'static str,
    },

    #[error("Batch has {got} entries for {expected} destinations")]
    BatchSize { expected: usize, got: usize },
}

/// A send that did not leave the socket
#[derive(Debug, thiserror::Error)]
#[error("Send to {destination} failed: {source}")]
pub struct TransmissionError {
    pub destination: SocketAddr,
    #[source]
    pub source: io::Error,
}

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct TransmitReport {
    pub delivered: usize,
    pub failures: Vec<TransmissionError>,
}

impl TransmitReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct CommandChannel {
    socket: UdpSocket,
    topology: Topology,
    destinations: Vec<SocketAddr>,
}

impl CommandChannel {
    /// Bind the local endpoint and build the destination table
    pub fn open(
        topology: Topology,
        bind: &str,
        destinations: &[Destination],
        robot_count: usize,
    ) -> Result<Self, ChannelError> {
        topology.check_destinations(robot_count, destinations.len())?;

        let destinations = destinations
            .iter()
            .map(Destination::resolve)
            .collect::<Result<Vec<_>, _>>()?;

        let socket = UdpSocket::bind(bind).map_err(|source| ChannelError::Bind {
            addr: bind.to_string(),
            source,
        })?;
        socket
            .set_read_timeout(Some(RECEIVE_TIMEOUT))
            .map_err(|source| ChannelError::Bind {
                addr: bind.to_string(),
                source,
            })?;

        info!(
            "{} UDP mode connection selected: {} -> {:?}",
            topology,
            bind,
            destinations
        );

        Ok(Self {
            socket,
            topology,
            destinations,
        })
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn destinations(&self) -> &[SocketAddr] {
        &self.destinations
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send wheel command k to destination k (DIRECT, LISTENER)
    pub fn transmit_wheels(
        &self,
        commands: &[WheelCommand],
    ) -> Result<TransmitReport, ChannelError> {
        if self.topology == Topology::Master {
            return Err(ChannelError::PayloadMismatch {
                topology: self.topology,
                payload: "wheel",
            });
        }
        if commands.len() != self.destinations.len() {
            return Err(ChannelError::BatchSize {
                expected: self.destinations.len(),
                got: commands.len(),
            });
        }

        Ok(self.send_batch(commands.iter().map(codec::encode_wheels)))
    }

    /// Send pose k to peer k (MASTER)
    pub fn transmit_poses(&self, poses: &[Pose]) -> Result<TransmitReport, ChannelError> {
        if self.topology != Topology::Master {
            return Err(ChannelError::PayloadMismatch {
                topology: self.topology,
                payload: "pose",
            });
        }
        if poses.len() < self.destinations.len() {
            return Err(ChannelError::BatchSize {
                expected: self.destinations.len(),
                got: poses.len(),
            });
        }

        Ok(self.send_batch(poses.iter().map(codec::encode_pose)))
    }

    fn send_batch(&self, payloads: impl Iterator<Item = String>) -> TransmitReport {
        let mut report = TransmitReport::default();

        for (destination, payload) in self.destinations.iter().zip(payloads) {
            match self.socket.send_to(payload.as_bytes(), destination) {
                Ok(_) => {
                    debug!("Sent {} to {}", payload, destination);
                    report.delivered += 1;
                }
                Err(source) => {
                    warn!("Send to {} failed: {}", destination, source);
                    report.failures.push(TransmissionError {
                        destination: *destination,
                        source,
                    });
                }
            }
        }

        report
    }

    /// Wait up to the receive timeout for one frame.
    ///
    /// Timeouts and malformed datagrams both come back as `None`.
    pub fn receive(&self) -> Option<(Frame, SocketAddr)> {
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];

        let (len, from) = match self.socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return None;
            }
            Err(e) => {
                debug!("Receive failed: {}", e);
                return None;
            }
        };

        match codec::decode(&buffer[..len]) {
            Ok(frame) => Some((frame, from)),
            Err(e) => {
                debug!("Discarding datagram from {}: {}", from, e);
                None
            }
        }
    }

    /// Release the socket
    pub fn close(self) {
        info!("Closing {} UDP channel", self.topology);
    }
}
