// 30 Hz control loop with pose watchdog
// Note: if the pose estimator stalls, the last known poses go stale and every robot is told to stop
// instead of chasing a goal from an old position.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};

// local imports
use crate::channel::{ChannelError, CommandChannel, Topology};
use crate::config::{LOOP_HZ, POSE_TIMEOUT, Settings, TOPIC_HEALTH, TOPIC_POSES, TOPIC_WHEELS};
use crate::control::{ForceVector, MotionController, MotionError, WheelCommand};
use crate::messages::{Goal, Pose, PoseFrame, RuntimeHealth, WheelFrame};
use crate::sequence::GoalSequencer;

pub struct Runtime {
    controller: MotionController,
    sequencer: Option<GoalSequencer>,
    goals: Vec<Goal>,
    channel: Option<CommandChannel>,
    poses: Vec<Option<Pose>>,
    pose_received_at: Option<Instant>,
    commands: Vec<WheelCommand>,
    forces: Vec<ForceVector>,
    health: RuntimeHealth,
}

impl Runtime {
    /// `goals` is the static goal set, used when no sequencer is given.
    /// Without a channel the runtime computes and publishes but sends nothing.
    pub fn new(
        controller: MotionController,
        goals: Vec<Goal>,
        sequencer: Option<GoalSequencer>,
        channel: Option<CommandChannel>,
    ) -> Self {
        let robots = controller.robot_count();
        Self {
            controller,
            sequencer,
            goals,
            channel,
            poses: vec![None; robots],
            pose_received_at: None,
            commands: vec![WheelCommand::zero(); robots],
            forces: vec![ForceVector::zero(); robots],
            health: RuntimeHealth::PoseStale, // Start stale until first frame
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Commands from the last `compute`, one per robot
    pub fn commands(&self) -> &[WheelCommand] {
        &self.commands
    }

    pub fn wheel_frame(&self) -> WheelFrame<'_> {
        WheelFrame {
            commands: &self.commands,
            forces: &self.forces,
        }
    }

    /// Restart the schedule clock
    pub fn start(&mut self) {
        if let Some(sequencer) = self.sequencer.as_mut() {
            sequencer.start();
        }
    }

    /// Merge an estimator frame into the last known poses
    pub fn on_pose_frame(&mut self, frame: PoseFrame) {
        if frame.poses.len() > self.poses.len() {
            warn!(
                "Pose frame has {} entries for {} robots, ignoring the rest",
                frame.poses.len(),
                self.poses.len()
            );
        }

        let mut detected = 0;
        // A missed detection keeps the previous pose
        for (slot, sample) in self.poses.iter_mut().zip(frame.poses) {
            if let Some(sample) = sample {
                *slot = Some(sample.planar());
                detected += 1;
            }
        }

        if detected > 0 {
            self.pose_received_at = Some(Instant::now());
        } else {
            debug!("No robots detected in pose frame");
        }
    }

    /// Poses for every robot, or None while any robot has never been seen
    fn known_poses(&self) -> Option<Vec<Pose>> {
        self.poses.iter().copied().collect()
    }

    /// Compute wheel commands based on watchdog state
    pub fn compute(&mut self) -> Result<&[WheelCommand], MotionError> {
        let known = self.known_poses();
        let fresh = self
            .pose_received_at
            .is_some_and(|at| at.elapsed() <= POSE_TIMEOUT);

        // The schedule clock advances whether or not the robots can move
        let goals: &[Goal] = match self.sequencer.as_mut() {
            Some(sequencer) => sequencer.next_goals(),
            None => &self.goals,
        };

        match known {
            Some(poses) if fresh => {
                self.health = RuntimeHealth::Ok;
                let commands = self.controller.tick(&poses, goals)?;
                self.commands.copy_from_slice(commands);
                self.forces.copy_from_slice(self.controller.forces());
            }
            _ => {
                // Watchdog triggered - stop every robot
                if self.health != RuntimeHealth::PoseStale {
                    warn!(
                        "Poses stale ({:?} since last frame), stopping robots",
                        self.pose_received_at.map(|at| at.elapsed())
                    );
                }
                self.health = RuntimeHealth::PoseStale;
                self.commands.fill(WheelCommand::zero());
                self.forces.fill(ForceVector::zero());
            }
        }

        Ok(&self.commands)
    }

    /// Send this tick's payload through the channel, if one is open
    pub fn transmit(&mut self) -> Result<(), ChannelError> {
        let Some(channel) = self.channel.as_ref() else {
            return Ok(());
        };

        let report = match channel.topology() {
            Topology::Direct | Topology::Listener => channel.transmit_wheels(&self.commands)?,
            Topology::Master => match self.known_poses() {
                Some(poses) => channel.transmit_poses(&poses)?,
                None => return Ok(()),
            },
        };

        if !report.is_complete() {
            self.health = RuntimeHealth::PartialDelivery;
        }
        Ok(())
    }

    /// Send a final stop batch and close the channel
    pub fn shutdown(mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };

        if channel.topology() != Topology::Master {
            let stop = vec![WheelCommand::zero(); self.commands.len()];
            match channel.transmit_wheels(&stop) {
                Ok(report) => info!(
                    "Stop batch delivered to {} of {} destinations",
                    report.delivered,
                    channel.destinations().len()
                ),
                Err(e) => warn!("Failed to send stop batch: {}", e),
            }
        }

        channel.close();
    }
}

pub async fn run(
    settings: Settings,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let robots = settings.robot_count();
    let controller = MotionController::for_fleet(
        settings.controller.mode,
        settings.controller.params,
        robots,
    )?;

    let goals = settings.initial_goals();
    let sequencer = match &settings.goals.schedule {
        Some(path) => Some(GoalSequencer::initialize(goals.clone(), path)?),
        None => None,
    };

    let channel = if dry_run {
        info!("Dry run: UDP channel not opened");
        None
    } else {
        Some(CommandChannel::open(
            settings.channel.topology,
            &settings.channel.bind,
            &settings.destinations()?,
            robots,
        )?)
    };

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_POSES).await?;
    let pub_wheels = session.declare_publisher(TOPIC_WHEELS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(controller, goals, sequencer, channel);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {} robots, {}Hz loop, {}ms watchdog timeout",
        robots,
        LOOP_HZ,
        POSE_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_POSES);
    info!("Publishing to: {}, {}", TOPIC_WHEELS, TOPIC_HEALTH);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    runtime.start();

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            result = &mut shutdown => {
                result?;
                info!("Stop signal received");
                break;
            }
        }

        // 1. Drain all pending pose frames (non-blocking)
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<PoseFrame>(&payload) {
                Ok(frame) => runtime.on_pose_frame(frame),
                Err(e) => warn!("Failed to parse pose frame: {}", e),
            }
        }

        // 2. Compute wheel commands (includes watchdog logic)
        runtime.compute()?;

        // 3. Send to the robots or peer stations
        runtime.transmit()?;

        // 4. Publish commands and health
        let wheels_json = serde_json::to_string(&runtime.wheel_frame())?;
        pub_wheels.put(wheels_json).await?;

        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }

    runtime.shutdown();
    session.close().await?;
    Ok(())
}
