// Synthetic pose estimator: robots orbiting a point, published at 30 Hz
//
// Usage: cargo run --example pose_publisher -- [robot_count]

use serde_json::json;
use std::f64::consts::TAU;
use std::time::{Duration, Instant};
use tracing::info;

use ucorobot_runtime::config::TOPIC_POSES;

const CENTER: (f64, f64) = (400.0, 300.0); // px
const RADIUS: f64 = 150.0; // px
const PERIOD_S: f64 = 20.0; // one lap
const PUBLISH_INTERVAL: Duration = Duration::from_millis(33);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let robots: usize = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(2);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_POSES).await?;

    info!("Publishing {} orbiting robots on {}", robots, TOPIC_POSES);

    let started = Instant::now();
    let mut tick = tokio::time::interval(PUBLISH_INTERVAL);

    loop {
        tick.tick().await;
        let t = started.elapsed().as_secs_f64();

        let poses: Vec<_> = (0..robots)
            .map(|k| {
                let phase = TAU * (t / PERIOD_S + k as f64 / robots as f64);
                json!({
                    "x": CENTER.0 + RADIUS * phase.cos(),
                    "y": CENTER.1 - RADIUS * phase.sin(),
                    // Tangent to the orbit, counter-clockwise on screen
                    "heading": phase + TAU / 4.0,
                })
            })
            .collect();

        publisher.put(json!({ "poses": poses }).to_string()).await?;
    }
}
