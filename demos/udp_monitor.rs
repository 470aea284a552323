// UDP monitor: bind like a robot would and log every decoded command frame
//
// Usage: cargo run --example udp_monitor -- [bind] [reply_to]
// Example: cargo run --example udp_monitor -- 0.0.0.0:44444 192.168.43.10

use tracing::info;

use ucorobot_runtime::channel::{CommandChannel, Destination, Frame, Topology};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let bind = args.next().unwrap_or_else(|| "0.0.0.0:44444".to_string());
    let reply_to = args.next().unwrap_or_else(|| "127.0.0.1".to_string());

    // LISTENER needs exactly one destination; the monitor never sends to it
    let port = bind
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .ok_or("bind must be host:port")?;
    let channel = CommandChannel::open(
        Topology::Listener,
        &bind,
        &[Destination::new(reply_to, port)],
        1,
    )?;

    info!("Listening on {}", channel.local_addr()?);

    loop {
        let Some((frame, from)) = channel.receive() else {
            continue;
        };

        match frame {
            Frame::Wheels { left, right } => {
                info!("{} -> wheels left={:4} right={:4}", from, left, right)
            }
            Frame::Pose { x, y, heading_deg } => {
                info!("{} -> pose x={:.2} y={:.2} theta={:.2}deg", from, x, y, heading_deg)
            }
        }
    }
}
