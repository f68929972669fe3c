//! Simple telemetry monitor for the vis exec.
//!
//! Subscribes to the exec's TM endpoint and prints every packet received.
//!
//! Usage: `tm_monitor [ENDPOINT]`, defaulting to `tcp://localhost:5021`.

use color_eyre::{eyre::WrapErr, Report};
use comms_if::{
    net::{zmq, MonitoredSocket, SocketOptions},
    tm::VisTmMessage,
};

fn main() -> Result<(), Report> {
    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("tcp://localhost:5021"));

    println!("Monitoring {}", endpoint);

    // Create context
    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        block_on_first_connect: false,
        recv_timeout: 1000,
        ..Default::default()
    };

    let socket = MonitoredSocket::new(&ctx, zmq::SUB, socket_options, &endpoint)
        .wrap_err("Failed to create the TM socket")?;
    socket
        .set_subscribe(&[])
        .wrap_err("Failed to subscribe to the TM endpoint")?;

    loop {
        let message_str = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                eprintln!("Received a message which was not valid UTF-8");
                continue;
            }
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => return Err(e).wrap_err("Failed to receive telemetry"),
        };

        match serde_json::from_str::<VisTmMessage>(&message_str) {
            Ok(VisTmMessage::Pos(tm)) => println!(
                "POS    t={} us x={:.3} m y={:.3} m z={:.3} m",
                tm.timestamp_us, tm.x_m, tm.y_m, tm.z_m
            ),
            Ok(VisTmMessage::Status(tm)) => println!(
                "STATUS pos=({:.3}, {:.3}, {:.3}) m vel=({:.3}, {:.3}, {:.3}) m/s \
                 head={:.1} deg quality={}% fps={:.1} valid={}",
                tm.x_m,
                tm.y_m,
                tm.z_m,
                tm.vx_ms,
                tm.vy_ms,
                tm.vz_ms,
                tm.heading_deg,
                tm.quality,
                tm.fps,
                tm.pos_valid()
            ),
            Err(e) => eprintln!("Could not parse TM packet: {}", e),
        }
    }
}
