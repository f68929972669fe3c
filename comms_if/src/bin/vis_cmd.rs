//! Simple command line tool to send a telecommand to the vis exec.
//!
//! Usage: `vis_cmd <ENDPOINT> <TC>`, for example
//! `vis_cmd tcp://*:5020 vis_enable`.

use comms_if::{
    net::{MonitoredSocket, SocketOptions},
    tc::{Tc, TcResponse},
};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "vis_cmd", about = "Send a telecommand to the vis exec")]
struct Opts {
    /// Endpoint to bind the command socket to
    endpoint: String,

    /// The telecommand to send
    #[structopt(subcommand)]
    tc: Tc,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::from_args();

    // Create context
    let ctx = zmq::Context::new();

    // Create socket options, the command tool binds and the exec connects
    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        recv_timeout: 5000,
        send_timeout: 1000,
        ..Default::default()
    };

    // Create socket
    let socket = MonitoredSocket::new(&ctx, zmq::REQ, socket_options, &opts.endpoint)?;

    // Send the TC
    socket.send(&opts.tc.to_json()?, 0)?;

    // Wait for the response
    let response_str = socket
        .recv_string(0)?
        .map_err(|_| "Response was not valid UTF-8")?;

    let response: TcResponse = serde_json::from_str(&response_str)?;

    println!("Response: {:?}", response);

    Ok(())
}
