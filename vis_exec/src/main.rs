//! Visual localisation executable entry point.
//!
//! # Architecture
//!
//! The exec runs a single cyclic loop:
//!
//!     - Telecommand processing (from a script or the remote TC server)
//!     - Frame acquisition from the capture exec
//!     - Estimator processing (the VisLoc module)
//!     - Telemetry publication
//!
//! All estimation logic lives in `vis_lib::vis_loc`, this file only wires it
//! to the network.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

#[cfg(feature = "sim")]
use vis_lib::sim_odom::SimOdom;
use vis_lib::{
    ahrs_client::AhrsClient,
    frame_client::{FrameClient, FrameClientError},
    tc_client::{TcClient, TcClientError},
    tm_server::TmServer,
    vis_loc::{odometry::VisualOdometry, FrameInput, VisLocMgr},
};

use comms_if::{
    net::NetParams,
    tc::{Tc, TcResponse},
    tm::{VisStatusTm, VisTmMessage},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use util::{
    host,
    logger::{logger_init, LevelFilter},
    raise_error,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
///
/// Frames arrive at up to 60 Hz, the loop polls well above that so frame
/// latency stays low.
const CYCLE_PERIOD_S: f64 = 0.005;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("vis_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("MAV Visual Localisation Exec\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    info!("Exec parameters loaded");

    // Snapshot the loaded params into the session for later inspection
    session.save("net_params.json", net_params.clone());

    // ---- INITIALISE TC SOURCE ----

    // TC source is used to determine whether we're getting TCs from a script
    // or from the ground.
    let mut tc_source = TcSource::None;
    let mut use_tc_client = false;

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    // If we have a single argument use it as the script path
    if args.len() == 2 {
        info!("Loading script from \"{}\"", &args[1]);

        // Load the script interpreter
        let si = ScriptInterpreter::new(&args[1]).wrap_err("Failed to load script")?;

        // Display some info
        info!(
            "Loaded script lasts {:.02} s and contains {} TCs\n",
            si.get_duration(),
            si.get_num_tcs()
        );

        // Set the interpreter in the source
        tc_source = TcSource::Script(si);
    }
    // If no arguments then setup the tc client
    else if args.len() == 1 {
        info!("No script provided, remote control via the TcClient will be used\n");
        use_tc_client = true;
    } else {
        return Err(eyre!(
            "Expected either zero or one argument, found {}",
            args.len() - 1
        ));
    }

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    if use_tc_client {
        tc_source = TcSource::Remote(
            TcClient::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the TcClient")?,
        );
        info!("TcClient initialised");
    }

    let mut frame_client = FrameClient::new(&zmq_ctx, &net_params)
        .wrap_err("Failed to initialise the FrameClient")?;
    info!("FrameClient initialised");

    let ahrs_client =
        AhrsClient::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the AhrsClient")?;
    info!("AhrsClient initialised");

    let mut tm_server =
        TmServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the TmServer")?;
    info!("TmServer initialised");

    info!("Network initialisation complete");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    #[cfg(feature = "sim")]
    let odometry: Option<Box<dyn VisualOdometry>> = Some(Box::new(
        SimOdom::init("sim_odom.toml")
            .wrap_err("Failed to initialise the simulated odometry provider")?,
    ));

    #[cfg(not(feature = "sim"))]
    let odometry: Option<Box<dyn VisualOdometry>> = None;

    let mut vis_loc = VisLocMgr::init("vis_loc.toml", odometry, Box::new(ahrs_client))
        .wrap_err("Failed to initialise VisLoc")?;
    vis_loc
        .init_archives(&session)
        .wrap_err("Failed to initialise VisLoc archives")?;
    session.save("vis_loc_params.json", vis_loc.params.clone());
    info!("VisLoc init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- TELECOMMAND PROCESSING ----

        // Branch depending on the source
        match tc_source {
            // If no source no point in continuing so break
            TcSource::None => raise_error!("No TC source present"),

            TcSource::Remote(ref client) => {
                // Get commands until none remain
                loop {
                    match client.receive_tc() {
                        Ok(Some(tc)) => {
                            let (response, final_status) =
                                exec_tc(&mut vis_loc, &tc, &frame_client);

                            if let Err(e) = client.send_response(response) {
                                warn!("Could not respond to TC: {}", e);
                            }

                            publish_final_status(&mut tm_server, final_status);
                        }
                        Ok(None) => break,
                        // The TC server being away is not fatal, the exec
                        // keeps processing frames
                        Err(TcClientError::NotConnected) => break,
                        Err(TcClientError::TcParseError(e)) => {
                            warn!("Could not parse received TC: {}", e);
                            break;
                        }
                        Err(e) => {
                            return Err(e)
                                .wrap_err("An error occured while receiving TCs from the server")
                        }
                    }
                }
            }

            TcSource::Script(ref mut si) => match si.get_pending_tcs() {
                PendingTcs::None => (),
                PendingTcs::Some(tc_vec) => {
                    for tc in tc_vec.iter() {
                        let (response, final_status) = exec_tc(&mut vis_loc, tc, &frame_client);
                        debug!("Script TC {:?} response: {:?}", tc, response);

                        publish_final_status(&mut tm_server, final_status);
                    }
                }
                // Exit if end of script reached
                PendingTcs::EndOfScript => {
                    info!("End of TC script reached, stopping");
                    break;
                }
            },
        };

        // ---- FRAME PROCESSING ----

        match frame_client.receive_frame() {
            Ok(Some((rgb, depth))) => {
                let output = vis_loc.step(&FrameInput {
                    rgb: &rgb.image,
                    depth: &depth,
                    wall_time_s: session::get_elapsed_seconds(),
                });

                if let Some(tm) = output.pos_tm {
                    if let Err(e) = tm_server.send(&VisTmMessage::Pos(tm)) {
                        warn!("TmServer error: {}", e);
                    }
                }
                if let Some(tm) = output.status_tm {
                    if let Err(e) = tm_server.send(&VisTmMessage::Status(tm)) {
                        warn!("TmServer error: {}", e);
                    }
                }
            }
            Ok(None) => (),
            // The capture exec being offline is not fatal, enables are
            // rejected until it comes back
            Err(FrameClientError::NotConnected) => (),
            Err(e) => warn!("Could not receive frame pair: {}", e),
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => {
                debug!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
            }
        }
    }

    // ---- SHUTDOWN ----

    // Wait for the session's save thread to flush any pending writes
    session.exit();

    info!("End of execution");

    Ok(())
}

/// Execute a TC against the estimator.
///
/// Enables are rejected here while the capture exec is unavailable, since an
/// estimator with no frame source can never leave the reconvergence window.
fn exec_tc(
    vis_loc: &mut VisLocMgr,
    tc: &Tc,
    frame_client: &FrameClient,
) -> (TcResponse, Option<VisStatusTm>) {
    if matches!(tc, Tc::VisionEnable) && !frame_client.is_connected() {
        warn!("Cannot enable visual localisation, the capture exec is not connected");
        return (TcResponse::CannotExecute, None);
    }

    vis_loc.exec_tc(tc, session::get_elapsed_seconds())
}

/// Publish the final status TM produced by a disable, if any.
fn publish_final_status(tm_server: &mut TmServer, status: Option<VisStatusTm>) {
    if let Some(status) = status {
        if let Err(e) = tm_server.send(&VisTmMessage::Status(status)) {
            warn!("Could not publish the final status TM: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the telecommands incoming to the exec.
#[allow(dead_code)]
enum TcSource {
    None,
    Remote(TcClient),
    Script(ScriptInterpreter),
}
