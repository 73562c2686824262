//! # Arm Control Executable
//!
//! This executable is responsible for moving the arm:
//! - Accepts plans from the decision service and queues them
//! - Executes queued plans one at a time on a background worker
//! - Handles emergency stops, which send the arm home

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{info, warn};
use std::sync::Arc;
use structopt::StructOpt;

// Internal
use arm_lib::{
    arm_ctrl::{ArmCtrl, ArmParams},
    params::ArmExecParams,
    safety::SafetyCtrl,
    serial_link::{sim::SimPort, SerialLink},
    task_queue::{plan_queue, Worker},
    tc_server::{self, TcState},
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
    time::secs_to_duration,
};

// ------------------------------------------------------------------------------------------------
// CLI
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "arm_exec", about = "Arm control executable")]
struct Opt {
    /// Don't open the serial port, only log the frames that would be sent
    #[structopt(long)]
    dry_run: bool,

    /// Serial port connected to the arm, overrides arm_exec.toml
    #[structopt(long)]
    port: Option<String>,

    /// Address to serve telecommands on, overrides arm_exec.toml
    #[structopt(long)]
    bind: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("arm_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Arm Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let mut exec_params: ArmExecParams =
        util::params::load("arm_exec.toml").wrap_err("Could not load exec params")?;
    let arm_params: ArmParams =
        util::params::load("arm_ctrl.toml").wrap_err("Could not load arm params")?;

    if let Some(port) = opt.port {
        exec_params.serial_port = port;
    }
    if let Some(bind) = opt.bind {
        exec_params.http_bind_addr = bind;
    }

    exec_params
        .validate()
        .wrap_err("Invalid exec params")?;

    info!("Parameters loaded");

    // ---- SERIAL LINK ----

    let link = if opt.dry_run {
        warn!("Dry run, no commands will reach the arm");
        SerialLink::from_port(String::from("sim"), SimPort)
    } else {
        SerialLink::open(&exec_params).wrap_err("Failed to open the serial link")?
    };
    let link = Arc::new(link);

    info!("Serial link {} open", link.name());

    // ---- CONTROLLERS ----

    let arm = Arc::new(ArmCtrl::new(arm_params, link).wrap_err("Invalid arm parameters")?);
    let safety = SafetyCtrl::new(arm.clone());

    let (queue, queue_rx) = plan_queue();
    let worker = Worker::new(
        arm,
        safety.flag(),
        queue_rx,
        secs_to_duration(exec_params.queue_poll_s),
    )
    .spawn()
    .wrap_err("Failed to start the worker")?;

    info!("Worker started");

    // ---- SERVER ----

    let state = TcState {
        queue: queue.clone(),
        safety,
        saver: Some(session.saver()),
    };

    let runtime = tokio::runtime::Runtime::new().wrap_err("Failed to start the async runtime")?;

    info!("Initialisation complete, serving telecommands");

    let served = runtime.block_on(tc_server::serve(
        &exec_params.http_bind_addr,
        state,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        },
    ));

    // ---- SHUTDOWN ----

    // The worker finishes the plan in progress, drops anything still queued,
    // homes and exits
    queue.close();
    if worker.join().is_err() {
        warn!("Worker thread panicked");
    }

    session.exit();

    served.wrap_err("Telecommand server failed")
}
