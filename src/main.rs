pub mod config;
pub mod controller;
pub mod mapping;
pub mod output;
pub mod persistence;
pub mod status;

use crate::config::{resolve_startup, Cli};
use crate::controller::GilrsSource;
use crate::mapping::ControlLoop;
use crate::output::ydotool::HELPER_STARTUP_DELAY;
use crate::output::{
    spawn_output_worker, HelperDaemon, OutputQueue, YdotoolSink, OUTPUT_QUEUE_CAPACITY,
};
use crate::persistence::{default_config_path, TomlParameterStore};
use crate::status::{spawn_status_reporter, StatusSnapshot};
use clap::Parser;
use color_eyre::Result;
use std::time::Duration;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// How long queued actions may take to drain after the loop stopped
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup(cli.verbose)?;

    let store = TomlParameterStore::new(cli.config.clone().unwrap_or_else(default_config_path));
    info!("Using parameter file {}", store.path().display());
    let startup = resolve_startup(cli.params.clone(), &store);

    // handlers are installed before anything that needs cleanup is started
    let shutdown = CancellationToken::new();
    let signal_task = spawn_signal_listener(shutdown.clone());

    let mut helper = if cli.no_helper {
        info!("Injection helper disabled");
        HelperDaemon::disabled()
    } else {
        match HelperDaemon::spawn(&cli.helper, HELPER_STARTUP_DELAY, &shutdown).await {
            Ok(helper) => helper,
            Err(e) => {
                warn!("Continuing without injection helper: {}", e);
                HelperDaemon::disabled()
            }
        }
    };
    if !helper.is_enabled() {
        warn!("No injection helper started, ydotool needs a running ydotoold");
    }

    let (queue, actions) = OutputQueue::new(OUTPUT_QUEUE_CAPACITY);
    let worker = spawn_output_worker(Box::new(YdotoolSink::default()), actions);

    let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());
    let reporter = spawn_status_reporter(status_rx);

    // gilrs is not Send, the loop stays on the main task
    let source = GilrsSource::create(startup.params.joystick_index);
    let control = ControlLoop::create(
        startup.params,
        Box::new(source),
        Box::new(store),
        queue,
        status_tx,
        startup.using_file,
    )
    .start();

    let final_params = control.run_until_shutdown(shutdown).await.finish();
    debug!("Final parameters: {:?}", final_params);

    match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, worker).await {
        Ok(Ok(executed)) => debug!("Output worker finished, {} actions executed", executed),
        Ok(Err(e)) => error!("Output worker panicked: {}", e),
        Err(_) => warn!("Output worker did not drain within {:?}", OUTPUT_DRAIN_TIMEOUT),
    }
    signal_task.abort();
    if let Err(e) = reporter.await {
        error!("Status reporter panicked: {}", e);
    }

    helper.shutdown().await;
    info!("joymouse stopped");
    Ok(())
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// Registers a handler for `kind`, or logs why it could not
fn register_signal(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            error!("Failed to register {} handler: {}", name, e);
            None
        }
    }
}

async fn recv_or_pending(stream: Option<Signal>) {
    match stream {
        Some(mut stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Cancels `shutdown` on Ctrl+C or SIGTERM
///
/// Both handlers are registered before this returns, so a signal arriving
/// at any later point cancels the token instead of killing the process.
fn spawn_signal_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    let interrupt = register_signal(SignalKind::interrupt(), "SIGINT");
    let terminate = register_signal(SignalKind::terminate(), "SIGTERM");
    tokio::spawn(async move {
        tokio::select! {
            _ = recv_or_pending(interrupt) => info!("Received Ctrl+C"),
            _ = recv_or_pending(terminate) => info!("Received SIGTERM"),
        }
        shutdown.cancel();
    })
}
