//! Boots the audio plane as a standalone process: binds the three ingress
//! receivers under a restart supervisor (spec §4.2/§9), starts the engine,
//! optionally applies an initial desired-state document, and then idles
//! logging periodic statistics until interrupted.
//!
//! The HTTP/WebSocket control API, YAML persistence and browser UI are
//! external collaborators (spec §1) and are not built here; a control
//! plane embeds `screamrouter-core::Engine` directly and calls
//! `apply_state`/`get_mp3_data`/`export_pcm`/`stats` the way this binary's
//! demo loop does.

mod settings;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use screamrouter_config::DesiredState;
use screamrouter_core::Engine;
use screamrouter_net::{PerProcessReceiver, RtpReceiver, ScreamReceiver, Supervisor};
use screamrouter_timeshift::TimeshiftRegistry;
use tracing::info;

use settings::Settings;

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(10);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> Result<()> {
    init_logging();

    let settings = Settings::from_env();
    info!(?settings, "starting screamrouter audio plane");

    let engine = Arc::new(Engine::with_settings(
        settings.worker_threads,
        settings.mp3_bitrate_kbps,
        settings.max_history_seconds,
    ));

    if let Some(path) = &settings.initial_state_path {
        apply_initial_state(&engine, path)
            .with_context(|| format!("applying initial desired state from {path}"))?;
    }

    let timeshift = engine.timeshift_registry();
    let stats = engine.stats_registry();

    let scream_addr = SocketAddr::new(settings.bind_ip, settings.scream_port);
    let scream_supervisor = spawn_scream(scream_addr, timeshift.clone(), stats.clone());

    let per_process_addr = SocketAddr::new(settings.bind_ip, settings.scream_per_process_port);
    let per_process_supervisor =
        spawn_per_process(per_process_addr, timeshift.clone(), stats.clone());

    let rtp_addr = SocketAddr::new(settings.bind_ip, settings.rtp_port);
    let rtp_supervisor = spawn_rtp(rtp_addr, timeshift, stats);

    let shutdown = Arc::new(AtomicBool::new(false));
    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("received interrupt signal, shutting down");
        ctrlc_shutdown.store(true, Ordering::Relaxed);
    })
    .context("installing Ctrl+C handler")?;

    info!("screamrouter audio plane ready");
    let mut elapsed = Duration::ZERO;
    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(SHUTDOWN_POLL_INTERVAL);
        elapsed += SHUTDOWN_POLL_INTERVAL;
        if elapsed >= STATS_LOG_INTERVAL {
            elapsed = Duration::ZERO;
            log_stats(&engine);
        }
    }

    info!("stopping receivers");
    scream_supervisor.stop();
    per_process_supervisor.stop();
    rtp_supervisor.stop();
    info!("screamrouter audio plane stopped");
    Ok(())
}

fn apply_initial_state(engine: &Engine, path: &str) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading desired state document at {path}"))?;
    let desired: DesiredState =
        serde_json::from_str(&text).context("parsing desired state document as JSON")?;
    engine
        .apply_state(desired)
        .map_err(|err| anyhow::anyhow!("rejected initial desired state: {err}"))?;
    Ok(())
}

fn spawn_scream(
    addr: SocketAddr,
    timeshift: Arc<TimeshiftRegistry>,
    stats: Arc<screamrouter_stats::StatsRegistry>,
) -> Supervisor {
    Supervisor::spawn("scream", move || {
        ScreamReceiver::bind(addr, timeshift.clone(), stats.clone())
    })
}

fn spawn_per_process(
    addr: SocketAddr,
    timeshift: Arc<TimeshiftRegistry>,
    stats: Arc<screamrouter_stats::StatsRegistry>,
) -> Supervisor {
    Supervisor::spawn("per-process", move || {
        PerProcessReceiver::bind(addr, timeshift.clone(), stats.clone())
    })
}

fn spawn_rtp(
    addr: SocketAddr,
    timeshift: Arc<TimeshiftRegistry>,
    stats: Arc<screamrouter_stats::StatsRegistry>,
) -> Supervisor {
    Supervisor::spawn("rtp", move || {
        RtpReceiver::bind(addr, timeshift.clone(), stats.clone())
    })
}

fn log_stats(engine: &Engine) {
    let snapshot = engine.stats();
    info!(
        sinks = snapshot.sinks.len(),
        paths = snapshot.paths.len(),
        tags = snapshot.tags.len(),
        packets_per_second = snapshot.process.packets_added_to_timeshift_per_second,
        "stats"
    );
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
