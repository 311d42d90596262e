// signal_controller_main.rs
//
// Runs the live control loop against a synthetic intersection feed.
// Usage: signal_controller_main [--amqp] [frames]
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;
use tokio::sync::watch;
use traffic_signal_engine::communication::{AmqpPublisher, LogSink, SignalMessage, StatusSink};
use traffic_signal_engine::engine::{run_live, LiveOptions};
use traffic_signal_engine::flow_analyzer::aggregate;
use traffic_signal_engine::global_variables::{
    AMQP_URL, DEFAULT_PHASE_LOG, ENV_AMQP_URL, ENV_CONFIG_PATH, ENV_PHASE_LOG,
};
use traffic_signal_engine::monitoring::{summarize_phase_log, PhaseLogger};
use traffic_signal_engine::shared_data::{Direction, SignalStatus};
use traffic_signal_engine::simulation_engine::{ReplayDetector, SyntheticTraffic};
use traffic_signal_engine::{Result, SignalController, SystemConfig};

const FRAME_INTERVAL_MS: u64 = 100;

fn load_config() -> Result<SystemConfig> {
    match env::var(ENV_CONFIG_PATH) {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            SystemConfig::load(path)
        }
        Err(_) => Ok(SystemConfig::default()),
    }
}

fn open_sink(use_broker: bool) -> Box<dyn StatusSink> {
    let url = env::var(ENV_AMQP_URL)
        .ok()
        .or_else(|| use_broker.then(|| AMQP_URL.to_string()));
    if let Some(url) = url {
        match AmqpPublisher::connect(&url) {
            Ok(publisher) => return Box::new(publisher),
            Err(e) => warn!("Broker unavailable ({}), publishing to the log instead", e),
        }
    }
    Box::new(LogSink)
}

async fn run() -> Result<()> {
    let config = load_config()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let use_broker = args.iter().any(|arg| arg == "--amqp");
    let frame_limit = args.iter().find_map(|arg| arg.parse::<usize>().ok());

    let mut rates = BTreeMap::new();
    rates.insert(Direction::North, 0.30);
    rates.insert(Direction::South, 0.05);
    rates.insert(Direction::East, 0.15);
    rates.insert(Direction::West, 0.10);
    let mut feed = SyntheticTraffic::new(2024, 1280, 720, rates);
    if let Some(limit) = frame_limit {
        feed = feed.with_frame_limit(limit);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            let _ = shutdown_tx.send(true);
        }
    });

    let phase_log_path = env::var(ENV_PHASE_LOG).unwrap_or_else(|_| DEFAULT_PHASE_LOG.to_string());
    let mut phase_logger = PhaseLogger::new(&phase_log_path);
    let mut sink = open_sink(use_broker);
    let mut last_status: Option<SignalStatus> = None;
    let mut controller = SignalController::from_config(&config);

    println!("Starting signal controller (Ctrl+C to stop)...");
    let report = run_live(
        feed,
        ReplayDetector,
        &mut controller,
        &config,
        LiveOptions {
            frame_interval: Some(Duration::from_millis(FRAME_INTERVAL_MS)),
        },
        shutdown_rx,
        |outcome, ctrl| {
            if let Some(change) = SignalMessage::phase_change(last_status.as_ref(), &outcome.status) {
                if let Err(e) = sink.publish(&change) {
                    error!("Publishing phase change failed: {}", e);
                }
                if let Err(e) = sink.publish(&SignalMessage::status(&outcome.status, &outcome.traffic)) {
                    error!("Publishing status failed: {}", e);
                }
                let published = aggregate(&outcome.traffic, &config.signal, None)
                    .and_then(|rec| sink.publish(&SignalMessage::Recommendation(rec)));
                if let Err(e) = published {
                    error!("Publishing recommendation failed: {}", e);
                }
            }
            if let Err(e) = phase_logger.record_new(ctrl) {
                error!("Writing phase log failed: {}", e);
            }
            last_status = Some(outcome.status.clone());
        },
    )
    .await?;

    println!("\n=== Session statistics ===");
    println!("Stopped:           {:?}", report.stop_reason);
    println!("Runtime:           {:.1}s", report.runtime.as_secs_f64());
    println!("Frames read:       {}", report.frames_read);
    println!("Frames processed:  {}", report.frames_processed);
    println!("Vehicles detected: {}", report.total_vehicles_detected);
    println!("Cycles completed:  {}", report.cycles_completed);
    for (direction, stats) in &report.tracker_stats {
        println!(
            "  {:<5} tracks created: {:>4}, live: {}",
            direction.as_str(), stats.tracks_created, stats.live_tracks
        );
    }

    if phase_logger.path().exists() {
        let summary = summarize_phase_log(phase_logger.path())?;
        println!("\nPhase log {} ({} records):", phase_log_path, summary.records);
        for (direction, stats) in &summary.directions {
            println!(
                "  {:<5} green phases: {:>3}, avg green {:.1}s, forced {}",
                direction.as_str(),
                stats.green_phases,
                stats.average_green_secs(),
                stats.forced_phases
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        eprintln!("Controller error: {}", e);
        std::process::exit(1);
    }
}
