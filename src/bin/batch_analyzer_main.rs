// batch_analyzer_main.rs
//
// Usage:
//   batch_analyzer_main <recording.json>          per-direction recorded detections
//   batch_analyzer_main --summary <summary.json>  precomputed per-direction counts
use log::info;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::sync::Arc;
use traffic_signal_engine::engine::{analyze_batch, DirectionInput};
use traffic_signal_engine::flow_analyzer::{aggregate, parse_summary, RawDirectionTraffic};
use traffic_signal_engine::global_variables::ENV_CONFIG_PATH;
use traffic_signal_engine::simulation_engine::{load_recording, ReplayDetector, ReplaySource};
use traffic_signal_engine::{Result, SignalController, SignalError, SystemConfig};

fn load_config() -> Result<SystemConfig> {
    match env::var(ENV_CONFIG_PATH) {
        Ok(path) => SystemConfig::load(path),
        Err(_) => Ok(SystemConfig::default()),
    }
}

async fn analyze_recording(path: &str, config: SystemConfig) -> Result<()> {
    let recording = load_recording(path)?;
    info!("Loaded {} direction(s) from {}", recording.len(), path);
    let inputs: Vec<_> = recording
        .into_iter()
        .map(|(direction, frames)| DirectionInput {
            direction,
            source: ReplaySource::new(frames),
            detector: ReplayDetector,
        })
        .collect();

    let mut controller = SignalController::from_config(&config);
    let report = analyze_batch(inputs, Arc::new(config), Some(&mut controller)).await?;

    println!("Per-direction results:");
    for result in report.results.values() {
        println!(
            "  {:<5} frames {:>3}/{:<3} avg {:>5.2} max {:>3} unique {:>3} -> {}",
            result.direction.as_str(),
            result.frames_processed,
            result.frames_read,
            result.average_vehicles,
            result.max_vehicles,
            result.unique_vehicles,
            result.density_level
        );
    }
    println!("{}", serde_json::to_string_pretty(&report.recommendation)?);
    Ok(())
}

fn analyze_summary(path: &str, config: &SystemConfig) -> Result<()> {
    let contents = fs::read_to_string(path)?;
    let raw: HashMap<String, RawDirectionTraffic> = serde_json::from_str(&contents)?;
    let summary = parse_summary(&raw, &config.density)?;
    let recommendation = aggregate(&summary, &config.signal, None)?;
    println!("{}", serde_json::to_string_pretty(&recommendation)?);
    Ok(())
}

async fn run() -> Result<()> {
    let config = load_config()?;
    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [flag, path] if flag == "--summary" => analyze_summary(path, &config),
        [path] => analyze_recording(path, config).await,
        _ => Err(SignalError::InvalidConfig(
            "usage: batch_analyzer_main <recording.json> | --summary <summary.json>".to_string(),
        )),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        eprintln!("Batch analysis failed: {}", e);
        std::process::exit(1);
    }
}
