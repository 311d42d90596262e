// End-to-end flows through the public API: summary in, recommendation out;
// recorded approaches through the batch pipelines; synthetic feed through the
// live loop.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use traffic_signal_engine::engine::{analyze_batch, run_live, DirectionInput, LiveOptions, StopReason};
use traffic_signal_engine::flow_analyzer::{aggregate, parse_summary, RawDirectionTraffic};
use traffic_signal_engine::shared_data::{DensityLevel, Direction, SignalPhase};
use traffic_signal_engine::simulation_engine::{parse_recording, ReplayDetector, ReplaySource, SyntheticTraffic};
use traffic_signal_engine::{SignalController, SignalError, SystemConfig};

fn raw(count: f64) -> RawDirectionTraffic {
    RawDirectionTraffic { count, density: None }
}

#[test]
fn summary_to_recommendation() {
    let config = SystemConfig::default();
    let mut input = HashMap::new();
    input.insert("NORTH".to_string(), raw(28.0));
    input.insert("SOUTH".to_string(), raw(3.0));
    input.insert("EAST".to_string(), raw(18.0));
    input.insert("WEST".to_string(), raw(9.0));

    let summary = parse_summary(&input, &config.density).unwrap();
    let rec = aggregate(&summary, &config.signal, None).unwrap();

    assert_eq!(
        rec.optimal_sequence,
        vec![Direction::North, Direction::East, Direction::West, Direction::South]
    );
    let north = &rec.directions[&Direction::North];
    assert_eq!(north.density_level, DensityLevel::Critical);
    assert_eq!((north.green_duration, north.yellow_duration, north.total_duration), (60, 3, 63));
    assert_eq!(rec.directions[&Direction::South].green_duration, 15);
    assert!(rec.signal_status.is_none());
}

#[test]
fn configured_thresholds_change_classification() {
    let config = SystemConfig::from_json(
        r#"{ "density_thresholds": { "low_max": 2, "medium_max": 4, "high_max": 6 } }"#,
    )
    .unwrap();
    let mut input = HashMap::new();
    input.insert("EAST".to_string(), raw(5.0));
    let summary = parse_summary(&input, &config.density).unwrap();
    assert_eq!(summary[&Direction::East].density, DensityLevel::High);
}

#[test]
fn bad_summary_is_rejected() {
    let config = SystemConfig::default();
    let mut input = HashMap::new();
    input.insert("NORTH".to_string(), raw(-1.0));
    assert!(matches!(
        parse_summary(&input, &config.density),
        Err(SignalError::NegativeCount { .. })
    ));
    assert!(matches!(
        aggregate(&BTreeMap::new(), &config.signal, None),
        Err(SignalError::EmptySummary)
    ));
}

fn cars(n: usize) -> String {
    (0..n)
        .map(|i| {
            let x = 20 + i * 80;
            format!(
                r#"{{ "bbox": [{}, 100, {}, 140], "class": "car", "confidence": 0.9 }}"#,
                x,
                x + 40
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[tokio::test]
async fn recorded_batch_updates_controller_once() {
    let json = format!(
        r#"{{
            "NORTH": [
                {{ "width": 1280, "height": 720, "timestamp_ms": 0, "detections": [{n}] }},
                {{ "width": 1280, "height": 720, "timestamp_ms": 33, "detections": [{n}] }}
            ],
            "SOUTH": [
                {{ "width": 1280, "height": 720, "detections": [{s}] }}
            ]
        }}"#,
        n = cars(7),
        s = cars(1)
    );
    let recording = parse_recording(&json).unwrap();
    let inputs: Vec<_> = recording
        .into_iter()
        .map(|(direction, frames)| DirectionInput {
            direction,
            source: ReplaySource::new(frames),
            detector: ReplayDetector,
        })
        .collect();

    let mut config = SystemConfig::default();
    config.detection.process_every_n_frames = 1;
    let mut controller = SignalController::from_config(&config);
    let report = analyze_batch(inputs, Arc::new(config), Some(&mut controller))
        .await
        .unwrap();

    assert_eq!(report.results[&Direction::North].unique_vehicles, 7);
    assert_eq!(report.results[&Direction::North].density_level, DensityLevel::Medium);
    assert_eq!(
        report.recommendation.optimal_sequence,
        vec![Direction::North, Direction::South]
    );
    assert_eq!(controller.active_direction(), Some(Direction::North));
    assert_eq!(controller.cycle_count(), 0);
}

#[tokio::test]
async fn synthetic_feed_runs_to_exhaustion() {
    let config = SystemConfig::default();
    let mut rates = BTreeMap::new();
    rates.insert(Direction::North, 0.4);
    rates.insert(Direction::West, 0.2);
    let feed = SyntheticTraffic::new(11, 1280, 720, rates).with_frame_limit(40);

    let (_tx, rx) = watch::channel(false);
    let mut controller = SignalController::from_config(&config);
    let mut updates = 0;
    let report = run_live(
        feed,
        ReplayDetector,
        &mut controller,
        &config,
        LiveOptions {
            frame_interval: Some(Duration::from_millis(1)),
        },
        rx,
        |outcome, _| {
            updates += 1;
            assert_eq!(outcome.traffic.len(), 4);
        },
    )
    .await
    .unwrap();

    assert_eq!(report.stop_reason, StopReason::SourceExhausted);
    assert_eq!(report.frames_read, 40);
    assert_eq!(report.frames_processed, 20);
    assert_eq!(updates, 20);
    assert_eq!(controller.status(std::time::Instant::now()).phase, SignalPhase::Green);
}
