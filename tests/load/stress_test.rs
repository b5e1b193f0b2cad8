//! Load Testing Suite for the simulation engine
//!
//! Verifies behaviour at demo scale (tens to low hundreds of devices):
//! - Every device keeps its own schedule
//! - Stopping everything leaves no stragglers
//! - Tick latency stays low while devices share the runtime

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use solar_telemetry_sim::config::SimulationConfig;
use solar_telemetry_sim::simulation::{SimulationEngine, VirtualClock};

const DEVICE_COUNT: usize = 200;

fn build_engine(tick_interval_secs: u64) -> SimulationEngine {
    let sim = SimulationConfig {
        tick_interval_secs,
        random_seed: Some(99),
        ..Default::default()
    };
    SimulationEngine::new(sim, VirtualClock::starting_at_hour(12, 60.0)).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_many_devices_tick_independently() {
    let engine = build_engine(5);
    let counts = Arc::new(Mutex::new(HashMap::<String, usize>::new()));

    for i in 0..DEVICE_COUNT {
        let id = format!("household-{i}");
        let counts = counts.clone();
        let sink_id = id.clone();
        engine.start(id, move |_| *counts.lock().entry(sink_id.clone()).or_default() += 1);
    }
    assert_eq!(engine.active_count(), DEVICE_COUNT);

    tokio::time::sleep(Duration::from_secs(31)).await;
    {
        let counts = counts.lock();
        assert_eq!(counts.len(), DEVICE_COUNT);
        assert!(counts.values().all(|&n| n == 7), "uneven delivery: {counts:?}");
    }

    for i in (0..DEVICE_COUNT).step_by(2) {
        engine.stop(&format!("household-{i}"));
    }
    tokio::time::sleep(Duration::from_secs(10)).await;

    let counts = counts.lock();
    for i in 0..DEVICE_COUNT {
        let expected = if i % 2 == 0 { 7 } else { 9 };
        assert_eq!(counts[&format!("household-{i}")], expected);
    }
    drop(counts);
    engine.stop_all();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_tick_latency_under_load() {
    let engine = build_engine(1);
    let worst = Arc::new(Mutex::new(Duration::ZERO));

    for i in 0..DEVICE_COUNT {
        let worst = worst.clone();
        let last = Mutex::new(Instant::now());
        engine.start(format!("household-{i}"), move |_| {
            let now = Instant::now();
            let mut last = last.lock();
            let gap = now.duration_since(*last);
            *last = now;
            let mut worst = worst.lock();
            if gap > *worst {
                *worst = gap;
            }
        });
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
    engine.stop_all();

    let worst = *worst.lock();
    println!("worst gap between readings: {worst:?}");
    assert!(worst < Duration::from_millis(1_500), "tick gap {worst:?}");
}
