use anyhow::Result;
use proptest::prelude::*;
use vitals_sampler::{
    AlertEvaluator, SamplerCore, Severity, ThresholdConfig, ThresholdKey,
};

use crate::mocks::{RecordingSink, ScriptedSource, SnapshotGenerator};
use crate::utils::{assertions, collect_publications, TestHarness};
use crate::DEFAULT_TEST_TIMEOUT;

const MIB: f64 = 1024.0 * 1024.0;

#[test]
fn test_alert_rearms_only_below_hysteresis_band() -> Result<()> {
    let mut core = SamplerCore::new(60, 0.9);
    let thresholds = ThresholdConfig::default();
    let mut generator = SnapshotGenerator::new();

    // Threshold 90 clears below 81
    let mut ticks = Vec::new();
    for cpu in [50.0, 92.0, 93.0, 85.0, 81.0, 80.0, 92.0] {
        let publication = core.apply(generator.cpu(cpu), &thresholds);
        ticks.push((publication.alerts, publication.active_alerts));
    }

    assertions::assert_single_activation(&ticks)?;
    let activations: Vec<usize> = ticks
        .iter()
        .enumerate()
        .filter(|(_, (events, _))| !events.is_empty())
        .map(|(index, _)| index)
        .collect();
    assert_eq!(activations, vec![1, 6]);
    assert!(ticks[4].1.contains(&"cpu".to_string()));
    assert!(ticks[5].1.is_empty());
    Ok(())
}

#[test]
fn test_gpus_alert_independently() -> Result<()> {
    let mut core = SamplerCore::new(60, 0.9);
    let thresholds = ThresholdConfig::default();
    let mut generator = SnapshotGenerator::new().with_gpus(&["0", "1"]);

    let first = core.apply(generator.gpu_utilization(&[97.0, 20.0]), &thresholds);
    assertions::assert_alert_keys(&first.alerts, &["gpu-0"])?;

    let second = core.apply(generator.gpu_utilization(&[96.0, 99.0]), &thresholds);
    assertions::assert_alert_keys(&second.alerts, &["gpu-1"])?;
    assert_eq!(second.active_alerts, vec!["gpu-0", "gpu-1"]);
    Ok(())
}

#[test]
fn test_missing_sensor_neither_triggers_nor_clears() -> Result<()> {
    let mut core = SamplerCore::new(60, 0.9);
    let thresholds = ThresholdConfig::default();
    let mut generator = SnapshotGenerator::new().with_gpus(&["0"]);

    let hot = core.apply(generator.gpu_temperature(&[Some(88.0)]), &thresholds);
    assertions::assert_alert_keys(&hot.alerts, &["temp-0"])?;
    assert_eq!(hot.alerts[0].severity, Severity::Error);

    let missing = core.apply(generator.gpu_temperature(&[None]), &thresholds);
    assert!(missing.alerts.is_empty());
    assert_eq!(missing.active_alerts, vec!["temp-0"]);
    assert_eq!(missing.histories["temp-0"], vec![88.0]);

    let cool = core.apply(generator.gpu_temperature(&[Some(60.0)]), &thresholds);
    assert!(cool.active_alerts.is_empty());
    Ok(())
}

#[test]
fn test_swap_alert_requires_configured_swap() -> Result<()> {
    let thresholds = ThresholdConfig::default().with(ThresholdKey::Swap, 0.0)?;

    let mut no_swap = SnapshotGenerator::new();
    let mut evaluator = AlertEvaluator::new(0.9);
    assert!(evaluator.evaluate(&no_swap.swap_percent(0.0), &thresholds).is_empty());

    let mut with_swap = SnapshotGenerator::new().with_swap_gib(2);
    let events = evaluator.evaluate(&with_swap.swap_percent(0.0), &thresholds);
    assertions::assert_alert_keys(&events, &["swap"])?;
    assert_eq!(events[0].severity, Severity::Warning);
    Ok(())
}

#[test]
fn test_io_thresholds_compare_in_mebibytes() -> Result<()> {
    let mut evaluator = AlertEvaluator::new(0.9);
    let thresholds = ThresholdConfig::default();
    let mut generator = SnapshotGenerator::new();

    let mut snapshot = generator.idle();
    snapshot.disk_read_bytes_per_sec = 300.0 * MIB;
    snapshot.disk_write_bytes_per_sec = 250.0 * MIB;
    snapshot.network_rx_bytes_per_sec = 99.0 * MIB;

    let events = evaluator.evaluate(&snapshot, &thresholds);
    assertions::assert_alert_keys(&events, &["diskIO"])?;
    assert_eq!(events[0].value, 550.0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sink_hears_each_activation_once() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let mut generator = SnapshotGenerator::new();
    let source =
        ScriptedSource::from_snapshots(generator.cpu_series(&[95.0, 96.0, 50.0, 97.0, 98.0]));
    let sink = RecordingSink::new();

    let sampling_loop = harness.sampling_loop_with_sink(source, sink.clone())?;
    let mut updates = sampling_loop.subscribe();
    sampling_loop.start()?;
    collect_publications(&mut updates, 5, DEFAULT_TEST_TIMEOUT).await?;
    sampling_loop.stop().await;

    assert_eq!(sink.keys(), vec!["cpu", "cpu"]);
    assert_eq!(sampling_loop.stats().alerts_emitted, 2);
    Ok(())
}

/// Reference model of one metric's alert state
fn model_activations(values: &[f64], threshold: f64, factor: f64) -> (usize, bool) {
    let mut active = false;
    let mut activations = 0;
    for value in values {
        if *value >= threshold {
            if !active {
                activations += 1;
            }
            active = true;
        } else if *value < threshold * factor {
            active = false;
        }
    }
    (activations, active)
}

proptest! {
    #[test]
    fn prop_evaluator_matches_hysteresis_model(
        values in prop::collection::vec(0.0f64..100.0, 1..60),
        threshold in 1.0f64..100.0,
        factor in 0.5f64..=1.0,
    ) {
        let thresholds = ThresholdConfig::default()
            .with(ThresholdKey::Cpu, threshold)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut evaluator = AlertEvaluator::new(factor);
        let mut generator = SnapshotGenerator::new();

        let mut emitted = 0;
        for value in &values {
            emitted += evaluator
                .evaluate(&generator.cpu(*value), &thresholds)
                .iter()
                .filter(|event| event.key == "cpu")
                .count();
        }

        let (expected, active) = model_activations(&values, threshold, factor);
        prop_assert_eq!(emitted, expected);
        prop_assert_eq!(evaluator.is_active("cpu"), active);
    }
}
