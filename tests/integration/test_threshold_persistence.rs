use anyhow::Result;
use vitals_sampler::{ThresholdConfig, ThresholdKey};

use crate::mocks::{ScriptedSource, SnapshotGenerator};
use crate::utils::{collect_publications, TestHarness};
use crate::DEFAULT_TEST_TIMEOUT;

#[test]
fn test_saved_thresholds_survive_reload() -> Result<()> {
    let harness = TestHarness::new()?;
    harness.thresholds().set(ThresholdKey::Temperature, 70.0)?;
    harness.thresholds().set(ThresholdKey::DiskIo, 1200.0)?;

    let reloaded = harness.reopen_thresholds()?.current();
    assert_eq!(reloaded.temperature, 70.0);
    assert_eq!(reloaded.disk_io, 1200.0);
    assert_eq!(reloaded.cpu, 90.0);

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(harness.thresholds_path())?)?;
    assert_eq!(document["thresholds"]["temperature"], 70.0);
    assert_eq!(document["thresholds"]["diskIO"], 1200.0);
    Ok(())
}

#[test]
fn test_rejected_update_is_not_persisted() -> Result<()> {
    let harness = TestHarness::new()?;
    harness.thresholds().set(ThresholdKey::Cpu, 80.0)?;

    assert!(harness.thresholds().set(ThresholdKey::Cpu, 101.0).is_err());
    assert!(harness.thresholds().set(ThresholdKey::NetworkIo, 0.5).is_err());

    assert_eq!(harness.thresholds().current().cpu, 80.0);
    assert_eq!(harness.reopen_thresholds()?.current().cpu, 80.0);
    Ok(())
}

#[test]
fn test_stored_record_is_merged_and_clamped() -> Result<()> {
    let harness = TestHarness::new()?;
    std::fs::write(
        harness.thresholds_path(),
        r#"{"thresholds": {"cpu": 150, "memory": "high", "fan": 10, "swap": 55}}"#,
    )?;

    let loaded = harness.reopen_thresholds()?.current();
    assert_eq!(loaded.cpu, 100.0);
    assert_eq!(loaded.memory, 90.0);
    assert_eq!(loaded.swap, 55.0);
    assert_eq!(loaded.gpu, 95.0);
    Ok(())
}

#[test]
fn test_corrupt_document_falls_back_to_defaults() -> Result<()> {
    let harness = TestHarness::new()?;
    std::fs::write(harness.thresholds_path(), "{ not json")?;

    assert_eq!(*harness.reopen_thresholds()?.current(), ThresholdConfig::default());
    Ok(())
}

#[test]
fn test_save_keeps_other_records() -> Result<()> {
    let harness = TestHarness::new()?;
    std::fs::write(
        harness.thresholds_path(),
        r#"{"window": {"width": 640}, "thresholds": {"cpu": 70}}"#,
    )?;

    let thresholds = harness.reopen_thresholds()?;
    assert_eq!(thresholds.current().cpu, 70.0);
    thresholds.set(ThresholdKey::Gpu, 60.0)?;

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(harness.thresholds_path())?)?;
    assert_eq!(document["window"]["width"], 640);
    assert_eq!(document["thresholds"]["gpu"], 60.0);
    assert_eq!(document["thresholds"]["cpu"], 70.0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_running_loop_uses_updated_thresholds() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let mut generator = SnapshotGenerator::new();
    let source = ScriptedSource::from_snapshots(generator.cpu_series(&[80.0; 5]));

    let sampling_loop = harness.sampling_loop(source)?;
    let mut updates = sampling_loop.subscribe();
    sampling_loop.start()?;

    let before = collect_publications(&mut updates, 1, DEFAULT_TEST_TIMEOUT).await?;
    assert!(before[0].alerts.is_empty());

    harness.thresholds().set(ThresholdKey::Cpu, 75.0)?;
    let after = collect_publications(&mut updates, 1, DEFAULT_TEST_TIMEOUT).await?;
    sampling_loop.stop().await;

    assert_eq!(after[0].alerts.len(), 1);
    assert_eq!(after[0].alerts[0].key, "cpu");
    assert_eq!(after[0].alerts[0].threshold, 75.0);
    Ok(())
}
