use std::time::Duration;

use anyhow::Result;
use vitals_sampler::{LoopState, SamplerConfig, SamplerError, SourceError};

use crate::mocks::{FailingSource, ScriptedSource, SnapshotGenerator};
use crate::utils::{assertions, collect_publications, TestHarness};
use crate::DEFAULT_TEST_TIMEOUT;

#[tokio::test(start_paused = true)]
async fn test_histories_roll_over_at_capacity() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::with_config(SamplerConfig {
        history_capacity: 3,
        ..SamplerConfig::default()
    })?;
    let mut generator = SnapshotGenerator::new();
    let source = ScriptedSource::from_snapshots(generator.cpu_series(&[1.0, 2.0, 3.0, 4.0, 5.0]));

    let sampling_loop = harness.sampling_loop(source)?;
    let mut updates = sampling_loop.subscribe();
    sampling_loop.start()?;

    let publications = collect_publications(&mut updates, 5, DEFAULT_TEST_TIMEOUT).await?;
    sampling_loop.stop().await;

    for publication in &publications {
        assertions::assert_histories_bounded(publication, 3)?;
    }
    assert_eq!(publications[4].histories["cpu"], vec![3.0, 4.0, 5.0]);
    assert_eq!(sampling_loop.history("cpu"), Some(vec![3.0, 4.0, 5.0]));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_leaves_history_untouched() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let mut generator = SnapshotGenerator::new();
    let source = ScriptedSource::new(vec![
        Ok(generator.cpu(10.0)),
        Err(SourceError::unavailable("sensor busy")),
        Ok(generator.cpu(20.0)),
    ]);

    let sampling_loop = harness.sampling_loop(source)?;
    let mut updates = sampling_loop.subscribe();
    sampling_loop.start()?;

    let publications = collect_publications(&mut updates, 2, DEFAULT_TEST_TIMEOUT).await?;
    sampling_loop.stop().await;

    assert_eq!(publications[1].histories["cpu"], vec![10.0, 20.0]);
    let stats = sampling_loop.stats();
    assert_eq!(stats.failures, 1);
    assert!(stats.ticks >= 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_source_reports_failed_state() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let sampling_loop = harness.sampling_loop(FailingSource::unavailable())?;
    let mut state = sampling_loop.watch_state();
    sampling_loop.start()?;

    while !matches!(*state.borrow_and_update(), LoopState::Failed(_)) {
        tokio::time::timeout(DEFAULT_TEST_TIMEOUT, state.changed()).await??;
    }

    assert!(sampling_loop.histories().is_empty());
    assert!(sampling_loop.is_running());
    sampling_loop.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_polling_for_good() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let mut generator = SnapshotGenerator::new();
    let source = ScriptedSource::from_snapshots(generator.cpu_series(&[10.0; 10]));

    let sampling_loop = harness.sampling_loop(source.clone())?;
    let mut updates = sampling_loop.subscribe();
    sampling_loop.start()?;
    collect_publications(&mut updates, 2, DEFAULT_TEST_TIMEOUT).await?;

    sampling_loop.stop().await;
    let fetches = source.fetch_count();
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(source.fetch_count(), fetches);
    assert_eq!(sampling_loop.state(), LoopState::Stopped);
    assert!(!sampling_loop.is_running());
    assert!(matches!(sampling_loop.start(), Err(SamplerError::Stopped)));
    Ok(())
}
