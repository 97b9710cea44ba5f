//! Integration tests for mini-batched provider writes.

use ironmat::error::ConfigError;
use ironmat::testing::*;
use ironmat::*;
use std::num::NonZeroUsize;
use std::sync::Arc;

fn writer(store: &Arc<RecordingOnlineStore>, setting: MiniBatchSetting) -> BatchWriter {
    BatchWriter::new(
        store.clone(),
        RepoConfig::new("test"),
        Arc::new(driver_stats_view()),
        setting,
    )
}

fn fixed(size: usize) -> MiniBatchSetting {
    MiniBatchSetting::fixed(NonZeroUsize::new(size).expect("non-zero size"))
}

#[test]
fn rows_are_split_into_ceil_n_over_b_calls() -> anyhow::Result<()> {
    for (n, b, expected) in [
        (10, 3, vec![3, 3, 3, 1]),
        (9, 3, vec![3, 3, 3]),
        (2, 5, vec![2]),
        (1, 1, vec![1]),
    ] {
        let store = Arc::new(RecordingOnlineStore::new());
        let mut w = writer(&store, fixed(b));
        let rows = sample_feature_rows(n);

        assert_eq!(w.write(&rows)?, n);
        assert_mini_batch_sizes(&store, &expected);
        assert_mini_batches_bounded(&store, b);
        assert_rows_written_in_order(&store, &rows);
        assert_eq!(w.progress().get(), n as u64);
        assert_eq!(w.mini_batches_written(), expected.len());
    }
    Ok(())
}

#[test]
fn default_setting_writes_thousand_row_mini_batches() -> anyhow::Result<()> {
    let store = Arc::new(RecordingOnlineStore::new());
    let mut w = writer(&store, MiniBatchSetting::default());
    w.write(&sample_feature_rows(2500))?;
    assert_mini_batch_sizes(&store, &[1000, 1000, 500]);
    assert_eq!(w.progress().get(), 2500);
    Ok(())
}

#[test]
fn empty_input_makes_no_calls() -> anyhow::Result<()> {
    let store = Arc::new(RecordingOnlineStore::new());
    let mut w = writer(&store, fixed(10));
    assert_eq!(w.write(&[])?, 0);
    assert!(store.calls().is_empty());
    assert_eq!(w.progress().get(), 0);
    Ok(())
}

#[test]
fn progress_accumulates_across_writes() -> anyhow::Result<()> {
    let store = Arc::new(RecordingOnlineStore::new());
    let mut w = writer(&store, fixed(4));
    let rows = sample_feature_rows(10);

    w.write(&rows[..6])?;
    assert_eq!(w.progress().get(), 6);
    w.write(&rows[6..])?;
    assert_eq!(w.progress().get(), 10);

    // Each write starts its own run of mini-batches.
    assert_mini_batch_sizes(&store, &[4, 2, 4]);
    assert_rows_written_in_order(&store, &rows);
    Ok(())
}

#[test]
fn failed_mini_batch_stops_the_write() {
    let store = Arc::new(RecordingOnlineStore::failing_on_call(2));
    let mut w = writer(&store, fixed(3));
    let rows = sample_feature_rows(10);

    let err = w.write(&rows).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderWrite);
    match &err {
        MaterializeError::ProviderWrite {
            mini_batch,
            rows_acknowledged,
            source,
            ..
        } => {
            assert_eq!(*mini_batch, 1);
            assert_eq!(*rows_acknowledged, 3);
            assert_eq!(source.to_string(), "injected failure on provider call 2");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Third and fourth mini-batches are never attempted.
    assert_mini_batch_sizes(&store, &[3, 3]);
    assert_rows_written_in_order(&store, &rows[..3]);
    assert_eq!(w.progress().get(), 3);
}

#[test]
fn invalid_setting_fails_before_any_provider_call() {
    for raw in ["0", "abc", "-1", ""] {
        let store = Arc::new(RecordingOnlineStore::new());
        let mut w = writer(&store, MiniBatchSetting::from_raw(raw));

        let err = w.write(&sample_feature_rows(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration, "{raw:?}");
        assert!(matches!(
            err,
            MaterializeError::Config(ConfigError::InvalidMiniBatchSize { .. })
        ));
        assert!(store.calls().is_empty());
        assert_eq!(w.progress().get(), 0);
    }
}

#[test]
fn replaced_setting_is_resolved_again() -> anyhow::Result<()> {
    let store = Arc::new(RecordingOnlineStore::new());
    let mut w = writer(&store, fixed(2));
    assert_eq!(w.mini_batch_size()?.get(), 2);

    w.set_mini_batch_setting(fixed(5));
    assert_eq!(w.mini_batch_size()?.get(), 5);
    Ok(())
}
