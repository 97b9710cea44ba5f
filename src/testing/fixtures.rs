//! Pre-built feature views and datasets for common testing scenarios.

use crate::schema::{DataSource, FeatureView, ValueType};
use crate::value::{EntityKey, FeatureRow, Value};
use anyhow::{Context, Result};
use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};
use serde_arrow::to_record_batch;

/// Event time of the first fixture row, in epoch seconds.
pub const FIXTURE_EPOCH_SECONDS: i64 = 1_700_000_000;

/// One row of the driver statistics dataset, as written by an offline store.
///
/// Timestamps are epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStatsRow {
    pub driver_id: i64,
    pub conv_rate: f64,
    pub acc_rate: f32,
    pub avg_daily_trips: i64,
    pub event_timestamp: i64,
    pub created: i64,
}

/// The feature view matching [`DriverStatsRow`].
///
/// # Example
///
/// ```
/// use ironmat::testing::driver_stats_view;
///
/// let view = driver_stats_view();
/// assert_eq!(view.features.len(), 3);
/// assert!(view.validate().is_ok());
/// ```
#[must_use]
pub fn driver_stats_view() -> FeatureView {
    FeatureView::new(
        "driver_hourly_stats",
        DataSource::new("event_timestamp").with_created_timestamp_column("created"),
    )
    .with_entity("driver_id", ValueType::Int64)
    .with_feature("conv_rate", ValueType::Double)
    .with_feature("acc_rate", ValueType::Float)
    .with_feature("avg_daily_trips", ValueType::Int64)
}

/// `n` driver rows with distinct ids and increasing event times.
#[must_use]
pub fn driver_stats_rows(n: usize) -> Vec<DriverStatsRow> {
    (0..n)
        .map(|i| {
            let i = i as i64;
            DriverStatsRow {
                driver_id: 1000 + i,
                conv_rate: (i % 100) as f64 / 100.0,
                acc_rate: (i % 10) as f32 / 10.0,
                avg_daily_trips: i % 50,
                event_timestamp: FIXTURE_EPOCH_SECONDS + i,
                created: FIXTURE_EPOCH_SECONDS + i + 60,
            }
        })
        .collect()
}

/// Build a `RecordBatch` from serializable rows, inferring the schema from `T`.
///
/// # Errors
///
/// Returns an error if the schema cannot be inferred or the rows do not fit it.
pub fn record_batch_from_rows<T: Serialize + Deserialize<'static>>(
    rows: &[T],
) -> Result<RecordBatch> {
    let fields = Vec::<FieldRef>::from_type::<T>(TracingOptions::default())
        .context("infer Arrow schema from type T")?;
    to_record_batch(&fields, &rows).context("convert rows to RecordBatch")
}

/// [`driver_stats_rows`] as a single Arrow batch.
///
/// # Errors
///
/// See [`record_batch_from_rows`].
pub fn driver_stats_batch(n: usize) -> Result<RecordBatch> {
    record_batch_from_rows(&driver_stats_rows(n))
}

/// The feature row a [`DriverStatsRow`] converts to under [`driver_stats_view`].
#[must_use]
pub fn expected_feature_row(row: &DriverStatsRow) -> FeatureRow {
    FeatureRow {
        entity_key: EntityKey {
            join_keys: vec!["driver_id".to_string()],
            entity_values: vec![Value::Int64(row.driver_id)],
        },
        features: vec![
            ("conv_rate".to_string(), Value::Double(row.conv_rate)),
            ("acc_rate".to_string(), Value::Float(row.acc_rate)),
            ("avg_daily_trips".to_string(), Value::Int64(row.avg_daily_trips)),
        ],
        event_timestamp: epoch_seconds(row.event_timestamp),
        created_timestamp: Some(epoch_seconds(row.created)),
    }
}

/// Feature rows for writer tests that do not go through Arrow.
#[must_use]
pub fn sample_feature_rows(n: usize) -> Vec<FeatureRow> {
    driver_stats_rows(n).iter().map(expected_feature_row).collect()
}

fn epoch_seconds(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}
