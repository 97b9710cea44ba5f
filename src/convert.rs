//! Conversion of columnar batches into typed feature rows.
//!
//! [`RowConverter`] reads every column the feature view needs out of a
//! [`RecordBatch`], coerces it to the declared [`ValueType`] with a strict
//! Arrow cast, and zips the columns back into one [`FeatureRow`] per input row.
//!
//! Coercion is all-or-nothing for a batch: a single value that does not fit
//! its declared type fails the whole batch with a [`ConversionError`].
//!
//! Timestamp columns (event, created and `UNIX_TIMESTAMP` values) accept Arrow
//! timestamps of any unit, dates, integer epoch seconds and RFC 3339 strings,
//! and are normalised to UTC.

use crate::error::ConversionError;
use crate::schema::{FeatureView, JoinKeyTypeMap, ValueType};
use crate::value::{EntityKey, FeatureRow, Value};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int32Type, Int64Type, TimeUnit, TimestampMicrosecondType,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::sync::Arc;

type Timestamps = Vec<Option<DateTime<Utc>>>;

/// Converts batches for one feature view.
#[derive(Debug, Clone)]
pub struct RowConverter {
    view: Arc<FeatureView>,
    join_keys: JoinKeyTypeMap,
}

impl RowConverter {
    #[must_use]
    pub fn new(view: Arc<FeatureView>) -> Self {
        let join_keys = JoinKeyTypeMap::from_view(&view);
        Self { view, join_keys }
    }

    #[must_use]
    pub fn join_keys(&self) -> &JoinKeyTypeMap {
        &self.join_keys
    }

    /// Convert `batch` into one row per input row, in input order.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] if a required column is missing, a value
    /// cannot be coerced to its declared type, or an event timestamp is null.
    pub fn convert(&self, batch: &RecordBatch) -> Result<Vec<FeatureRow>, ConversionError> {
        let num_rows = batch.num_rows();
        let source = &self.view.batch_source;

        let mut entity_columns = Vec::with_capacity(self.join_keys.len());
        for (name, value_type) in self.join_keys.iter() {
            entity_columns.push(column_values(batch, name, value_type)?.into_iter());
        }
        let mut feature_columns = Vec::with_capacity(self.view.features.len());
        for feature in &self.view.features {
            let values = column_values(batch, &feature.name, feature.value_type)?;
            feature_columns.push(values.into_iter());
        }

        let event_timestamps = timestamp_column(batch, &source.timestamp_field)?;
        let created_timestamps: Timestamps = match &source.created_timestamp_column {
            Some(column) => timestamp_column(batch, column)?,
            None => vec![None; num_rows],
        };

        let join_key_names: Vec<String> = self.join_keys.names().map(String::from).collect();
        let mut rows = Vec::with_capacity(num_rows);
        for (row, (event, created)) in event_timestamps
            .into_iter()
            .zip(created_timestamps)
            .enumerate()
        {
            let event_timestamp = event.ok_or_else(|| ConversionError::NullEventTimestamp {
                column: source.timestamp_field.clone(),
                row,
            })?;
            let entity_values = entity_columns
                .iter_mut()
                .map(|col| col.next().unwrap_or(Value::Null))
                .collect();
            let features = self
                .view
                .features
                .iter()
                .zip(feature_columns.iter_mut())
                .map(|(f, col)| (f.name.clone(), col.next().unwrap_or(Value::Null)))
                .collect();
            rows.push(FeatureRow {
                entity_key: EntityKey {
                    join_keys: join_key_names.clone(),
                    entity_values,
                },
                features,
                event_timestamp,
                created_timestamp: created,
            });
        }
        Ok(rows)
    }
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef, ConversionError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ConversionError::MissingColumn {
            column: name.to_string(),
        })
}

fn column_values(
    batch: &RecordBatch,
    name: &str,
    value_type: ValueType,
) -> Result<Vec<Value>, ConversionError> {
    array_values(column(batch, name)?.as_ref(), name, value_type)
}

fn timestamp_column(batch: &RecordBatch, name: &str) -> Result<Timestamps, ConversionError> {
    timestamp_values(column(batch, name)?.as_ref(), name)
}

fn strict_cast(
    array: &dyn Array,
    to: &DataType,
    column: &str,
    value_type: ValueType,
) -> Result<ArrayRef, ConversionError> {
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    cast_with_options(array, to, &options).map_err(|source| ConversionError::Coerce {
        column: column.to_string(),
        value_type,
        source,
    })
}

fn array_values(
    array: &dyn Array,
    column: &str,
    value_type: ValueType,
) -> Result<Vec<Value>, ConversionError> {
    if let Some(element) = value_type.element_type() {
        return list_values(array, column, value_type, element);
    }
    if value_type == ValueType::UnixTimestamp {
        return Ok(timestamp_values(array, column)?
            .into_iter()
            .map(|t| t.map_or(Value::Null, Value::UnixTimestamp))
            .collect());
    }

    let cast = strict_cast(array, &value_type.arrow_type(), column, value_type)?;
    let values = match value_type {
        ValueType::Bytes => cast
            .as_binary::<i32>()
            .iter()
            .map(|v| v.map_or(Value::Null, |b| Value::Bytes(b.to_vec())))
            .collect(),
        ValueType::String => cast
            .as_string::<i32>()
            .iter()
            .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string())))
            .collect(),
        ValueType::Int32 => cast
            .as_primitive::<Int32Type>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Int32))
            .collect(),
        ValueType::Int64 => cast
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Int64))
            .collect(),
        ValueType::Double => cast
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Double))
            .collect(),
        ValueType::Float => cast
            .as_primitive::<Float32Type>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Float))
            .collect(),
        ValueType::Bool => cast
            .as_boolean()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
        // handled above
        _ => Vec::new(),
    };
    Ok(values)
}

fn list_values(
    array: &dyn Array,
    column: &str,
    value_type: ValueType,
    element: ValueType,
) -> Result<Vec<Value>, ConversionError> {
    let normalised: ArrayRef = match array.data_type() {
        DataType::List(_) => Arc::new(array.as_list::<i32>().clone()) as ArrayRef,
        DataType::LargeList(item) | DataType::FixedSizeList(item, _) => strict_cast(
            array,
            &DataType::List(Arc::clone(item)),
            column,
            value_type,
        )?,
        other => {
            return Err(ConversionError::NotAList {
                column: column.to_string(),
                value_type,
                data_type: other.clone(),
            });
        }
    };
    let list = normalised.as_list::<i32>();

    // Convert the child array once, then slice it per row by offsets.
    let items = array_values(list.values().as_ref(), column, element)?;
    let offsets = list.value_offsets();
    let mut out = Vec::with_capacity(list.len());
    for row in 0..list.len() {
        if list.is_null(row) {
            out.push(Value::Null);
            continue;
        }
        let start = usize::try_from(offsets[row]).unwrap_or_default();
        let end = usize::try_from(offsets[row + 1]).unwrap_or_default();
        let value = items
            .get(start..end)
            .and_then(|slice| Value::list_of(element, slice))
            .ok_or_else(|| ConversionError::NullListElement {
                column: column.to_string(),
                row,
                value_type,
            })?;
        out.push(value);
    }
    Ok(out)
}

fn timestamp_values(array: &dyn Array, column: &str) -> Result<Timestamps, ConversionError> {
    let invalid = |row| ConversionError::InvalidTimestamp {
        column: column.to_string(),
        row,
    };
    let micros_type = |tz| DataType::Timestamp(TimeUnit::Microsecond, tz);

    let micros = match array.data_type() {
        DataType::Timestamp(_, tz) => strict_cast(
            array,
            &micros_type(tz.clone()),
            column,
            ValueType::UnixTimestamp,
        )?,
        DataType::Date32 | DataType::Date64 => {
            strict_cast(array, &micros_type(None), column, ValueType::UnixTimestamp)?
        }
        DataType::Utf8 | DataType::LargeUtf8 => strict_cast(
            array,
            &micros_type(Some("UTC".into())),
            column,
            ValueType::UnixTimestamp,
        )?,
        dt if dt.is_integer() => {
            let secs = strict_cast(array, &DataType::Int64, column, ValueType::UnixTimestamp)?;
            return secs
                .as_primitive::<Int64Type>()
                .iter()
                .enumerate()
                .map(|(row, v)| {
                    v.map(|s| DateTime::<Utc>::from_timestamp(s, 0).ok_or_else(|| invalid(row)))
                        .transpose()
                })
                .collect();
        }
        other => {
            return Err(ConversionError::UnsupportedTimestamp {
                column: column.to_string(),
                data_type: other.clone(),
            });
        }
    };

    micros
        .as_primitive::<TimestampMicrosecondType>()
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|us| DateTime::<Utc>::from_timestamp_micros(us).ok_or_else(|| invalid(row)))
                .transpose()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataSource;
    use arrow::array::{
        BooleanArray, Float64Array, Int64Array, ListArray, StringArray,
        TimestampMillisecondArray, TimestampSecondArray,
    };
    use chrono::TimeZone;

    fn view() -> Arc<FeatureView> {
        Arc::new(
            FeatureView::new(
                "driver_stats",
                DataSource::new("event_timestamp").with_created_timestamp_column("created"),
            )
            .with_entity("driver_id", ValueType::Int64)
            .with_feature("conv_rate", ValueType::Double)
            .with_feature("active", ValueType::Bool),
        )
    }

    fn batch(driver_ids: ArrayRef) -> RecordBatch {
        batch_with_events(
            driver_ids,
            Arc::new(TimestampSecondArray::from(vec![100, 200, 300])),
        )
    }

    fn batch_with_events(driver_ids: ArrayRef, events: ArrayRef) -> RecordBatch {
        RecordBatch::try_from_iter([
            ("driver_id", driver_ids),
            (
                "conv_rate",
                Arc::new(Float64Array::from(vec![Some(0.5), None, Some(0.25)])) as ArrayRef,
            ),
            (
                "active",
                Arc::new(BooleanArray::from(vec![true, false, true])) as ArrayRef,
            ),
            ("event_timestamp", events),
            (
                "created",
                Arc::new(TimestampMillisecondArray::from(vec![Some(1_000), None, Some(3_000)]))
                    as ArrayRef,
            ),
        ])
        .expect("valid batch")
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn converts_rows_in_order() -> anyhow::Result<()> {
        let ids = Arc::new(Int64Array::from(vec![11, 12, 13])) as ArrayRef;
        let converter = RowConverter::new(view());
        assert_eq!(converter.join_keys().get("driver_id"), Some(ValueType::Int64));
        let rows = converter.convert(&batch(ids))?;

        assert_eq!(rows.len(), 3);
        let ids: Vec<_> = rows
            .iter()
            .map(|r| r.entity_value("driver_id").cloned())
            .collect();
        assert_eq!(
            ids,
            vec![
                Some(Value::Int64(11)),
                Some(Value::Int64(12)),
                Some(Value::Int64(13))
            ]
        );
        assert_eq!(rows[0].feature("conv_rate"), Some(&Value::Double(0.5)));
        assert!(rows[1].feature("conv_rate").is_some_and(Value::is_null));
        assert_eq!(rows[1].feature("active"), Some(&Value::Bool(false)));
        assert_eq!(rows[2].event_timestamp, at(300));
        assert_eq!(rows[0].created_timestamp, Some(at(1)));
        assert_eq!(rows[1].created_timestamp, None);
        Ok(())
    }

    #[test]
    fn coerces_entity_strings_to_declared_type() -> anyhow::Result<()> {
        let ids = Arc::new(StringArray::from(vec!["11", "12", "13"])) as ArrayRef;
        let rows = RowConverter::new(view()).convert(&batch(ids))?;
        assert_eq!(rows[1].entity_value("driver_id"), Some(&Value::Int64(12)));
        Ok(())
    }

    #[test]
    fn uncoercible_entity_value_fails_the_batch() {
        let ids = Arc::new(StringArray::from(vec!["11", "twelve", "13"])) as ArrayRef;
        let err = RowConverter::new(view()).convert(&batch(ids)).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::Coerce {
                column,
                value_type: ValueType::Int64,
                ..
            } if column == "driver_id"
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let b = RecordBatch::try_from_iter([(
            "driver_id",
            Arc::new(Int64Array::from(vec![1])) as ArrayRef,
        )])
        .expect("valid batch");
        let err = RowConverter::new(view()).convert(&b).unwrap_err();
        assert!(matches!(err, ConversionError::MissingColumn { column } if column == "conv_rate"));
    }

    #[test]
    fn null_event_timestamp_is_an_error() {
        let b = batch_with_events(
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(TimestampSecondArray::from(vec![Some(1), None, Some(3)])),
        );
        let err = RowConverter::new(view()).convert(&b).unwrap_err();
        assert!(matches!(err, ConversionError::NullEventTimestamp { row: 1, .. }));
    }

    #[test]
    fn integer_timestamps_are_epoch_seconds() -> anyhow::Result<()> {
        let ts = Arc::new(Int64Array::from(vec![Some(1_700_000_000), None])) as ArrayRef;
        let values = timestamp_values(ts.as_ref(), "ts")?;
        assert_eq!(values, vec![Some(at(1_700_000_000)), None]);
        Ok(())
    }

    #[test]
    fn list_features_are_converted_per_row() -> anyhow::Result<()> {
        let list = ListArray::from_iter_primitive::<Int64Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            None,
            Some(vec![]),
        ]);
        let values = array_values(&list, "trips", ValueType::Int64List)?;
        assert_eq!(
            values,
            vec![Value::Int64List(vec![1, 2]), Value::Null, Value::Int64List(vec![])]
        );

        let with_null = ListArray::from_iter_primitive::<Int64Type, _, _>(vec![Some(vec![
            Some(1),
            None,
        ])]);
        assert!(matches!(
            array_values(&with_null, "trips", ValueType::Int64List),
            Err(ConversionError::NullListElement { row: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn scalar_column_is_not_a_list() {
        let ints = Int64Array::from(vec![1]);
        assert!(matches!(
            array_values(&ints, "trips", ValueType::Int64List),
            Err(ConversionError::NotAList { .. })
        ));
    }
}
