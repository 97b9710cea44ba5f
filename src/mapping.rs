//! Column renaming applied to batches before conversion.

use crate::error::MappingError;
use crate::schema::FieldMapping;
use arrow::datatypes::{FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::HashSet;
use std::sync::Arc;

/// Rename the columns of `batch` named in `mapping`.
///
/// Columns not mentioned pass through unchanged, column order and row order
/// are preserved, and the column data is shared with the input. With no
/// mapping (or an empty one) the input batch is returned as is.
///
/// # Errors
///
/// Returns [`MappingError::DuplicateColumn`] if two columns end up with the
/// same name.
pub fn apply_field_mapping(
    batch: RecordBatch,
    mapping: Option<&FieldMapping>,
) -> Result<RecordBatch, MappingError> {
    let Some(mapping) = mapping.filter(|m| !m.is_empty()) else {
        return Ok(batch);
    };

    let schema = batch.schema();
    let fields: Vec<FieldRef> = schema
        .fields()
        .iter()
        .map(|field| match mapping.get(field.name()) {
            Some(renamed) => Arc::new(field.as_ref().clone().with_name(renamed)),
            None => Arc::clone(field),
        })
        .collect();

    let mut seen = HashSet::with_capacity(fields.len());
    for field in &fields {
        if !seen.insert(field.name().as_str()) {
            return Err(MappingError::DuplicateColumn {
                column: field.name().clone(),
            });
        }
    }

    let renamed = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(
        Arc::new(renamed),
        batch.columns().to_vec(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, StringArray};

    fn batch() -> RecordBatch {
        RecordBatch::try_from_iter([
            ("a", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            ("b", Arc::new(StringArray::from(vec!["x", "y", "z"])) as ArrayRef),
        ])
        .expect("valid batch")
    }

    fn mapping(pairs: &[(&str, &str)]) -> FieldMapping {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn no_mapping_returns_input() -> anyhow::Result<()> {
        let input = batch();
        assert_eq!(apply_field_mapping(input.clone(), None)?, input);
        assert_eq!(apply_field_mapping(input.clone(), Some(&FieldMapping::new()))?, input);
        Ok(())
    }

    #[test]
    fn renames_only_mapped_columns() -> anyhow::Result<()> {
        let input = batch();
        let out = apply_field_mapping(input.clone(), Some(&mapping(&[("a", "x")])))?;

        let names: Vec<_> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["x", "b"]);
        assert!(out.column_by_name("a").is_none());
        assert_eq!(out.column(0), input.column(0));
        assert_eq!(out.column(1), input.column(1));
        assert_eq!(out.num_rows(), 3);
        Ok(())
    }

    #[test]
    fn unknown_source_columns_are_ignored() -> anyhow::Result<()> {
        let input = batch();
        let out = apply_field_mapping(input.clone(), Some(&mapping(&[("missing", "m")])))?;
        assert_eq!(out, input);
        Ok(())
    }

    #[test]
    fn swapping_names_is_allowed() -> anyhow::Result<()> {
        let out = apply_field_mapping(batch(), Some(&mapping(&[("a", "b"), ("b", "a")])))?;
        let names: Vec<_> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["b", "a"]);
        Ok(())
    }

    #[test]
    fn rename_onto_existing_column_fails() {
        let err = apply_field_mapping(batch(), Some(&mapping(&[("a", "b")]))).unwrap_err();
        assert!(matches!(err, MappingError::DuplicateColumn { column } if column == "b"));
    }
}
