//! Feature view schema model.
//!
//! A [`FeatureView`] describes what one materialization run writes: the entity
//! (join-key) columns that identify a row, the feature columns carried as
//! values, and the [`DataSource`] the batch data comes from. Everything here is
//! immutable for the duration of a run and (de)serializable so a job file can
//! carry it.

use crate::error::ConfigError;
use arrow::datatypes::{DataType, Field, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Column renames applied to batches before interpretation (`old -> new`).
pub type FieldMapping = BTreeMap<String, String>;

/// Declared type of an entity or feature value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Bytes,
    String,
    Int32,
    Int64,
    Double,
    Float,
    Bool,
    UnixTimestamp,
    BytesList,
    StringList,
    Int32List,
    Int64List,
    DoubleList,
    FloatList,
    BoolList,
    UnixTimestampList,
}

impl ValueType {
    /// Element type of a list type, `None` for scalars.
    #[must_use]
    pub const fn element_type(self) -> Option<Self> {
        match self {
            Self::BytesList => Some(Self::Bytes),
            Self::StringList => Some(Self::String),
            Self::Int32List => Some(Self::Int32),
            Self::Int64List => Some(Self::Int64),
            Self::DoubleList => Some(Self::Double),
            Self::FloatList => Some(Self::Float),
            Self::BoolList => Some(Self::Bool),
            Self::UnixTimestampList => Some(Self::UnixTimestamp),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_list(self) -> bool {
        self.element_type().is_some()
    }

    /// Arrow type a column is cast to before its values are read.
    #[must_use]
    pub fn arrow_type(self) -> DataType {
        match self {
            Self::Bytes => DataType::Binary,
            Self::String => DataType::Utf8,
            Self::Int32 => DataType::Int32,
            Self::Int64 => DataType::Int64,
            Self::Double => DataType::Float64,
            Self::Float => DataType::Float32,
            Self::Bool => DataType::Boolean,
            Self::UnixTimestamp => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            list => {
                let element = list.element_type().unwrap_or(Self::Bytes).arrow_type();
                DataType::List(Arc::new(Field::new_list_field(element, true)))
            }
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bytes => "BYTES",
            Self::String => "STRING",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Double => "DOUBLE",
            Self::Float => "FLOAT",
            Self::Bool => "BOOL",
            Self::UnixTimestamp => "UNIX_TIMESTAMP",
            Self::BytesList => "BYTES_LIST",
            Self::StringList => "STRING_LIST",
            Self::Int32List => "INT32_LIST",
            Self::Int64List => "INT64_LIST",
            Self::DoubleList => "DOUBLE_LIST",
            Self::FloatList => "FLOAT_LIST",
            Self::BoolList => "BOOL_LIST",
            Self::UnixTimestampList => "UNIX_TIMESTAMP_LIST",
        };
        f.write_str(name)
    }
}

/// An entity (join-key) column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub value_type: ValueType,
}

impl Entity {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// A feature column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub value_type: ValueType,
}

impl Feature {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// Where the batch data of a feature view comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Column holding each row's event timestamp.
    pub timestamp_field: String,
    /// Column holding each row's ingestion timestamp, if any.
    #[serde(default)]
    pub created_timestamp_column: Option<String>,
    /// Renames applied to source columns before conversion.
    #[serde(default)]
    pub field_mapping: Option<FieldMapping>,
}

impl DataSource {
    pub fn new(timestamp_field: impl Into<String>) -> Self {
        Self {
            timestamp_field: timestamp_field.into(),
            created_timestamp_column: None,
            field_mapping: None,
        }
    }

    #[must_use]
    pub fn with_created_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.created_timestamp_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_field_mapping<I, K, V>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.field_mapping = Some(
            mapping
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

/// Schema of the feature data being materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureView {
    pub name: String,
    pub entity_columns: Vec<Entity>,
    pub features: Vec<Feature>,
    pub batch_source: DataSource,
}

impl FeatureView {
    pub fn new(name: impl Into<String>, batch_source: DataSource) -> Self {
        Self {
            name: name.into(),
            entity_columns: Vec::new(),
            features: Vec::new(),
            batch_source,
        }
    }

    #[must_use]
    pub fn with_entity(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.entity_columns.push(Entity::new(name, value_type));
        self
    }

    #[must_use]
    pub fn with_feature(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.features.push(Feature::new(name, value_type));
        self
    }

    /// Check that entity and feature names are usable as row keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFeatureView`] if the view has no entity
    /// columns or declares a column name twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidFeatureView {
            view: self.name.clone(),
            reason,
        };
        if self.entity_columns.is_empty() {
            return Err(invalid("no entity columns declared".into()));
        }
        let mut seen = HashSet::new();
        let names = self
            .entity_columns
            .iter()
            .map(|e| &e.name)
            .chain(self.features.iter().map(|f| &f.name));
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("column {name} is declared more than once")));
            }
        }
        Ok(())
    }
}

/// Entity name to declared value type, in entity-column order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinKeyTypeMap {
    entries: Vec<(String, ValueType)>,
}

impl JoinKeyTypeMap {
    #[must_use]
    pub fn from_view(view: &FeatureView) -> Self {
        Self {
            entries: view
                .entity_columns
                .iter()
                .map(|e| (e.name.clone(), e.value_type))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ValueType> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ValueType)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), *t))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
