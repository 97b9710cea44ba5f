//! Typed values and the feature rows built from them.

use crate::schema::ValueType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A single typed entity or feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bytes(Vec<u8>),
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Float(f32),
    Bool(bool),
    UnixTimestamp(DateTime<Utc>),
    BytesList(Vec<Vec<u8>>),
    StringList(Vec<String>),
    Int32List(Vec<i32>),
    Int64List(Vec<i64>),
    DoubleList(Vec<f64>),
    FloatList(Vec<f32>),
    BoolList(Vec<bool>),
    UnixTimestampList(Vec<DateTime<Utc>>),
}

// Collects scalar values of one variant into the matching list variant.
macro_rules! collect_list {
    ($items:expr, $scalar:ident => $list:ident) => {
        $items
            .iter()
            .map(|v| match v {
                Value::$scalar(x) => Some(x.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(Value::$list)
    };
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Build a list value from scalar items of `element` type.
    ///
    /// Returns `None` if any item is null or of a different type.
    #[must_use]
    pub fn list_of(element: ValueType, items: &[Value]) -> Option<Value> {
        match element {
            ValueType::Bytes => collect_list!(items, Bytes => BytesList),
            ValueType::String => collect_list!(items, String => StringList),
            ValueType::Int32 => collect_list!(items, Int32 => Int32List),
            ValueType::Int64 => collect_list!(items, Int64 => Int64List),
            ValueType::Double => collect_list!(items, Double => DoubleList),
            ValueType::Float => collect_list!(items, Float => FloatList),
            ValueType::Bool => collect_list!(items, Bool => BoolList),
            ValueType::UnixTimestamp => collect_list!(items, UnixTimestamp => UnixTimestampList),
            _ => None,
        }
    }
}

/// The entity a feature row describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityKey {
    pub join_keys: Vec<String>,
    pub entity_values: Vec<Value>,
}

impl EntityKey {
    /// Stable string form used to key rows in a store.
    #[must_use]
    pub fn storage_key(&self) -> String {
        let mut key = String::new();
        for (name, value) in self.join_keys.iter().zip(&self.entity_values) {
            if !key.is_empty() {
                key.push('|');
            }
            let _ = write!(key, "{name}={value:?}");
        }
        key
    }
}

/// One converted input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub entity_key: EntityKey,
    /// Feature values in declaration order.
    pub features: Vec<(String, Value)>,
    pub event_timestamp: DateTime<Utc>,
    pub created_timestamp: Option<DateTime<Utc>>,
}

impl FeatureRow {
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<&Value> {
        self.features
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn entity_value(&self, join_key: &str) -> Option<&Value> {
        self.entity_key
            .join_keys
            .iter()
            .position(|k| k == join_key)
            .and_then(|i| self.entity_key.entity_values.get(i))
    }
}
