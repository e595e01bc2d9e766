//! Flat, column-ordered rows handed to the models.
//!
//! Every model was fit on a frame with its own column names and order. A
//! [`ColumnMap`] records that layout as a fixed table so a validated request
//! can be turned into exactly the row the artifact expects.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Float(f64),
    Int(i64),
    Str(String),
    Missing,
}

impl FeatureValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FeatureValue::Missing,
            Value::Number(n) => match n.as_i64() {
                Some(i) if n.is_i64() => FeatureValue::Int(i),
                _ => n.as_f64().map_or(FeatureValue::Missing, FeatureValue::Float),
            },
            Value::String(s) => FeatureValue::Str(s.clone()),
            Value::Bool(b) => FeatureValue::Int(i64::from(*b)),
            Value::Array(_) | Value::Object(_) => FeatureValue::Str(value.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }
}

/// One entry of a column map: request field name and trained column name.
/// Optional columns may arrive as [`FeatureValue::Missing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub source: &'static str,
    pub name: &'static str,
    pub optional: bool,
}

pub const fn column(source: &'static str, name: &'static str) -> Column {
    Column {
        source,
        name,
        optional: false,
    }
}

pub const fn optional_column(source: &'static str, name: &'static str) -> Column {
    Column {
        source,
        name,
        optional: true,
    }
}

/// Ordered source-field to trained-column table for one model.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMap(&'static [Column]);

impl ColumnMap {
    pub const fn new(columns: &'static [Column]) -> Self {
        ColumnMap(columns)
    }

    pub fn columns(&self) -> &'static [Column] {
        self.0
    }

    /// Trained column names, in model order.
    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|c| c.name).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_optional(&self, name: &str) -> bool {
        self.0.iter().any(|c| c.optional && c.name == name)
    }

    /// Builds the row from a normalized request record. Fields absent from
    /// the record are carried as [`FeatureValue::Missing`].
    pub fn build_row(&self, record: &Map<String, Value>) -> FeatureRow {
        let values = self
            .0
            .iter()
            .map(|c| {
                let value = record
                    .get(c.source)
                    .map_or(FeatureValue::Missing, FeatureValue::from_json);
                (c.name, value)
            })
            .collect();
        FeatureRow { values }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: Vec<(&'static str, FeatureValue)>,
}

impl FeatureRow {
    pub fn new(values: Vec<(&'static str, FeatureValue)>) -> Self {
        FeatureRow { values }
    }

    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(name, _)| *name)
    }

    pub fn values(&self) -> impl Iterator<Item = &FeatureValue> {
        self.values.iter().map(|(_, value)| value)
    }
}
