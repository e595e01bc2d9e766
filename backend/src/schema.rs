//! Request records and their field-by-field validation.
//!
//! Each record declares its fields once in [`Schema::FIELDS`]. Validation
//! walks that table in order and reports the first missing or mistyped
//! field, coercing numbers the way a lax JSON validator would (numeric
//! strings, integral floats). No range or enum checks are made.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Int,
    Str,
    /// A string that may be absent or `null`.
    OptionalStr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field { name, kind }
}

pub trait Schema: Serialize + DeserializeOwned {
    const FIELDS: &'static [Field];
}

/// Validates `body` against `S`, returning the typed record.
pub fn validate<S: Schema>(body: &Value) -> Result<S, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::Body("expected a JSON object".to_string()))?;

    let mut normalized = Map::with_capacity(S::FIELDS.len());
    for field in S::FIELDS {
        let value = coerce(field, object.get(field.name))?;
        normalized.insert(field.name.to_string(), value);
    }

    serde_json::from_value(Value::Object(normalized)).map_err(|err| ApiError::Body(err.to_string()))
}

fn coerce(field: &Field, raw: Option<&Value>) -> Result<Value, ApiError> {
    let invalid = |reason: &str| ApiError::validation(field.name, reason);

    match (field.kind, raw) {
        (FieldKind::OptionalStr, None | Some(Value::Null)) => Ok(Value::Null),
        (_, None) => Err(invalid("field required")),
        (FieldKind::Float, Some(value)) => coerce_float(value)
            .map(Value::from)
            .ok_or_else(|| invalid("value is not a valid float")),
        (FieldKind::Int, Some(value)) => coerce_int(value)
            .map(Value::from)
            .ok_or_else(|| invalid("value is not a valid integer")),
        (FieldKind::Str | FieldKind::OptionalStr, Some(Value::String(s))) => Ok(Value::String(s.clone())),
        (FieldKind::Str | FieldKind::OptionalStr, Some(_)) => Err(invalid("value is not a valid string")),
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    };
    parsed.filter(|x| x.is_finite())
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|x| x.fract() == 0.0 && x.abs() < i64::MAX as f64)
                .map(|x| x as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flower {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl Schema for Flower {
    const FIELDS: &'static [Field] = &[
        field("sepal_length", FieldKind::Float),
        field("sepal_width", FieldKind::Float),
        field("petal_length", FieldKind::Float),
        field("petal_width", FieldKind::Float),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penguin {
    pub bill_length_mm: f64,
    pub bill_depth_mm: f64,
    pub flipper_length_mm: f64,
    pub body_mass_g: f64,
}

impl Schema for Penguin {
    const FIELDS: &'static [Field] = &[
        field("bill_length_mm", FieldKind::Float),
        field("bill_depth_mm", FieldKind::Float),
        field("flipper_length_mm", FieldKind::Float),
        field("body_mass_g", FieldKind::Float),
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub pclass: i64,
    pub sex: String,
    pub age: f64,
    pub sibsp: i64,
    pub parch: i64,
    pub fare: f64,
    pub embarked: String,
}

impl Schema for Passenger {
    const FIELDS: &'static [Field] = &[
        field("pclass", FieldKind::Int),
        field("sex", FieldKind::Str),
        field("age", FieldKind::Float),
        field("sibsp", FieldKind::Int),
        field("parch", FieldKind::Int),
        field("fare", FieldKind::Float),
        field("embarked", FieldKind::Str),
    ];
}

/// German Credit applicant. Field names follow the client contract, which
/// differs from the training frame's column names (see the credit column map).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditApplicant {
    #[serde(rename = "Unnamed_0")]
    pub unnamed_0: i64,
    #[serde(rename = "Age")]
    pub age: i64,
    #[serde(rename = "Sex")]
    pub sex: String,
    #[serde(rename = "Job")]
    pub job: i64,
    #[serde(rename = "Housing")]
    pub housing: String,
    #[serde(rename = "Saving_accounts")]
    pub saving_accounts: Option<String>,
    #[serde(rename = "Checking_account")]
    pub checking_account: Option<String>,
    #[serde(rename = "Credit_amount")]
    pub credit_amount: i64,
    #[serde(rename = "Duration")]
    pub duration: i64,
    #[serde(rename = "Purpose")]
    pub purpose: String,
}

impl Schema for CreditApplicant {
    const FIELDS: &'static [Field] = &[
        field("Unnamed_0", FieldKind::Int),
        field("Age", FieldKind::Int),
        field("Sex", FieldKind::Str),
        field("Job", FieldKind::Int),
        field("Housing", FieldKind::Str),
        field("Saving_accounts", FieldKind::OptionalStr),
        field("Checking_account", FieldKind::OptionalStr),
        field("Credit_amount", FieldKind::Int),
        field("Duration", FieldKind::Int),
        field("Purpose", FieldKind::Str),
    ];
}
