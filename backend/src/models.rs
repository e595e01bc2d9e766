use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::classifier::Label;

#[derive(Debug, Serialize)]
pub struct Banner {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub artifact: &'static str,
    pub columns: Vec<&'static str>,
    pub classes: Vec<String>,
}

/// Class name to probability, serialized as a JSON object in model class order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Probabilities(Vec<(String, f32)>);

impl Probabilities {
    pub fn new(entries: Vec<(String, f32)>) -> Self {
        Probabilities(entries)
    }

    pub fn get(&self, class_name: &str) -> Option<f32> {
        self.0
            .iter()
            .find(|(name, _)| name == class_name)
            .map(|(_, p)| *p)
    }
}

impl Serialize for Probabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, p) in &self.0 {
            map.serialize_entry(name, p)?;
        }
        map.end()
    }
}

/// Response body of every `/predict/*` endpoint.
///
/// The distribution endpoints fill `class_name` and `probabilities`; the
/// German Credit endpoint only reports the top `probability`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub input: Value,
    pub prediction: Label,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Probabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub detail: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(kind: &'static str, detail: String) -> Self {
        ErrorResponse {
            error: kind,
            detail,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
