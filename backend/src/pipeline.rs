//! The validate → map → infer → format pipeline shared by every
//! `/predict/*` endpoint.

use std::sync::Arc;

use actix_web::web;
use log::{error, info, warn};
use serde_json::Value;

use crate::catalog::{LabelStrategy, ModelSpec, ResponseShape};
use crate::classifier::{Classifier, ModelOutput};
use crate::error::ApiError;
use crate::models::{PredictionResult, Probabilities};
use crate::registry::ModelRegistry;
use crate::schema::{self, Schema};

/// Runs one prediction for `spec`, validating `body` as an `S` record.
///
/// The model is not touched unless validation succeeds. Inference runs on
/// the blocking pool.
pub async fn predict<S: Schema>(
    registry: &ModelRegistry,
    spec: &'static ModelSpec,
    body: Value,
) -> Result<PredictionResult, ApiError> {
    let record: S = schema::validate(&body).map_err(|err| {
        warn!("Rejected {} request: {}", spec.id, err);
        err
    })?;

    let input = serde_json::to_value(&record).map_err(|err| ApiError::Body(err.to_string()))?;
    let row = match &input {
        Value::Object(fields) => spec.columns.build_row(fields),
        _ => return Err(ApiError::Body("record is not a JSON object".to_string())),
    };

    let classifier = Arc::clone(registry.get(spec.id));
    let output = match web::block(move || classifier.run(&row)).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            error!("{} inference failed: {:#}", spec.id, err);
            return Err(ApiError::Inference(format!("{err:#}")));
        }
        Err(err) => {
            error!("{} inference task failed: {}", spec.id, err);
            return Err(ApiError::Inference(err.to_string()));
        }
    };

    let result = assemble(spec, &registry.class_names(spec.id), input, output)?;
    info!("{} prediction: {}", spec.id, result.prediction);
    Ok(result)
}

/// Shapes the raw model output into the endpoint's response.
pub fn assemble(
    spec: &ModelSpec,
    class_names: &[String],
    input: Value,
    output: ModelOutput,
) -> Result<PredictionResult, ApiError> {
    let ModelOutput { label, probabilities } = output;

    match spec.response {
        ResponseShape::MaxProbability => {
            let probability = probabilities
                .iter()
                .copied()
                .reduce(f32::max)
                .ok_or_else(|| ApiError::Inference("model returned no probabilities".to_string()))?;
            Ok(PredictionResult {
                input,
                prediction: label,
                class_name: None,
                probabilities: None,
                probability: Some(probability),
            })
        }
        ResponseShape::Distribution => {
            if probabilities.len() != class_names.len() {
                return Err(ApiError::Inference(format!(
                    "model returned {} probabilities for {} classes",
                    probabilities.len(),
                    class_names.len()
                )));
            }
            let class_name = match spec.labels {
                LabelStrategy::Lookup(names) => label
                    .as_index()
                    .and_then(|ix| names.get(ix))
                    .map(|name| name.to_string())
                    .ok_or_else(|| ApiError::Inference(format!("label {label} is not a class index")))?,
                LabelStrategy::Native => label.to_string(),
            };
            let probabilities = Probabilities::new(class_names.iter().cloned().zip(probabilities).collect());
            Ok(PredictionResult {
                input,
                prediction: label,
                class_name: Some(class_name),
                probabilities: Some(probabilities),
                probability: None,
            })
        }
    }
}
