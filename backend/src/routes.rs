use actix_web::{web, HttpResponse};
use serde_json::Value;

use crate::catalog::{ModelId, GERMAN_CREDIT, IRIS, PENGUINS, TITANIC};
use crate::error::ApiError;
use crate::models::{Banner, ModelInfo, ModelList};
use crate::pipeline;
use crate::registry::ModelRegistry;
use crate::schema::{CreditApplicant, Flower, Passenger, Penguin};

pub const BANNER: &str = "Welcome to the Iris, Penguins, Titanic and German Credit prediction API";

/// Registers every endpoint plus the JSON 404 fallback.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .route("/models", web::get().to(list_models))
        .route("/models/{name}", web::get().to(model_info))
        .route("/predict/iris", web::post().to(predict_iris))
        .route("/predict/penguins", web::post().to(predict_penguins))
        .route("/predict/titanic", web::post().to(predict_titanic))
        .route("/predict/german_credit", web::post().to(predict_german_credit))
        .default_service(web::route().to(not_found));
}

/// Body extractor settings: size limit, and malformed JSON reported as a
/// validation error instead of actix's plain-text 400.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| ApiError::Body(err.to_string()).into())
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(Banner { message: BANNER })
}

async fn list_models() -> HttpResponse {
    HttpResponse::Ok().json(ModelList {
        models: ModelId::ALL.iter().map(|id| id.as_str()).collect(),
    })
}

async fn model_info(
    registry: web::Data<ModelRegistry>,
    name: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = name.into_inner();
    let id: ModelId = name
        .parse()
        .map_err(|_| ApiError::NotFound(format!("model '{name}'")))?;
    let spec = id.spec();

    Ok(HttpResponse::Ok().json(ModelInfo {
        name: id.as_str(),
        artifact: spec.artifact,
        columns: spec.columns.names(),
        classes: registry.class_names(id),
    }))
}

async fn predict_iris(
    registry: web::Data<ModelRegistry>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let result = pipeline::predict::<Flower>(&registry, &IRIS, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn predict_penguins(
    registry: web::Data<ModelRegistry>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let result = pipeline::predict::<Penguin>(&registry, &PENGUINS, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn predict_titanic(
    registry: web::Data<ModelRegistry>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let result = pipeline::predict::<Passenger>(&registry, &TITANIC, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn predict_german_credit(
    registry: web::Data<ModelRegistry>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let result = pipeline::predict::<CreditApplicant>(&registry, &GERMAN_CREDIT, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("endpoint".to_string()))
}
