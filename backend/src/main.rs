use std::io;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use log::{error, info};

use models_api::catalog::ModelId;
use models_api::config::ServerConfig;
use models_api::registry::ModelRegistry;
use models_api::routes;

fn cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600);

    if origins.iter().any(|origin| origin == "*") {
        return cors.allow_any_origin();
    }
    origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    info!("Starting ML Models API v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let registry = ModelRegistry::load(&config.models_dir).map_err(|e| {
        error!("Cannot load models: {}", e);
        io::Error::new(io::ErrorKind::Other, e)
    })?;
    info!("All models loaded from {}", config.models_dir.display());

    let registry = web::Data::new(registry);
    let bind_address = config.bind_address();

    info!("Server listening on http://{}", bind_address);
    info!("Workers: {}", config.workers);
    info!("Endpoints:");
    info!("   GET  /");
    info!("   GET  /models");
    info!("   GET  /models/{{name}}");
    for id in ModelId::ALL {
        info!("   POST /predict/{}", id);
    }

    let origins = config.allowed_origins.clone();
    let json_limit = config.json_limit;

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(cors(&origins))
            .app_data(registry.clone())
            .app_data(routes::json_config(json_limit))
            .configure(routes::configure)
    })
    .workers(config.workers)
    .bind(&bind_address)?
    .run()
    .await
}
