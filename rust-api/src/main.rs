use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn, Level};

use f1_predictor::config::ServerConfig;
use f1_predictor::ergast::{ErgastClient, RaceDataSource};
use f1_predictor::handlers::{self, AppState};
use f1_predictor::predictor::WinPredictor;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; `init` also routes actix's `log` records here
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    let addr = config.bind_addr();

    info!("Loading model from {:?}", config.model_dir);
    let predictor = match WinPredictor::load(&config.model_dir) {
        Ok(p) => Some(p),
        Err(e) if e.is_missing() => {
            warn!("{}. Prediction endpoints will answer 503 until a model is trained.", e);
            None
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!(
                "Refusing to start with model artifacts in {:?}",
                config.model_dir
            )));
        }
    };

    let client = ErgastClient::new(config.client_config())
        .context("Failed to build results API client")?;
    info!("Results API: {}", client.base_url());
    let source: Arc<dyn RaceDataSource> = Arc::new(client);

    let app_state = Arc::new(AppState::new(source, predictor));
    let origins = config.cors_origins.clone();

    info!("Starting F1 Predictor API server at http://{}", addr);

    HttpServer::new(move || {
        let cors = origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&addr)
    .with_context(|| format!("Failed to bind {}", addr))?
    .run()
    .await
    .context("Server terminated with an error")
}
