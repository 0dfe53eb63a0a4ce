use actix_web::{middleware, web, App, HttpServer};
use log::{error, info, warn};
use std::path::Path;

use photo_folio::api::configure_app;
use photo_folio::app_state::AppState;
use photo_folio::config::AppConfig;

fn init_logging(config: &AppConfig) {
    let log_config = &config.logging.config_file;
    if Path::new(log_config).exists() {
        match log4rs::init_file(log_config, Default::default()) {
            Ok(()) => return,
            Err(e) => eprintln!("Failed to initialize log4rs from {}: {}", log_config, e),
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    warn!("Log configuration {} not usable, logging to stderr", log_config);
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::load().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    init_logging(&config);

    let bind = (config.server.host.clone(), config.server.port);
    let workers = config.server.workers;
    let state = AppState::from_config(config).await.map_err(|e| {
        error!("Failed to initialize application state: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    info!(
        "Starting photo portfolio on {}:{} ({} metadata via {:?})",
        bind.0, bind.1, state.config.metadata.variant, state.config.metadata.backend
    );

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(data.clone())
            .configure(configure_app)
    })
    .workers(workers)
    .bind(bind)?
    .run()
    .await
}
