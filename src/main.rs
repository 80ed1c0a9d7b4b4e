use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::{Data, JsonConfig, PathConfig, QueryConfig};
use actix_web::{App, HttpResponse, HttpServer, Responder, get};

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod repo;
mod routes;
mod utils;

use config::Config;
use db::init_db;
use error::{Envelope, bad_request};
use routes::Limiters;
use utils::{settings_cache::SettingsCache, username_filter};

use crate::docs::ApiDoc;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().json(Envelope::message(true, "Campus attendance service"))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url).await?;
    let limiters = Limiters::from_config(&config)?;
    let settings_cache = SettingsCache::new(Duration::from_secs(config.settings_cache_ttl_secs));

    let pool_for_filter_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = username_filter::warmup_username_filter(&pool_for_filter_warmup, 500).await {
            error!(error = %e, "Failed to warm up username filter");
        }
    });

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let json_config = JsonConfig::default().error_handler(bad_request);
        let query_config = QueryConfig::default().error_handler(bad_request);
        let path_config = PathConfig::default().error_handler(bad_request);

        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(json_config)
            .app_data(query_config)
            .app_data(path_config)
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(settings_cache.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
