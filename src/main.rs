// src/main.rs
use actix_web::{
    middleware::{Compress, DefaultHeaders, Logger},
    web, App, HttpServer,
};
use actix_web::http::header;
use actix_cors::Cors;
use anyhow::Context;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod monitoring;
mod notification_handlers;
mod product_handlers;
mod repositories;
mod sensor_handlers;
mod stock_notifications;

use config::{load_config, Config};
use monitoring::{Metrics, RequestLogger, start_maintenance_tasks};
use stock_notifications::StockNotifier;

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
    pub notifier: StockNotifier,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config, metrics: Arc<Metrics>) -> Self {
        let notifier = StockNotifier::new(db_pool.clone(), &config.notifications, metrics.clone());
        Self { db_pool, config, notifier, metrics }
    }
}

// ==================== ROUTES ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check and metrics
        .service(
            web::scope("/health")
                .route("", web::get().to(monitoring::health_check))
                .route("/ready", web::get().to(monitoring::readiness_check))
                .route("/metrics", web::get().to(monitoring::metrics_endpoint))
        )
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/products")
                        .route("", web::get().to(product_handlers::get_products))
                        .route("", web::post().to(product_handlers::create_product))
                        .route("/low-stock", web::get().to(product_handlers::get_low_stock_products))
                        .route("/{id}", web::get().to(product_handlers::get_product))
                        .route("/{id}", web::put().to(product_handlers::update_product))
                        .route("/{id}", web::delete().to(product_handlers::delete_product))
                )
                .service(
                    web::scope("/notifications")
                        .route("", web::get().to(notification_handlers::get_notifications))
                        .route("", web::delete().to(notification_handlers::delete_all_notifications))
                        .route("/unread-count", web::get().to(notification_handlers::get_unread_count))
                        .route("/read-all", web::put().to(notification_handlers::mark_all_read))
                        .route("/delete", web::post().to(notification_handlers::delete_notifications))
                        .route("/stream", web::get().to(notification_handlers::notification_stream))
                        .route("/{id}/read", web::put().to(notification_handlers::mark_notification_read))
                        .route("/{id}", web::delete().to(notification_handlers::delete_notification))
                )
                .service(
                    web::scope("/sensors")
                        .route("/readings", web::get().to(sensor_handlers::get_readings))
                        .route("/readings", web::post().to(sensor_handlers::record_reading))
                        .route("/latest", web::get().to(sensor_handlers::get_latest_reading))
                )
                .route("/dashboard/stats", web::get().to(handlers::get_dashboard_stats))
        );
}

fn json_config(max_request_size: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(max_request_size)
        .error_handler(handlers::json_error_handler)
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;
    config.print_startup_info();

    let pool = db::create_database_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let metrics = Arc::new(Metrics::new());
    let app_state = Arc::new(AppState::new(pool.clone(), config.clone(), metrics.clone()));

    // Start maintenance tasks
    let maintenance_pool = pool.clone();
    let maintenance_config = config.maintenance.clone();
    tokio::spawn(async move {
        start_maintenance_tasks(maintenance_pool, maintenance_config).await;
    });

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let server_config = config.clone();
    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&server_config.security.allowed_origins, server_config.is_production());
        let security_headers = setup_security_headers(&server_config.security);

        App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(RequestLogger::new(metrics.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(json_config(server_config.security.max_request_size))
            .configure(configure_routes)
    })
        .keep_alive(Duration::from_secs(config.server.keep_alive));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await
        .context("Server failed to run")?;

    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

pub fn setup_cors(allowed_origins: &[String], is_production: bool) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::CACHE_CONTROL,
        ])
        .expose_headers(vec![header::CONTENT_LENGTH])
        .max_age(3600);

    // Wildcard in production is rejected by Config::validate
    if allowed_origins.iter().any(|o| o == "*") && !is_production {
        log::warn!("Using wildcard CORS (*) in development mode");
        cors = cors.allow_any_origin().allow_any_header().allow_any_method();
    } else {
        for origin in allowed_origins.iter().filter(|o| !o.is_empty() && o.as_str() != "*") {
            log::debug!("Adding CORS origin: {}", origin);
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let level = config.logging.level.as_str();
            tracing_subscriber::EnvFilter::new(level)
        });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.logging.format == "compact" {
        registry.with(tracing_subscriber::fmt::layer().compact()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.context("Failed to install log subscriber")?;

    Ok(())
}

fn setup_security_headers(config: &config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains; preload"
        ));
    }

    headers
}
