// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        // API v1 routes (all require authentication)
        .service(
            web::scope("/api/v1")
                // Scrape pipeline
                .route("/scrape", web::post().to(handlers::trigger_scrape))
                .route("/scrape/cooldown", web::get().to(handlers::get_cooldown))
                // Monitoring sweep
                .route(
                    "/monitoring/run",
                    web::post().to(handlers::run_monitoring_handler),
                )
                // Canonical apps
                .route("/apps", web::get().to(handlers::list_apps))
                .route("/apps/{name}/stats", web::get().to(handlers::get_app_stats)),
        );
}
