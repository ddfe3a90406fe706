// API server implementation using actix-web

use crate::api::{auth, middleware, routes};
use crate::ratelimit::CooldownGate;
use crate::scrape::fetcher::HttpFetcher;
use crate::util::db::Db;
use crate::util::env::{env_opt, env_parse, env_req};
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub api_secret: String,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_parse("API_PORT", 8080u16);

        let api_secret = env_req("API_SECRET").context("the API refuses to start unsecured")?;

        let allowed_origins = env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:8000".to_string());

        Ok(Self {
            host,
            port,
            api_secret,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            "Starting review-radar API server"
        );

        let fetcher = HttpFetcher::new(None)
            .map_err(|e| anyhow::anyhow!("failed to build HTTP fetcher: {e}"))?;

        let db_data = web::Data::new(db);
        let fetcher_data = web::Data::new(fetcher);
        let gate_data = web::Data::new(CooldownGate::from_env());
        let api_secret = self.api_secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = auth::Auth::new(api_secret.clone());

            App::new()
                .app_data(db_data.clone())
                .app_data(fetcher_data.clone())
                .app_data(gate_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .wrap(auth)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
