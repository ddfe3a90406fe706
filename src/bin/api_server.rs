//! Standalone HTTP API server for the review dashboard.

use anyhow::Result;
use review_radar::api::server::ApiServer;
use review_radar::util::{env, tracing as tracing_util};
use review_radar::Db;

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_util::init_tracing("info,sqlx=warn,actix_web=info")?;
    env::init_env();

    let db = Db::connect(&env::db_url(), env::env_parse("DB_MAX_CONNECTIONS", 5)).await?;
    let server = ApiServer::from_env()?;
    server.run(db).await
}
