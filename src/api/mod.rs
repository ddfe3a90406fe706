// HTTP API: actix-web server, routes, handlers, auth, DTOs.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
