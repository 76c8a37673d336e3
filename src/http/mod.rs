//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the channel proxy and listing endpoints
//! - Request classification for proxied paths
//! - Line-by-line manifest rewriting
//! - Request logging and CORS middleware

pub mod handlers;
pub mod middleware;
pub mod proxy;
pub mod request;
pub mod rewrite;
pub mod routes;

pub use routes::create_router;
