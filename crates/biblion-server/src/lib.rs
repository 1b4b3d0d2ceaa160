//! # biblion-server
//!
//! The HTTP surface of the catalogue service: a hyper server, a
//! hand-rolled router, JSON handlers over [`biblion_catalogue`], and an
//! in-memory bearer-token registry guarding the transactional endpoints.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use auth::TokenRegistry;
pub use config::ServiceConfig;
pub use state::AppState;
