//! # sentflow-server
//!
//! HTTP surface for Sentient Flow: the workflow execute endpoint plus
//! the ancillary service layers (auth, owner-scoped stores, credential
//! cipher).

pub mod auth;
pub mod cipher;
pub mod config;
pub mod error;
pub mod routes;
pub mod store;

pub use config::{AppState, Config};
pub use routes::app;
