//! Cache-and-sync layer for the Hey! Work worker client.
//!
//! Server collections are cached locally and served cache-first, joined
//! client-side, kept current by a live push channel, and fed into pure
//! derived-state engines.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod derive;
pub mod error;
pub mod live;
pub mod logging;
pub mod resolve;
