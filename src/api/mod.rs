//! Worker REST API.

pub mod cache;
pub mod cached_client;
pub mod client;
pub mod types;

pub use cached_client::WorkerClient;
pub use client::{ApiClient, HttpTransport, Transport};
