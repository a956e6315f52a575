//! Application layer: HTTP client, interceptors, and the generic service.

pub mod config;
pub mod error_handler;
pub mod http_client;
pub mod interceptors;
pub mod resources;
pub mod service;
pub mod state;

pub use config::ClientConfig;
pub use error_handler::handle_error;
pub use http_client::{HttpClient, backoff_delay};
pub use interceptors::{AuthInterceptor, RequestIdInterceptor, ResponseLogInterceptor};
pub use service::{BaseService, DEFAULT_CACHE_TTL};
pub use state::AppState;
