//! Storefront Client
//!
//! A typed HTTP client layer for a storefront backend: a request pipeline
//! with interceptors, timeouts and retries, plus generic CRUD services with
//! cache-aside reads and audit trails.
//!
//! # Architecture Overview
//!
//! This crate is organized into three main layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Application Layer              │
//! │  HttpClient, interceptors, BaseService<R>    │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │   Traits, types, errors (no I/O)             │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │  reqwest transport, cache, audit sinks       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Key Features
//!
//! - **Trait-based abstraction**: Transport, cache and audit sit behind traits
//! - **Dependency injection**: Components receive their dependencies through constructors
//! - **Typed errors**: Every failure maps to an `ApiError` with a `retryable` flag
//! - **Retries**: Exponential backoff on network errors and 5xx responses
//! - **Caching**: Read-through caching with invalidation on writes
//! - **Logging**: Structured logging with `tracing`
//! - **Security**: Bearer tokens held in `secrecy::SecretString`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use storefront_client::app::{AppState, ClientConfig, HttpClient};
//! use storefront_client::domain::ListParams;
//! use storefront_client::infra::{InMemoryCache, ReqwestTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     let transport = Arc::new(ReqwestTransport::with_defaults()?);
//!     let client = Arc::new(HttpClient::new(transport, config));
//!
//!     let state = AppState::new(client).with_cache(Arc::new(InMemoryCache::new()));
//!     let page = state.products().list(&ListParams::default().page(1, 10)).await;
//!     println!("{:?}", page.data);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
