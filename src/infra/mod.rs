//! Infrastructure layer implementations.

pub mod audit;
pub mod cache;
pub mod http;
pub mod observability;
pub mod token;

pub use audit::{HttpAuditSink, TracingAuditSink};
pub use cache::InMemoryCache;
pub use http::{ReqwestTransport, TransportConfig};
pub use token::InMemoryTokenStore;
