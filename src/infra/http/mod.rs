//! HTTP transport implementations.

pub mod reqwest_transport;

pub use reqwest_transport::{ReqwestTransport, TransportConfig};
