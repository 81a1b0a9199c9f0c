//! HTTP/1.1 upload gateway library.

pub mod buffer;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod upload;
pub mod upstream;

pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
