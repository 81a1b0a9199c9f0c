//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, one handler per connection)
//!     → handler.rs (parser task + queue, idle timer, teardown)
//!     → parser.rs (bytes → ParsedRequest)
//!     → request.rs (Request variants, execute via the gateway)
//!     → queue.rs (FIFO execution and write back)
//!     → response.rs (wire encoding)
//! ```

pub mod handler;
pub mod headers;
pub mod parser;
pub mod queue;
pub mod request;
pub mod response;
pub mod server;

pub use handler::{CloseReason, ConnectionHandler};
pub use headers::HeaderMap;
pub use parser::{Method, ParseError, ParsedRequest, RequestParser};
pub use request::{Request, RequestOk};
pub use response::Response;
pub use server::GatewayServer;
