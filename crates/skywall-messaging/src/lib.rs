//! # Skywall Messaging
//!
//! Resilient HTTPS messaging client to the management fog (and to peers).
//!
//! The client keeps one persistent connection per message category, buffers
//! messages across connectivity loss with on-disk persistence, honors
//! `Retry-After` rate limiting, memoizes fog GET responses, and tunnels
//! through HTTP proxies. Both the success and the error channel of every
//! operation carry an [`HttpResponse`], so callers always receive a
//! structured status - synthetic codes (`NO_HTTP_RESPONSE`, `HTTP_SUSPEND`,
//! `HTTP_TOO_MANY_REQUESTS`, `HTTP_UNKNOWN`) convey local failures.
//!
//! The wire transport is injectable through the [`Transport`] trait; tests
//! drive the full client against an in-memory stub.

pub mod buffer;
pub mod client;
pub mod connection;
pub mod metadata;
pub mod response;
pub mod transport;

pub use buffer::{BufferedMessage, MessageBuffer};
pub use client::{FogConnectionStatus, MessagingClient, MessagingConfig};
pub use connection::{ConnKey, ConnectionPool};
pub use metadata::{ConnectionFlags, MessageCategory, MessageMetadata, ProxySettings};
pub use response::{HttpMethod, HttpResponse, HttpStatus};
pub use transport::{ReqwestTransport, Transport, TransportRequest};

/// Result alias: the error channel reuses [`HttpResponse`] so callers can
/// inspect the synthetic status
pub type MessagingResult<T> = std::result::Result<T, HttpResponse>;
