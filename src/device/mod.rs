//! Self-healing network write devices.
//!
//! The layering mirrors how much each piece knows about the transport:
//! [`ConnectionManager`] owns the handle lifecycle and the
//! ensure-connected/guard/retry machinery for any [`Transport`];
//! [`SocketConfig`] adds host/port addressing for stream sockets; and
//! [`TcpTransport`]/[`TcpDevice`] supply the concrete TCP behaviour: optional
//! TLS wrapping, optional OS keepalive, and half-closed-peer detection.
//!
//! Everything is synchronous and single-threaded. A device is `&mut self`
//! throughout, so concurrent callers must serialise access externally (one
//! device per worker, or an outer lock).

mod builder;
mod manager;
mod stream;
mod tcp;


pub use builder::TcpDeviceBuilder;
pub use manager::{ConnectionManager, MAX_RETRIES};
pub use stream::{Connection, DEFAULT_HOST, SocketConfig, Transport};
pub use tcp::{TcpConnection, TcpDevice, TcpTransport};
