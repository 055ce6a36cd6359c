//! Resilient TCP log shipping.
//!
//! This crate provides the network write channel used by log shippers: a
//! device that streams opaque message bytes over a TCP connection (optionally
//! TLS-wrapped), detects dead or half-closed peers, and transparently
//! reconnects before giving up. Message formatting, level filtering, and
//! framing are the caller's concern; the device consumes raw bytes via
//! [`TcpDevice::write`] and the occasional [`TcpDevice::flush`].
//!
//! Diagnostics are emitted through the [`log`] facade, so the host
//! application decides where warnings about dropped connections end up.

pub mod device;
mod error;

pub use device::{
    Connection, ConnectionManager, DEFAULT_HOST, MAX_RETRIES, SocketConfig, TcpConnection,
    TcpDevice, TcpDeviceBuilder, TcpTransport, Transport,
};
pub use error::DeviceError;
