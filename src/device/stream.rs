//! Stream-socket addressing and the transport seam.

use std::io::{self, Write};

use crate::error::DeviceError;

/// Address used when no host is configured.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Host/port pair targeted by stream-socket transports.
///
/// The port is mandatory; construction fails with
/// [`DeviceError::InvalidConfig`] without one. The host falls back to the
/// wildcard address.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    host: String,
    port: u16,
}

impl SocketConfig {
    pub fn new(host: Option<String>, port: Option<u16>) -> Result<Self, DeviceError> {
        let port = port.ok_or_else(|| DeviceError::InvalidConfig("port is required".into()))?;
        if port == 0 {
            return Err(DeviceError::InvalidConfig(
                "port must be greater than zero".into(),
            ));
        }
        let host = host
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// A live connection handle owned by a
/// [`ConnectionManager`](super::ConnectionManager).
///
/// A handle that exists is connected-or-unknown, never known-dead: liveness
/// is advisory and checked on demand via [`Connection::is_closed`].
pub trait Connection: Write {
    /// Whether the handle is known dead: locally closed, or the peer has
    /// shut down its end.
    fn is_closed(&mut self) -> bool;

    /// Release the underlying resource. Call sites treat this as
    /// best-effort; a socket that errors while closing is already gone.
    fn close(&mut self) -> io::Result<()>;
}

/// Capability that produces connection handles for a manager.
///
/// Concrete transports carry the immutable device configuration (address,
/// TLS, socket options) and know how to open one fresh handle at a time.
pub trait Transport {
    type Handle: Connection;

    /// Device type name used in diagnostic log lines.
    const NAME: &'static str;

    /// Open a fresh handle to the configured peer. Blocks until the
    /// connection (and any TLS handshake) completes or fails.
    fn connect(&self) -> io::Result<Self::Handle>;
}
