//! Builder for [`TcpDevice`].
//!
//! Mirrors the device's option surface: `port` is required, everything else
//! is optional. Validation happens in [`TcpDeviceBuilder::build`], which
//! returns [`DeviceError::InvalidConfig`] for unusable settings.

use std::path::PathBuf;

use crate::error::DeviceError;

use super::stream::SocketConfig;
use super::tcp::{TcpDevice, TcpTransport};

#[derive(Clone, Debug, Default)]
pub struct TcpDeviceBuilder {
    host: Option<String>,
    port: Option<u16>,
    ssl_certificate: Option<PathBuf>,
    use_ssl: bool,
    use_keepalive: bool,
    sync: Option<bool>,
}

impl TcpDeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target host. Defaults to the wildcard address when unset.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Target port. Required.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Certificate path. Setting this implies TLS even when
    /// [`with_ssl`](Self::with_ssl) is never called.
    pub fn with_ssl_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_certificate = Some(path.into());
        self
    }

    /// Explicitly enable TLS wrapping of the connection.
    pub fn with_ssl(mut self, enabled: bool) -> Self {
        self.use_ssl = enabled;
        self
    }

    /// Enable OS-level TCP keepalive on each connection.
    pub fn with_keepalive(mut self, enabled: bool) -> Self {
        self.use_keepalive = enabled;
        self
    }

    /// Toggle synchronous writes (TCP_NODELAY) on the raw socket. Left to
    /// the OS default when unset.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn build(self) -> Result<TcpDevice, DeviceError> {
        let addr = SocketConfig::new(self.host, self.port)?;
        let use_ssl = self.use_ssl || self.ssl_certificate.is_some();
        let transport = TcpTransport::new(
            addr,
            self.ssl_certificate,
            use_ssl,
            self.use_keepalive,
            self.sync,
        );
        Ok(TcpDevice::from_transport(transport))
    }
}
