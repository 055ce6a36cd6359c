//! Concrete TCP device: plain or TLS-wrapped streams, optional OS keepalive,
//! and half-closed-peer detection.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::path::{Path, PathBuf};

use native_tls::{TlsConnector, TlsStream};
use socket2::SockRef;

use crate::error::DeviceError;

use super::builder::TcpDeviceBuilder;
use super::manager::ConnectionManager;
use super::stream::{Connection, SocketConfig, Transport};

/// Transport that opens plain or TLS-wrapped TCP connections.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    addr: SocketConfig,
    ssl_certificate: Option<PathBuf>,
    use_ssl: bool,
    use_keepalive: bool,
    sync: Option<bool>,
}

impl TcpTransport {
    pub(crate) fn new(
        addr: SocketConfig,
        ssl_certificate: Option<PathBuf>,
        use_ssl: bool,
        use_keepalive: bool,
        sync: Option<bool>,
    ) -> Self {
        Self {
            addr,
            ssl_certificate,
            use_ssl,
            use_keepalive,
            sync,
        }
    }

    pub fn host(&self) -> &str {
        self.addr.host()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn use_ssl(&self) -> bool {
        self.use_ssl
    }

    pub fn use_keepalive(&self) -> bool {
        self.use_keepalive
    }

    pub fn ssl_certificate(&self) -> Option<&Path> {
        self.ssl_certificate.as_deref()
    }

    fn plain_connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((self.addr.host(), self.addr.port()))?;
        if let Some(sync) = self.sync {
            stream.set_nodelay(sync)?;
        }
        if self.use_keepalive {
            SockRef::from(&stream).set_keepalive(true)?;
        }
        Ok(stream)
    }

    // The configured certificate path is recorded but not fed into the
    // handshake; the connector trusts the platform store.
    fn ssl_connect(&self, stream: TcpStream) -> io::Result<TcpConnection> {
        let connector = TlsConnector::new().map_err(io::Error::other)?;
        let session = connector
            .connect(self.addr.host(), stream)
            .map_err(io::Error::other)?;
        Ok(TcpConnection::Tls(Box::new(session)))
    }
}

impl Transport for TcpTransport {
    type Handle = TcpConnection;

    const NAME: &'static str = "TcpDevice";

    fn connect(&self) -> io::Result<TcpConnection> {
        let stream = self.plain_connect()?;
        if self.use_ssl {
            self.ssl_connect(stream)
        } else {
            Ok(TcpConnection::Plain(stream))
        }
    }
}

/// Live connection handle: a raw stream or a TLS session layered over one.
pub enum TcpConnection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl TcpConnection {
    /// The raw stream beneath the handle (the TLS session's inner socket,
    /// for wrapped connections).
    pub fn get_ref(&self) -> &TcpStream {
        match self {
            TcpConnection::Plain(stream) => stream,
            TcpConnection::Tls(stream) => stream.get_ref(),
        }
    }

    /// Detect a peer that has shut down its end while the local handle is
    /// still open (CLOSE_WAIT).
    ///
    /// Zero-timeout and non-consuming: `peek` reports readiness without
    /// draining pending bytes, so "peer sent FIN" is distinguished from
    /// "peer sent data" without disturbing the stream. Pending data is
    /// treated as alive; a probe error means the handle is unusable anyway.
    pub fn server_closed(&mut self) -> bool {
        let stream = self.get_ref();
        if stream.set_nonblocking(true).is_err() {
            return true;
        }
        let mut probe = [0u8; 1];
        let readiness = stream.peek(&mut probe);
        if stream.set_nonblocking(false).is_err() {
            return true;
        }
        match readiness {
            Ok(0) => true,
            Ok(_) => false,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => false,
            Err(_) => true,
        }
    }
}

impl Write for TcpConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TcpConnection::Plain(stream) => stream.write(buf),
            TcpConnection::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TcpConnection::Plain(stream) => stream.flush(),
            TcpConnection::Tls(stream) => stream.flush(),
        }
    }
}

impl Connection for TcpConnection {
    fn is_closed(&mut self) -> bool {
        self.server_closed()
    }

    fn close(&mut self) -> io::Result<()> {
        match self {
            TcpConnection::Plain(stream) => stream.shutdown(Shutdown::Both),
            TcpConnection::Tls(stream) => stream.shutdown(),
        }
    }
}

/// TCP log-shipping device.
///
/// Writes opaque message bytes to a single remote endpoint, reconnecting
/// transparently on transient failures and spotting half-closed peers before
/// writing into a dead stream. Always allows reconnect-and-retry on write
/// failures.
///
/// ```no_run
/// use logship::TcpDevice;
///
/// let mut device = TcpDevice::builder()
///     .with_host("logs.internal")
///     .with_port(5228)
///     .build()?;
/// device.write(b"application started\n")?;
/// # Ok::<(), logship::DeviceError>(())
/// ```
pub struct TcpDevice {
    manager: ConnectionManager<TcpTransport>,
}

impl TcpDevice {
    pub fn builder() -> TcpDeviceBuilder {
        TcpDeviceBuilder::new()
    }

    pub(crate) fn from_transport(transport: TcpTransport) -> Self {
        Self {
            manager: ConnectionManager::new(transport, true),
        }
    }

    /// Send one message. See [`ConnectionManager::write`] for the retry and
    /// guard semantics.
    pub fn write(&mut self, message: &[u8]) -> Result<(), DeviceError> {
        self.manager.write(message)
    }

    /// Flush the transport. Silently does nothing when disconnected.
    pub fn flush(&mut self) {
        self.manager.flush();
    }

    /// Borrow the live handle, connecting first if necessary. Intended for
    /// buffering wrappers that need direct stream access.
    pub fn to_io(&mut self) -> Option<&mut TcpConnection> {
        self.manager.to_io()
    }

    /// Whether a handle currently exists. Existence, not liveness.
    pub fn connected(&self) -> bool {
        self.manager.connected()
    }

    /// Whether the device has no handle, or the peer has closed its end.
    pub fn closed(&mut self) -> bool {
        self.manager.closed()
    }

    /// Liveness probe: true when no handle exists, or when the peer has shut
    /// down its side (CLOSE_WAIT) even though the local handle is still open.
    pub fn server_closed(&mut self) -> bool {
        match self.manager.handle() {
            None => true,
            Some(handle) => handle.server_closed(),
        }
    }

    /// Close and discard the current connection, if any. The next operation
    /// connects from scratch.
    pub fn close(&mut self) {
        self.manager.close();
    }

    pub fn allows_retry(&self) -> bool {
        self.manager.allows_retry()
    }

    /// True when built with a certificate path or an explicit TLS flag.
    pub fn use_ssl(&self) -> bool {
        self.manager.transport().use_ssl()
    }

    pub fn use_keepalive(&self) -> bool {
        self.manager.transport().use_keepalive()
    }

    pub fn host(&self) -> &str {
        self.manager.transport().host()
    }

    pub fn port(&self) -> u16 {
        self.manager.transport().port()
    }

    pub fn ssl_certificate(&self) -> Option<&Path> {
        self.manager.transport().ssl_certificate()
    }
}

impl std::fmt::Debug for TcpDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpDevice")
            .field("host", &self.host())
            .field("port", &self.port())
            .field("use_ssl", &self.use_ssl())
            .field("use_keepalive", &self.use_keepalive())
            .field("connected", &self.connected())
            .finish()
    }
}
