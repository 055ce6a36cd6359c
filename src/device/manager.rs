//! Connection lifecycle management: the guard and the retry loop.
//!
//! Every public operation runs inside a guard that establishes a connection
//! first and recovers afterwards: transient write failures are retried with a
//! reconnect in between, up to [`MAX_RETRIES`] times, and any other fault is
//! logged once and converted into a teardown so the next call starts from a
//! clean connect. Callers therefore only ever see an error when the retry
//! budget is spent, or when the device's policy forbids retrying at all.

use std::io::{self, Write};

use log::warn;

use crate::error::DeviceError;

use super::stream::{Connection, Transport};

/// Reconnect-and-retry budget per logical write call.
pub const MAX_RETRIES: usize = 5;

#[cfg(unix)]
const EBADF: i32 = 9;

/// Transport-reset conditions that are worth a reconnect: broken pipe, bad
/// descriptor, connection reset, not connected.
fn retryable(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::NotConnected
    ) {
        return true;
    }
    #[cfg(unix)]
    if err.raw_os_error() == Some(EBADF) {
        return true;
    }
    false
}

/// Failure classification produced by a guarded write.
enum Fault {
    /// Transient failure that must reach the caller: the retry budget was
    /// spent, or the device forbids retrying.
    Surface { attempts: usize, source: io::Error },
    /// Anything else. The guard logs it and tears the connection down; the
    /// caller sees nothing.
    Invalidated(io::Error),
}

/// Owns the optional connection handle and guarantees every transport
/// operation executes against a valid one.
///
/// Generic over the [`Transport`] that opens handles, so the retry and guard
/// semantics are testable without touching a real socket.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    handle: Option<T::Handle>,
    retry_on_failure: bool,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, retry_on_failure: bool) -> Self {
        Self {
            transport,
            handle: None,
            retry_on_failure,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// True when a handle exists. Existence, not liveness.
    pub fn connected(&self) -> bool {
        self.handle.is_some()
    }

    /// True when no handle exists or the handle reports itself dead.
    pub fn closed(&mut self) -> bool {
        match self.handle.as_mut() {
            None => true,
            Some(handle) => handle.is_closed(),
        }
    }

    /// Whether transient write failures trigger reconnect-and-retry.
    pub fn allows_retry(&self) -> bool {
        self.retry_on_failure
    }

    /// Send a message over the live connection.
    ///
    /// At most `MAX_RETRIES + 1` underlying write attempts are made, with a
    /// reconnect between failed ones. An `Err` is returned only once the
    /// budget is spent (or immediately, for devices that disallow retrying);
    /// the guard has already closed and nulled the handle by then.
    pub fn write(&mut self, message: &[u8]) -> Result<(), DeviceError> {
        if let Err(err) = self.ensure_connection() {
            self.invalidate(&err);
            return Ok(());
        }
        match self.write_with_retries(message) {
            Ok(()) => Ok(()),
            Err(Fault::Surface { attempts, source }) => {
                self.invalidate(&source);
                if attempts > 1 {
                    Err(DeviceError::RetriesExhausted { attempts, source })
                } else {
                    Err(DeviceError::Io(source))
                }
            }
            Err(Fault::Invalidated(err)) => {
                self.invalidate(&err);
                Ok(())
            }
        }
    }

    /// Flush the underlying transport. Does nothing when disconnected.
    pub fn flush(&mut self) {
        if !self.connected() {
            return;
        }
        if let Err(err) = self.ensure_connection() {
            self.invalidate(&err);
            return;
        }
        let result = match self.handle.as_mut() {
            Some(handle) => handle.flush(),
            None => Ok(()),
        };
        if let Err(err) = result {
            self.invalidate(&err);
        }
    }

    /// Borrow the live handle, connecting first if none exists. Returns
    /// `None` when the connect attempt fails; the failure has already been
    /// logged and the slot nulled.
    pub fn to_io(&mut self) -> Option<&mut T::Handle> {
        if let Err(err) = self.ensure_connection() {
            self.invalidate(&err);
            return None;
        }
        self.handle.as_mut()
    }

    /// Borrow the current handle without connecting.
    pub fn handle(&mut self) -> Option<&mut T::Handle> {
        self.handle.as_mut()
    }

    /// Close and discard the current connection, if any.
    pub fn close(&mut self) {
        self.teardown();
    }

    /// Replace the current handle with a fresh connection. The old handle is
    /// closed first so descriptors cannot leak across reconnects.
    pub fn reconnect(&mut self) -> io::Result<()> {
        self.teardown();
        self.handle = Some(self.transport.connect()?);
        Ok(())
    }

    /// Connect if no handle exists, then reconnect if the handle turns out
    /// to be already dead (e.g. a peer that half-closed since the last call).
    fn ensure_connection(&mut self) -> io::Result<()> {
        if self.handle.is_none() {
            self.handle = Some(self.transport.connect()?);
        }
        if self.closed() {
            self.reconnect()?;
        }
        Ok(())
    }

    /// Force-close and null the handle.
    fn teardown(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            let _ = handle.close();
        }
    }

    /// Guard-level failure handling: one diagnostic line naming the device
    /// type, error kind, and message, then teardown. The next call starts
    /// from a clean connect.
    fn invalidate(&mut self, err: &io::Error) {
        warn!("{} - {:?} - {}", T::NAME, err.kind(), err);
        self.teardown();
    }

    fn write_with_retries(&mut self, message: &[u8]) -> Result<(), Fault> {
        if !self.retry_on_failure {
            return self.write_once(message).map_err(|source| {
                if retryable(&source) {
                    Fault::Surface {
                        attempts: 1,
                        source,
                    }
                } else {
                    Fault::Invalidated(source)
                }
            });
        }
        // Retry counter is scoped to this call; nothing persists across
        // writes or reconnects triggered elsewhere.
        let mut retries = 0;
        loop {
            let err = match self.write_once(message) {
                Ok(()) => return Ok(()),
                Err(err) if retryable(&err) => err,
                Err(err) => return Err(Fault::Invalidated(err)),
            };
            retries += 1;
            if retries > MAX_RETRIES {
                return Err(Fault::Surface {
                    attempts: retries,
                    source: err,
                });
            }
            if let Err(err) = self.reconnect() {
                // A failed reconnect is not part of the retry contract; the
                // guard swallows it and the next write starts fresh.
                return Err(Fault::Invalidated(err));
            }
        }
    }

    fn write_once(&mut self, message: &[u8]) -> io::Result<()> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no live connection"))?;
        handle.write_all(message)
    }
}
