//! One TCP connection to the station.
//!
//! A `Session` owns the socket and the timeout applied to every read and
//! write. Any transport failure marks the session dead; a dead session refuses
//! further I/O and must be replaced by a fresh connection.

use crate::error::{Result, RobolinkError, TransportError};
use crate::wire::ByteSource;
use bytes::{Bytes, BytesMut};
use socket2::SockRef;
use std::io::ErrorKind;
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Upper bound on buffer growth per read.
const READ_CHUNK: usize = 64 * 1024;

/// An open connection with its timeout state.
#[derive(Debug)]
pub struct Session {
    stream: BufReader<TcpStream>,
    peer: SocketAddr,
    default_timeout: Duration,
    timeout: Duration,
    dead: bool,
}

impl Session {
    /// Connect to `host:port`, giving up after `connect_timeout`.
    ///
    /// The new session uses `connect_timeout` for I/O until
    /// [`set_default_timeout`](Self::set_default_timeout) is called.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::TimedOut(connect_timeout))??;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        debug!("Connected to station at {}", peer);
        Ok(Self::from_stream(stream, peer, connect_timeout))
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer,
            default_timeout: timeout,
            timeout,
            dead: false,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn port(&self) -> u16 {
        self.peer.port()
    }

    /// Timeout currently applied to I/O.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Replace the default timeout and make it the active one.
    pub fn set_default_timeout(&mut self, timeout: Duration) {
        self.default_timeout = timeout;
        self.timeout = timeout;
    }

    /// Raise the timeout until the returned guard is dropped.
    ///
    /// The default is restored on every exit path, including errors and
    /// early returns through `?`.
    pub fn extended(&mut self, timeout: Duration) -> ExtendedTimeout<'_> {
        self.timeout = timeout;
        ExtendedTimeout { session: self }
    }

    pub fn mark_dead(&mut self) {
        if !self.dead {
            warn!("Session with {} marked dead", self.peer);
        }
        self.dead = true;
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Non-blocking liveness check that never consumes data.
    ///
    /// The peer has closed only when the socket is readable and yields zero
    /// bytes. Buffered or pending data means alive.
    pub fn is_alive(&self) -> bool {
        if self.dead {
            return false;
        }
        if !self.stream.buffer().is_empty() {
            return true;
        }
        let mut probe = [MaybeUninit::<u8>::uninit(); 1];
        match SockRef::from(self.stream.get_ref()).peek(&mut probe) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                true
            }
            Err(_) => false,
        }
    }

    /// Wait until data is available, up to `limit`. `None` waits forever.
    ///
    /// Returns `false` if the limit elapsed. Nothing is read.
    pub async fn wait_readable(&mut self, limit: Option<Duration>) -> Result<bool> {
        if self.dead {
            return Err(TransportError::NotConnected.into());
        }
        if !self.stream.buffer().is_empty() {
            return Ok(true);
        }
        let readable = self.stream.get_ref().readable();
        let outcome = match limit {
            Some(limit) => match tokio::time::timeout(limit, readable).await {
                Ok(r) => r,
                Err(_) => return Ok(false),
            },
            None => readable.await,
        };
        if let Err(e) = outcome {
            self.mark_dead();
            return Err(TransportError::RecvFailed(e).into());
        }
        Ok(true)
    }

    /// Write all bytes and flush.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if self.dead {
            return Err(TransportError::NotConnected.into());
        }
        let timeout = self.timeout;
        let stream = &mut self.stream;
        let outcome = tokio::time::timeout(timeout, async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.fail(TransportError::SendFailed(e))),
            Err(_) => Err(self.fail(TransportError::TimedOut(timeout))),
        }
    }

    async fn read_exact_inner(&mut self, n: usize) -> std::result::Result<Bytes, TransportError> {
        // Capacity follows what has arrived, never the announced size alone.
        let mut buf = BytesMut::with_capacity(n.min(READ_CHUNK));
        while buf.len() < n {
            let remaining = n - buf.len();
            buf.reserve(remaining.min(READ_CHUNK));
            let mut limited = (&mut self.stream).take(remaining as u64);
            match limited.read_buf(&mut buf).await {
                Ok(0) => {
                    return Err(TransportError::ConnectionClosed {
                        expected: n,
                        received: buf.len(),
                    })
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if !buf.is_empty() => {
                    return Err(TransportError::ShortRead {
                        expected: n,
                        received: buf.len(),
                        source: e,
                    })
                }
                Err(e) => return Err(TransportError::RecvFailed(e)),
            }
        }
        Ok(buf.freeze())
    }

    async fn read_line_inner(&mut self) -> std::result::Result<Vec<u8>, TransportError> {
        let mut line = Vec::new();
        let read = self
            .stream
            .read_until(b'\n', &mut line)
            .await
            .map_err(TransportError::RecvFailed)?;
        if read == 0 || line.last() != Some(&b'\n') {
            return Err(TransportError::ConnectionClosed {
                expected: read + 1,
                received: read,
            });
        }
        line.pop();
        Ok(line)
    }

    fn fail(&mut self, err: TransportError) -> RobolinkError {
        self.mark_dead();
        err.into()
    }

    /// Close the connection. Errors during shutdown are ignored.
    pub async fn disconnect(mut self) {
        self.dead = true;
        let _ = self.stream.get_mut().shutdown().await;
        debug!("Disconnected from {}", self.peer);
    }
}

#[async_trait::async_trait]
impl ByteSource for Session {
    async fn recv_exact(&mut self, n: usize) -> Result<Bytes> {
        if self.dead {
            return Err(TransportError::NotConnected.into());
        }
        let timeout = self.timeout;
        let outcome = tokio::time::timeout(timeout, self.read_exact_inner(n)).await;
        match outcome {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(self.fail(e)),
            Err(_) => Err(self.fail(TransportError::TimedOut(timeout))),
        }
    }

    async fn recv_line(&mut self) -> Result<Vec<u8>> {
        if self.dead {
            return Err(TransportError::NotConnected.into());
        }
        let timeout = self.timeout;
        let outcome = tokio::time::timeout(timeout, self.read_line_inner()).await;
        match outcome {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(e)) => Err(self.fail(e)),
            Err(_) => Err(self.fail(TransportError::TimedOut(timeout))),
        }
    }
}

/// Scoped extended timeout. Dereferences to the session.
#[derive(Debug)]
pub struct ExtendedTimeout<'a> {
    session: &'a mut Session,
}

impl Deref for ExtendedTimeout<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session
    }
}

impl DerefMut for ExtendedTimeout<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session
    }
}

impl Drop for ExtendedTimeout<'_> {
    fn drop(&mut self) {
        self.session.timeout = self.session.default_timeout;
    }
}
