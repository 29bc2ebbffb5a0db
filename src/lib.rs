//! Async client driver for the MaazDB wire protocol.
//!
//! MaazDB speaks a small length-prefixed binary protocol over TLS: the
//! client authenticates with a credential handshake, then exchanges one SQL
//! command per round trip, receiving the server's textual response verbatim.
//! [`ConnectionBuilder`] establishes connections; [`MaazStream`] exchanges
//! queries over them.
//!
//! ```no_run
//! use maaz_stream::{CertVerification, ConnectionBuilder, TlsOptions};
//!
//! # async fn run() -> maaz_stream::Result<()> {
//! let mut db = ConnectionBuilder::new("admin", "admin")
//!     .tls(TlsOptions::new().verify(CertVerification::AcceptInvalid))
//!     .connect_tls("localhost", 8811)
//!     .await?;
//!
//! let rows = db.query("SELECT * FROM users;").await?;
//! println!("{rows}");
//! db.close().await;
//! # Ok(())
//! # }
//! ```

mod connect;
mod error;
pub mod packet;
mod slot;
mod tls;

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

pub use connect::ConnectionBuilder;
pub use error::{Error, Result};
pub use packet::{DRIVER_SIGNATURE, Packet, PacketCode};
pub use tls::{CertVerification, TlsOptions};

use crate::slot::{Pending, RequestSlot};

/// An authenticated MaazDB connection.
///
/// Owns the transport, the receive accumulator, and the single request slot.
/// One command may be outstanding at a time: `query` holds `&mut self` until
/// the response packet (or a transport failure) settles it, so pipelining is
/// unrepresentable through this API and the slot's occupancy check backs the
/// same invariant at runtime.
pub struct MaazStream<S> {
    stream: S,
    /// Receive accumulator: complete packets are drained off the front,
    /// leaving at most one partial packet prefix behind.
    buf: BytesMut,
    /// Packets decoded but not yet delivered to a request.
    inbound: VecDeque<Packet>,
    slot: RequestSlot,
    connected: bool,
}

impl<S> MaazStream<S> {
    pub(crate) fn from_stream(stream: S) -> Self {
        MaazStream {
            stream,
            buf: BytesMut::new(),
            inbound: VecDeque::new(),
            slot: RequestSlot::new(),
            connected: false,
        }
    }

    /// Whether the connection is authenticated and ready for queries.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Consumes the stream, returning the transport and any unconsumed
    /// receive bytes.
    pub fn into_parts(self) -> (S, Vec<u8>) {
        (self.stream, self.buf.to_vec())
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> MaazStream<S> {
    /// Sends a query and waits for the server's response text.
    ///
    /// The SQL is opaque to the driver: no parsing, no escaping, and the
    /// response payload is returned unmodified. Callers interpret the text
    /// (data packets conventionally carry JSON, but that is their concern).
    ///
    /// Fails immediately with [`Error::NotConnected`] once the connection
    /// has been closed or has hit a transport failure.
    pub async fn query(&mut self, sql: impl AsRef<str>) -> Result<String> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.roundtrip(Pending::Query, PacketCode::QUERY, sql.as_ref())
            .await
    }

    /// Shuts the transport down and marks the connection closed.
    ///
    /// Idempotent: calling it again, or on a connection the peer already
    /// dropped, does nothing.
    pub async fn close(&mut self) {
        if self.connected {
            debug!("closing connection");
        }
        self.connected = false;
        let _ = self.stream.shutdown().await;
    }

    pub(crate) async fn handshake(&mut self, payload: &str) -> Result<String> {
        match self
            .roundtrip(Pending::Handshake, PacketCode::HANDSHAKE, payload)
            .await
        {
            Ok(marker) => {
                debug!("authenticated");
                self.connected = true;
                Ok(marker)
            }
            Err(err) => {
                self.close().await;
                Err(err)
            }
        }
    }

    /// One request/response exchange through the request slot.
    async fn roundtrip(
        &mut self,
        pending: Pending,
        code: PacketCode,
        payload: &str,
    ) -> Result<String> {
        self.slot.occupy(pending)?;

        let mut msg = BytesMut::new();
        if let Err(err) = code.frame(&mut msg, payload) {
            return Err(self.slot.fail(err));
        }

        trace!("sending {code} packet, {}B payload", payload.len());
        if let Err(err) = self.send(&msg).await {
            self.connected = false;
            return Err(self.slot.fail(err.into()));
        }

        match self.next_packet().await {
            Ok(Some(packet)) => {
                trace!("settling {pending:?} with {packet}");
                self.slot.complete(packet)
            }
            Ok(None) => {
                self.connected = false;
                Err(self.slot.fail(Error::ConnectionClosed))
            }
            Err(err) => {
                self.connected = false;
                Err(self.slot.fail(err.into()))
            }
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Returns the next decoded packet, reading from the transport as
    /// needed.
    ///
    /// Every chunk read is appended to the accumulator and drained to
    /// exhaustion, so packets batched into one read are queued in arrival
    /// order and a packet split across reads is reassembled. `Ok(None)`
    /// means the peer closed the connection.
    async fn next_packet(&mut self) -> std::io::Result<Option<Packet>> {
        loop {
            if let Some(packet) = self.inbound.pop_front() {
                return Ok(Some(packet));
            }

            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }

            let packets = packet::decode(&mut self.buf);
            trace!("read {n}B, decoded {} packets", packets.len());
            self.inbound.extend(packets);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, MaazStream};

    #[tokio::test]
    async fn test_query_before_handshake_fails() {
        let (client, _server) = tokio::io::duplex(64);
        let mut stream = MaazStream::from_stream(client);

        assert!(matches!(
            stream.query("SELECT 1;").await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_into_parts_returns_residual_bytes() {
        let (client, _server) = tokio::io::duplex(64);
        let mut stream = MaazStream::from_stream(client);
        stream.buf.extend_from_slice(&[0x02, 0, 0]);

        let (_, residual) = stream.into_parts();
        assert_eq!(residual, vec![0x02, 0, 0]);
    }
}
