use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use crate::packet::DRIVER_SIGNATURE;
use crate::tls::{self, TlsOptions};
use crate::{MaazStream, Result};

/// Builder for configuring and establishing MaazDB connections.
///
/// The credential handshake is an ordinary request/response exchange: it is
/// the first (hidden) request on the connection and is settled through the
/// same slot queries use.
pub struct ConnectionBuilder {
    user: String,
    password: String,
    signature: String,
    tls: TlsOptions,
}

impl ConnectionBuilder {
    /// Creates a new connection builder with the given credentials.
    ///
    /// Defaults to the standard driver signature and strict certificate
    /// verification.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            signature: DRIVER_SIGNATURE.into(),
            tls: TlsOptions::new(),
        }
    }

    /// Sets the TLS options used by [`connect_tls`](Self::connect_tls).
    pub fn tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }

    /// Overrides the driver signature sent in the handshake.
    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    fn handshake_payload(&self) -> String {
        format!("{}\0{}\0{}", self.user, self.password, self.signature)
    }

    /// Establishes a MaazDB connection over an already-open stream.
    ///
    /// Sends the credential handshake and waits for the server's verdict.
    /// On rejection the transport is closed before the error is returned.
    pub async fn connect<S>(&self, stream: S) -> Result<MaazStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = MaazStream::from_stream(stream);
        stream.handshake(&self.handshake_payload()).await?;
        Ok(stream)
    }

    /// Opens a TCP + TLS transport to `host:port` and connects over it.
    ///
    /// The transport-level TLS handshake is distinct from the protocol-level
    /// credential handshake, which follows as soon as the stream is up.
    pub async fn connect_tls(
        &self,
        host: &str,
        port: u16,
    ) -> Result<MaazStream<TlsStream<TcpStream>>> {
        let connector = self.tls.connector()?;
        let server_name = tls::server_name(host)?;

        debug!("connecting to {host}:{port}");
        let tcp = TcpStream::connect((host, port)).await?;
        tcp.set_nodelay(true)?;

        let stream = connector.connect(server_name, tcp).await?;
        self.connect(stream).await
    }
}
