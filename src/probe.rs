//! The TLS "hello" probe run against every pair.

use async_trait::async_trait;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use socket2::SockRef;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;
use tracing::debug;

use crate::{CheckError, MismatchReason, Pair};

/// Something that can tell whether a pair answers TLS for its hostname.
#[async_trait]
pub trait Prober: Send + Sync {
    /// `Ok(())` when the handshake for `pair` succeeds.
    async fn hello(&self, pair: &Pair) -> Result<(), MismatchReason>;
}

/// Dials `ip:port` and runs an OpenSSL client handshake using the hostname as SNI.
///
/// The certificate is never verified: completing the handshake is the only
/// signal. Connect and handshake each get the full timeout.
pub struct TlsProber {
    connector: SslConnector,
    timeout: Duration,
    port: u16,
}

impl TlsProber {
    pub fn new(timeout: Duration, port: u16) -> Result<Self, CheckError> {
        let mut builder = SslConnector::builder(SslMethod::tls())?;
        builder.set_verify(SslVerifyMode::NONE);
        Ok(TlsProber {
            connector: builder.build(),
            timeout,
            port,
        })
    }

    async fn connect(&self, addr: SocketAddr) -> Result<TcpStream, MismatchReason> {
        let tcp = match timeout(self.timeout, TcpStream::connect(addr)).await {
            Err(_elapsed) => return Err(MismatchReason::ConnectTimeout),
            Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => {
                return Err(MismatchReason::ConnectTimeout)
            }
            Ok(Err(e)) => return Err(MismatchReason::Connect(e.to_string())),
            Ok(Ok(tcp)) => tcp,
        };

        // drop the connection with a reset instead of lingering on close
        if let Err(e) = SockRef::from(&tcp).set_linger(Some(Duration::ZERO)) {
            debug!(%addr, error = %e, "failed to disable linger");
        }
        Ok(tcp)
    }
}

#[async_trait]
impl Prober for TlsProber {
    async fn hello(&self, pair: &Pair) -> Result<(), MismatchReason> {
        let addr = SocketAddr::new(pair.ip, self.port);
        debug!(%pair, %addr, "dialing");
        let tcp = self.connect(addr).await?;

        let ssl = self
            .connector
            .configure()
            .and_then(|mut config| {
                config.set_verify_hostname(false);
                config.into_ssl(&pair.hostname)
            })
            .map_err(|e| MismatchReason::Handshake(e.to_string()))?;
        let mut stream =
            SslStream::new(ssl, tcp).map_err(|e| MismatchReason::Handshake(e.to_string()))?;

        match timeout(self.timeout, Pin::new(&mut stream).connect()).await {
            Err(_elapsed) => Err(MismatchReason::HandshakeTimeout),
            Ok(Err(e)) => Err(MismatchReason::Handshake(e.to_string())),
            Ok(Ok(())) => {
                debug!(%pair, "handshake ok");
                Ok(())
            }
        }
    }
}
