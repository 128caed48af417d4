//! Checks that the static address mappings of a hosts file still serve their
//! hostnames over TLS.
//!
//! Every `IP hostname...` line yields one [`Pair`] per hostname. Each pair is
//! dialed on port 443 and a TLS handshake is attempted with the hostname as
//! SNI. Pairs that fail come back as a [`Mismatch`] carrying a classified
//! [`MismatchReason`].
//!
//! ```no_run
//! use hostscheck::{check_hosts, config::Config, TlsProber};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), hostscheck::CheckError> {
//! let settings = Config::empty().resolve()?;
//! let prober = TlsProber::new(settings.timeout, settings.port)?;
//! let summary = check_hosts(&settings, prober, std::io::stdout(), CancellationToken::new()).await?;
//! println!("{} pairs checked", summary.pairs);
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

pub mod config;
pub mod error;
pub mod hosts;
pub mod known;
pub mod pipeline;
pub mod probe;
pub mod report;

pub use error::CheckError;
pub use known::KnownTimeouts;
pub use pipeline::{check_hosts, check_reader, probe_pairs, PoolStats, Summary};
pub use probe::{Prober, TlsProber};

/// One claim from the hosts file: `ip` should answer TLS as `hostname`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Pair {
    pub ip: IpAddr,
    pub hostname: String,
}

impl Pair {
    pub fn new(ip: IpAddr, hostname: impl Into<String>) -> Self {
        Pair {
            ip,
            hostname: hostname.into(),
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {}}}", self.ip, self.hostname)
    }
}

/// Why a pair failed its probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    /// The TCP connect did not finish within the timeout
    ConnectTimeout,
    /// The TCP connect failed (refused, unreachable, reset...)
    Connect(String),
    /// The TLS handshake did not finish within the timeout
    HandshakeTimeout,
    /// The TLS handshake failed, e.g. the server rejected the SNI
    Handshake(String),
}

impl MismatchReason {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout | Self::HandshakeTimeout)
    }

    /// Short machine-readable tag used by the JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectTimeout => "connect_timeout",
            Self::Connect(_) => "connect",
            Self::HandshakeTimeout => "handshake_timeout",
            Self::Handshake(_) => "handshake",
        }
    }
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectTimeout | Self::HandshakeTimeout => write!(f, "i/o timeout"),
            Self::Connect(details) | Self::Handshake(details) => write!(f, "{}", details),
        }
    }
}

/// A pair that did not complete a TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub pair: Pair,
    pub reason: MismatchReason,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pair, self.reason)
    }
}
