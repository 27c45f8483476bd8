//! PortProbe — single-instance guard on the controller port.
//!
//! A TCP connect decides the outcome: accepted means another controller
//! already listens, refused means the port is free. Anything else (timeout,
//! unreachable network, resolution failure) is inconclusive and reported as
//! a [`ProbeError`].

use std::io;
use std::time::Duration;

use aiota_supervisor::BoxFuture;
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    /// Something accepted a connection.
    Open,
    /// Nothing is bound.
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe of {addr} timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("probe of {addr} failed: {source}")]
    Io {
        addr: String,
        #[source]
        source: io::Error,
    },
}

pub trait PortProbe: Send + Sync {
    fn check<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<PortStatus, ProbeError>>;
}

#[derive(Debug, Clone, Copy)]
pub struct TcpPortProbe {
    timeout: Duration,
}

impl TcpPortProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpPortProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl PortProbe for TcpPortProbe {
    fn check<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<PortStatus, ProbeError>> {
        Box::pin(async move {
            let addr = format!("{host}:{port}");
            let status = match tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await {
                Ok(Ok(_stream)) => PortStatus::Open,
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => PortStatus::Closed,
                Ok(Err(source)) => return Err(ProbeError::Io { addr, source }),
                Err(_) => {
                    return Err(ProbeError::Timeout {
                        addr,
                        timeout: self.timeout,
                    });
                }
            };
            debug!(%addr, ?status, "port probed");
            Ok(status)
        })
    }
}
