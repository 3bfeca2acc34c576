//! Default health-probe transport: a bare TCP connect attempt against the
//! node's advertised address. Good enough to detect a dead process; a real
//! deployment would probe the data-plane's own health RPC instead, which is
//! out of this crate's scope.

use std::time::Duration;

use topology_service::ProbeTransport;

/// Probes liveness with a plain TCP connect.
#[derive(Debug, Default)]
pub struct TcpProbe;

#[async_trait::async_trait]
impl ProbeTransport for TcpProbe {
    async fn probe(&self, address: &str, timeout: Duration) -> Result<Duration, ()> {
        let start = tokio::time::Instant::now();
        match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => Ok(start.elapsed()),
            _ => Err(()),
        }
    }
}
