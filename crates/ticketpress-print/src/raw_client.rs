// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP print client (JetDirect, port 9100).
//
// Open a socket, dump the ESC/POS bytes, give the firmware a moment to drain
// its buffer, half-close, then wait for the printer to hang up.  There is no
// acknowledgement in the protocol: the far end closing is the only success
// signal we get.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use ticketpress_core::error::{Result, TicketpressError};
pub use ticketpress_core::types::RAW_PORT;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DRAIN: Duration = Duration::from_millis(500);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Something that can put bytes on a printer.
///
/// The scheduler is generic over this so tests can drive it with a fake
/// device instead of a socket.
pub trait Transport: Send + Sync + 'static {
    /// Deliver `bytes` to `host:port`.  Resolves once the device has taken
    /// the whole payload, or fails with `TransientDelivery`.
    fn send(&self, host: &str, port: u16, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// `true` if a connection to `host:port` can be opened.
    fn probe(&self, host: &str, port: u16) -> impl Future<Output = bool> + Send;
}

fn delivery_err(addr: &str, what: &str, detail: impl std::fmt::Display) -> TicketpressError {
    TicketpressError::TransientDelivery(format!("{what} {addr}: {detail}"))
}

/// Raw TCP transport.
#[derive(Debug, Clone)]
pub struct RawClient {
    idle_timeout: Duration,
    drain: Duration,
    probe_timeout: Duration,
}

impl Default for RawClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RawClient {
    pub fn new() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            drain: DEFAULT_DRAIN,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Bound on connecting and on any single write or read.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Pause between the last write and the half-close.
    pub fn with_drain(mut self, drain: Duration) -> Self {
        self.drain = drain;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

impl Transport for RawClient {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn send(&self, host: &str, port: u16, bytes: &[u8]) -> Result<()> {
        let addr = format!("{host}:{port}");
        debug!(addr = %addr, "connecting via raw TCP");

        let mut stream = tokio::time::timeout(self.idle_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                delivery_err(&addr, "connect timed out to", format!("{:?}", self.idle_timeout))
            })?
            .map_err(|e| delivery_err(&addr, "connect to", e))?;

        tokio::time::timeout(self.idle_timeout, stream.write_all(bytes))
            .await
            .map_err(|_| delivery_err(&addr, "write timed out to", "device stopped reading"))?
            .map_err(|e| delivery_err(&addr, "write to", e))?;

        tokio::time::sleep(self.drain).await;

        stream
            .shutdown()
            .await
            .map_err(|e| delivery_err(&addr, "half-close of", e))?;

        // Wait for the device to close its side.  Anything it sends back
        // (status bytes on some models) is discarded.
        let mut scratch = [0u8; 256];
        loop {
            let read = tokio::time::timeout(self.idle_timeout, stream.read(&mut scratch))
                .await
                .map_err(|_| delivery_err(&addr, "no close from", "idle timeout"))?
                .map_err(|e| delivery_err(&addr, "read from", e))?;
            if read == 0 {
                break;
            }
            debug!(read, "discarding bytes from printer");
        }

        info!(addr = %addr, total = bytes.len(), "raw TCP print job sent");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn probe(&self, host: &str, port: u16) -> bool {
        let addr = format!("{host}:{port}");
        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                warn!(addr = %addr, error = %e, "printer probe failed");
                false
            }
            Err(_) => {
                warn!(addr = %addr, "printer probe timed out");
                false
            }
        }
    }
}
