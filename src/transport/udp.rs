//! Owned UDP transport: one connected socket per target.
//!
//! Simplest transport for small target counts (see [`SharedUdpTransport`]
//! for high-throughput polling of many targets from one socket).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use super::{Transport, extract_request_id};
use crate::error::{Error, Result};
use crate::util::bind_ephemeral_udp_socket;

/// A UDP socket connected to a single SNMP target.
///
/// Created via [`Client::v1()`](crate::Client::v1)/[`v2c()`](crate::Client::v2c)/
/// [`v3()`](crate::Client::v3) builder's `.connect()`, or directly with
/// [`UdpTransport::connect()`].
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    local: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local socket and connect it to `addr`.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let socket = bind_ephemeral_udp_socket(addr).await.map_err(|e| Error::Io {
            target: Some(addr),
            source: e,
        })?;
        socket.connect(addr).await.map_err(|e| Error::Io {
            target: Some(addr),
            source: e,
        })?;
        let local = socket.local_addr().map_err(|e| Error::Io { target: Some(addr), source: e })?;
        tracing::debug!(snmp.target = %addr, snmp.local_addr = %local, "UDP transport connected");
        Ok(UdpTransport { socket: Arc::new(socket), peer: addr, local })
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        tracing::trace!(snmp.target = %self.peer, snmp.bytes = data.len(), "UDP send");
        self.socket
            .send(data)
            .await
            .map_err(|e| Error::SendFailed { target: Some(self.peer), source: e })?;
        Ok(())
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        let fut = async {
            let mut buf = vec![0u8; 65535];
            loop {
                let len = self.socket.recv(&mut buf).await.map_err(|e| Error::Io {
                    target: Some(self.peer),
                    source: e,
                })?;
                let data = Bytes::copy_from_slice(&buf[..len]);
                match extract_request_id(&data) {
                    Some(id) if id == request_id => return Ok(data),
                    Some(stale) => {
                        tracing::debug!(
                            snmp.target = %self.peer,
                            snmp.expected_request_id = request_id,
                            snmp.stale_request_id = stale,
                            "discarding response for stale request_id"
                        );
                    }
                    None => {
                        tracing::debug!(snmp.target = %self.peer, "discarding malformed datagram");
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(data)) => Ok((data, self.peer)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Timeout { target: Some(self.peer), elapsed: timeout, request_id, retries: 0 }),
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn is_stream(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_binds_ephemeral_local_port() {
        let addr: SocketAddr = "127.0.0.1:16100".parse().unwrap();
        let transport = UdpTransport::connect(addr).await.unwrap();
        assert_eq!(transport.peer_addr(), addr);
        assert_ne!(transport.local_addr().port(), 0);
        assert!(!transport.is_stream());
    }

    #[tokio::test]
    async fn recv_times_out_with_no_peer() {
        let addr: SocketAddr = "127.0.0.1:16101".parse().unwrap();
        let transport = UdpTransport::connect(addr).await.unwrap();
        let err = transport.recv(1, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
