//! TCP transport (RFC 3430): BER messages are self-framing, so no extra
//! length prefix is needed — the SEQUENCE tag/length pair read off the wire
//! tells us exactly how many content bytes follow.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::{Transport, extract_request_id};
use crate::ber::decode_length;
use crate::error::{DecodeErrorKind, Error, Result};

/// A connected TCP stream carrying BER-framed SNMP messages.
///
/// Because TCP guarantees in-order delivery or a connection error,
/// [`Client`](crate::Client) skips its UDP retry logic for this transport
/// (see [`Transport::is_stream`]).
#[derive(Clone)]
pub struct TcpTransport {
    stream: Arc<Mutex<TcpStream>>,
    peer: SocketAddr,
    local: SocketAddr,
}

impl TcpTransport {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| Error::Io { target: Some(addr), source: e })?;
        let local = stream.local_addr().map_err(|e| Error::Io { target: Some(addr), source: e })?;
        tracing::debug!(snmp.target = %addr, snmp.local_addr = %local, "TCP transport connected");
        Ok(TcpTransport { stream: Arc::new(Mutex::new(stream)), peer: addr, local })
    }

    /// Read one complete BER message off the stream: a tag byte, its length
    /// octets, and exactly that many content bytes.
    async fn read_message(stream: &mut TcpStream, peer: SocketAddr) -> Result<Bytes> {
        let io_err = |e: std::io::Error| Error::Io { target: Some(peer), source: e };

        let mut tag = [0u8; 1];
        stream.read_exact(&mut tag).await.map_err(io_err)?;

        let mut first_len = [0u8; 1];
        stream.read_exact(&mut first_len).await.map_err(io_err)?;

        let mut length_octets = vec![first_len[0]];
        if first_len[0] & 0x80 != 0 {
            let num_octets = (first_len[0] & 0x7f) as usize;
            if num_octets == 0 || num_octets > 8 {
                return Err(Error::decode(0, DecodeErrorKind::InvalidLength));
            }
            let mut rest = vec![0u8; num_octets];
            stream.read_exact(&mut rest).await.map_err(io_err)?;
            length_octets.extend_from_slice(&rest);
        }

        let (content_len, _) = decode_length(&length_octets)?;

        let mut message = Vec::with_capacity(1 + length_octets.len() + content_len);
        message.push(tag[0]);
        message.extend_from_slice(&length_octets);
        let body_start = message.len();
        message.resize(body_start + content_len, 0);
        stream.read_exact(&mut message[body_start..]).await.map_err(io_err)?;

        Ok(Bytes::from(message))
    }
}

impl Transport for TcpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        let mut stream = self.stream.lock().await;
        stream
            .write_all(data)
            .await
            .map_err(|e| Error::SendFailed { target: Some(self.peer), source: e })
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        let fut = async {
            let mut stream = self.stream.lock().await;
            loop {
                let data = Self::read_message(&mut stream, self.peer).await?;
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
                        tracing::debug!(snmp.target = %self.peer, "discarding malformed message");
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
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn roundtrips_a_ber_framed_message() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&buf[..n]).await.unwrap();
        });

        let transport = TcpTransport::connect(server_addr).await.unwrap();
        assert!(transport.is_stream());

        let pdu = crate::pdu::Pdu::request(
            crate::pdu::PduType::GetRequest,
            7,
            vec![crate::varbind::VarBind::null(crate::oid::Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]))],
        );
        let msg = crate::message::SnmpMessage::community(
            crate::version::Version::V2c,
            Bytes::from_static(b"public"),
            pdu,
        );
        let encoded = msg.encode().bytes;

        transport.send(&encoded).await.unwrap();
        let (data, addr) = transport.recv(7, Duration::from_secs(1)).await.unwrap();
        assert_eq!(addr, server_addr);
        assert_eq!(data, encoded);

        server.await.unwrap();
    }
}
