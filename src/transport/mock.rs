//! In-memory transport for exercising [`Client`](crate::Client) without a
//! real socket.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::message::SnmpMessage;
use crate::oid::Oid;
use crate::pdu::{ErrorInfo, Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::Transport;

enum MockEvent {
    Response(Bytes),
    Timeout,
}

struct Inner {
    addr: SocketAddr,
    events: Mutex<VecDeque<MockEvent>>,
}

/// Queue responses (or timeouts) with [`queue_response`](Self::queue_response)
/// / [`queue_timeout`](Self::queue_timeout) before handing the transport to a
/// [`Client`](crate::Client). Each `recv` pops the next queued event in FIFO
/// order and ignores `request_id` — callers are expected to queue events in
/// the same order the client will issue its requests.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

impl MockTransport {
    pub fn new(addr: SocketAddr) -> Self {
        MockTransport {
            inner: Arc::new(Inner { addr, events: Mutex::new(VecDeque::new()) }),
        }
    }

    /// Queue a raw response datagram to be returned by the next `recv` call.
    pub fn queue_response(&mut self, data: Bytes) {
        self.inner.events.lock().unwrap().push_back(MockEvent::Response(data));
    }

    /// Queue a timeout: the next `recv` call returns `Error::Timeout`.
    pub fn queue_timeout(&mut self) {
        self.inner.events.lock().unwrap().push_back(MockEvent::Timeout);
    }
}

impl Transport for MockTransport {
    async fn send(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        let event = self.inner.events.lock().unwrap().pop_front();
        match event {
            Some(MockEvent::Response(data)) => Ok((data, self.inner.addr)),
            Some(MockEvent::Timeout) => Err(Error::Timeout {
                target: Some(self.inner.addr),
                elapsed: timeout,
                request_id,
                retries: 0,
            }),
            None => Err(Error::SocketUnavailable { target: Some(self.inner.addr) }),
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.addr
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.addr
    }

    fn is_stream(&self) -> bool {
        false
    }
}

/// Builds a raw GET-RESPONSE datagram for [`MockTransport::queue_response`].
pub struct ResponseBuilder {
    request_id: i32,
    varbinds: Vec<VarBind>,
}

impl ResponseBuilder {
    pub fn new(request_id: i32) -> Self {
        ResponseBuilder { request_id, varbinds: Vec::new() }
    }

    pub fn varbind(mut self, oid: Oid, value: Value) -> Self {
        self.varbinds.push(VarBind::new(oid, value));
        self
    }

    /// Encode as a v1/v2c community RESPONSE PDU.
    pub fn build_v2c(self, community: &[u8]) -> Bytes {
        let pdu = Pdu::new(PduType::Response, self.request_id, ErrorInfo::success(), self.varbinds);
        let msg = SnmpMessage::community(Version::V2c, Bytes::copy_from_slice(community), pdu);
        msg.encode().bytes
    }
}
