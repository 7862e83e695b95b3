//! Accumulating walk entry points built on top of [`Client::walk`] and
//! [`Client::bulk_walk`]'s [`Stream`] primitives.
//!
//! [`client::walk`]'s `Walk`/`BulkWalk` types stop at a single terminal
//! condition per poll; they don't know about iteration caps or an overall
//! time budget, and a caller still has to drive the stream to completion by
//! hand. [`walk`] does that driving, dispatching on SNMP version the way
//! spec requires: v1 walks stay on GET-NEXT (no `max_repetitions` ever
//! reaches the PDU), v2c/v3 walks use GET-BULK.

use std::future::poll_fn;
use std::pin::Pin;
use std::task::Context;
use std::time::{Duration, Instant};

use futures_core::Stream;

use crate::client::{BulkWalk, Client, Walk};
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::varbind::VarBind;
use crate::version::Version;

/// Tuning knobs for [`walk`], orthogonal to the per-PDU timeout each
/// individual GET-NEXT/GET-BULK request already carries via
/// [`ClientConfig::timeout`](super::ClientConfig::timeout).
#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// `max_repetitions` hint passed to GET-BULK on v2c/v3 walks. Ignored
    /// for v1 walks, which never send the field.
    pub max_repetitions: i32,
    /// Hard cap on the number of GET-NEXT/GET-BULK round trips a single
    /// walk may issue before it aborts with [`Error::WalkIterationLimit`].
    pub iteration_limit: usize,
    /// Overall wall-clock budget for the walk. `None` means no deadline is
    /// enforced here (the multi-target executor enforces its own 20-minute
    /// ceiling at the task level instead).
    pub deadline: Option<Duration>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self { max_repetitions: 10, iteration_limit: 10_000, deadline: None }
    }
}

/// Drive a subtree walk to completion, returning every varbind at or below
/// `root` in the order the agent returned them.
///
/// Dispatches on [`Client::version`]: v1 clients walk via repeated
/// GET-NEXT, v2c/v3 clients via repeated GET-BULK. Both strategies share
/// the same iteration cap and deadline enforcement; the underlying
/// [`Walk`]/[`BulkWalk`] streams already enforce subtree-boundary and
/// non-increasing-OID termination per iteration.
pub async fn walk<T>(client: &Client<T>, root: Oid, opts: WalkOptions) -> Result<Vec<VarBind>>
where
    T: Transport + 'static,
{
    match client.version() {
        Version::V1 => walk_v1(client, root, opts).await,
        Version::V2c | Version::V3 => walk_v2c_v3(client, root, opts).await,
    }
}

async fn walk_v1<T>(client: &Client<T>, root: Oid, opts: WalkOptions) -> Result<Vec<VarBind>>
where
    T: Transport + 'static,
{
    let stream = Box::pin(client.walk(root));
    drain(stream, opts).await
}

async fn walk_v2c_v3<T>(client: &Client<T>, root: Oid, opts: WalkOptions) -> Result<Vec<VarBind>>
where
    T: Transport + 'static,
{
    let stream = Box::pin(client.bulk_walk(root, opts.max_repetitions));
    drain(stream, opts).await
}

/// Poll a pinned walk stream to completion, enforcing the iteration cap
/// and deadline that neither [`Walk`] nor [`BulkWalk`] know about on their
/// own.
async fn drain<S>(mut stream: Pin<Box<S>>, opts: WalkOptions) -> Result<Vec<VarBind>>
where
    S: Stream<Item = Result<VarBind>>,
{
    let start = Instant::now();
    let mut results = Vec::new();
    let mut iterations = 0usize;

    loop {
        if let Some(deadline) = opts.deadline {
            if start.elapsed() >= deadline {
                return Err(Error::WalkDeadlineExceeded { elapsed: start.elapsed() });
            }
        }
        if iterations >= opts.iteration_limit {
            return Err(Error::WalkIterationLimit { limit: opts.iteration_limit });
        }
        iterations += 1;

        let item = poll_fn(|cx: &mut Context<'_>| stream.as_mut().poll_next(cx)).await;
        match item {
            Some(Ok(varbind)) => results.push(varbind),
            Some(Err(e)) => return Err(e),
            None => return Ok(results),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::client::ClientConfig;
    use crate::transport::{MockTransport, ResponseBuilder};
    use crate::value::Value;

    fn mock_client(mock: MockTransport, version: Version) -> Client<MockTransport> {
        let config = ClientConfig {
            version,
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(1),
            retries: 0,
            max_oids_per_request: 10,
            v3_security: None,
        };
        Client::new(mock, config)
    }

    #[tokio::test]
    async fn v1_walk_collects_until_out_of_subtree() {
        let mut mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]), Value::OctetString("a".into()))
                .build_v2c(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(2)
                .varbind(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 2, 0]), Value::OctetString("b".into()))
                .build_v2c(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(3)
                .varbind(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 2, 1, 0]), Value::Integer(1))
                .build_v2c(b"public"),
        );

        let client = mock_client(mock, Version::V1);
        let result = walk(&client, Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1]), WalkOptions::default()).await.unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn v2c_walk_uses_bulk_and_collects_all() {
        let mut mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]), Value::OctetString("a".into()))
                .varbind(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 2, 0]), Value::OctetString("b".into()))
                .varbind(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1]), Value::EndOfMibView)
                .build_v2c(b"public"),
        );

        let client = mock_client(mock, Version::V2c);
        let result = walk(&client, Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1]), WalkOptions::default()).await.unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn iteration_limit_aborts_a_walk_that_never_terminates() {
        let mut mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        for i in 0..5 {
            mock.queue_response(
                ResponseBuilder::new(i + 1)
                    .varbind(
                        Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, i as u32]),
                        Value::OctetString("x".into()),
                    )
                    .build_v2c(b"public"),
            );
        }

        let client = mock_client(mock, Version::V1);
        let opts = WalkOptions { iteration_limit: 3, ..WalkOptions::default() };
        let err = walk(&client, Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1]), opts).await.unwrap_err();

        assert!(matches!(err, Error::WalkIterationLimit { limit: 3 }));
    }

    #[tokio::test]
    async fn deadline_aborts_a_slow_walk() {
        let mut mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(1)
                .varbind(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]), Value::OctetString("a".into()))
                .build_v2c(b"public"),
        );

        let client = mock_client(mock, Version::V1);
        let opts = WalkOptions { deadline: Some(Duration::ZERO), ..WalkOptions::default() };
        let err = walk(&client, Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1]), opts).await.unwrap_err();

        assert!(matches!(err, Error::WalkDeadlineExceeded { .. }));
    }
}
