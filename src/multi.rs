//! Multi-target fan-out executor.
//!
//! Reuses the single-target [`Client`] (and, through it, whatever
//! [`Transport`] it's built on — typically a
//! [`SharedUdpTransport`](crate::transport::SharedUdpTransport) handle, so
//! the whole batch shares one socket) to run a batch of operations against
//! many endpoints with bounded concurrency, per-operation option overrides,
//! and a walk-budget watchdog that's distinct from the per-PDU timeout.
//!
//! Grounded on the fan-out pattern in [`transport::shared`](crate::transport::shared)'s
//! module docs (`futures::future::join_all` over a `Vec<Client<SharedUdpHandle>>`),
//! generalized from an unbounded `join_all` into a bounded, order-preserving
//! executor.

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesOrdered;
use tokio::sync::Semaphore;

use crate::client::{ClientConfig, RequestOptions};
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::varbind::VarBind;
use crate::walk_engine::{self, WalkOptions};
use crate::Client;

/// A task-level watchdog of `per_pdu_timeout + 1s` would otherwise race the
/// client's own retry budget on a flaky target; the margin just needs to be
/// bigger than the scheduling jitter of one suspension point.
const WATCHDOG_MARGIN: Duration = Duration::from_secs(1);

/// Fixed ceiling for any operation of kind [`OperationKind::Walk`],
/// independent of `per_pdu_timeout`.
const WALK_BUDGET: Duration = Duration::from_secs(20 * 60);

/// What to do against one target.
#[derive(Debug, Clone)]
pub enum OperationKind {
    Get(Vec<Oid>),
    GetNext(Oid),
    GetBulk { oids: Vec<Oid>, non_repeaters: i32, max_repetitions: i32 },
    Set(Vec<VarBind>),
    Walk { root: Oid, max_repetitions: i32 },
}

impl OperationKind {
    fn is_walk(&self) -> bool {
        matches!(self, OperationKind::Walk { .. })
    }
}

/// One entry in a batch: the target, the operation, and any per-operation
/// option overrides layered on top of the batch's `global_opts`.
pub struct Operation<T> {
    pub client: Client<T>,
    pub kind: OperationKind,
    pub options: Option<RequestOptions>,
}

impl<T> Operation<T> {
    pub fn new(client: Client<T>, kind: OperationKind) -> Self {
        Self { client, kind, options: None }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Result of a single successful operation, tagged by the kind of request
/// that produced it.
#[derive(Debug, Clone)]
pub enum MultiOutcome {
    Get(Vec<VarBind>),
    GetNext(VarBind),
    GetBulk(Vec<VarBind>),
    Set(Vec<VarBind>),
    Walk(Vec<VarBind>),
}

/// Run `operations` over the shared mux each operation's [`Client`] is
/// built on, with at most `max_concurrency` in flight at once. Per-operation
/// overrides in [`Operation::options`] win field-by-field over
/// `global_opts`; an operation's own invalid override values fall back to
/// `global_opts` rather than the operation failing outright
/// ([`RequestOptions::merge_overrides`]).
///
/// Output preserves input order. A failed operation surfaces as `Err` at
/// its index; it never aborts siblings.
pub async fn run_multi<T>(
    operations: Vec<Operation<T>>,
    global_opts: &RequestOptions,
    max_concurrency: usize,
) -> Vec<Result<MultiOutcome>>
where
    T: Transport + 'static,
{
    let semaphore = std::sync::Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut pending = FuturesOrdered::new();

    for op in operations {
        let semaphore = semaphore.clone();
        let merged = op.options.as_ref().map(|local| local.merge_overrides(global_opts)).unwrap_or_else(|| global_opts.clone());
        pending.push_back(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            run_one(op.client, op.kind, merged).await
        });
    }

    pending.collect().await
}

async fn run_one<T>(client: Client<T>, kind: OperationKind, opts: RequestOptions) -> Result<MultiOutcome>
where
    T: Transport + 'static,
{
    let opts = opts.for_version(client.version());
    let client = client.with_options(&opts);
    let is_walk = kind.is_walk();
    let watchdog = if is_walk { WALK_BUDGET } else { effective_pdu_timeout(&opts) + WATCHDOG_MARGIN };
    let target = client.peer_addr();

    let outcome = tokio::time::timeout(watchdog, execute(&client, kind));
    match outcome.await {
        Ok(result) => result,
        Err(_) if is_walk => Err(Error::WalkDeadlineExceeded { elapsed: watchdog }),
        Err(_) => Err(Error::Timeout { target: Some(target), elapsed: watchdog, request_id: 0, retries: 0 }),
    }
}

fn effective_pdu_timeout(opts: &RequestOptions) -> Duration {
    opts.timeout.unwrap_or(ClientConfig::default().timeout)
}

async fn execute<T>(client: &Client<T>, kind: OperationKind) -> Result<MultiOutcome>
where
    T: Transport + 'static,
{
    match kind {
        OperationKind::Get(oids) => client.get(&oids).await.map(MultiOutcome::Get),
        OperationKind::GetNext(oid) => client.get_next(&oid).await.map(MultiOutcome::GetNext),
        OperationKind::GetBulk { oids, non_repeaters, max_repetitions } => {
            client.get_bulk(&oids, non_repeaters, max_repetitions).await.map(MultiOutcome::GetBulk)
        }
        OperationKind::Set(varbinds) => client.set(varbinds).await.map(MultiOutcome::Set),
        OperationKind::Walk { root, max_repetitions } => {
            let walk_opts = WalkOptions { max_repetitions, ..WalkOptions::default() };
            walk_engine::walk(client, root, walk_opts).await.map(MultiOutcome::Walk)
        }
    }
}
