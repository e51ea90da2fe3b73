//! Serialized, rate-limited query dispatch.
//!
//! A single task owns the query queue and the pending-completion slot.
//! Callers enqueue through a [`DispatcherHandle`]; the gateway event path
//! reports terminal records with [`DispatcherHandle::complete`]. Both are
//! messages on one channel, so the slot has exactly one writer.
//!
//! Each dispatched query goes out under a request id issued by the task.
//! The id is published through [`DispatcherHandle::pending_request`] before
//! the request is sent, and a completion only releases the slot when it
//! names that id. Responses to an abandoned query are therefore stale.
//!
//! Dispatch rules:
//! - strict FIFO
//! - at most one query pending completion
//! - at least `min_interval` between two dispatch starts
//! - a pending query older than `query_timeout` is abandoned
//!
//! On stop, queued queries are discarded without running.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use qdp_telemetry::Metrics;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DispatcherConfig;
use crate::error::{TraderError, TraderResult};
use crate::sequence::Sequence;

/// Sends one query request under the given request id; returns the gateway's
/// send result (0 = sent).
pub type QueryAction = Box<dyn FnOnce(u32) -> i32 + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Account,
    Positions,
    Orders,
    Trades,
}

impl QueryKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Positions => "positions",
            Self::Orders => "orders",
            Self::Trades => "trades",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages to the dispatcher task.
pub enum DispatcherMsg {
    Enqueue { kind: QueryKind, action: QueryAction },
    /// Terminal record for the query sent under `request_id` arrived.
    Completed { kind: QueryKind, request_id: u32 },
    /// The pending query will never complete (transport lost).
    AbandonPending,
}

impl fmt::Debug for DispatcherMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enqueue { kind, .. } => write!(f, "Enqueue({kind})"),
            Self::Completed { kind, request_id } => write!(f, "Completed({kind}, {request_id})"),
            Self::AbandonPending => write!(f, "AbandonPending"),
        }
    }
}

struct QueuedQuery {
    kind: QueryKind,
    enqueued_at: Instant,
    action: QueryAction,
}

struct PendingQuery {
    kind: QueryKind,
    request_id: u32,
    dispatched_at: Instant,
}

// ============================================================================
// Task
// ============================================================================

struct DispatcherTask {
    rx: mpsc::UnboundedReceiver<DispatcherMsg>,
    queue: VecDeque<QueuedQuery>,
    pending: Option<PendingQuery>,
    /// Mirrors `pending` for the event path.
    pending_tx: watch::Sender<Option<u32>>,
    request_ids: Arc<Sequence>,
    last_dispatch: Option<Instant>,
    min_interval: Duration,
    query_timeout: Duration,
    cancel: CancellationToken,
}

impl DispatcherTask {
    /// Run until cancelled or every handle is dropped.
    ///
    /// Returns the number of queued queries discarded at exit.
    async fn run(mut self) -> usize {
        debug!("Query dispatcher started");

        loop {
            self.expire_pending(Instant::now());
            self.try_dispatch(Instant::now());

            let deadline = self.next_deadline();
            let wake = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    debug!("Query dispatcher cancelled");
                    break;
                }

                msg = self.rx.recv() => match msg {
                    Some(msg) => self.handle_message(msg),
                    None => {
                        debug!("All dispatcher handles dropped");
                        break;
                    }
                },

                () = wake => {}
            }
        }

        self.discard_queue()
    }

    fn handle_message(&mut self, msg: DispatcherMsg) {
        match msg {
            DispatcherMsg::Enqueue { kind, action } => {
                self.queue.push_back(QueuedQuery {
                    kind,
                    enqueued_at: Instant::now(),
                    action,
                });
                Metrics::query_enqueued(kind.as_str());
                Metrics::query_queue_depth(self.queue.len());
                debug!(%kind, depth = self.queue.len(), "Query enqueued");
            }
            DispatcherMsg::Completed { kind, request_id } => {
                let matches = self.pending.as_ref().is_some_and(|p| p.request_id == request_id);
                if !matches {
                    debug!(
                        %kind,
                        request_id,
                        pending = ?self.pending.as_ref().map(|p| p.request_id),
                        "Stale completion ignored"
                    );
                    return;
                }
                if let Some(pending) = self.clear_pending() {
                    let latency = pending.dispatched_at.elapsed();
                    Metrics::query_completed(pending.kind.as_str(), latency.as_secs_f64() * 1000.0);
                    debug!(%kind, request_id, latency_ms = latency.as_millis() as u64, "Query completed");
                }
            }
            DispatcherMsg::AbandonPending => {
                if let Some(pending) = self.clear_pending() {
                    warn!(kind = %pending.kind, request_id = pending.request_id, "Pending query abandoned");
                }
            }
        }
    }

    /// Release the pending slot if its query has run out of time.
    fn expire_pending(&mut self, now: Instant) {
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|p| now.duration_since(p.dispatched_at) >= self.query_timeout);
        if expired {
            if let Some(pending) = self.clear_pending() {
                warn!(
                    kind = %pending.kind,
                    request_id = pending.request_id,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "Query timed out waiting for terminal record"
                );
                Metrics::query_timed_out(pending.kind.as_str());
            }
        }
    }

    fn set_pending(&mut self, pending: PendingQuery) {
        self.pending_tx.send_replace(Some(pending.request_id));
        self.pending = Some(pending);
    }

    fn clear_pending(&mut self) -> Option<PendingQuery> {
        self.pending_tx.send_replace(None);
        self.pending.take()
    }

    /// Run the head of the queue if the slot is free and the gap has passed.
    fn try_dispatch(&mut self, now: Instant) {
        if self.pending.is_some() {
            return;
        }
        if let Some(last) = self.last_dispatch {
            if now.duration_since(last) < self.min_interval {
                return;
            }
        }
        let Some(query) = self.queue.pop_front() else {
            return;
        };

        self.last_dispatch = Some(now);
        Metrics::query_queue_depth(self.queue.len());

        let kind = query.kind;
        let request_id = self.request_ids.next();
        let waited = now.duration_since(query.enqueued_at);

        // Published first: responses may be handled before the action returns.
        self.set_pending(PendingQuery {
            kind,
            request_id,
            dispatched_at: now,
        });
        let result = (query.action)(request_id);
        if result == 0 {
            Metrics::query_dispatched(kind.as_str());
            debug!(%kind, request_id, waited_ms = waited.as_millis() as u64, "Query dispatched");
        } else {
            // No response will arrive for a request that was never sent.
            self.clear_pending();
            Metrics::query_send_failed(kind.as_str());
            warn!(%kind, request_id, code = result, "Query send failed");
        }
    }

    /// Earliest instant at which the loop has work without a new message.
    fn next_deadline(&self) -> Option<Instant> {
        if let Some(pending) = &self.pending {
            return Some(pending.dispatched_at + self.query_timeout);
        }
        if self.queue.is_empty() {
            return None;
        }
        Some(match self.last_dispatch {
            Some(last) => last + self.min_interval,
            None => Instant::now(),
        })
    }

    fn discard_queue(&mut self) -> usize {
        let discarded = self.queue.len();
        for query in self.queue.drain(..) {
            Metrics::query_discarded(query.kind.as_str());
        }
        Metrics::query_queue_depth(0);
        self.clear_pending();
        if discarded > 0 {
            info!(discarded, "Query dispatcher stopped, queued queries discarded");
        } else {
            debug!("Query dispatcher stopped");
        }
        discarded
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable sender side of the dispatcher.
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<DispatcherMsg>,
    pending_rx: watch::Receiver<Option<u32>>,
}

impl DispatcherHandle {
    /// Append a query to the tail of the queue.
    pub fn enqueue(&self, kind: QueryKind, action: QueryAction) -> TraderResult<()> {
        self.tx
            .send(DispatcherMsg::Enqueue { kind, action })
            .map_err(|_| TraderError::DispatcherStopped)
    }

    /// Report the terminal record of the query sent under `request_id`.
    ///
    /// Ignored unless that query is still the pending one.
    pub fn complete(&self, kind: QueryKind, request_id: u32) {
        let _ = self.tx.send(DispatcherMsg::Completed { kind, request_id });
    }

    /// Request id of the query awaiting its terminal record, if any.
    #[must_use]
    pub fn pending_request(&self) -> Option<u32> {
        *self.pending_rx.borrow()
    }

    /// Release the pending slot without a terminal record.
    pub fn abandon_pending(&self) {
        let _ = self.tx.send(DispatcherMsg::AbandonPending);
    }

    /// Returns true once the dispatcher task has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Running dispatcher: its handle plus the task it controls.
pub struct RequestDispatcher {
    handle: DispatcherHandle,
    cancel: CancellationToken,
    join: JoinHandle<usize>,
    shutdown_timeout: Duration,
}

impl RequestDispatcher {
    /// Spawn the dispatcher task on the current runtime.
    ///
    /// Query request ids are drawn from `request_ids`.
    #[must_use]
    pub fn spawn(config: &DispatcherConfig, request_ids: Arc<Sequence>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (pending_tx, pending_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let task = DispatcherTask {
            rx,
            queue: VecDeque::new(),
            pending: None,
            pending_tx,
            request_ids,
            last_dispatch: None,
            min_interval: config.min_interval(),
            query_timeout: config.query_timeout(),
            cancel: cancel.clone(),
        };

        Self {
            handle: DispatcherHandle { tx, pending_rx },
            cancel,
            join: tokio::spawn(task.run()),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Stop the task and wait for it, at most `shutdown_timeout`.
    ///
    /// Returns the number of discarded queries, or `None` if the task had to
    /// be aborted.
    pub async fn stop(self) -> Option<usize> {
        self.cancel.cancel();
        let mut join = self.join;

        match tokio::time::timeout(self.shutdown_timeout, &mut join).await {
            Ok(Ok(discarded)) => Some(discarded),
            Ok(Err(e)) => {
                warn!(?e, "Query dispatcher task failed");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "Query dispatcher did not stop in time, aborting"
                );
                join.abort();
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
