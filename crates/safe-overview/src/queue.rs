//! Collects overview requests for the duration of one batching window.

use {
    crate::{
        dispatcher::BatchDispatcher,
        model::{OverviewParams, SafeRef},
        service::OverviewResult,
        source::ApiVersion,
    },
    std::{
        mem,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tokio::sync::oneshot,
    tracing::Instrument as _,
};

/// One pending overview request.
#[derive(Debug)]
pub struct QueueItem {
    pub safe: SafeRef,
    pub params: OverviewParams,
    /// Resolved when the request was enqueued.
    pub version: ApiVersion,
    /// Answered exactly once when the batch containing the item settles.
    pub sender: oneshot::Sender<OverviewResult>,
}

/// Queue of pending requests with a single shared batching timer.
///
/// The timer is armed by the first item that lands in an empty queue and is
/// never extended by later items. When it fires the whole queue is drained,
/// so everything that was enqueued up to that point ends up in the same
/// batch and anything enqueued afterwards opens a new window.
pub struct RequestQueue {
    state: Mutex<State>,
    batch_delay: Duration,
    dispatcher: Arc<BatchDispatcher>,
}

#[derive(Default)]
struct State {
    items: Vec<QueueItem>,
    timer_armed: bool,
}

impl RequestQueue {
    pub fn new(batch_delay: Duration, dispatcher: Arc<BatchDispatcher>) -> Arc<Self> {
        Arc::new(Self {
            state: Default::default(),
            batch_delay,
            dispatcher,
        })
    }

    /// Adds an item to the current window, arming the timer if this opens a
    /// new window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(self: &Arc<Self>, item: QueueItem) {
        tracing::trace!(safe = %item.safe, version = %item.version, "queueing overview request");
        // Checking and arming the timer happens under the same lock so
        // concurrent callers can never arm it twice.
        let mut state = self.state.lock().unwrap();
        state.items.push(item);
        if state.timer_armed {
            return;
        }
        state.timer_armed = true;
        drop(state);

        let queue = self.clone();
        let delay = self.batch_delay;
        tokio::task::spawn(
            async move {
                tokio::time::sleep(delay).await;
                queue.drain_and_dispatch().await;
            }
            .instrument(tracing::debug_span!("overview_batch")),
        );
        tracing::trace!(?delay, "armed batching timer");
    }

    /// Takes everything that is queued right now and hands it to the
    /// dispatcher. Resolves once every drained item has been answered.
    pub async fn drain_and_dispatch(&self) {
        let items = {
            let mut state = self.state.lock().unwrap();
            state.timer_armed = false;
            mem::take(&mut state.items)
        };
        if items.is_empty() {
            return;
        }
        self.dispatcher.dispatch(items).await;
    }

    /// Number of requests waiting for the current window to close.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }
}
