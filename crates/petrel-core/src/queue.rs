//! Priority inbound queue.
//!
//! Socket payloads are buffered in four lanes and drained in time-boxed
//! batches so a burst of traffic cannot blow the frame budget. URGENT
//! items bypass batching entirely; under backpressure the batch grows to
//! its ceiling and LOW items wait, possibly indefinitely — a flood of
//! presence pings must never delay a forced logout.
//!
//! The queue only sequences delivery: each [`push`] hands back a oneshot
//! receiver that resolves with the envelope once it is the item's turn.
//! The pusher does the actual work; errors thrown there are the
//! pusher's problem and cannot stop the drain loop.
//!
//! [`push`]: InboundQueue::push

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;

use petrel_shared::codes::Priority;
use petrel_shared::envelope::InboundEnvelope;

use crate::config::QueueConfig;

/// An envelope handed back to its pusher, stamped with the position it
/// was drained at. Stamps are strictly increasing across the queue, so
/// resolution order is observable without racing on task wakeup.
#[derive(Debug)]
pub struct Delivery {
    pub envelope: InboundEnvelope,
    pub order: u64,
}

struct QueueItem {
    envelope: InboundEnvelope,
    enqueued_at: Instant,
    resolve: oneshot::Sender<Delivery>,
}

const LANES: usize = 4;

struct Lanes {
    queues: [VecDeque<QueueItem>; LANES],
    /// Adaptive batch size, between `initial_batch_size` and
    /// `max_batch_size`.
    batch_size: usize,
    next_order: u64,
}

impl Lanes {
    fn depth(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Pop the next item in strict lane order, honoring the LOW-lane
    /// deferral under backpressure.
    fn pop_next(&mut self, skip_low: bool) -> Option<(usize, QueueItem)> {
        let limit = if skip_low { LANES - 1 } else { LANES };
        for lane in 0..limit {
            if let Some(item) = self.queues[lane].pop_front() {
                return Some((lane, item));
            }
        }
        None
    }
}

struct Inner {
    config: QueueConfig,
    lanes: Mutex<Lanes>,
    wake: Notify,
}

/// The four-lane inbound queue. Cloneable handle; the drain loop runs as
/// a background task spawned at construction.
#[derive(Clone)]
pub struct InboundQueue {
    inner: Arc<Inner>,
}

impl InboundQueue {
    /// Create the queue and spawn its drain loop on the current runtime.
    pub fn new(config: QueueConfig) -> Self {
        let inner = Arc::new(Inner {
            lanes: Mutex::new(Lanes {
                queues: [
                    VecDeque::new(),
                    VecDeque::new(),
                    VecDeque::new(),
                    VecDeque::new(),
                ],
                batch_size: config.initial_batch_size.max(1),
                next_order: 1,
            }),
            config,
            wake: Notify::new(),
        });

        tokio::spawn(drain_loop(Arc::clone(&inner)));

        Self { inner }
    }

    /// Enqueue an envelope. Never fails; the returned receiver resolves
    /// once the item has been drained and it is the pusher's turn to
    /// process it.
    pub fn push(
        &self,
        envelope: InboundEnvelope,
        priority: Priority,
    ) -> oneshot::Receiver<Delivery> {
        let (resolve, rx) = oneshot::channel();
        let lane = if self.inner.config.enable_priority {
            priority.lane()
        } else {
            Priority::Normal.lane()
        };

        {
            let mut lanes = self.inner.lanes.lock().expect("queue mutex poisoned");
            lanes.queues[lane].push_back(QueueItem {
                envelope,
                enqueued_at: Instant::now(),
                resolve,
            });
        }
        self.inner.wake.notify_one();
        rx
    }

    /// Total number of queued items across all lanes.
    pub fn depth(&self) -> usize {
        self.inner.lanes.lock().expect("queue mutex poisoned").depth()
    }

    /// Number of queued items in one lane.
    pub fn lane_depth(&self, priority: Priority) -> usize {
        self.inner.lanes.lock().expect("queue mutex poisoned").queues[priority.lane()].len()
    }
}

async fn drain_loop(inner: Arc<Inner>) {
    loop {
        while drain_cycle(&inner) > 0 {
            // Frame boundary: let consumers and pushers run.
            tokio::task::yield_now().await;
        }
        inner.wake.notified().await;
    }
}

/// Drain one time-boxed batch. Returns the number of items resolved.
fn drain_cycle(inner: &Inner) -> usize {
    let config = &inner.config;
    let started = Instant::now();
    let budget = config.max_frame_time();

    let (effective_batch, skip_low, depth_at_start) = {
        let lanes = inner.lanes.lock().expect("queue mutex poisoned");
        let depth = lanes.depth();
        let low_depth = lanes.queues[Priority::Low.lane()].len();
        if depth > config.backpressure_threshold {
            // LOW is only deferred in favor of other traffic; when the
            // backlog is LOW alone it must still drain, or the items
            // would never resolve.
            (config.max_batch_size.max(1), depth > low_depth, depth)
        } else {
            (lanes.batch_size, false, depth)
        }
    };
    if depth_at_start == 0 {
        return 0;
    }
    if skip_low {
        tracing::debug!(
            depth = depth_at_start,
            threshold = config.backpressure_threshold,
            "inbound queue backpressure: deferring low-priority items"
        );
    }

    let mut resolved = 0usize;
    let mut batched = 0usize;
    // Once the batch or the time budget is spent, only URGENT items may
    // still flow this cycle.
    let mut urgent_only = false;

    loop {
        let popped = {
            let mut lanes = inner.lanes.lock().expect("queue mutex poisoned");
            let next = if urgent_only {
                lanes.queues[Priority::Urgent.lane()]
                    .pop_front()
                    .map(|item| (Priority::Urgent.lane(), item))
            } else {
                lanes.pop_next(skip_low)
            };
            match next {
                Some((lane, item)) => {
                    let order = lanes.next_order;
                    lanes.next_order += 1;
                    Some((lane, item, order))
                }
                None => None,
            }
        };

        let Some((lane, item, order)) = popped else {
            break;
        };

        let waited = item.enqueued_at.elapsed();
        tracing::trace!(code = item.envelope.code, lane, ?waited, order, "resolving inbound item");

        // A dropped receiver means the pusher lost interest; the queue
        // does not care.
        let _ = item.resolve.send(Delivery {
            envelope: item.envelope,
            order,
        });
        resolved += 1;

        // URGENT bypasses batching: it never counts against the batch
        // that caps this cycle.
        if lane != Priority::Urgent.lane() {
            batched += 1;
        }

        if batched >= effective_batch || started.elapsed() >= budget {
            urgent_only = true;
        }
    }

    // Adapt the batch size for the next cycle: grow while the queue
    // stays loaded, reset once it empties.
    {
        let mut lanes = inner.lanes.lock().expect("queue mutex poisoned");
        if lanes.depth() == 0 {
            lanes.batch_size = config.initial_batch_size.max(1);
        } else {
            lanes.batch_size = (lanes.batch_size * 2).min(config.max_batch_size.max(1));
        }
    }

    resolved
}
