#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Run event bus.
//!
//! The bus carries a typed event enum with sequential identifiers and keeps a
//! bounded replay ring so a late subscriber (for example a progress renderer
//! attached after the run started) can catch up. Internally it uses
//! `tokio::broadcast`; when a subscriber lags, the oldest events are dropped
//! for that subscriber only.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use astrofetch_core::{RunStatus, TransferErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, Receiver, Sender};
use uuid::Uuid;

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Events emitted while a run progresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run began.
    RunStarted {
        /// Run identifier.
        run_id: Uuid,
        /// Whether transfers are suppressed.
        dry_run: bool,
    },
    /// A catalog page arrived.
    PageFetched {
        /// Run identifier.
        run_id: Uuid,
        /// Offset of the page's first item.
        offset: u64,
        /// Items on the page.
        items: usize,
        /// Catalog total-count signal.
        total_count: u64,
    },
    /// A batch was handed to the executor.
    BatchStarted {
        /// Run identifier.
        run_id: Uuid,
        /// One-based batch index.
        batch_index: u64,
        /// Tasks in the batch.
        size: usize,
    },
    /// A task finished successfully.
    ItemTransferred {
        /// Run identifier.
        run_id: Uuid,
        /// Catalog item identifier.
        item_id: String,
        /// Destination written.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// A task gave up.
    ItemFailed {
        /// Run identifier.
        run_id: Uuid,
        /// Catalog item identifier.
        item_id: String,
        /// Final error kind.
        kind: TransferErrorKind,
        /// Attempts made.
        attempts: u32,
    },
    /// Every task of a batch reached a terminal outcome.
    BatchCompleted {
        /// Run identifier.
        run_id: Uuid,
        /// One-based batch index.
        batch_index: u64,
        /// Successful tasks in the batch.
        transferred: u64,
        /// Failed or cancelled tasks in the batch.
        failed: u64,
    },
    /// The run is idling at a batch boundary.
    RunPaused {
        /// Run identifier.
        run_id: Uuid,
    },
    /// The run left the paused state.
    RunResumed {
        /// Run identifier.
        run_id: Uuid,
    },
    /// The run reached a terminal status.
    RunFinished {
        /// Run identifier.
        run_id: Uuid,
        /// Terminal status.
        status: RunStatus,
    },
}

impl Event {
    /// Machine-friendly discriminator for log and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::PageFetched { .. } => "page_fetched",
            Self::BatchStarted { .. } => "batch_started",
            Self::ItemTransferred { .. } => "item_transferred",
            Self::ItemFailed { .. } => "item_failed",
            Self::BatchCompleted { .. } => "batch_completed",
            Self::RunPaused { .. } => "run_paused",
            Self::RunResumed { .. } => "run_resumed",
            Self::RunFinished { .. } => "run_finished",
        }
    }
}

/// Event plus its identifier and emission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Payload.
    pub event: Event,
}

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    buffer: Arc<Mutex<VecDeque<EventEnvelope>>>,
    next_id: Arc<AtomicU64>,
    replay_capacity: usize,
}

impl EventBus {
    /// Construct a bus whose broadcast channel and replay ring hold
    /// `capacity` events. A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            replay_capacity: capacity,
        }
    }

    /// Construct a bus with the default replay size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish an event, assigning it the next sequential identifier.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            if buffer.len() == self.replay_capacity {
                buffer.pop_front();
            }
            buffer.push_back(envelope.clone());
        }

        // No receivers is not an error; the replay ring still holds the event.
        let _ = self.sender.send(envelope);
        id
    }

    /// Subscribe, replaying buffered events newer than `since_id` first.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let backlog = since_id.map_or_else(VecDeque::new, |since| {
            let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            buffer
                .iter()
                .filter(|item| item.id > since)
                .cloned()
                .collect()
        });
        EventStream {
            backlog,
            receiver,
            last_seen: since_id,
        }
    }

    /// Identifier of the most recent event still in the replay ring.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.back().map(|event| event.id)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Yields events from the replay backlog, then from the live channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    last_seen: Option<EventId>,
}

impl EventStream {
    /// Receive the next event. Returns `None` once every bus handle is gone.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(event) = self.backlog.pop_front() {
            self.last_seen = Some(event.id);
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                // Events already replayed from the backlog can also be queued
                // on the live channel.
                Ok(event) if self.last_seen.is_some_and(|seen| event.id <= seen) => {}
                Ok(event) => {
                    self.last_seen = Some(event.id);
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
