//! Queue worker that feeds updates to the processor in order.
//!
//! Producers (one per webhook delivery) submit through a cloneable
//! [`ProcessorHandle`]; a single tokio task owns the [`EventProcessor`] and
//! drains a bounded channel. Submission waits while the channel is full.
//! When every handle has been dropped the worker finishes the backlog and
//! returns the processor through its `JoinHandle`.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::events::UpdateEvent;
use crate::matcher::ContextMatcher;
use crate::metrics::Publisher;

use super::engine::EventProcessor;

/// Default capacity of the update queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Errors returned when submitting an update.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The worker task has stopped and will accept no more updates.
    #[error("event processor has stopped")]
    Closed(Box<UpdateEvent>),
}

/// Cloneable producer side of the processor queue.
#[derive(Debug, Clone)]
pub struct ProcessorHandle {
    tx: mpsc::Sender<UpdateEvent>,
}

impl ProcessorHandle {
    /// Enqueues an update, waiting while the queue is full.
    ///
    /// Returns the update back inside the error if the worker is gone.
    #[instrument(skip_all, fields(kind = event.kind(), repo = %event.repo()))]
    pub async fn submit(&self, event: UpdateEvent) -> Result<(), SubmitError> {
        self.tx
            .send(event)
            .await
            .map_err(|e| SubmitError::Closed(Box::new(e.0)))?;
        debug!("Update enqueued");
        Ok(())
    }

    /// Returns true once the worker has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Moves `processor` into a new task that drains a queue of `capacity`.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn spawn_processor<P, M>(
    processor: EventProcessor<P, M>,
    capacity: usize,
) -> (ProcessorHandle, JoinHandle<EventProcessor<P, M>>)
where
    P: Publisher,
    M: ContextMatcher,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(run(processor, rx));
    (ProcessorHandle { tx }, task)
}

async fn run<P, M>(
    mut processor: EventProcessor<P, M>,
    mut rx: mpsc::Receiver<UpdateEvent>,
) -> EventProcessor<P, M>
where
    P: Publisher,
    M: ContextMatcher,
{
    info!(
        track_build_times = processor.track_build_times(),
        "Event processor started"
    );

    while let Some(event) = rx.recv().await {
        processor.process(event);
    }

    info!(
        live = processor.live_count(),
        "Update queue closed, event processor stopped"
    );
    processor
}
