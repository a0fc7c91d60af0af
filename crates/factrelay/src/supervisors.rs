//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where facts arrive faster than collectors answer..."
//! 🎬 "One supervisor dared to wire them all." 🦆
//!
//! 📦 The Supervisor owns the pipeline's moving parts and nothing else:
//!
//! ```text
//! Ingestor ──append──▶ SharedBuffer ──drain (FlushWorker)──▶ delivery queue ──▶ DeliveryWorker ──▶ Sink
//!     └──── flush signal (try_send, capacity 1) ────▶ FlushWorker ◀── timer
//! ```
//!
//! No globals. The buffer and both channels are built here, at start, and handed out.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB. They are the supervisor's private little minions.

mod workers;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app_config::RuntimeConfig;
use crate::backends::SinkBackend;
use crate::buffer::SharedBuffer;
use crate::common::Fact;
use crate::gateway::Ingestor;
use workers::{DeliveryWorker, FlushWorker, Worker};

/// 📦 The Supervisor: because even async tasks need someone hovering over them.
pub(crate) struct Supervisor {
    runtime: RuntimeConfig,
}

/// 🧵 Join handles for the two long-running workers, plus a view of what is still in flight.
#[derive(Debug)]
pub(crate) struct PipelineHandles {
    flush: JoinHandle<Result<()>>,
    delivery: JoinHandle<Result<()>>,
    buffer: Arc<SharedBuffer>,
    queue: Receiver<Fact>,
}

impl Supervisor {
    pub(crate) fn new(runtime: RuntimeConfig) -> Self {
        Self { runtime }
    }

    /// 🚀 Build the buffer and the channels, spawn both workers, hand back the producer end.
    ///
    /// The pipeline winds down once every clone of the returned `Ingestor` is dropped:
    /// final flush, queue closes, delivery drains, sink closes.
    pub(crate) fn start(&self, sink: SinkBackend) -> (Ingestor, PipelineHandles) {
        let buffer = Arc::new(SharedBuffer::new());
        // -- 🔔 capacity 1: at most one pending flush request, extra requests are no-ops
        let (flush_tx, flush_rx) = async_channel::bounded(1);
        let (queue_tx, queue_rx) = async_channel::bounded(self.runtime.queue_capacity);

        let flush = FlushWorker::new(
            Arc::clone(&buffer),
            flush_rx,
            queue_tx,
            &queue_rx,
            &self.runtime,
        )
        .start();
        let delivery = DeliveryWorker::new(queue_rx.clone(), sink).start();

        info!(
            "🧵 Pipeline up: flush at {} facts or every {:?}, delivery queue of {} ({:?} when full)",
            self.runtime.buffer_capacity,
            self.runtime.flush_interval(),
            self.runtime.queue_capacity,
            self.runtime.queue_policy
        );

        let handles = PipelineHandles {
            flush,
            delivery,
            buffer: Arc::clone(&buffer),
            queue: queue_rx,
        };
        let ingestor = Ingestor::new(buffer, flush_tx, self.runtime.buffer_capacity);
        (ingestor, handles)
    }
}

impl PipelineHandles {
    /// 🏁 Wait for both workers to finish, with no deadline.
    #[cfg(test)]
    pub(crate) async fn join(self) -> Result<()> {
        join_workers(self.flush, self.delivery).await
    }

    /// 🏁 Wait for the pipeline to drain, but not forever.
    ///
    /// Returns once both workers finish, `deadline` passes, or `interrupt` resolves,
    /// whichever comes first. In the last two cases the workers are aborted and the
    /// facts still buffered or queued are logged as abandoned. Returns that count.
    pub(crate) async fn shutdown(
        self,
        deadline: Duration,
        interrupt: impl Future<Output = ()>,
    ) -> Result<usize> {
        let PipelineHandles {
            flush,
            delivery,
            buffer,
            queue,
        } = self;
        let flush_abort = flush.abort_handle();
        let delivery_abort = delivery.abort_handle();

        let gave_up_because = tokio::select! {
            drained = join_workers(flush, delivery) => return drained.map(|()| 0),
            _ = tokio::time::sleep(deadline) => "the drain deadline passed",
            _ = interrupt => "a second shutdown signal arrived",
        };

        flush_abort.abort();
        delivery_abort.abort();
        let abandoned = buffer.len() + queue.len();
        warn!(
            "⏰ Stopped waiting on the pipeline, {}: {} facts abandoned, plus any delivery in flight",
            gave_up_because, abandoned
        );
        Ok(abandoned)
    }
}

/// Flush first, since its exit is what closes the queue.
async fn join_workers(
    flush: JoinHandle<Result<()>>,
    delivery: JoinHandle<Result<()>>,
) -> Result<()> {
    flush
        .await
        .context("💀 FlushWorker panicked or was cancelled")?
        .context("💀 FlushWorker failed")?;
    delivery
        .await
        .context("💀 DeliveryWorker panicked or was cancelled")?
        .context("💀 DeliveryWorker failed")?;
    Ok(())
}
