//! 🎬 *[a queue fills with facts. somewhere, a collector waits.]*
//!
//! 📤 The DeliveryWorker — patient, tireless, strictly sequential. It takes the next
//! fact, makes one delivery attempt, and moves on no matter how that went. It never
//! batches. It never runs two sends at once. The collector sees facts in the order
//! they were ingested, or not at all.
//!
//! 🦆 (the duck has no comment at this time)

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::Worker;
use crate::backends::{Sink, SinkBackend};
use crate::common::Fact;

#[derive(Debug)]
pub(crate) struct DeliveryWorker {
    rx: Receiver<Fact>,
    sink: SinkBackend,
}

impl DeliveryWorker {
    pub(crate) fn new(rx: Receiver<Fact>, sink: SinkBackend) -> Self {
        Self { rx, sink }
    }
}

impl Worker for DeliveryWorker {
    fn start(mut self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 DeliveryWorker started draining the delivery queue...");
            loop {
                match self.rx.recv().await {
                    Ok(fact) => match self.sink.deliver(&fact).await {
                        Ok(()) => info!("✅ Fact delivered to the collector"),
                        // -- 💀 at-most-once: log it, drop it, next.
                        Err(err) => error!("💀 Fact delivery failed, dropping it: {:#}", err),
                    },
                    Err(_) => {
                        debug!("🏁 DeliveryWorker: queue closed and empty. Shutting down.");
                        self.sink
                            .close()
                            .await
                            .context("DeliveryWorker failed to close sink")?;
                        return Ok(());
                    }
                }
            }
        })
    }
}
