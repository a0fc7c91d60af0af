//! 🎬 *[the timer ticks. the buffer fills. somebody has to empty it.]*
//!
//! 🚿 The FlushWorker — two triggers, one action.
//!
//! - ⏱️ Timer: every `flush_interval`, full or not.
//! - 🔔 Signal: the gateway says the buffer hit its threshold.
//!
//! Either way: if the buffer is empty, shrug. Otherwise pop facts one by one (lock,
//! pop, unlock) and hand each to the delivery queue with the lock released. A full
//! queue stalls the hand-off, never the producers.
//!
//! When the signal channel closes (every `Ingestor` is gone), one last flush runs
//! and the worker exits, which closes the delivery queue behind it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_channel::{Receiver, Sender, TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace, warn};

use super::Worker;
use crate::app_config::{QueuePolicy, RuntimeConfig};
use crate::buffer::SharedBuffer;
use crate::common::Fact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Timer,
    Threshold,
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushTrigger::Timer => f.write_str("timer"),
            FlushTrigger::Threshold => f.write_str("threshold"),
            FlushTrigger::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// 🎯 What happened to one fact at the queue door.
#[derive(Debug, PartialEq, Eq)]
enum HandOff {
    Queued,
    /// 🔄 Queue full under `reject`: the fact went back to the buffer head.
    Deferred,
}

#[derive(Debug)]
pub(crate) struct FlushWorker {
    buffer: Arc<SharedBuffer>,
    flush_rx: Receiver<()>,
    queue_tx: Sender<Fact>,
    /// 🗑️ Only under `drop_oldest`: a second receiver, used solely to evict the head.
    evictor: Option<Receiver<Fact>>,
    interval: Duration,
    policy: QueuePolicy,
}

impl FlushWorker {
    pub(crate) fn new(
        buffer: Arc<SharedBuffer>,
        flush_rx: Receiver<()>,
        queue_tx: Sender<Fact>,
        queue_rx: &Receiver<Fact>,
        runtime: &RuntimeConfig,
    ) -> Self {
        let evictor = match runtime.queue_policy {
            QueuePolicy::DropOldest => Some(queue_rx.clone()),
            QueuePolicy::Block | QueuePolicy::Reject => None,
        };
        Self {
            buffer,
            flush_rx,
            queue_tx,
            evictor,
            interval: runtime.flush_interval(),
            policy: runtime.queue_policy,
        }
    }

    /// 🚿 One flush cycle. Returns how many facts made it into the delivery queue.
    async fn flush(&self, trigger: FlushTrigger) -> Result<usize> {
        let pending = self.buffer.len();
        if pending == 0 {
            trace!("🚿 {} flush: buffer empty, nothing to do", trigger);
            return Ok(0);
        }
        debug!("🚿 {} flush: {} facts buffered", trigger, pending);

        let mut queued = 0;
        // -- 🔒 `drain_all` locks per item and never across this await. keep it that way.
        for fact in self.buffer.drain_all() {
            match self.hand_off(fact).await? {
                HandOff::Queued => queued += 1,
                HandOff::Deferred => break,
            }
        }

        debug!("🚿 {} flush: {} facts handed to delivery", trigger, queued);
        Ok(queued)
    }

    async fn hand_off(&self, fact: Fact) -> Result<HandOff> {
        match self.policy {
            QueuePolicy::Block => {
                self.queue_tx
                    .send(fact)
                    .await
                    .map_err(|_| anyhow!("💀 Delivery queue closed mid-flush. The delivery worker left without saying goodbye."))?;
                Ok(HandOff::Queued)
            }
            QueuePolicy::DropOldest => {
                let mut fact = fact;
                loop {
                    match self.queue_tx.try_send(fact) {
                        Ok(()) => return Ok(HandOff::Queued),
                        Err(TrySendError::Full(returned)) => {
                            fact = returned;
                            if let Some(evicted) =
                                self.evictor.as_ref().and_then(|rx| rx.try_recv().ok())
                            {
                                warn!("🗑️ Delivery queue full, evicted the oldest fact: {:?}", evicted);
                            }
                        }
                        Err(TrySendError::Closed(_)) => {
                            bail!("💀 Delivery queue closed mid-flush.")
                        }
                    }
                }
            }
            QueuePolicy::Reject => match self.queue_tx.try_send(fact) {
                Ok(()) => Ok(HandOff::Queued),
                Err(TrySendError::Full(returned)) => {
                    self.buffer.push_front(returned);
                    warn!(
                        "🔄 Delivery queue full, {} facts stay buffered until the next flush",
                        self.buffer.len()
                    );
                    Ok(HandOff::Deferred)
                }
                Err(TrySendError::Closed(_)) => bail!("💀 Delivery queue closed mid-flush."),
            },
        }
    }
}

impl Worker for FlushWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("⏱️ FlushWorker started, timer every {:?}", self.interval);
            // -- ⏱️ first tick one full interval from now, not immediately
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.flush(FlushTrigger::Timer).await?;
                    }
                    signal = self.flush_rx.recv() => match signal {
                        Ok(()) => {
                            self.flush(FlushTrigger::Threshold).await?;
                        }
                        Err(_) => {
                            debug!("🏁 FlushWorker: ingestion closed. One last flush, then home.");
                            self.flush(FlushTrigger::Shutdown).await?;
                            return Ok(());
                        }
                    },
                }
            }
        })
    }
}
