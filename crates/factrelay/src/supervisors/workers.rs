//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! Two of them, exactly two, forever:
//! - `FlushWorker` moves facts from the shared buffer into the delivery queue.
//! - `DeliveryWorker` moves facts from the delivery queue to the collector, one at a time.
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use anyhow::Result;
use tokio::task::JoinHandle;

mod delivery_worker;
mod flush_worker;

pub(crate) use delivery_worker::DeliveryWorker;
pub(crate) use flush_worker::FlushWorker;

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify.
    fn start(self) -> JoinHandle<Result<()>>;
}
