//! 📦 A sink with a short memory. Shorter than mine, and I forgot my own birthday in 2019.
//!
//! Logs every delivered fact and keeps the most recent `retain` of them in RAM behind an
//! `Arc<Mutex<...>>`, so tests (and `sink_config.in_memory` dry runs) can see what the
//! collector would have seen, without a week-long dry run eating the heap.
//!
//! ⚠️ This is NOT a durable store. Restart the process and the facts are gone.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::backends::Sink;
use crate::common::Fact;

/// 🔧 How much the dry run remembers. TOML says `[sink_config.in_memory]`.
#[derive(Debug, Deserialize, Clone)]
pub struct InMemorySinkConfig {
    /// 🧠 Most recent deliveries kept. Older ones are forgotten, oldest first.
    #[serde(default = "default_retain")]
    pub retain: usize,
}

fn default_retain() -> usize {
    1000
}

impl Default for InMemorySinkConfig {
    fn default() -> Self {
        Self {
            retain: default_retain(),
        }
    }
}

/// 📦 Keeps the latest deliveries in arrival order.
///
/// Clone-able because tests need to peek inside after handing `self` off to the
/// delivery worker. The `Arc` means everyone shares the same deque.
#[derive(Debug, Clone)]
pub(crate) struct InMemorySink {
    pub(crate) received: Arc<Mutex<VecDeque<Fact>>>,
    retain: usize,
}

impl InMemorySink {
    pub(crate) fn new(sink_config: &InMemorySinkConfig) -> Self {
        Self {
            received: Arc::new(Mutex::new(VecDeque::new())),
            retain: sink_config.retain,
        }
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn deliver(&mut self, fact: &Fact) -> Result<()> {
        // -- 🔒 the Mutex is load-bearing. do not remove. I know it looks optional. it isn't.
        let mut received = self.received.lock().await;
        received.push_back(fact.clone());
        while received.len() > self.retain {
            received.pop_front();
            debug!("🧠 In-memory sink forgot its oldest fact to stay at {}", self.retain);
        }
        info!("📦 In-memory sink delivered {:?} ({} retained)", fact, received.len());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(value: i64) -> Fact {
        Fact {
            value: Some(value),
            ..Fact::default()
        }
    }

    #[tokio::test]
    async fn the_one_where_the_dry_run_only_remembers_the_latest() {
        let mut sink = InMemorySink::new(&InMemorySinkConfig { retain: 3 });
        for v in 0..10 {
            sink.deliver(&fact(v)).await.expect("💀 in-memory delivery never fails");
        }

        let received = sink.received.lock().await;
        assert_eq!(received.len(), 3);
        let values: Vec<i64> = received.iter().filter_map(|f| f.value).collect();
        assert_eq!(values, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn the_one_where_zero_retain_logs_and_keeps_nothing() {
        let mut sink = InMemorySink::new(&InMemorySinkConfig { retain: 0 });
        sink.deliver(&fact(1)).await.expect("💀 in-memory delivery never fails");
        assert!(sink.received.lock().await.is_empty());
    }
}
