//! 🔌 Backends — where the facts finally leave the building.
//!
//! 🎭 This module is the casting agency. Need to POST to the real collector?
//! Need to just remember what would have been sent, for a test or a dry run?
//! We've got a sink for that. We've got exactly two sinks for that.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::app_config::SinkConfig;
use crate::common::Fact;

pub(crate) mod collector;
pub(crate) mod in_mem;

pub use collector::CollectorSinkConfig;
pub use in_mem::InMemorySinkConfig;

/// 🕳️ A sink that delivers one fact at a time — pure I/O, zero buffering.
///
/// # Contract 📜
/// - `deliver` makes exactly ONE attempt. No retries. `Err` means this fact is gone,
///   and the caller logs it and moves on.
/// - `close` releases whatever the sink holds. Called once, when the queue closes.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug + Send {
    /// 📡 Deliver one fact downstream. One shot.
    async fn deliver(&mut self, fact: &Fact) -> Result<()>;
    /// 🗑️ Flush, finalize, and release.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Sink.
///
/// The enum dispatches `deliver` and `close` to the inner concrete type,
/// keeping the delivery worker blissfully ignorant of where facts actually land.
#[derive(Debug)]
pub(crate) enum SinkBackend {
    Collector(collector::CollectorSink),
    InMemory(in_mem::InMemorySink),
}

impl SinkBackend {
    /// 🏗️ Resolve a sink from config. Same trick as everywhere else: config enum in, backend enum out.
    pub(crate) fn from_config(config: &SinkConfig) -> Result<Self> {
        match config {
            SinkConfig::Collector(collector_config) => {
                let sink = collector::CollectorSink::new(collector_config.clone())
                    .context("💀 Failed to stand up the collector sink")?;
                Ok(SinkBackend::Collector(sink))
            }
            SinkConfig::InMemory(in_mem_config) => {
                Ok(SinkBackend::InMemory(in_mem::InMemorySink::new(in_mem_config)))
            }
        }
    }
}

#[async_trait]
impl Sink for SinkBackend {
    async fn deliver(&mut self, fact: &Fact) -> Result<()> {
        match self {
            SinkBackend::Collector(sink) => sink.deliver(fact).await,
            SinkBackend::InMemory(sink) => sink.deliver(fact).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::Collector(sink) => sink.close().await,
            SinkBackend::InMemory(sink) => sink.close().await,
        }
    }
}
