use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

use crate::backends::Sink;
use crate::common::Fact;

/// 📡 Where the collector lives and how to knock on its door.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectorSinkConfig {
    /// 📡 The full save endpoint, e.g. `https://collector.example/_api/facts/save_fact`.
    pub url: String,
    /// 🔒 Static bearer token. Sent as `Authorization: Bearer <token>`.
    pub token: String,
    /// ✅ The one status code that means "saved". Anything else is a rejection.
    #[serde(default = "default_success_status")]
    pub success_status: u16,
    /// ⏱️ Per-request deadline. Unset means we wait as long as the collector takes.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_success_status() -> u16 {
    200
}

/// 📡 The sink side of the collector — one form-encoded POST per fact.
///
/// Internally holds:
/// - `client`: the HTTP muscle 💪 — reused across requests
/// - `sink_config`: URL, token, and what "success" looks like
///
/// Knock knock. Who's there? A fact. A fact who? A fact, form-encoded, with a bearer token,
/// hoping for a 200.
#[derive(Debug)]
pub(crate) struct CollectorSink {
    client: reqwest::Client,
    sink_config: CollectorSinkConfig,
}

impl CollectorSink {
    /// 🚀 Build the client. No connectivity ping: the collector is somebody else's
    /// service and it may legitimately be asleep when we boot.
    pub(crate) fn new(config: CollectorSinkConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder
            .build()
            .context("💀 The HTTP client refused to be born. Probably a TLS setup issue. Either way: tragic.")?;

        Ok(Self {
            client,
            sink_config: config,
        })
    }
}

#[async_trait]
impl Sink for CollectorSink {
    /// 📡 One POST. One fact. One chance.
    ///
    /// Three ways this ends badly, and all three are terminal for this fact:
    /// the request can't be built, the request can't be sent, or the collector says no.
    async fn deliver(&mut self, fact: &Fact) -> Result<()> {
        // -- 🏗️ build first, send second. a bad URL is a construction problem, not a network one.
        let request = self
            .client
            .post(&self.sink_config.url)
            .bearer_auth(&self.sink_config.token)
            .form(&fact.form_fields())
            .build()
            .context("💀 Failed to build the collector request. The URL or the form had a bad day.")?;

        let response = self
            .client
            .execute(request)
            .await
            .context("💀 Failed to send the fact to the collector. The network said 'not today'.")?;

        let status = response.status();
        if status.as_u16() != self.sink_config.success_status {
            anyhow::bail!(
                "💀 Collector answered '{}' instead of {}. The fact, for manual recovery: {:?}",
                status,
                self.sink_config.success_status,
                fact
            );
        }

        trace!("🚀 Collector accepted the fact with {}", status);
        Ok(())
    }

    /// 🗑️ Nothing to flush. The connection pool says goodbye on drop.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
