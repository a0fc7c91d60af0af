//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, ensure};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{CollectorSinkConfig, InMemorySinkConfig};

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// 📡 Where the facts go when they grow up.
    pub sink_config: SinkConfig,
}

/// 🚪 The inbound side. One address. One endpoint. One job.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// 🧵 Pipeline knobs: how much to hold, how long to wait, how hard to push back.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 🪣 Buffered facts that trigger an early flush. The "we're full, ship it" line.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// ⏱️ Flush at least this often, full or not.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// 📬 Bound of the delivery queue between the flush worker and the delivery worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub queue_policy: QueuePolicy,
    /// 🏁 On shutdown, how long to wait for the pipeline to drain before walking away.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_buffer_capacity() -> usize {
    1000
}

// -- ⏱️ one minute. long enough to batch, short enough that nobody files a ticket.
fn default_flush_interval_ms() -> u64 {
    60_000
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_drain_timeout_ms() -> u64 {
    30_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            flush_interval_ms: default_flush_interval_ms(),
            queue_capacity: default_queue_capacity(),
            queue_policy: QueuePolicy::default(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl RuntimeConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.buffer_capacity > 0, "💀 runtime.buffer_capacity must be at least 1");
        ensure!(self.queue_capacity > 0, "💀 runtime.queue_capacity must be at least 1");
        ensure!(
            self.flush_interval_ms > 0,
            "💀 runtime.flush_interval_ms must be at least 1. Zero is not an interval, it's a busy loop."
        );
        ensure!(
            self.drain_timeout_ms > 0,
            "💀 runtime.drain_timeout_ms must be at least 1, or shutdown abandons everything on sight."
        );
        Ok(())
    }
}

/// 🚦 What the flush worker does when the delivery queue is full.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// ⏳ Wait for room. Facts stay in the buffer meanwhile. Nothing is lost.
    #[default]
    Block,
    /// 🗑️ Evict the oldest queued fact to make room. Logged, then gone.
    DropOldest,
    /// 🔄 Give the fact back to the buffer head and stop this flush. Next trigger tries again.
    Reject,
}

/// 🎭 The many faces of a sink config.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum SinkConfig {
    Collector(CollectorSinkConfig),
    InMemory(InMemorySinkConfig),
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (`FACTRELAY_*`, nesting with `__`) with an optional
/// TOML file. TOML wins on conflicts.
///
/// 💀 Returns an error if the config is unparseable or the runtime knobs make no sense.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("FACTRELAY_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (FACTRELAY_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (FACTRELAY_*). \
                 No file was provided — this one's all on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config
        .runtime
        .validate()
        .context("💀 The config parsed, but the runtime section is not one we can run with.")?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- 🧪 every test runs inside a figment Jail: a private cwd, a private env, one at a time.
    // -- env vars leaking between parallel tests is how you get a flaky CI and a sad standup.
    fn load_from(jail: &mut figment::Jail, contents: &str) -> anyhow::Result<AppConfig> {
        jail.create_file("factrelay.toml", contents)
            .expect("💀 Failed to write test config. The filesystem said 'new phone who dis'.");
        load_config(Some(Path::new("factrelay.toml")))
    }

    #[test]
    fn the_one_where_every_knob_gets_turned() {
        figment::Jail::expect_with(|jail| {
            let app_config = load_from(
                jail,
                r#"
                [server]
                listen_addr = "127.0.0.1:9999"

                [runtime]
                buffer_capacity = 8
                flush_interval_ms = 250
                queue_capacity = 3
                queue_policy = "drop_oldest"
                drain_timeout_ms = 5000

                [sink_config.collector]
                url = "http://collector.local/save_fact"
                token = "s3cr3t"
                success_status = 201
                timeout_ms = 1500
                "#,
            )
            .expect("💀 A fully specified config should parse.");

            assert_eq!(app_config.server.listen_addr, "127.0.0.1:9999");
            assert_eq!(app_config.runtime.buffer_capacity, 8);
            assert_eq!(app_config.runtime.flush_interval(), Duration::from_millis(250));
            assert_eq!(app_config.runtime.queue_capacity, 3);
            assert_eq!(app_config.runtime.queue_policy, QueuePolicy::DropOldest);
            assert_eq!(app_config.runtime.drain_timeout(), Duration::from_secs(5));
            match app_config.sink_config {
                SinkConfig::Collector(collector) => {
                    assert_eq!(collector.url, "http://collector.local/save_fact");
                    assert_eq!(collector.token, "s3cr3t");
                    assert_eq!(collector.success_status, 201);
                    assert_eq!(collector.timeout_ms, Some(1500));
                }
                honestly_who_knows => panic!(
                    "💀 Expected a collector sink, serde took us to {:?}. Plot twist energy.",
                    honestly_who_knows
                ),
            }
            Ok(())
        });
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        figment::Jail::expect_with(|jail| {
            let app_config = load_from(
                jail,
                r#"
                [sink_config.collector]
                url = "http://collector.local/save_fact"
                token = "t"
                "#,
            )
            .expect("💀 Defaults should fill the gaps.");

            assert_eq!(app_config.server.listen_addr, "0.0.0.0:8080");
            assert_eq!(app_config.runtime.buffer_capacity, 1000);
            assert_eq!(app_config.runtime.flush_interval(), Duration::from_secs(60));
            assert_eq!(app_config.runtime.queue_capacity, 1000);
            assert_eq!(app_config.runtime.queue_policy, QueuePolicy::Block);
            assert_eq!(app_config.runtime.drain_timeout(), Duration::from_secs(30));
            match app_config.sink_config {
                SinkConfig::Collector(collector) => {
                    assert_eq!(collector.success_status, 200);
                    assert_eq!(collector.timeout_ms, None);
                }
                other => panic!("💀 Expected a collector sink, got {:?}", other),
            }
            Ok(())
        });
    }

    #[test]
    fn the_one_where_zero_capacity_is_turned_away_at_the_door() {
        figment::Jail::expect_with(|jail| {
            let err = load_from(
                jail,
                r#"
                [runtime]
                buffer_capacity = 0

                [sink_config.in_memory]
                "#,
            )
            .expect_err("💀 zero capacity must not load");
            assert!(format!("{err:#}").contains("buffer_capacity"));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_a_zero_drain_timeout_is_refused() {
        figment::Jail::expect_with(|jail| {
            let err = load_from(
                jail,
                r#"
                [runtime]
                drain_timeout_ms = 0

                [sink_config.in_memory]
                "#,
            )
            .expect_err("💀 a zero drain timeout must not load");
            assert!(format!("{err:#}").contains("drain_timeout_ms"));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_dry_run_sink_keeps_a_short_memory() {
        figment::Jail::expect_with(|jail| {
            let app_config = load_from(jail, "[sink_config.in_memory]\nretain = 3\n")
                .expect("💀 in_memory with retain should load");
            match app_config.sink_config {
                SinkConfig::InMemory(in_mem) => assert_eq!(in_mem.retain, 3),
                other => panic!("💀 Expected an in-memory sink, got {:?}", other),
            }

            let app_config = load_from(jail, "[sink_config.in_memory]\n")
                .expect("💀 a bare in_memory table should load");
            match app_config.sink_config {
                SinkConfig::InMemory(in_mem) => assert_eq!(in_mem.retain, 1000),
                other => panic!("💀 Expected an in-memory sink, got {:?}", other),
            }
            Ok(())
        });
    }

    #[test]
    fn the_one_where_a_missing_sink_is_a_hard_no() {
        figment::Jail::expect_with(|jail| {
            assert!(load_from(jail, "[runtime]\nbuffer_capacity = 5\n").is_err());
            Ok(())
        });
    }

    #[test]
    fn the_one_where_env_vars_fill_in_and_the_file_wins() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FACTRELAY_RUNTIME__BUFFER_CAPACITY", "7");
            jail.set_env("FACTRELAY_RUNTIME__QUEUE_POLICY", "reject");
            jail.set_env("FACTRELAY_SERVER__LISTEN_ADDR", "127.0.0.1:1234");

            let app_config = load_from(
                jail,
                r#"
                [runtime]
                buffer_capacity = 42

                [sink_config.in_memory]
                "#,
            )
            .expect("💀 env + file should merge");

            assert_eq!(app_config.runtime.buffer_capacity, 42);
            assert_eq!(app_config.runtime.queue_policy, QueuePolicy::Reject);
            assert_eq!(app_config.server.listen_addr, "127.0.0.1:1234");
            assert!(matches!(app_config.sink_config, SinkConfig::InMemory(_)));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_environment_is_the_whole_show() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FACTRELAY_SINK_CONFIG__COLLECTOR__URL", "http://c.local/save");
            jail.set_env("FACTRELAY_SINK_CONFIG__COLLECTOR__TOKEN", "envtoken");

            let app_config = load_config(None).expect("💀 env-only config should load");
            match app_config.sink_config {
                SinkConfig::Collector(collector) => {
                    assert_eq!(collector.url, "http://c.local/save");
                    assert_eq!(collector.token, "envtoken");
                }
                other => panic!("💀 Expected a collector sink, got {:?}", other),
            }
            Ok(())
        });
    }
}
