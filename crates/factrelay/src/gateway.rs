//! 🚪 The ingestion gateway — `POST /submit`, one fact per request, fire and forget.
//!
//! The caller gets `202 Accepted` the moment the fact is in the buffer. Whether the
//! collector ever sees it is none of the caller's business. That's the whole deal.
//!
//! 🧠 Knowledge graph:
//! - `Ingestor`: buffer handle + flush-signal sender + threshold. Cheap to clone, one per request.
//! - `router`: the axum surface. Only `/submit`, only POST.
//! - The flush signal is a capacity-1 channel fed with `try_send`. Never blocks, never piles up.

use std::sync::Arc;

use async_channel::{Sender, TrySendError};
use axum::{Router, body::Bytes, extract::State, http::StatusCode, routing::post};
use tracing::{debug, trace, warn};

use crate::buffer::SharedBuffer;
use crate::common::Fact;

/// 📥 The producer end of the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct Ingestor {
    buffer: Arc<SharedBuffer>,
    flush_tx: Sender<()>,
    threshold: usize,
}

impl Ingestor {
    pub(crate) fn new(buffer: Arc<SharedBuffer>, flush_tx: Sender<()>, threshold: usize) -> Self {
        Self {
            buffer,
            flush_tx,
            threshold,
        }
    }

    /// 📥 Buffer a fact; poke the flush worker if the buffer just hit the threshold.
    ///
    /// Returns the buffer length right after the append.
    pub(crate) fn ingest(&self, fact: Fact) -> usize {
        let buffered = self.buffer.append(fact);
        if buffered >= self.threshold {
            match self.flush_tx.try_send(()) {
                Ok(()) => debug!("🪣 Buffer hit {} of {}, flush requested", buffered, self.threshold),
                // -- 🔁 a flush is already pending. it will see this fact too.
                Err(TrySendError::Full(())) => trace!("🪣 Flush already pending, not asking twice"),
                Err(TrySendError::Closed(())) => {
                    warn!("💀 Flush worker is gone; {} facts wait for nobody", buffered)
                }
            }
        }
        buffered
    }
}

/// 🗺️ The whole inbound surface, one route long.
pub(crate) fn router(ingestor: Ingestor) -> Router {
    Router::new()
        .route("/submit", post(submit))
        .with_state(ingestor)
}

/// 📮 `POST /submit` — decode, buffer, 202. Or 400, and nothing happened.
///
/// The body is read as raw bytes so a missing `Content-Type` is not the caller's problem.
/// Keys match case-insensitively, see [`Fact::from_json`].
async fn submit(State(ingestor): State<Ingestor>, body: Bytes) -> StatusCode {
    match Fact::from_json(&body) {
        Ok(fact) => {
            let buffered = ingestor.ingest(fact);
            trace!("📥 Fact accepted, {} buffered", buffered);
            StatusCode::ACCEPTED
        }
        Err(err) => {
            debug!("💀 Rejected a malformed fact: {}", err);
            StatusCode::BAD_REQUEST
        }
    }
}
