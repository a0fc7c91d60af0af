//! 📦 Common data structures — the humble `Fact` that everything else exists to carry.
//!
//! 🎬 COLD OPEN — INT. HTTP HANDLER — 9:02 AM
//!
//! A JSON object arrives. Ten optional fields. Maybe two of them filled in.
//! It does not know about buffers. It does not know about flush timers. It only
//! knows that somewhere, a collector wants it, form-encoded, with a bearer token.
//!
//! 🦆
//!
//! ⚠️ Two serializations live here and they DISAGREE on purpose:
//! - JSON omits unset fields. `{}` is a perfectly valid fact.
//! - The outbound form renders every field. Unset numbers are `0`, unset text is empty.
//!   The collector has always received it this way, and the collector does not like surprises.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 🎯 A single fact — one measurement, one destiny, at most one delivery.
///
/// Immutable once it lands in the buffer. Nobody mutates a fact after ingestion.
/// Not the flush worker, not the delivery worker, not even Kevin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator_to_mo_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator_to_mo_fact_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_time: Option<String>,
    /// 🔧 plan (1) vs actual (0). An integer, because the collector said so.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_plan: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Fact {
    /// 📥 Decodes a fact from a JSON body, matching object keys without regard to case.
    ///
    /// Callers have always been free to send `Value` or `COMMENT`, so those bind like
    /// `value` and `comment`. When both spellings show up, the exact lowercase key wins.
    /// Anything that isn't a JSON object, or a field of the wrong type, is an error.
    pub(crate) fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        let value = match serde_json::from_slice(body)? {
            Value::Object(fields) => Value::Object(fold_keys(fields)),
            not_an_object => not_an_object,
        };
        serde_json::from_value(value)
    }

    /// 📡 Flattens the fact into the key/value pairs the collector expects.
    ///
    /// Keys come out in ascending order, which is the order the collector has always
    /// seen them in. Every field is present: numbers as decimal text (`0` when unset),
    /// text as-is (empty when unset). No `Option` survives this function.
    pub(crate) fn form_fields(&self) -> Vec<(&'static str, String)> {
        // -- 🔢 sorted by hand. ten keys. the alphabet is load-bearing.
        vec![
            ("auth_user_id", number(self.auth_user_id)),
            ("comment", text(&self.comment)),
            ("fact_time", text(&self.fact_time)),
            ("indicator_to_mo_fact_id", number(self.indicator_to_mo_fact_id)),
            ("indicator_to_mo_id", number(self.indicator_to_mo_id)),
            ("is_plan", number(self.is_plan)),
            ("period_end", text(&self.period_end)),
            ("period_key", text(&self.period_key)),
            ("period_start", text(&self.period_start)),
            ("value", number(self.value)),
        ]
    }
}

fn fold_keys(fields: Map<String, Value>) -> Map<String, Value> {
    let mut folded = Map::with_capacity(fields.len());
    for (key, value) in fields {
        let lower = key.to_lowercase();
        if lower == key {
            folded.insert(key, value);
        } else {
            folded.entry(lower).or_insert(value);
        }
    }
    folded
}

fn number(field: Option<i64>) -> String {
    field.unwrap_or_default().to_string()
}

fn text(field: &Option<String>) -> String {
    field.clone().unwrap_or_default()
}
