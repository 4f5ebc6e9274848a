//! Decision-log assembly.
//!
//! Model-authored entries are validated one at a time — a malformed entry
//! is dropped with a warning, it never sinks the run. Afterwards every
//! change the deterministic post-pass made gets an entry of its own unless
//! a surviving model entry already covers it, so the final log accounts for
//! every exclusion, merge, and normalization regardless of how diligent the
//! model felt like being.

use serde_json::Value;
use tracing::warn;

use crate::normalize::NormalizationRecord;
use crate::schema::{Confidence, DecisionLogEntry};

/// Builds the final ordered log: valid model entries first (model order
/// preserved), then one synthesized entry per uncovered post-pass record.
pub fn build_log(raw_entries: Vec<Value>, applied: &[NormalizationRecord]) -> Vec<DecisionLogEntry> {
    let mut entries: Vec<DecisionLogEntry> = Vec::with_capacity(raw_entries.len());

    for (i, raw) in raw_entries.into_iter().enumerate() {
        match parse_entry(raw) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                warn!(index = i, %reason, "dropping invalid decision-log entry");
            }
        }
    }

    for record in applied {
        if !covered(&entries, record) {
            entries.push(DecisionLogEntry {
                section: record.section.clone(),
                action: record.action,
                items: record.items.clone(),
                reason: record.reason.clone(),
                source: record.source,
                confidence: Confidence::High,
            });
        }
    }

    entries
}

/// Lenient single-entry parse: enum fields accept any case, a scalar
/// `items` string becomes a one-element list. Anything else is a reject.
fn parse_entry(mut raw: Value) -> Result<DecisionLogEntry, String> {
    let obj = raw
        .as_object_mut()
        .ok_or_else(|| "entry is not an object".to_string())?;

    for key in ["action", "source", "confidence"] {
        if let Some(Value::String(s)) = obj.get_mut(key) {
            *s = s.to_lowercase();
        }
    }
    if let Some(items) = obj.get_mut("items") {
        if items.is_string() {
            let item = std::mem::take(items);
            *items = Value::Array(vec![item]);
        }
    }

    let entry: DecisionLogEntry =
        serde_json::from_value(raw).map_err(|e| format!("shape mismatch: {e}"))?;

    if entry.items.iter().all(|item| item.trim().is_empty()) {
        return Err("items is empty".to_string());
    }
    if entry.reason.trim().is_empty() {
        return Err("reason is empty".to_string());
    }
    Ok(entry)
}

/// A record is covered when a surviving model entry with the same action
/// already names one of its items.
fn covered(entries: &[DecisionLogEntry], record: &NormalizationRecord) -> bool {
    entries.iter().any(|entry| {
        entry.action == record.action
            && entry.items.iter().any(|item| {
                record
                    .items
                    .iter()
                    .any(|have| have.trim().eq_ignore_ascii_case(item.trim()))
            })
    })
}
