//! bko-audit
//!
//! Append-only audit log for desk events (attempt recorded, document
//! opened, manual closure, order status change). Writes JSON Lines, one
//! event per line, in canonical form (recursively key-sorted, compact).
//!
//! Optional hash chain: each event carries `hash_prev` + `hash_self`, so a
//! rewritten or dropped line is detectable after the fact: the durable
//! counterpart of the "remarks are never overwritten" rule inside the
//! engine. Event ids are derived deterministically from chain state +
//! payload + sequence; no RNG, so a replay of the same feed produces an
//! identical log.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Namespace for deterministic (v5) event-id derivation.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_bytes(*b"bko-audit-events");

/// Everything the desk writes to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeskEventKind {
    AttemptRecorded,
    DocumentOpened,
    ManualClosure,
    OrderStatusChanged,
}

impl DeskEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeskEventKind::AttemptRecorded => "attempt_recorded",
            DeskEventKind::DocumentOpened => "document_opened",
            DeskEventKind::ManualClosure => "manual_closure",
            DeskEventKind::OrderStatusChanged => "order_status_changed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskAuditEvent {
    pub event_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Append-only audit writer. One desk session, one file.
pub struct DeskAuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    /// Monotonically increasing sequence counter for event-id derivation.
    /// When resuming an existing log, restore with `set_seq(events_written)`
    /// alongside `set_last_hash`.
    seq: u64,
}

impl DeskAuditWriter {
    /// Creates the audit writer and ensures parent dirs exist.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        Ok(Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    /// Set last hash explicitly (e.g., after reading the last line of an
    /// existing log on desk restart).
    pub fn set_last_hash(&mut self, last_hash: Option<String>) {
        self.last_hash = last_hash;
    }

    pub fn last_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    /// Set the sequence counter when resuming an existing log. Must be
    /// called together with `set_last_hash`.
    pub fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Number of events appended so far.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append one desk event.
    pub fn append(&mut self, kind: DeskEventKind, payload: Value) -> Result<DeskAuditEvent> {
        let ts_utc = Utc::now();
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;
        self.seq += 1;

        let mut ev = DeskAuditEvent {
            event_id,
            ts_utc,
            event_type: kind.as_str().to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();

            let self_hash = compute_event_hash(&ev)?;
            ev.hash_self = Some(self_hash.clone());
            self.last_hash = Some(self_hash);
        }

        let line = canonical_json_line(&ev)?;
        append_line(&self.path, &line)?;

        Ok(ev)
    }
}

/// Deterministic event id: v5 UUID over (chain head, sequence, canonical
/// payload). Replaying the same events yields the same ids.
fn derive_event_id(last_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let canonical_payload = canonical_json_line(payload)?;
    let material = format!("{}|{}|{}", last_hash.unwrap_or(""), seq, canonical_payload);
    Ok(Uuid::new_v5(&EVENT_ID_NAMESPACE, material.as_bytes()))
}

/// Write a single line to file (with trailing newline).
fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Canonicalize by sorting keys recursively and emitting compact JSON.
/// One event == one JSON line.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Chain hash is computed from canonical JSON of the event WITHOUT
/// hash_self (to avoid self-reference).
pub fn compute_event_hash(ev: &DeskAuditEvent) -> Result<String> {
    let mut clone = ev.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Verify the hash chain integrity of an audit log file.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Verify the hash chain integrity of JSONL content held in memory.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: DeskAuditEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit event at line {}", i + 1))?;

        line_count += 1;

        // 1. hash_prev must match the previous event's hash_self.
        if ev.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, ev.hash_prev
                ),
            });
        }

        // 2. hash_self must be correct for this event's content.
        if let Some(ref claimed_hash) = ev.hash_self {
            let recomputed = compute_event_hash(&ev)?;
            if *claimed_hash != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!(
                        "hash_self mismatch: claimed {}, recomputed {}",
                        claimed_hash, recomputed
                    ),
                });
            }
        }

        prev_hash = ev.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}

/// Result of hash chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// The entire chain is valid.
    Valid { lines: usize },
    /// The chain is broken at the given line.
    Broken { line: usize, reason: String },
}
