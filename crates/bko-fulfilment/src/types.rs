use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use bko_schemas::{DocumentStage, SourcingChannel};

/// Identifier of a line item. Stable for the life of the item; successor
/// ids are minted via [`LineId::retry_successor`] when a partial fulfilment
/// spawns a retry line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Successor id for retry round `n`: `{original}-R{n}`.
    pub fn retry_successor(&self, n: u32) -> LineId {
        LineId(format!("{}-R{}", self.0, n))
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a web order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a sourcing document (TO / PO / MP record).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which kind of counterparty a line item is currently sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    None,
    Store,
    Distributor,
    Market,
}

impl From<SourcingChannel> for SourceType {
    fn from(channel: SourcingChannel) -> Self {
        match channel {
            SourcingChannel::Store => SourceType::Store,
            SourcingChannel::Distributor => SourceType::Distributor,
            SourcingChannel::Market => SourceType::Market,
        }
    }
}

/// One timestamped free-text audit entry on a line item.
/// Remarks are append-only; nothing in this crate ever rewrites one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remark {
    pub at: DateTime<Utc>,
    pub text: String,
}

impl Remark {
    pub fn new<S: Into<String>>(at: DateTime<Utc>, text: S) -> Self {
        Self {
            at,
            text: text.into(),
        }
    }
}

/// One resolved try to fulfil a line item's pending quantity from a given
/// channel. Immutable once recorded; the engine only appends attempts, it
/// does not mutate past ones.
///
/// `qty_granted` comes from the external sourcing system; the engine never
/// fabricates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcingAttempt {
    pub line_id: LineId,
    pub channel: SourcingChannel,
    pub qty_requested: u32,
    pub qty_granted: u32,
    pub document_id: Option<DocumentId>,
}

impl SourcingAttempt {
    pub fn new(
        line_id: LineId,
        channel: SourcingChannel,
        qty_requested: u32,
        qty_granted: u32,
        document_id: Option<DocumentId>,
    ) -> Self {
        // qty_requested bounds are the engine's check (typed InvalidQuantity).
        debug_assert!(
            qty_granted <= qty_requested,
            "SourcingAttempt.qty_granted must not exceed qty_requested"
        );
        Self {
            line_id,
            channel,
            qty_requested,
            qty_granted,
            document_id,
        }
    }

    /// Fully granted: the channel supplied everything this attempt asked for.
    pub fn fully_granted(&self) -> bool {
        self.qty_granted == self.qty_requested
    }
}

/// One attempt as recorded in the engine's append-only attempt log, stamped
/// with the order it was applied to and a desk-wide sequence number.
///
/// The log is owned by the desk, not by line items, so the audit trail
/// survives a line item being logically superseded by a retry successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedAttempt {
    pub seq: u64,
    pub order_id: OrderId,
    pub at: DateTime<Utc>,
    pub attempt: SourcingAttempt,
}
