//! bko-schemas
//!
//! Shared serde DTOs for the BackOrderDesk workspace: the order-book and
//! attempt-feed file formats the desk loads, and the audit payload shapes
//! written by bko-audit.
//!
//! All enums here are closed. An unrecognized channel, stage, or action
//! string in an input file is a hard parse error, never a fallthrough.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sourcing channel for a back-order line item.
///
/// Store: transfer order (TO) against a store inventory
/// Distributor: purchase order (PO) to a distributor
/// Market: market purchase (MP) from the open market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourcingChannel {
    Store,
    Distributor,
    Market,
}

impl SourcingChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcingChannel::Store => "STORE",
            SourcingChannel::Distributor => "DISTRIBUTOR",
            SourcingChannel::Market => "MARKET",
        }
    }

    /// Document prefix used when formatting remark lines (TO/PO/MP).
    pub fn doc_kind(&self) -> &'static str {
        match self {
            SourcingChannel::Store => "TO",
            SourcingChannel::Distributor => "PO",
            SourcingChannel::Market => "MP",
        }
    }
}

/// Whether a sourcing document is still a draft or has been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStage {
    Draft,
    Issued,
}

// ---------------------------------------------------------------------------
// Order book file format
// ---------------------------------------------------------------------------

/// Top-level order-book file: the set of web orders a desk session tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookFile {
    pub orders: Vec<OrderRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub customer: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<LineRecord>,
}

/// One original line item as ordered by the customer.
/// Successors spawned by partial fulfilments never appear in input files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRecord {
    pub line_id: String,
    pub sku: String,
    pub product_name: String,
    pub qty_requested: u32,
}

// ---------------------------------------------------------------------------
// Attempt feed file format
// ---------------------------------------------------------------------------

/// An ordered script of desk actions to run through the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptFeedFile {
    pub actions: Vec<FeedAction>,
}

/// One desk action. `line_id` always names the item the action targets;
/// for actions against a retry successor the feed uses the successor's id
/// (e.g. "L1-R1").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FeedAction {
    /// Create a sourcing document (draft TO, issued TO/PO, market purchase).
    OpenDocument {
        order_id: String,
        line_id: String,
        channel: SourcingChannel,
        stage: DocumentStage,
        document_id: String,
    },
    /// Record one resolved sourcing attempt (request + granted result).
    Attempt {
        order_id: String,
        line_id: String,
        channel: SourcingChannel,
        qty_requested: u32,
        qty_granted: u32,
        document_id: Option<String>,
    },
    /// Manually close a line item that internal and market sourcing failed.
    Close {
        order_id: String,
        line_id: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Audit payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecordedPayload {
    pub order_id: String,
    pub line_id: String,
    pub channel: SourcingChannel,
    pub qty_requested: u32,
    pub qty_granted: u32,
    pub document_id: Option<String>,
    /// Line-item status after the attempt was applied.
    pub status_after: String,
    /// Successor line id when the attempt spawned a retry line.
    pub spawned_line_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOpenedPayload {
    pub order_id: String,
    pub line_id: String,
    pub channel: SourcingChannel,
    pub stage: DocumentStage,
    pub document_id: String,
    pub status_after: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualClosurePayload {
    pub order_id: String,
    pub line_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedPayload {
    pub order_id: String,
    pub from: String,
    pub to: String,
}
