//! bko-fulfilment
//!
//! Fulfilment state engine for pharmacy back orders:
//! - per-line-item lifecycle state machine (draft/issued documents, partial
//!   grants, retry chain, market escalation, manual write-off)
//! - order-level aggregation derived on demand, never cached
//! - append-only attempt log owned by the desk, not by line items
//!
//! Pure, synchronous, single-writer-per-order. The engine takes granted
//! quantities as inputs from the external sourcing system; it never invents
//! them, never retries on its own, and surfaces every refused operation as a
//! typed [`EngineError`].

mod desk;
mod engine;
mod error;
mod lifecycle;
mod types;

pub use desk::FulfilmentDesk;

pub use engine::{
    compute_aggregate_status, list_active_line_items, manual_closure, open_sourcing_document,
    record_sourcing_attempt, OrderStatus, WebOrder,
};

pub use error::EngineError;

pub use lifecycle::{LineItem, LineItemStatus, STORE_RETRY_CEILING};

pub use types::{
    DocumentId, DocumentStage, LineId, OrderId, RecordedAttempt, Remark, SourceType,
    SourcingAttempt, SourcingChannel,
};
