//! Order-level operations.
//!
//! - Web orders own their line items exclusively; successors spawned by
//!   partial grants are appended to the owning order.
//! - Aggregate status is a pure function over the current (non-superseded)
//!   item of each lineage, recomputed on demand and never cached.
//! - No clocks in here: every mutating function takes `at` from the caller
//!   so replays are deterministic. No I/O, no randomness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::lifecycle::{AttemptOutcome, LineItem, LineItemStatus};
use crate::types::{DocumentId, DocumentStage, LineId, OrderId, SourcingAttempt, SourcingChannel};

// ---------------------------------------------------------------------------
// WebOrder
// ---------------------------------------------------------------------------

/// A customer web order: a non-empty ordered sequence of line items.
///
/// Orders are never deleted; terminal orders are retained for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebOrder {
    pub id: OrderId,
    pub customer: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// Originals in book order, with spawned successors appended after.
    pub line_items: Vec<LineItem>,
}

impl WebOrder {
    /// # Panics (debug only)
    /// Panics if `line_items` is empty.
    pub fn new<S: Into<String>>(
        id: OrderId,
        customer: S,
        created_at: DateTime<Utc>,
        line_items: Vec<LineItem>,
    ) -> Self {
        debug_assert!(!line_items.is_empty(), "WebOrder must own at least one line item");
        Self {
            id,
            customer: customer.into(),
            created_at,
            last_updated_at: created_at,
            line_items,
        }
    }

    pub fn line_item(&self, line_id: &LineId) -> Option<&LineItem> {
        self.line_items.iter().find(|li| &li.line_id == line_id)
    }

    fn line_item_mut(&mut self, line_id: &LineId) -> Result<&mut LineItem, EngineError> {
        self.line_items
            .iter_mut()
            .find(|li| &li.line_id == line_id)
            .ok_or_else(|| EngineError::LineItemNotFound {
                line_id: line_id.clone(),
            })
    }

    /// Total fulfilled quantity across one lineage (original + successors).
    pub fn lineage_fulfilled(&self, root_id: &LineId) -> u32 {
        self.line_items
            .iter()
            .filter(|li| &li.root_id == root_id)
            .map(|li| li.qty_fulfilled)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Order-level status, derived from the line items and never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Nothing sourced yet.
    Approved,
    /// At least one lineage has sourced quantity, but not every lineage is
    /// completely fulfilled.
    PartiallyFulfilled,
    /// Every lineage is completely fulfilled.
    Fulfilled,
    /// Every lineage ended in a terminal failure (market exhausted or
    /// written off).
    Exception,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Approved => "APPROVED",
            OrderStatus::PartiallyFulfilled => "PARTIALLY_FULFILLED",
            OrderStatus::Fulfilled => "FULFILLED",
            OrderStatus::Exception => "EXCEPTION",
        }
    }
}

// ---------------------------------------------------------------------------
// Pure reads
// ---------------------------------------------------------------------------

/// Current (non-superseded) line items, book order preserved.
pub fn list_active_line_items(order: &WebOrder) -> Vec<&LineItem> {
    order.line_items.iter().filter(|li| li.is_active()).collect()
}

/// Derive the order-level status from the current item of each lineage.
///
/// Pure and idempotent: two calls with no intervening mutation always
/// agree. Callers recompute after every mutation instead of caching.
pub fn compute_aggregate_status(order: &WebOrder) -> OrderStatus {
    let active = list_active_line_items(order);
    debug_assert!(!active.is_empty(), "an order always has an active item per lineage");

    let all_fulfilled = active
        .iter()
        .all(|li| li.status == LineItemStatus::CompletelyFulfilled);
    if all_fulfilled {
        return OrderStatus::Fulfilled;
    }

    let all_failed = active.iter().all(|li| {
        matches!(
            li.status,
            LineItemStatus::NotAvailableInMarket | LineItemStatus::ManuallyClosed
        )
    });
    if all_failed {
        return OrderStatus::Exception;
    }

    // Partial credit counts lineage-wide: a frozen partial original keeps
    // its fulfilled quantity even though the active successor has none yet.
    let any_sourced = active
        .iter()
        .any(|li| order.lineage_fulfilled(&li.root_id) > 0);
    if any_sourced {
        return OrderStatus::PartiallyFulfilled;
    }

    OrderStatus::Approved
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Record one resolved sourcing attempt against a line item of `order`.
///
/// Returns a snapshot of the updated (original) line item; when the attempt
/// spawned a retry successor its id is in the snapshot's `superseded_by`.
pub fn record_sourcing_attempt(
    order: &mut WebOrder,
    attempt: &SourcingAttempt,
    at: DateTime<Utc>,
) -> Result<LineItem, EngineError> {
    let item = order.line_item_mut(&attempt.line_id)?;
    let outcome = item.apply_attempt(attempt, at)?;
    let snapshot = item.clone();

    if let AttemptOutcome::Partial { successor } = outcome {
        order.line_items.push(successor);
    }
    order.last_updated_at = at;
    Ok(snapshot)
}

/// Create a sourcing document (draft/issued TO, PO, market purchase)
/// against a line item and move it into the matching document state.
pub fn open_sourcing_document(
    order: &mut WebOrder,
    line_id: &LineId,
    channel: SourcingChannel,
    stage: DocumentStage,
    document_id: DocumentId,
    at: DateTime<Utc>,
) -> Result<LineItem, EngineError> {
    let item = order.line_item_mut(line_id)?;
    item.open_document(channel, stage, document_id, at)?;
    let snapshot = item.clone();
    order.last_updated_at = at;
    Ok(snapshot)
}

/// Write a line item off after market sourcing stalled or failed.
pub fn manual_closure(
    order: &mut WebOrder,
    line_id: &LineId,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<LineItem, EngineError> {
    let item = order.line_item_mut(line_id)?;
    item.close_manually(reason, at)?;
    let snapshot = item.clone();
    order.last_updated_at = at;
    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourcingChannel;

    fn ts() -> DateTime<Utc> {
        Utc::now()
    }

    fn order_with(lines: Vec<(&str, u32)>) -> WebOrder {
        let items = lines
            .into_iter()
            .map(|(id, qty)| LineItem::new(LineId::new(id), "SKU", "Product", qty))
            .collect();
        WebOrder::new(OrderId::new("WO-1001"), "Riverside Pharmacy", ts(), items)
    }

    fn store_attempt(line: &str, req: u32, granted: u32) -> SourcingAttempt {
        SourcingAttempt::new(LineId::new(line), SourcingChannel::Store, req, granted, None)
    }

    #[test]
    fn fresh_order_is_approved() {
        let order = order_with(vec![("L1", 100), ("L2", 50)]);
        assert_eq!(compute_aggregate_status(&order), OrderStatus::Approved);
    }

    #[test]
    fn aggregate_read_is_idempotent() {
        let mut order = order_with(vec![("L1", 100)]);
        record_sourcing_attempt(&mut order, &store_attempt("L1", 100, 40), ts()).unwrap();

        let first = compute_aggregate_status(&order);
        let second = compute_aggregate_status(&order);
        assert_eq!(first, second);
        assert_eq!(first, OrderStatus::PartiallyFulfilled);
    }

    #[test]
    fn partial_attempt_appends_successor_to_order() {
        let mut order = order_with(vec![("L1", 500)]);
        let snapshot =
            record_sourcing_attempt(&mut order, &store_attempt("L1", 500, 300), ts()).unwrap();

        assert_eq!(snapshot.status, LineItemStatus::PartiallyFulfilled);
        assert_eq!(snapshot.superseded_by, Some(LineId::new("L1-R1")));
        assert_eq!(order.line_items.len(), 2);

        let active = list_active_line_items(&order);
        assert_eq!(active.len(), 1, "only the successor is active");
        assert_eq!(active[0].line_id, LineId::new("L1-R1"));
        assert_eq!(active[0].qty_requested, 200);
    }

    #[test]
    fn completing_successor_fulfills_the_order() {
        let mut order = order_with(vec![("L1", 500)]);
        record_sourcing_attempt(&mut order, &store_attempt("L1", 500, 300), ts()).unwrap();
        let snapshot =
            record_sourcing_attempt(&mut order, &store_attempt("L1-R1", 200, 200), ts()).unwrap();

        assert_eq!(snapshot.status, LineItemStatus::CompletelyFulfilled);
        assert_eq!(snapshot.superseded_by, None, "no further successor spawned");
        assert_eq!(order.line_items.len(), 2);
        assert_eq!(compute_aggregate_status(&order), OrderStatus::Fulfilled);
    }

    #[test]
    fn lineage_granted_sum_never_exceeds_root_request() {
        let mut order = order_with(vec![("L1", 500)]);
        record_sourcing_attempt(&mut order, &store_attempt("L1", 500, 300), ts()).unwrap();
        record_sourcing_attempt(&mut order, &store_attempt("L1-R1", 150, 150), ts()).unwrap();
        record_sourcing_attempt(&mut order, &store_attempt("L1-R2", 50, 50), ts()).unwrap();

        assert_eq!(order.lineage_fulfilled(&LineId::new("L1")), 500);

        // Lineage is complete; any further attempt is refused.
        let err = record_sourcing_attempt(&mut order, &store_attempt("L1-R2", 1, 1), ts())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition { .. }));
    }

    #[test]
    fn mixed_outcomes_are_partially_fulfilled_not_exception() {
        let mut order = order_with(vec![("L1", 100), ("L2", 100)]);

        // L1 fulfilled completely; L2 dies in the market.
        record_sourcing_attempt(&mut order, &store_attempt("L1", 100, 100), ts()).unwrap();
        let market_fail = SourcingAttempt::new(
            LineId::new("L2"),
            SourcingChannel::Market,
            100,
            0,
            None,
        );
        record_sourcing_attempt(&mut order, &market_fail, ts()).unwrap();

        assert_eq!(
            compute_aggregate_status(&order),
            OrderStatus::PartiallyFulfilled,
            "one fulfilled lineage keeps the order out of Exception"
        );
    }

    #[test]
    fn order_is_exception_only_when_every_lineage_failed() {
        let mut order = order_with(vec![("L1", 100), ("L2", 100)]);

        for line in ["L1", "L2"] {
            let fail = SourcingAttempt::new(
                LineId::new(line),
                SourcingChannel::Market,
                100,
                0,
                None,
            );
            record_sourcing_attempt(&mut order, &fail, ts()).unwrap();
        }
        assert_eq!(compute_aggregate_status(&order), OrderStatus::Exception);

        // Manual closure keeps the order in Exception.
        manual_closure(&mut order, &LineId::new("L1"), "Discontinued", ts()).unwrap();
        assert_eq!(compute_aggregate_status(&order), OrderStatus::Exception);
    }

    #[test]
    fn unknown_line_item_is_reported() {
        let mut order = order_with(vec![("L1", 100)]);
        let err = record_sourcing_attempt(&mut order, &store_attempt("L9", 10, 10), ts())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::LineItemNotFound {
                line_id: LineId::new("L9")
            }
        );
    }

    #[test]
    fn mutations_touch_last_updated_at() {
        let mut order = order_with(vec![("L1", 100)]);
        let created = order.last_updated_at;
        let later = created + chrono::Duration::seconds(90);

        record_sourcing_attempt(&mut order, &store_attempt("L1", 100, 10), later).unwrap();
        assert_eq!(order.last_updated_at, later);
    }
}
