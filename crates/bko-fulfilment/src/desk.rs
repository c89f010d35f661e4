//! Desk façade: an in-memory book of web orders plus the engine's
//! append-only attempt log.
//!
//! The desk is the single-writer surface a host embeds. It stamps wall-clock
//! time onto mutations and resolves order ids; the underlying order-level
//! functions in [`crate::engine`] stay clock-free and pure.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::engine::{self, OrderStatus, WebOrder};
use crate::error::EngineError;
use crate::lifecycle::LineItem;
use crate::types::{
    DocumentId, DocumentStage, LineId, OrderId, RecordedAttempt, SourcingAttempt, SourcingChannel,
};

/// In-memory fulfilment desk: owns the orders and the attempt log.
///
/// Single-writer: callers serialize mutations per desk. Reads may run
/// concurrently with each other but not with a mutation.
#[derive(Debug, Default)]
pub struct FulfilmentDesk {
    /// BTreeMap keeps iteration deterministic for reports and replays.
    orders: BTreeMap<OrderId, WebOrder>,
    /// Append-only. Survives line items being superseded by successors.
    attempts: Vec<RecordedAttempt>,
}

impl FulfilmentDesk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an order with the desk. Replacing an existing order is not
    /// a desk operation; the original book entry wins.
    pub fn insert_order(&mut self, order: WebOrder) {
        self.orders.entry(order.id.clone()).or_insert(order);
    }

    pub fn order(&self, order_id: &OrderId) -> Result<&WebOrder, EngineError> {
        self.orders.get(order_id).ok_or_else(|| EngineError::OrderNotFound {
            order_id: order_id.clone(),
        })
    }

    fn order_mut(&mut self, order_id: &OrderId) -> Result<&mut WebOrder, EngineError> {
        self.orders
            .get_mut(order_id)
            .ok_or_else(|| EngineError::OrderNotFound {
                order_id: order_id.clone(),
            })
    }

    pub fn orders(&self) -> impl Iterator<Item = &WebOrder> {
        self.orders.values()
    }

    pub fn attempt_log(&self) -> &[RecordedAttempt] {
        &self.attempts
    }

    /// Record one resolved sourcing attempt. On success the attempt is
    /// appended to the desk log; refused attempts are not logged.
    pub fn record_sourcing_attempt(
        &mut self,
        order_id: &OrderId,
        attempt: SourcingAttempt,
    ) -> Result<LineItem, EngineError> {
        let at = Utc::now();
        self.record_sourcing_attempt_at(order_id, attempt, at)
    }

    /// Clock-explicit variant used by replays and tests.
    pub fn record_sourcing_attempt_at(
        &mut self,
        order_id: &OrderId,
        attempt: SourcingAttempt,
        at: DateTime<Utc>,
    ) -> Result<LineItem, EngineError> {
        let order = self.order_mut(order_id)?;
        let snapshot = engine::record_sourcing_attempt(order, &attempt, at)?;

        self.attempts.push(RecordedAttempt {
            seq: self.attempts.len() as u64,
            order_id: order_id.clone(),
            at,
            attempt,
        });
        Ok(snapshot)
    }

    pub fn open_sourcing_document(
        &mut self,
        order_id: &OrderId,
        line_id: &LineId,
        channel: SourcingChannel,
        stage: DocumentStage,
        document_id: DocumentId,
    ) -> Result<LineItem, EngineError> {
        let at = Utc::now();
        let order = self.order_mut(order_id)?;
        engine::open_sourcing_document(order, line_id, channel, stage, document_id, at)
    }

    pub fn manual_closure(
        &mut self,
        order_id: &OrderId,
        line_id: &LineId,
        reason: &str,
    ) -> Result<LineItem, EngineError> {
        let at = Utc::now();
        let order = self.order_mut(order_id)?;
        engine::manual_closure(order, line_id, reason, at)
    }

    pub fn aggregate_status(&self, order_id: &OrderId) -> Result<OrderStatus, EngineError> {
        Ok(engine::compute_aggregate_status(self.order(order_id)?))
    }

    pub fn active_line_items(&self, order_id: &OrderId) -> Result<Vec<&LineItem>, EngineError> {
        Ok(engine::list_active_line_items(self.order(order_id)?))
    }

    /// Sum of granted quantity across one lineage's logged attempts.
    pub fn lineage_granted_total(&self, order_id: &OrderId, root_id: &LineId) -> u32 {
        let lineage_ids: Vec<&LineId> = match self.orders.get(order_id) {
            Some(order) => order
                .line_items
                .iter()
                .filter(|li| &li.root_id == root_id)
                .map(|li| &li.line_id)
                .collect(),
            None => return 0,
        };

        self.attempts
            .iter()
            .filter(|rec| &rec.order_id == order_id)
            .filter(|rec| lineage_ids.contains(&&rec.attempt.line_id))
            .map(|rec| rec.attempt.qty_granted)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OrderStatus;
    use crate::lifecycle::LineItemStatus;

    fn desk_with_order(qty: u32) -> (FulfilmentDesk, OrderId) {
        let order_id = OrderId::new("WO-2001");
        let item = LineItem::new(LineId::new("L1"), "SKU-7", "Metformin 850mg", qty);
        let order = WebOrder::new(order_id.clone(), "Hill Street Pharmacy", Utc::now(), vec![item]);

        let mut desk = FulfilmentDesk::new();
        desk.insert_order(order);
        (desk, order_id)
    }

    fn store(line: &str, req: u32, granted: u32) -> SourcingAttempt {
        SourcingAttempt::new(LineId::new(line), SourcingChannel::Store, req, granted, None)
    }

    #[test]
    fn unknown_order_is_reported() {
        let (mut desk, _) = desk_with_order(10);
        let missing = OrderId::new("WO-9999");
        let err = desk
            .record_sourcing_attempt(&missing, store("L1", 10, 10))
            .unwrap_err();
        assert_eq!(err, EngineError::OrderNotFound { order_id: missing });
    }

    #[test]
    fn successful_attempts_land_in_the_log() {
        let (mut desk, order_id) = desk_with_order(100);
        desk.record_sourcing_attempt(&order_id, store("L1", 100, 60))
            .unwrap();
        desk.record_sourcing_attempt(&order_id, store("L1-R1", 40, 40))
            .unwrap();

        assert_eq!(desk.attempt_log().len(), 2);
        assert_eq!(desk.attempt_log()[0].seq, 0);
        assert_eq!(desk.attempt_log()[1].seq, 1);
        assert_eq!(desk.lineage_granted_total(&order_id, &LineId::new("L1")), 100);
        assert_eq!(desk.aggregate_status(&order_id).unwrap(), OrderStatus::Fulfilled);
    }

    #[test]
    fn refused_attempts_are_not_logged() {
        let (mut desk, order_id) = desk_with_order(100);
        let err = desk
            .record_sourcing_attempt(&order_id, store("L1", 500, 500))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuantity { .. }));
        assert!(desk.attempt_log().is_empty());
    }

    #[test]
    fn duplicate_order_insert_keeps_original() {
        let (mut desk, order_id) = desk_with_order(100);
        desk.record_sourcing_attempt(&order_id, store("L1", 100, 100))
            .unwrap();

        let fresh = WebOrder::new(
            order_id.clone(),
            "Someone Else",
            Utc::now(),
            vec![LineItem::new(LineId::new("L1"), "SKU-7", "Metformin 850mg", 100)],
        );
        desk.insert_order(fresh);

        let li = desk.order(&order_id).unwrap().line_item(&LineId::new("L1")).unwrap();
        assert_eq!(li.status, LineItemStatus::CompletelyFulfilled);
    }
}
