//! Scenario: a store grants part of a line, the remainder rides a retry
//! line, and the retry line completes the order.
//!
//! # Invariants under test
//!
//! 1. A 300-of-500 grant leaves the original `PartiallyFulfilled` with
//!    `qty_fulfilled = 300` and spawns `{original}-R1` with
//!    `qty_requested = 200`, `retry_count = 1`, status `Pending`.
//! 2. Fully granting the retry line completes the lineage with no further
//!    successor and the order aggregates to `Fulfilled`.
//! 3. The desk attempt log carries both attempts in sequence.

use bko_fulfilment::{LineId, LineItemStatus, OrderId, OrderStatus, SourcingAttempt, SourcingChannel};
use bko_testkit::{desk_with, order_with_lines, ScriptedSupplier};

#[test]
fn partial_grant_then_retry_line_completion() {
    let order_id = OrderId::new("WO-5001");
    let mut desk = desk_with(vec![order_with_lines("WO-5001", "Riverside Pharmacy", &[("L1", 500)])]);

    let mut supplier = ScriptedSupplier::new();
    supplier
        .script_grant(SourcingChannel::Store, 300)
        .script_grant(SourcingChannel::Store, 200);

    // GIVEN: the store answers the full request with 300.
    let response = supplier.respond(SourcingChannel::Store, 500);
    let snapshot = desk
        .record_sourcing_attempt(
            &order_id,
            SourcingAttempt::new(
                LineId::new("L1"),
                SourcingChannel::Store,
                500,
                response.qty_granted,
                Some(response.document_id),
            ),
        )
        .unwrap();

    assert_eq!(snapshot.qty_fulfilled, 300);
    assert_eq!(snapshot.status, LineItemStatus::PartiallyFulfilled);
    assert_eq!(snapshot.superseded_by, Some(LineId::new("L1-R1")));

    {
        let active = desk.active_line_items(&order_id).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].line_id, LineId::new("L1-R1"));
        assert_eq!(active[0].qty_requested, 200);
        assert_eq!(active[0].qty_fulfilled, 0);
        assert_eq!(active[0].retry_count, 1);
        assert_eq!(active[0].status, LineItemStatus::Pending);
    }
    assert_eq!(
        desk.aggregate_status(&order_id).unwrap(),
        OrderStatus::PartiallyFulfilled
    );

    // WHEN: the retry line's 200 are granted in full.
    let response = supplier.respond(SourcingChannel::Store, 200);
    let snapshot = desk
        .record_sourcing_attempt(
            &order_id,
            SourcingAttempt::new(
                LineId::new("L1-R1"),
                SourcingChannel::Store,
                200,
                response.qty_granted,
                Some(response.document_id),
            ),
        )
        .unwrap();

    // THEN: lineage complete, no new successor, order fulfilled.
    assert_eq!(snapshot.status, LineItemStatus::CompletelyFulfilled);
    assert_eq!(snapshot.superseded_by, None);
    assert_eq!(desk.aggregate_status(&order_id).unwrap(), OrderStatus::Fulfilled);

    assert_eq!(desk.attempt_log().len(), 2);
    assert_eq!(desk.lineage_granted_total(&order_id, &LineId::new("L1")), 500);
}
