//! Line-item lifecycle state machine.
//!
//! # Design
//!
//! Explicit state machine for a single back-order line item. Every sourcing
//! outcome is applied via [`LineItem::apply_attempt`], which enforces three
//! invariants:
//!
//! 1. **Legal transitions only.** Illegal operations return
//!    [`EngineError`](crate::EngineError); the item is left untouched.
//! 2. **Quantity safety.** `qty_fulfilled` never exceeds `qty_requested`,
//!    and an attempt may never ask for more than the pending quantity.
//! 3. **Retry chain.** A partial grant freezes the item as a closed partial
//!    record and spawns exactly one successor carrying the remainder; at
//!    most one non-terminal item exists per lineage at any time.
//!
//! # State diagram (simplified)
//!
//! ```text
//!   new() ──► Pending ──► DraftCreated ──► TransferOrderCreated
//!                │                │                 │
//!                │                └─► PurchaseOrderCreated
//!                │   attempt fully granted          │
//!                ├──────────────────────────────────┴──► CompletelyFulfilled (term.)
//!                │   attempt partially granted
//!                ├──► PartiallyFulfilled (frozen; successor ──► Pending)
//!                │   3rd failed Store attempt / failed Distributor attempt
//!                └──► NotAvailableInternally ──► MarketPurchaseInitiated
//!                                                   │            │
//!                                 failed Market attempt      manual_closure
//!                                                   ▼            ▼
//!                                    NotAvailableInMarket ──► ManuallyClosed (term.)
//! ```
//!
//! Escalation off the Store channel is never automatic: after the retry
//! ceiling the engine refuses further Store attempts and the desk operator
//! issues a Distributor PO or a market purchase as a distinct action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{
    DocumentId, DocumentStage, LineId, Remark, SourceType, SourcingAttempt, SourcingChannel,
};

/// Internal (Store) attempts allowed on a lineage before the engine forces
/// escalation off the Store channel. Fixed policy, not configurable.
pub const STORE_RETRY_CEILING: u32 = 3;

// ---------------------------------------------------------------------------
// LineItemStatus
// ---------------------------------------------------------------------------

/// All valid states a back-order line item can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineItemStatus {
    /// Awaiting sourcing; no document issued yet.
    Pending,
    /// A draft transfer order exists but has not been issued.
    DraftCreated,
    /// A transfer order against a store's inventory has been issued.
    TransferOrderCreated,
    /// A purchase order to a distributor has been issued.
    PurchaseOrderCreated,
    /// A partial grant was applied; the item is a closed partial record and
    /// its remainder lives on a spawned successor. **Frozen.**
    PartiallyFulfilled,
    /// The full requested quantity has been sourced. **Terminal.**
    CompletelyFulfilled,
    /// Internal channels (stores, distributor) could not supply the item;
    /// market purchase is the remaining option.
    NotAvailableInternally,
    /// A market purchase has been initiated and is awaiting its outcome.
    MarketPurchaseInitiated,
    /// The open market could not supply the item. Terminal unless the desk
    /// writes it off via manual closure.
    NotAvailableInMarket,
    /// Written off by the desk. **Terminal.**
    ManuallyClosed,
}

impl LineItemStatus {
    /// Returns `true` if the item accepts no further sourcing attempts.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompletelyFulfilled | Self::NotAvailableInMarket | Self::ManuallyClosed
        )
    }

    /// Dashboard-facing label, used in remarks and audit payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::DraftCreated => "DRAFT_CREATED",
            Self::TransferOrderCreated => "TRANSFER_ORDER_CREATED",
            Self::PurchaseOrderCreated => "PURCHASE_ORDER_CREATED",
            Self::PartiallyFulfilled => "PARTIALLY_FULFILLED",
            Self::CompletelyFulfilled => "COMPLETELY_FULFILLED",
            Self::NotAvailableInternally => "NOT_AVAILABLE_INTERNALLY",
            Self::MarketPurchaseInitiated => "MARKET_PURCHASE_INITIATED",
            Self::NotAvailableInMarket => "NOT_AVAILABLE_IN_MARKET",
            Self::ManuallyClosed => "MANUALLY_CLOSED",
        }
    }
}

// ---------------------------------------------------------------------------
// AttemptOutcome
// ---------------------------------------------------------------------------

/// What applying an attempt did to the item, for the order-level layer.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    /// The item is now `CompletelyFulfilled`.
    Completed,
    /// A partial grant froze the item; `successor` carries the remainder
    /// and must be appended to the owning order.
    Partial { successor: LineItem },
    /// Nothing was granted; retry count and status were updated.
    Failed,
}

// ---------------------------------------------------------------------------
// LineItem
// ---------------------------------------------------------------------------

/// One product within a web order, tracked through the lifecycle machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Stable identifier; successors get `{root}-R{n}`.
    pub line_id: LineId,
    /// Lineage root (equals `line_id` for originals).
    pub root_id: LineId,
    pub sku: String,
    pub product_name: String,
    /// Fixed at creation; successors get their own, smaller value.
    pub qty_requested: u32,
    /// Monotonically non-decreasing; never exceeds `qty_requested`.
    pub qty_fulfilled: u32,
    pub status: LineItemStatus,
    pub source_type: SourceType,
    /// Sourcing documents created against this item. Append-only.
    pub linked_docs: Vec<DocumentId>,
    /// Failed-attempt counter for this item.
    pub retry_count: u32,
    /// Timestamped audit entries. Append-only, never rewritten.
    pub remarks: Vec<Remark>,
    /// Set exactly once, when a partial grant spawns a retry successor.
    /// A superseded item is frozen and accepts no further operations.
    pub superseded_by: Option<LineId>,
}

impl LineItem {
    /// Create an original line item in `Pending`.
    ///
    /// # Panics (debug only)
    /// Panics if `qty_requested` is zero.
    pub fn new<S, P>(line_id: LineId, sku: S, product_name: P, qty_requested: u32) -> Self
    where
        S: Into<String>,
        P: Into<String>,
    {
        debug_assert!(qty_requested > 0, "qty_requested must be positive");
        Self {
            root_id: line_id.clone(),
            line_id,
            sku: sku.into(),
            product_name: product_name.into(),
            qty_requested,
            qty_fulfilled: 0,
            status: LineItemStatus::Pending,
            source_type: SourceType::None,
            linked_docs: Vec::new(),
            retry_count: 0,
            remarks: Vec::new(),
            superseded_by: None,
        }
    }

    /// Pending quantity, always derived and never stored.
    ///
    /// Frozen records (superseded partials, manually closed items) report 0
    /// regardless of how much was actually sourced.
    pub fn qty_pending(&self) -> u32 {
        if self.superseded_by.is_some() || self.status == LineItemStatus::ManuallyClosed {
            return 0;
        }
        self.qty_requested - self.qty_fulfilled
    }

    /// `true` for the current item of its lineage (not superseded).
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }

    fn push_remark(&mut self, at: DateTime<Utc>, text: String) {
        self.remarks.push(Remark::new(at, text));
    }

    fn refuse(&self, action: &'static str) -> EngineError {
        EngineError::InvalidStateTransition {
            line_id: self.line_id.clone(),
            from: self.status,
            action,
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Create a sourcing document against this item and move it into the
    /// corresponding document state.
    ///
    /// Store drafts go `Pending -> DraftCreated`; issuing moves to
    /// `TransferOrderCreated`. Distributor POs are issued from `Pending`,
    /// `DraftCreated`, or `NotAvailableInternally`. Market purchases are
    /// only initiated once internal channels are exhausted
    /// (`NotAvailableInternally`).
    pub(crate) fn open_document(
        &mut self,
        channel: SourcingChannel,
        stage: DocumentStage,
        document_id: DocumentId,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        use LineItemStatus::*;

        if self.superseded_by.is_some() {
            return Err(self.refuse("open_sourcing_document"));
        }

        let next = match (channel, stage, self.status) {
            (SourcingChannel::Store, DocumentStage::Draft, Pending) => DraftCreated,
            (SourcingChannel::Store, DocumentStage::Issued, Pending | DraftCreated) => {
                TransferOrderCreated
            }
            (
                SourcingChannel::Distributor,
                DocumentStage::Issued,
                Pending | DraftCreated | NotAvailableInternally,
            ) => PurchaseOrderCreated,
            (SourcingChannel::Market, DocumentStage::Issued, NotAvailableInternally) => {
                MarketPurchaseInitiated
            }
            _ => return Err(self.refuse("open_sourcing_document")),
        };

        self.status = next;
        self.source_type = channel.into();
        self.linked_docs.push(document_id.clone());
        self.push_remark(
            at,
            format!(
                "{} {} opened via {} ({} pending)",
                channel.doc_kind(),
                document_id,
                channel.as_str(),
                self.qty_pending()
            ),
        );
        Ok(())
    }

    /// Apply one resolved sourcing attempt.
    ///
    /// See the module docs for the full transition table. The caller (the
    /// order layer) is responsible for appending the spawned successor to
    /// the owning order and for recording the attempt in the desk log.
    pub(crate) fn apply_attempt(
        &mut self,
        attempt: &SourcingAttempt,
        at: DateTime<Utc>,
    ) -> Result<AttemptOutcome, EngineError> {
        if self.superseded_by.is_some() || self.status.is_terminal() {
            return Err(self.refuse("record_sourcing_attempt"));
        }
        if attempt.channel == SourcingChannel::Store && self.retry_count >= STORE_RETRY_CEILING {
            return Err(EngineError::ChannelExhausted {
                line_id: self.line_id.clone(),
                channel: attempt.channel,
                retry_count: self.retry_count,
            });
        }
        if attempt.qty_requested == 0 || attempt.qty_requested > self.qty_pending() {
            return Err(EngineError::InvalidQuantity {
                line_id: self.line_id.clone(),
                requested: attempt.qty_requested,
                pending: self.qty_pending(),
            });
        }
        debug_assert!(attempt.qty_granted <= attempt.qty_requested);

        self.qty_fulfilled += attempt.qty_granted;
        self.source_type = attempt.channel.into();
        if let Some(doc) = &attempt.document_id {
            if !self.linked_docs.contains(doc) {
                self.linked_docs.push(doc.clone());
            }
        }

        let outcome = if attempt.fully_granted() && self.qty_pending() == 0 {
            self.status = LineItemStatus::CompletelyFulfilled;
            self.push_remark(
                at,
                format!(
                    "granted {} of {} via {}; completely fulfilled",
                    attempt.qty_granted,
                    attempt.qty_requested,
                    attempt.channel.as_str()
                ),
            );
            AttemptOutcome::Completed
        } else if attempt.qty_granted > 0 {
            // Partial grant: freeze this item and hand the remainder to a
            // fresh successor. Remaining qty must be read before the item
            // is marked superseded (qty_pending() reports 0 afterwards).
            let remainder = self.qty_requested - self.qty_fulfilled;
            let succ_retry = self.retry_count + 1;
            let successor = LineItem {
                line_id: self.root_id.retry_successor(succ_retry),
                root_id: self.root_id.clone(),
                sku: self.sku.clone(),
                product_name: self.product_name.clone(),
                qty_requested: remainder,
                qty_fulfilled: 0,
                status: LineItemStatus::Pending,
                source_type: SourceType::None,
                linked_docs: Vec::new(),
                retry_count: succ_retry,
                remarks: Vec::new(),
                superseded_by: None,
            };

            self.status = LineItemStatus::PartiallyFulfilled;
            self.superseded_by = Some(successor.line_id.clone());
            self.push_remark(
                at,
                format!(
                    "granted {} of {} via {}; remainder {} moved to {}",
                    attempt.qty_granted,
                    attempt.qty_requested,
                    attempt.channel.as_str(),
                    remainder,
                    successor.line_id
                ),
            );
            AttemptOutcome::Partial { successor }
        } else {
            // Nothing granted: count the failure, then route by channel.
            self.retry_count += 1;
            self.status = match attempt.channel {
                SourcingChannel::Store if self.retry_count < STORE_RETRY_CEILING => {
                    LineItemStatus::Pending
                }
                SourcingChannel::Store => LineItemStatus::NotAvailableInternally,
                SourcingChannel::Distributor => LineItemStatus::NotAvailableInternally,
                SourcingChannel::Market => LineItemStatus::NotAvailableInMarket,
            };
            self.push_remark(
                at,
                format!(
                    "nothing granted via {} (retry {}); status {}",
                    attempt.channel.as_str(),
                    self.retry_count,
                    self.status.as_str()
                ),
            );
            AttemptOutcome::Failed
        };

        debug_assert!(self.qty_fulfilled <= self.qty_requested);
        Ok(outcome)
    }

    /// Write the item off. Allowed only once market sourcing is in flight
    /// or has failed; the pending quantity is frozen at zero regardless of
    /// what was actually sourced.
    pub(crate) fn close_manually(
        &mut self,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.superseded_by.is_some() {
            return Err(self.refuse("manual_closure"));
        }
        match self.status {
            LineItemStatus::MarketPurchaseInitiated | LineItemStatus::NotAvailableInMarket => {}
            _ => return Err(self.refuse("manual_closure")),
        }

        self.status = LineItemStatus::ManuallyClosed;
        self.push_remark(at, format!("manually closed: {}", reason));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc::now()
    }

    fn item(qty: u32) -> LineItem {
        LineItem::new(LineId::new("L1"), "SKU-001", "Amoxicillin 500mg", qty)
    }

    fn attempt(channel: SourcingChannel, req: u32, granted: u32) -> SourcingAttempt {
        SourcingAttempt::new(LineId::new("L1"), channel, req, granted, None)
    }

    #[test]
    fn new_item_starts_pending() {
        let li = item(500);
        assert_eq!(li.status, LineItemStatus::Pending);
        assert_eq!(li.qty_pending(), 500);
        assert_eq!(li.retry_count, 0);
        assert!(li.is_active());
        assert!(!li.status.is_terminal());
    }

    #[test]
    fn full_grant_completes_item() {
        let mut li = item(500);
        let out = li
            .apply_attempt(&attempt(SourcingChannel::Store, 500, 500), ts())
            .unwrap();
        assert!(matches!(out, AttemptOutcome::Completed));
        assert_eq!(li.status, LineItemStatus::CompletelyFulfilled);
        assert_eq!(li.qty_fulfilled, 500);
        assert_eq!(li.qty_pending(), 0);
        assert!(li.status.is_terminal());
    }

    #[test]
    fn partial_grant_freezes_item_and_spawns_successor() {
        let mut li = item(500);
        let out = li
            .apply_attempt(&attempt(SourcingChannel::Store, 500, 300), ts())
            .unwrap();

        let successor = match out {
            AttemptOutcome::Partial { successor } => successor,
            other => panic!("expected Partial, got {:?}", other),
        };

        // Original: frozen partial record.
        assert_eq!(li.status, LineItemStatus::PartiallyFulfilled);
        assert_eq!(li.qty_fulfilled, 300);
        assert_eq!(li.qty_pending(), 0, "superseded partial must freeze at 0");
        assert_eq!(li.superseded_by, Some(LineId::new("L1-R1")));

        // Successor: carries the remainder, same lineage.
        assert_eq!(successor.line_id, LineId::new("L1-R1"));
        assert_eq!(successor.root_id, LineId::new("L1"));
        assert_eq!(successor.qty_requested, 200);
        assert_eq!(successor.qty_fulfilled, 0);
        assert_eq!(successor.status, LineItemStatus::Pending);
        assert_eq!(successor.retry_count, 1);
    }

    #[test]
    fn fully_granted_but_short_of_pending_is_still_partial() {
        // Pending 500, attempt asks for 300 and gets all 300: the item is
        // not complete; the remaining 200 moves to a successor.
        let mut li = item(500);
        let out = li
            .apply_attempt(&attempt(SourcingChannel::Store, 300, 300), ts())
            .unwrap();
        match out {
            AttemptOutcome::Partial { successor } => {
                assert_eq!(successor.qty_requested, 200);
            }
            other => panic!("expected Partial, got {:?}", other),
        }
        assert_eq!(li.status, LineItemStatus::PartiallyFulfilled);
    }

    #[test]
    fn failed_store_attempts_hit_retry_ceiling() {
        let mut li = item(100);

        for round in 1..STORE_RETRY_CEILING {
            li.apply_attempt(&attempt(SourcingChannel::Store, 100, 0), ts())
                .unwrap();
            assert_eq!(li.retry_count, round);
            assert_eq!(li.status, LineItemStatus::Pending);
        }

        // Third failure exhausts internal sourcing.
        li.apply_attempt(&attempt(SourcingChannel::Store, 100, 0), ts())
            .unwrap();
        assert_eq!(li.retry_count, 3);
        assert_eq!(li.status, LineItemStatus::NotAvailableInternally);

        // Fourth Store attempt is refused outright.
        let err = li
            .apply_attempt(&attempt(SourcingChannel::Store, 100, 0), ts())
            .unwrap_err();
        assert!(matches!(err, EngineError::ChannelExhausted { retry_count: 3, .. }));
        assert_eq!(li.status, LineItemStatus::NotAvailableInternally);
    }

    #[test]
    fn distributor_failure_lands_not_available_internally() {
        let mut li = item(100);
        li.apply_attempt(&attempt(SourcingChannel::Distributor, 100, 0), ts())
            .unwrap();
        assert_eq!(li.status, LineItemStatus::NotAvailableInternally);
        assert_eq!(li.retry_count, 1);
    }

    #[test]
    fn market_failure_is_terminal_for_attempts() {
        let mut li = item(100);
        li.apply_attempt(&attempt(SourcingChannel::Market, 100, 0), ts())
            .unwrap();
        assert_eq!(li.status, LineItemStatus::NotAvailableInMarket);
        assert!(li.status.is_terminal());

        let err = li
            .apply_attempt(&attempt(SourcingChannel::Market, 100, 100), ts())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition { .. }));
    }

    #[test]
    fn attempt_exceeding_pending_is_rejected_untouched() {
        let mut li = item(100);
        let err = li
            .apply_attempt(&attempt(SourcingChannel::Store, 150, 150), ts())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidQuantity {
                line_id: LineId::new("L1"),
                requested: 150,
                pending: 100,
            }
        );
        assert_eq!(li.qty_fulfilled, 0);
        assert_eq!(li.status, LineItemStatus::Pending);
    }

    #[test]
    fn zero_quantity_attempt_is_rejected() {
        let mut li = item(100);
        let attempt = SourcingAttempt {
            line_id: LineId::new("L1"),
            channel: SourcingChannel::Store,
            qty_requested: 0,
            qty_granted: 0,
            document_id: None,
        };
        let err = li.apply_attempt(&attempt, ts()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuantity { requested: 0, .. }));
    }

    #[test]
    fn store_draft_then_issue_transfer_order() {
        let mut li = item(100);
        li.open_document(
            SourcingChannel::Store,
            DocumentStage::Draft,
            DocumentId::new("TO-000001"),
            ts(),
        )
        .unwrap();
        assert_eq!(li.status, LineItemStatus::DraftCreated);

        li.open_document(
            SourcingChannel::Store,
            DocumentStage::Issued,
            DocumentId::new("TO-000001"),
            ts(),
        )
        .unwrap();
        assert_eq!(li.status, LineItemStatus::TransferOrderCreated);
        assert_eq!(li.source_type, SourceType::Store);
        assert_eq!(li.linked_docs.len(), 2);
    }

    #[test]
    fn market_purchase_requires_internal_exhaustion() {
        let mut li = item(100);
        let err = li
            .open_document(
                SourcingChannel::Market,
                DocumentStage::Issued,
                DocumentId::new("MP-000001"),
                ts(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition { .. }));

        // Exhaust internal sourcing, then the market purchase is legal.
        li.apply_attempt(&attempt(SourcingChannel::Distributor, 100, 0), ts())
            .unwrap();
        li.open_document(
            SourcingChannel::Market,
            DocumentStage::Issued,
            DocumentId::new("MP-000001"),
            ts(),
        )
        .unwrap();
        assert_eq!(li.status, LineItemStatus::MarketPurchaseInitiated);
    }

    #[test]
    fn manual_closure_only_from_market_states() {
        let mut li = item(100);
        let err = li.close_manually("Discontinued", ts()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition { .. }));

        li.apply_attempt(&attempt(SourcingChannel::Market, 100, 0), ts())
            .unwrap();
        assert_eq!(li.status, LineItemStatus::NotAvailableInMarket);

        li.close_manually("Discontinued", ts()).unwrap();
        assert_eq!(li.status, LineItemStatus::ManuallyClosed);
        assert_eq!(li.qty_pending(), 0);
        assert!(li.remarks.iter().any(|r| r.text.contains("Discontinued")));
    }

    #[test]
    fn remarks_are_append_only_across_transitions() {
        let mut li = item(300);
        li.apply_attempt(&attempt(SourcingChannel::Store, 300, 0), ts())
            .unwrap();
        let first = li.remarks[0].text.clone();

        li.apply_attempt(&attempt(SourcingChannel::Store, 300, 300), ts())
            .unwrap();
        assert_eq!(li.remarks.len(), 2);
        assert_eq!(li.remarks[0].text, first, "existing remarks must not change");
    }

    #[test]
    fn superseded_item_refuses_everything() {
        let mut li = item(500);
        li.apply_attempt(&attempt(SourcingChannel::Store, 500, 300), ts())
            .unwrap();
        assert!(!li.is_active());

        let err = li
            .apply_attempt(&attempt(SourcingChannel::Store, 200, 200), ts())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition { .. }));

        let err = li
            .open_document(
                SourcingChannel::Distributor,
                DocumentStage::Issued,
                DocumentId::new("PO-000001"),
                ts(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition { .. }));
    }
}
