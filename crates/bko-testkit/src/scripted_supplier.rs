//! Deterministic supplier double for desk scenarios.
//!
//! Grants come from an explicit per-channel script, never from randomness;
//! the desk records whatever the supplier granted, exactly like it would
//! with a real sourcing backend. Document ids are minted from running
//! counters so repeated runs produce identical histories.

use std::collections::VecDeque;

use bko_fulfilment::{DocumentId, SourcingChannel};

/// One scripted answer to a sourcing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierResponse {
    pub document_id: DocumentId,
    pub qty_granted: u32,
}

/// Supplier double answering requests from per-channel grant scripts.
///
/// An unscripted request grants nothing (the channel "has no stock"),
/// which keeps failure-path scenarios short to write.
#[derive(Debug, Default)]
pub struct ScriptedSupplier {
    store_grants: VecDeque<u32>,
    distributor_grants: VecDeque<u32>,
    market_grants: VecDeque<u32>,
    next_doc_no: u64,
    responses: Vec<(SourcingChannel, SupplierResponse)>,
}

impl ScriptedSupplier {
    pub fn new() -> Self {
        Self {
            next_doc_no: 1,
            ..Self::default()
        }
    }

    /// Queue the next grant for a channel. Requests consume grants in FIFO
    /// order.
    pub fn script_grant(&mut self, channel: SourcingChannel, qty_granted: u32) -> &mut Self {
        self.queue_mut(channel).push_back(qty_granted);
        self
    }

    /// Answer one sourcing request. The granted quantity is capped at the
    /// requested quantity; the desk never sees an over-grant.
    pub fn respond(&mut self, channel: SourcingChannel, qty_requested: u32) -> SupplierResponse {
        let scripted = self.queue_mut(channel).pop_front().unwrap_or(0);
        let qty_granted = scripted.min(qty_requested);

        let document_id = DocumentId::new(format!("{}-{:06}", channel.doc_kind(), self.next_doc_no));
        self.next_doc_no += 1;

        let response = SupplierResponse {
            document_id,
            qty_granted,
        };
        self.responses.push((channel, response.clone()));
        response
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    pub fn responses(&self) -> &[(SourcingChannel, SupplierResponse)] {
        &self.responses
    }

    fn queue_mut(&mut self, channel: SourcingChannel) -> &mut VecDeque<u32> {
        match channel {
            SourcingChannel::Store => &mut self.store_grants,
            SourcingChannel::Distributor => &mut self.distributor_grants,
            SourcingChannel::Market => &mut self.market_grants,
        }
    }
}
