use std::fmt;

use crate::lifecycle::LineItemStatus;
use crate::types::{LineId, OrderId, SourcingChannel};

/// Typed failure of a fulfilment operation.
///
/// Every precondition violation is surfaced to the caller as a value;
/// nothing is silently clamped and nothing panics. The presentation layer
/// decides whether to retry with corrected input or show the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The attempt asked for more than the line item's pending quantity
    /// (or asked for nothing at all).
    InvalidQuantity {
        line_id: LineId,
        requested: u32,
        pending: u32,
    },
    /// The operation is not legal from the item's current state.
    InvalidStateTransition {
        line_id: LineId,
        from: LineItemStatus,
        action: &'static str,
    },
    /// The retry ceiling on a channel has been reached; the caller must
    /// escalate to a different channel.
    ChannelExhausted {
        line_id: LineId,
        channel: SourcingChannel,
        retry_count: u32,
    },
    LineItemNotFound {
        line_id: LineId,
    },
    OrderNotFound {
        order_id: OrderId,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidQuantity {
                line_id,
                requested,
                pending,
            } => write!(
                f,
                "invalid quantity on {}: requested {} but {} pending",
                line_id, requested, pending
            ),
            EngineError::InvalidStateTransition {
                line_id,
                from,
                action,
            } => write!(
                f,
                "illegal transition on {}: {} not allowed from {:?}",
                line_id, action, from
            ),
            EngineError::ChannelExhausted {
                line_id,
                channel,
                retry_count,
            } => write!(
                f,
                "channel {} exhausted on {} after {} retries",
                channel.as_str(),
                line_id,
                retry_count
            ),
            EngineError::LineItemNotFound { line_id } => {
                write!(f, "line item {} not found", line_id)
            }
            EngineError::OrderNotFound { order_id } => {
                write!(f, "order {} not found", order_id)
            }
        }
    }
}

impl std::error::Error for EngineError {}
