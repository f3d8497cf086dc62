//! Broker replies for order placement, status and cancellation.

use serde::{Deserialize, Serialize};

use super::OrderId;

/// Result of a buy or sell placement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderPlacement {
    Placed(OrderId),
    /// The broker answered but did not accept the order.
    NotPlaced { reason: String },
}

impl OrderPlacement {
    #[must_use]
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            OrderPlacement::Placed(id) => Some(id),
            OrderPlacement::NotPlaced { .. } => None,
        }
    }

    #[must_use]
    pub fn is_placed(&self) -> bool {
        matches!(self, OrderPlacement::Placed(_))
    }
}

/// Status of one order as seen by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrderStatus {
    pub order_id: OrderId,
    /// No longer on the book, i.e. fully filled.
    pub closed: bool,
    pub partially_filled: bool,
}

impl OpenOrderStatus {
    pub fn open(order_id: OrderId) -> Self {
        Self {
            order_id,
            closed: false,
            partially_filled: false,
        }
    }

    pub fn closed(order_id: OrderId) -> Self {
        Self {
            order_id,
            closed: true,
            partially_filled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReceipt {
    pub canceled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
