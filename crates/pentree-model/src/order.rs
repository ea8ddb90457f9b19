use std::fmt;

use rust_decimal::Decimal;
use typed_builder::TypedBuilder;

use crate::{participant::ParticipantId, Error};

/// Order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderId(u64);

impl OrderId {
    /// Create an order id from its raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The lifecycle status of orders.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[cfg_attr(
    feature = "strum",
    derive(strum::EnumIter, strum::EnumString, strum::Display)
)]
#[cfg_attr(feature = "strum", strum(serialize_all = "snake_case"))]
#[repr(u8)]
pub enum OrderStatus {
    /// Awaiting payment confirmation.
    #[default]
    Pending,
    /// Paid and eligible for commission distribution.
    Completed,
    /// Cancelled before completion.
    Cancelled,
    /// Payment failed.
    Failed,
}

/// An order record.
#[derive(Debug, Clone, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    id: OrderId,
    purchaser: ParticipantId,
    total_amount: Decimal,
    #[builder(default)]
    status: OrderStatus,
    #[builder(default = false)]
    reward_applied: bool,
}

impl Order {
    /// Get the id.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Get the purchaser.
    pub fn purchaser(&self) -> ParticipantId {
        self.purchaser
    }

    /// Get the monetary total.
    pub fn total_amount(&self) -> &Decimal {
        &self.total_amount
    }

    /// Get the lifecycle status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Get whether commissions were already applied for this order.
    pub fn reward_applied(&self) -> bool {
        self.reward_applied
    }

    /// Transition to a terminal status. Orders transition terminal exactly
    /// once.
    pub fn transition(&mut self, to: OrderStatus) -> crate::Result<()> {
        if self.status != OrderStatus::Pending {
            return Err(Error::InvariantViolation("order is already terminal"));
        }
        if to == OrderStatus::Pending {
            return Err(Error::InvalidArgument("cannot transition back to pending"));
        }
        self.status = to;
        Ok(())
    }

    /// Claim the one-shot reward flag. Returns `false` when already claimed.
    pub fn claim_reward(&mut self) -> bool {
        if self.reward_applied {
            false
        } else {
            self.reward_applied = true;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn order() -> Order {
        Order::builder()
            .id(OrderId::new(1))
            .purchaser(ParticipantId::new(1))
            .total_amount(dec!(1000))
            .build()
    }

    #[test]
    fn orders_transition_terminal_once() -> crate::Result<()> {
        let mut order = order();
        order.transition(OrderStatus::Completed)?;
        assert!(matches!(
            order.transition(OrderStatus::Cancelled),
            Err(Error::InvariantViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn reward_claim_is_single_shot() {
        let mut order = order();
        assert!(order.claim_reward());
        assert!(!order.claim_reward());
        assert!(order.reward_applied());
    }
}
