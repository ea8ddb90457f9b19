use rust_decimal::Decimal;
use typed_builder::TypedBuilder;

use crate::{order::OrderId, Error};

/// The kind of overflow funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive)]
#[cfg_attr(
    feature = "strum",
    derive(strum::EnumIter, strum::EnumString, strum::Display)
)]
#[cfg_attr(feature = "strum", strum(serialize_all = "snake_case"))]
#[repr(u8)]
pub enum FundKind {
    /// Absorbs commissions that cannot be routed to an eligible wallet.
    Trust,
    /// Receives the development allocation and the tree pool remainder.
    Development,
}

/// Why an amount was credited to a fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[cfg_attr(
    feature = "strum",
    derive(strum::EnumIter, strum::EnumString, strum::Display)
)]
#[cfg_attr(feature = "strum", strum(serialize_all = "snake_case"))]
#[repr(u8)]
pub enum CreditReason {
    /// The unconditional trust-fund allocation.
    BaseAllocation,
    /// A direct commission with no eligible recipient.
    DirectRedirect,
    /// A tree-walk level with no eligible recipient.
    TreeRedirect,
    /// The development-fund allocation.
    Development,
    /// Unconsumed tree pool remainder.
    Remainder,
}

/// An append-only fund ledger entry.
#[derive(Debug, Clone, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FundEntry {
    amount: Decimal,
    reason: CreditReason,
    source_order: OrderId,
    #[builder(setter(into))]
    description: String,
    at: i64,
}

impl FundEntry {
    /// Get the credited amount.
    pub fn amount(&self) -> &Decimal {
        &self.amount
    }

    /// Get the credit reason.
    pub fn reason(&self) -> CreditReason {
        self.reason
    }

    /// Get the source order.
    pub fn source_order(&self) -> OrderId {
        self.source_order
    }

    /// Get the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the entry timestamp (unix seconds).
    pub fn at(&self) -> i64 {
        self.at
    }
}

/// An accumulating fund with its append-only transaction log.
///
/// The balance is always derivable by replaying the log; see
/// [`replay_balance`](Self::replay_balance).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fund {
    kind: FundKind,
    balance: Decimal,
    entries: Vec<FundEntry>,
}

impl Fund {
    /// Create an empty fund.
    pub fn new(kind: FundKind) -> Self {
        Self {
            kind,
            balance: Decimal::ZERO,
            entries: Vec::new(),
        }
    }

    /// Get the fund kind.
    pub fn kind(&self) -> FundKind {
        self.kind
    }

    /// Get the running balance.
    pub fn balance(&self) -> &Decimal {
        &self.balance
    }

    /// Get the transaction log.
    pub fn entries(&self) -> &[FundEntry] {
        &self.entries
    }

    /// Credit the fund. Rejects negative amounts and silently no-ops on
    /// zero. The log entry is appended before the running balance moves.
    pub fn credit(
        &mut self,
        amount: &Decimal,
        source_order: OrderId,
        reason: CreditReason,
        description: &str,
        at: i64,
    ) -> crate::Result<()> {
        if amount.is_sign_negative() {
            return Err(Error::InvalidArgument("negative fund credit"));
        }
        if amount.is_zero() {
            return Ok(());
        }
        let next = self
            .balance
            .checked_add(*amount)
            .ok_or(Error::Computation("crediting fund"))?;
        self.entries.push(
            FundEntry::builder()
                .amount(*amount)
                .reason(reason)
                .source_order(source_order)
                .description(description)
                .at(at)
                .build(),
        );
        self.balance = next;
        Ok(())
    }

    /// Re-derive the balance by replaying the log.
    pub fn replay_balance(&self) -> crate::Result<Decimal> {
        self.entries
            .iter()
            .try_fold(Decimal::ZERO, |acc, entry| acc.checked_add(entry.amount))
            .ok_or(Error::Computation("replaying fund log"))
    }
}
