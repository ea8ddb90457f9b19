use rust_decimal::Decimal;
use typed_builder::TypedBuilder;

use crate::{order::OrderId, participant::ParticipantId, Error};

/// Status of commission transactions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[cfg_attr(
    feature = "strum",
    derive(strum::EnumIter, strum::EnumString, strum::Display)
)]
#[cfg_attr(feature = "strum", strum(serialize_all = "snake_case"))]
#[repr(u8)]
pub enum TransactionStatus {
    /// Distribution in progress.
    #[default]
    Pending,
    /// Distribution completed; the transaction is the durable receipt.
    Completed,
    /// Distribution aborted; partial wallet credits are not rolled back.
    Failed,
}

/// Where a commission amount was actually sent when the nominal recipient
/// could not take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RedirectTarget {
    /// The real owner of a virtual participant.
    Owner(ParticipantId),
    /// The trust fund.
    TrustFund,
}

/// A single level of the tree-commission walk.
///
/// The nominal recipient is always recorded for audit, even when the amount
/// was redirected.
#[derive(Debug, Clone, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeCommissionEntry {
    recipient: ParticipantId,
    level: u32,
    percent: Decimal,
    amount: Decimal,
    #[builder(default, setter(strip_option))]
    redirected_to: Option<RedirectTarget>,
}

impl TreeCommissionEntry {
    /// Get the nominal recipient.
    pub fn recipient(&self) -> ParticipantId {
        self.recipient
    }

    /// Get the walk level, starting at `1` for the nearest ancestor.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Get the applied percentage.
    pub fn percent(&self) -> &Decimal {
        &self.percent
    }

    /// Get the allocated amount.
    pub fn amount(&self) -> &Decimal {
        &self.amount
    }

    /// Get the redirect target, if the amount did not reach the nominal
    /// recipient's wallet.
    pub fn redirected_to(&self) -> Option<RedirectTarget> {
        self.redirected_to
    }
}

/// The immutable receipt of a one-time commission distribution.
///
/// Created once per order; append-only except for the status transition.
/// This record is the authoritative idempotency marker for the order.
#[derive(Debug, Clone, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommissionTransaction {
    order: OrderId,
    purchaser: ParticipantId,
    order_amount: Decimal,
    #[builder(default = Decimal::ZERO)]
    trust_fund_amount: Decimal,
    #[builder(default)]
    direct_referrer: Option<ParticipantId>,
    #[builder(default = Decimal::ZERO)]
    direct_amount: Decimal,
    #[builder(default = false)]
    direct_to_trust: bool,
    #[builder(default)]
    tree_entries: Vec<TreeCommissionEntry>,
    #[builder(default = Decimal::ZERO)]
    development_amount: Decimal,
    #[builder(default = Decimal::ZERO)]
    remainder_amount: Decimal,
    #[builder(default)]
    status: TransactionStatus,
    created_at: i64,
}

impl CommissionTransaction {
    /// Get the source order.
    pub fn order(&self) -> OrderId {
        self.order
    }

    /// Get the purchaser.
    pub fn purchaser(&self) -> ParticipantId {
        self.purchaser
    }

    /// Get the order amount.
    pub fn order_amount(&self) -> &Decimal {
        &self.order_amount
    }

    /// Get the base trust-fund allocation. Redirected amounts are recorded
    /// on the direct/tree entries instead.
    pub fn trust_fund_amount(&self) -> &Decimal {
        &self.trust_fund_amount
    }

    /// Get the direct referrer, if one was resolved.
    pub fn direct_referrer(&self) -> Option<ParticipantId> {
        self.direct_referrer
    }

    /// Get the direct-commission amount.
    pub fn direct_amount(&self) -> &Decimal {
        &self.direct_amount
    }

    /// Get whether the direct commission flowed to the trust fund instead
    /// of a wallet.
    pub fn direct_to_trust(&self) -> bool {
        self.direct_to_trust
    }

    /// Get the ordered tree-commission entries.
    pub fn tree_entries(&self) -> &[TreeCommissionEntry] {
        &self.tree_entries
    }

    /// Get the development-fund allocation (excluding the remainder).
    pub fn development_amount(&self) -> &Decimal {
        &self.development_amount
    }

    /// Get the unconsumed tree pool remainder, credited to the development
    /// fund.
    pub fn remainder_amount(&self) -> &Decimal {
        &self.remainder_amount
    }

    /// Get the status.
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Get whether the distribution completed.
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Get the creation timestamp (unix seconds).
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Record the base trust-fund allocation.
    pub fn set_trust_fund_amount(&mut self, amount: Decimal) {
        self.trust_fund_amount = amount;
    }

    /// Record the direct-commission outcome.
    pub fn set_direct(
        &mut self,
        referrer: Option<ParticipantId>,
        amount: Decimal,
        to_trust: bool,
    ) {
        self.direct_referrer = referrer;
        self.direct_amount = amount;
        self.direct_to_trust = to_trust;
    }

    /// Append a tree-commission entry.
    pub fn push_tree_entry(&mut self, entry: TreeCommissionEntry) {
        self.tree_entries.push(entry);
    }

    /// Record the development allocation and the tree pool remainder.
    pub fn set_development(&mut self, amount: Decimal, remainder: Decimal) {
        self.development_amount = amount;
        self.remainder_amount = remainder;
    }

    /// Sum of every allocated amount: trust + direct + tree entries +
    /// development + remainder. Redirects preserve amounts, so this must
    /// reconcile with the configured total allocation.
    pub fn allocated_total(&self) -> crate::Result<Decimal> {
        let mut total = self
            .trust_fund_amount
            .checked_add(self.direct_amount)
            .and_then(|acc| acc.checked_add(self.development_amount))
            .and_then(|acc| acc.checked_add(self.remainder_amount))
            .ok_or(Error::Computation("summing allocated amounts"))?;
        for entry in &self.tree_entries {
            total = total
                .checked_add(entry.amount)
                .ok_or(Error::Computation("summing allocated amounts"))?;
        }
        Ok(total)
    }

    /// Transition to completed.
    pub fn mark_completed(&mut self) -> crate::Result<()> {
        if self.status != TransactionStatus::Pending {
            return Err(Error::InvariantViolation("transaction is already terminal"));
        }
        self.status = TransactionStatus::Completed;
        Ok(())
    }

    /// Transition to failed.
    pub fn mark_failed(&mut self) -> crate::Result<()> {
        if self.status != TransactionStatus::Pending {
            return Err(Error::InvariantViolation("transaction is already terminal"));
        }
        self.status = TransactionStatus::Failed;
        Ok(())
    }
}
