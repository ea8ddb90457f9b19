use rust_decimal::Decimal;

use crate::{
    action::{
        distribute::{Distribute, DistributeParams},
        place_in_tree::PlaceInTree,
    },
    ledger::{CreditReason, FundKind},
    order::{Order, OrderId},
    participant::{CommissionKind, Participant, ParticipantId, Placement},
    settings::CommissionSettings,
    transaction::CommissionTransaction,
    Error,
};

/// Read access to the participant directory.
pub trait ParticipantStore {
    /// Find a participant by id.
    fn find(&self, id: ParticipantId) -> crate::Result<Option<Participant>>;

    /// Find a participant by referral code.
    fn find_by_referral_code(&self, code: &str) -> crate::Result<Option<Participant>>;

    /// Get the tree root: the first-ever placed participant.
    fn tree_root(&self) -> crate::Result<Option<ParticipantId>>;

    /// Get the placed participants at the given level, ordered by first
    /// purchase timestamp. The tree is populated by purchase order, not
    /// signup order; this ordering is where that property lives.
    fn placed_at_level(&self, level: u32) -> crate::Result<Vec<ParticipantId>>;
}

/// Mutating access to the participant directory.
pub trait ParticipantStoreMut: ParticipantStore {
    /// Credit a wallet, updating the accumulator selected by `kind`.
    /// Must be atomic per participant: concurrent sibling distributions may
    /// credit the same wallet.
    fn credit_wallet(
        &mut self,
        id: ParticipantId,
        amount: &Decimal,
        kind: CommissionKind,
    ) -> crate::Result<()>;

    /// Persist a placement: set the participant's tree fields and append it
    /// to the parent's child list in one operation, enforcing the fanout
    /// cap and level consistency.
    fn apply_placement(&mut self, id: ParticipantId, placement: &Placement) -> crate::Result<()>;

    /// Consume the participant's first-purchase semantic.
    fn mark_first_purchase(&mut self, id: ParticipantId, at: i64) -> crate::Result<()>;
}

impl<M: ParticipantStore> ParticipantStore for &mut M {
    fn find(&self, id: ParticipantId) -> crate::Result<Option<Participant>> {
        (**self).find(id)
    }

    fn find_by_referral_code(&self, code: &str) -> crate::Result<Option<Participant>> {
        (**self).find_by_referral_code(code)
    }

    fn tree_root(&self) -> crate::Result<Option<ParticipantId>> {
        (**self).tree_root()
    }

    fn placed_at_level(&self, level: u32) -> crate::Result<Vec<ParticipantId>> {
        (**self).placed_at_level(level)
    }
}

impl<M: ParticipantStoreMut> ParticipantStoreMut for &mut M {
    fn credit_wallet(
        &mut self,
        id: ParticipantId,
        amount: &Decimal,
        kind: CommissionKind,
    ) -> crate::Result<()> {
        (**self).credit_wallet(id, amount, kind)
    }

    fn apply_placement(&mut self, id: ParticipantId, placement: &Placement) -> crate::Result<()> {
        (**self).apply_placement(id, placement)
    }

    fn mark_first_purchase(&mut self, id: ParticipantId, at: i64) -> crate::Result<()> {
        (**self).mark_first_purchase(id, at)
    }
}

/// Extension trait of [`ParticipantStore`].
pub trait ParticipantStoreExt: ParticipantStore {
    /// Find a participant, failing when missing.
    fn expect(&self, id: ParticipantId) -> crate::Result<Participant> {
        self.find(id)?.ok_or(Error::NotFound("participant"))
    }

    /// Resolve the direct referrer of the participant, if any. An absent or
    /// unresolvable referral code resolves to `None`.
    fn resolve_referrer(&self, participant: &Participant) -> crate::Result<Option<Participant>> {
        match participant.referred_by() {
            Some(code) => self.find_by_referral_code(code),
            None => Ok(None),
        }
    }
}

impl<M: ParticipantStore + ?Sized> ParticipantStoreExt for M {}

/// Read access to the order store.
pub trait OrderStore {
    /// Find an order by id.
    fn find_order(&self, id: OrderId) -> crate::Result<Option<Order>>;
}

/// Mutating access to the order store.
pub trait OrderStoreMut: OrderStore {
    /// Atomically claim the one-shot reward flag for the order, the
    /// exclusive per-order claim against double-distribution. Returns
    /// `false` when the flag was already claimed.
    fn claim_reward(&mut self, id: OrderId) -> crate::Result<bool>;
}

impl<M: OrderStore> OrderStore for &mut M {
    fn find_order(&self, id: OrderId) -> crate::Result<Option<Order>> {
        (**self).find_order(id)
    }
}

impl<M: OrderStoreMut> OrderStoreMut for &mut M {
    fn claim_reward(&mut self, id: OrderId) -> crate::Result<bool> {
        (**self).claim_reward(id)
    }
}

/// Read access to the commission transaction store.
pub trait TransactionStore {
    /// Find the transaction recorded for the order.
    fn find_by_order(&self, order: OrderId) -> crate::Result<Option<CommissionTransaction>>;
}

/// Mutating access to the commission transaction store.
pub trait TransactionStoreMut: TransactionStore {
    /// Persist the receipt. Replaces an existing non-completed transaction
    /// for the same order (retry after failure) and rejects replacing a
    /// completed one.
    fn insert_transaction(&mut self, transaction: CommissionTransaction) -> crate::Result<()>;
}

impl<M: TransactionStore> TransactionStore for &mut M {
    fn find_by_order(&self, order: OrderId) -> crate::Result<Option<CommissionTransaction>> {
        (**self).find_by_order(order)
    }
}

impl<M: TransactionStoreMut> TransactionStoreMut for &mut M {
    fn insert_transaction(&mut self, transaction: CommissionTransaction) -> crate::Result<()> {
        (**self).insert_transaction(transaction)
    }
}

/// A bank of overflow funds.
pub trait FundBank {
    /// Get the balance of the fund. An absent fund has a zero balance.
    fn fund_balance(&self, kind: FundKind) -> crate::Result<Decimal>;

    /// Credit the fund, lazily creating it. Negative amounts are rejected,
    /// zero amounts are a silent no-op, and the log entry is appended
    /// before the balance moves.
    fn credit_fund(
        &mut self,
        kind: FundKind,
        amount: &Decimal,
        source_order: OrderId,
        reason: CreditReason,
        description: &str,
        at: i64,
    ) -> crate::Result<()>;
}

impl<M: FundBank> FundBank for &mut M {
    fn fund_balance(&self, kind: FundKind) -> crate::Result<Decimal> {
        (**self).fund_balance(kind)
    }

    fn credit_fund(
        &mut self,
        kind: FundKind,
        amount: &Decimal,
        source_order: OrderId,
        reason: CreditReason,
        description: &str,
        at: i64,
    ) -> crate::Result<()> {
        (**self).credit_fund(kind, amount, source_order, reason, description, at)
    }
}

/// Extension trait providing action constructors for platform stores.
pub trait PlatformExt: ParticipantStoreMut + TransactionStoreMut + FundBank {
    /// Create a [`PlaceInTree`] action for the participant.
    fn place_in_tree(&mut self, participant: ParticipantId) -> PlaceInTree<&mut Self>
    where
        Self: Sized,
    {
        PlaceInTree::new(self, participant)
    }

    /// Create a [`Distribute`] action for a completed order.
    fn distribute<'a>(
        &'a mut self,
        settings: &'a CommissionSettings,
        params: DistributeParams,
    ) -> Distribute<'a, &'a mut Self>
    where
        Self: Sized,
    {
        Distribute::new(self, settings, params)
    }
}

impl<M: ParticipantStoreMut + TransactionStoreMut + FundBank + ?Sized> PlatformExt for M {}
