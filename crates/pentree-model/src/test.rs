use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::{
    action::distribute::{DistributeParams, DistributionReport},
    ledger::{CreditReason, Fund, FundKind},
    order::{Order, OrderId, OrderStatus},
    participant::{CommissionKind, Participant, ParticipantId, ParticipantKind, Placement},
    settings::CommissionSettings,
    store::{
        FundBank, OrderStore, OrderStoreMut, ParticipantStore, ParticipantStoreMut, PlatformExt,
        TransactionStore, TransactionStoreMut,
    },
    transaction::CommissionTransaction,
    Error,
};

/// An in-memory platform store: an arena of participants, orders,
/// transactions and funds keyed by identity.
#[derive(Debug, Default)]
pub struct TestPlatform {
    participants: HashMap<ParticipantId, Participant>,
    orders: HashMap<OrderId, Order>,
    transactions: HashMap<OrderId, CommissionTransaction>,
    funds: HashMap<FundKind, Fund>,
    next_id: u64,
}

impl TestPlatform {
    /// Create an empty platform.
    pub fn new() -> Self {
        Default::default()
    }

    fn bump_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Insert a pre-built participant, keeping the id counter ahead of it.
    pub fn insert_participant(&mut self, participant: Participant) -> ParticipantId {
        let id = participant.id();
        self.next_id = self.next_id.max(id.get().saturating_add(1));
        self.participants.insert(id, participant);
        id
    }

    /// Add a real participant with a referral code and an optional referrer
    /// code.
    pub fn add_participant(&mut self, code: &str, referred_by: Option<&str>) -> ParticipantId {
        let id = ParticipantId::new(self.bump_id());
        let participant = match referred_by {
            Some(referrer) => Participant::builder()
                .id(id)
                .referral_code(code)
                .referred_by(referrer)
                .build(),
            None => Participant::builder().id(id).referral_code(code).build(),
        };
        self.participants.insert(id, participant);
        id
    }

    /// Add a virtual participant redirecting its earnings to `owner`.
    pub fn add_virtual(&mut self, code: &str, owner: ParticipantId) -> ParticipantId {
        let id = ParticipantId::new(self.bump_id());
        let participant = Participant::builder()
            .id(id)
            .referral_code(code)
            .kind(ParticipantKind::Virtual { owner })
            .build();
        self.participants.insert(id, participant);
        id
    }

    /// Get direct mutable access to a participant, for fixture setup.
    pub fn participant_mut(&mut self, id: ParticipantId) -> &mut Participant {
        self.participants
            .get_mut(&id)
            .expect("participant must exist")
    }

    /// Get every participant id, sorted.
    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<_> = self.participants.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Get a fund, if it was ever credited.
    pub fn fund(&self, kind: FundKind) -> Option<&Fund> {
        self.funds.get(&kind)
    }

    /// Create a pending order.
    pub fn create_order(&mut self, purchaser: ParticipantId, amount: Decimal) -> OrderId {
        let id = OrderId::new(self.bump_id());
        self.orders.insert(
            id,
            Order::builder()
                .id(id)
                .purchaser(purchaser)
                .total_amount(amount)
                .build(),
        );
        id
    }

    /// Run the order-completion handler path: transition the order, claim
    /// its one-shot reward flag and distribute. The distribution re-checks
    /// idempotency through the receipt, so a duplicate completion event is
    /// harmless.
    pub fn complete_order(
        &mut self,
        settings: &CommissionSettings,
        order_id: OrderId,
        now: i64,
    ) -> crate::Result<DistributionReport> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(Error::NotFound("order"))?;
        if order.status() == OrderStatus::Pending {
            order.transition(OrderStatus::Completed)?;
        }
        let purchaser = order.purchaser();
        let amount = *order.total_amount();
        let _claimed = self.claim_reward(order_id)?;
        let params = DistributeParams::builder()
            .order_id(order_id)
            .purchaser(purchaser)
            .order_amount(amount)
            .now(now)
            .build();
        self.distribute(settings, params).execute()
    }
}

impl ParticipantStore for TestPlatform {
    fn find(&self, id: ParticipantId) -> crate::Result<Option<Participant>> {
        Ok(self.participants.get(&id).cloned())
    }

    fn find_by_referral_code(&self, code: &str) -> crate::Result<Option<Participant>> {
        Ok(self
            .participants
            .values()
            .find(|participant| participant.referral_code() == code)
            .cloned())
    }

    fn tree_root(&self) -> crate::Result<Option<ParticipantId>> {
        Ok(self
            .participants
            .values()
            .filter(|participant| participant.tree_level() == 1)
            .min_by_key(|participant| {
                (
                    participant.first_purchase_at().unwrap_or(i64::MAX),
                    participant.id(),
                )
            })
            .map(Participant::id))
    }

    fn placed_at_level(&self, level: u32) -> crate::Result<Vec<ParticipantId>> {
        let mut placed: Vec<_> = self
            .participants
            .values()
            .filter(|participant| participant.tree_level() == level)
            .collect();
        placed.sort_by_key(|participant| {
            (
                participant.first_purchase_at().unwrap_or(i64::MAX),
                participant.id(),
            )
        });
        Ok(placed.into_iter().map(Participant::id).collect())
    }
}

impl ParticipantStoreMut for TestPlatform {
    fn credit_wallet(
        &mut self,
        id: ParticipantId,
        amount: &Decimal,
        kind: CommissionKind,
    ) -> crate::Result<()> {
        self.participants
            .get_mut(&id)
            .ok_or(Error::NotFound("participant"))?
            .credit_wallet(amount, kind)
    }

    fn apply_placement(&mut self, id: ParticipantId, placement: &Placement) -> crate::Result<()> {
        if !self.participants.contains_key(&id) {
            return Err(Error::NotFound("participant"));
        }
        if let Some(parent_id) = placement.parent {
            let parent = self
                .participants
                .get_mut(&parent_id)
                .ok_or(Error::NotFound("tree parent"))?;
            if placement.level != parent.tree_level().saturating_add(1) {
                return Err(Error::InvariantViolation(
                    "placement level is inconsistent with the parent",
                ));
            }
            let position = parent.push_child(id)?;
            if position != placement.position {
                return Err(Error::InvariantViolation("placement position is stale"));
            }
        }
        self.participants
            .get_mut(&id)
            .ok_or(Error::NotFound("participant"))?
            .set_placement(placement)
    }

    fn mark_first_purchase(&mut self, id: ParticipantId, at: i64) -> crate::Result<()> {
        self.participants
            .get_mut(&id)
            .ok_or(Error::NotFound("participant"))?
            .mark_first_purchase(at);
        Ok(())
    }
}

impl OrderStore for TestPlatform {
    fn find_order(&self, id: OrderId) -> crate::Result<Option<Order>> {
        Ok(self.orders.get(&id).cloned())
    }
}

impl OrderStoreMut for TestPlatform {
    fn claim_reward(&mut self, id: OrderId) -> crate::Result<bool> {
        Ok(self
            .orders
            .get_mut(&id)
            .ok_or(Error::NotFound("order"))?
            .claim_reward())
    }
}

impl TransactionStore for TestPlatform {
    fn find_by_order(&self, order: OrderId) -> crate::Result<Option<CommissionTransaction>> {
        Ok(self.transactions.get(&order).cloned())
    }
}

impl TransactionStoreMut for TestPlatform {
    fn insert_transaction(&mut self, transaction: CommissionTransaction) -> crate::Result<()> {
        if let Some(existing) = self.transactions.get(&transaction.order()) {
            if existing.is_completed() {
                return Err(Error::DuplicateTransaction);
            }
        }
        self.transactions.insert(transaction.order(), transaction);
        Ok(())
    }
}

impl FundBank for TestPlatform {
    fn fund_balance(&self, kind: FundKind) -> crate::Result<Decimal> {
        Ok(self
            .funds
            .get(&kind)
            .map(|fund| *fund.balance())
            .unwrap_or(Decimal::ZERO))
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
        self.funds
            .entry(kind)
            .or_insert_with(|| Fund::new(kind))
            .credit(amount, source_order, reason, description, at)
    }
}
