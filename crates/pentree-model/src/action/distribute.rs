use rust_decimal::Decimal;
use typed_builder::TypedBuilder;

use crate::{
    action::place_in_tree::{PlaceInTree, PlacementReport},
    ledger::{CreditReason, FundKind},
    order::OrderId,
    participant::{CommissionKind, Participant, ParticipantId, ParticipantKind},
    settings::CommissionSettings,
    store::{FundBank, ParticipantStoreExt, ParticipantStoreMut, TransactionStoreMut},
    transaction::{CommissionTransaction, RedirectTarget, TreeCommissionEntry},
    utils::{apply_percent, TOLERANCE},
    Error,
};

/// Distribution parameters.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct DistributeParams {
    order_id: OrderId,
    purchaser: ParticipantId,
    order_amount: Decimal,
    /// Distribution timestamp (unix seconds); recorded on the receipt and
    /// used as the first-purchase ordering key.
    now: i64,
}

/// Distribute commissions for a completed order.
///
/// Invoked exactly once when the order transitions to completed. The caller
/// holds the exclusive per-order claim (the order's one-shot reward flag);
/// this action independently re-verifies idempotency via the transaction
/// lookup, so a duplicate invocation returns the existing receipt instead
/// of re-distributing.
#[must_use]
pub struct Distribute<'a, S> {
    store: S,
    settings: &'a CommissionSettings,
    params: DistributeParams,
}

/// Commission distribution report.
#[derive(Debug, Clone)]
pub struct DistributionReport {
    transaction: CommissionTransaction,
    placement: Option<PlacementReport>,
    already_processed: bool,
}

impl DistributionReport {
    /// Get the persisted transaction.
    pub fn transaction(&self) -> &CommissionTransaction {
        &self.transaction
    }

    /// Get the tree placement triggered by this order, if any.
    pub fn placement(&self) -> Option<&PlacementReport> {
        self.placement.as_ref()
    }

    /// Get whether an existing completed transaction short-circuited the
    /// distribution.
    pub fn already_processed(&self) -> bool {
        self.already_processed
    }

    /// Convert into the transaction.
    pub fn into_transaction(self) -> CommissionTransaction {
        self.transaction
    }
}

impl<'a, S> Distribute<'a, S>
where
    S: ParticipantStoreMut + TransactionStoreMut + FundBank,
{
    /// Create a new [`Distribute`] action.
    pub fn new(store: S, settings: &'a CommissionSettings, params: DistributeParams) -> Self {
        Self {
            store,
            settings,
            params,
        }
    }

    /// Execute.
    ///
    /// Partial in-flight writes are not rolled back on failure; the
    /// persisted receipt (and its status) is the safety net for retries,
    /// not transactional rollback.
    pub fn execute(mut self) -> crate::Result<DistributionReport> {
        let DistributeParams {
            order_id,
            purchaser,
            order_amount,
            now,
        } = self.params;

        if order_amount <= Decimal::ZERO {
            return Err(Error::InvalidArgument("non-positive order amount"));
        }

        // Idempotency boundary: an existing completed receipt wins.
        if let Some(existing) = self.store.find_by_order(order_id)? {
            if existing.is_completed() {
                return Ok(DistributionReport {
                    transaction: existing,
                    placement: None,
                    already_processed: true,
                });
            }
        }

        // A missing purchaser is fatal; missing referrers and ancestors
        // degrade to trust-fund redirects instead.
        let buyer = self.store.expect(purchaser)?;

        // Placement trigger. Eligibility is governed by the placement state
        // and the threshold, not the first-purchase flag, so an order below
        // the threshold defers placement until a later qualifying purchase
        // instead of skipping it forever.
        let placement = if !buyer.is_placed() && order_amount >= *self.settings.min_placement_amount()
        {
            Some(PlaceInTree::new(&mut self.store, purchaser).execute()?)
        } else {
            None
        };
        if !buyer.first_purchase_done() {
            self.store.mark_first_purchase(purchaser, now)?;
        }
        let buyer = self.store.expect(purchaser)?;

        let mut transaction = CommissionTransaction::builder()
            .order(order_id)
            .purchaser(purchaser)
            .order_amount(order_amount)
            .created_at(now)
            .build();

        match self.split(&buyer, &mut transaction) {
            Ok(()) => {
                transaction.mark_completed()?;
                self.store.insert_transaction(transaction.clone())?;
                Ok(DistributionReport {
                    transaction,
                    placement,
                    already_processed: false,
                })
            }
            Err(err) => {
                transaction.mark_failed()?;
                self.store.insert_transaction(transaction)?;
                Err(err)
            }
        }
    }

    /// Split the allocation pool across trust, direct referrer, tree
    /// ancestors and the development fund.
    fn split(
        &mut self,
        buyer: &Participant,
        transaction: &mut CommissionTransaction,
    ) -> crate::Result<()> {
        let amount = *transaction.order_amount();
        let order_id = transaction.order();
        let now = transaction.created_at();

        // Unconditional trust-fund allocation.
        let trust_amount = apply_percent(&amount, self.settings.trust_percent())
            .ok_or(Error::Computation("calculating trust allocation"))?;
        self.store.credit_fund(
            FundKind::Trust,
            &trust_amount,
            order_id,
            CreditReason::BaseAllocation,
            "base trust allocation",
            now,
        )?;
        transaction.set_trust_fund_amount(trust_amount);

        // Direct commission: an absent, unresolvable or suspended referrer
        // redirects the amount to the trust fund.
        let direct_amount = apply_percent(&amount, self.settings.direct_percent())
            .ok_or(Error::Computation("calculating direct commission"))?;
        match self.store.resolve_referrer(buyer)? {
            Some(referrer) if !referrer.is_suspended() => {
                self.store
                    .credit_wallet(referrer.id(), &direct_amount, CommissionKind::Direct)?;
                transaction.set_direct(Some(referrer.id()), direct_amount, false);
            }
            referrer => {
                self.store.credit_fund(
                    FundKind::Trust,
                    &direct_amount,
                    order_id,
                    CreditReason::DirectRedirect,
                    "direct commission with no eligible recipient",
                    now,
                )?;
                transaction.set_direct(referrer.map(|r| r.id()), direct_amount, true);
            }
        }

        // Tree-commission walk over tree ancestry (not the referral chain).
        // An unplaced buyer walks from the placed referrer, the would-be
        // attachment point; a placed buyer with no parent is the root and
        // has no ancestors to pay.
        let mut cursor = if buyer.is_placed() {
            buyer.tree_parent()
        } else {
            self.store
                .resolve_referrer(buyer)?
                .filter(Participant::is_placed)
                .map(|referrer| referrer.id())
        };
        let mut pool = apply_percent(&amount, &self.settings.tree_pool_percent()?)
            .ok_or(Error::Computation("calculating tree pool"))?;

        for (index, percent) in self.settings.tree_level_percents().iter().enumerate() {
            if pool < TOLERANCE {
                break;
            }
            let Some(ancestor_id) = cursor else {
                break;
            };
            let level = (index as u32)
                .checked_add(1)
                .ok_or(Error::Computation("computing walk level"))?;
            let level_amount = apply_percent(&amount, percent)
                .ok_or(Error::Computation("calculating level commission"))?;

            let Some(ancestor) = self.store.find(ancestor_id)? else {
                // Broken chain: redirect this level and stop the walk.
                self.store.credit_fund(
                    FundKind::Trust,
                    &level_amount,
                    order_id,
                    CreditReason::TreeRedirect,
                    "unresolvable tree ancestor",
                    now,
                )?;
                transaction.push_tree_entry(
                    TreeCommissionEntry::builder()
                        .recipient(ancestor_id)
                        .level(level)
                        .percent(*percent)
                        .amount(level_amount)
                        .redirected_to(RedirectTarget::TrustFund)
                        .build(),
                );
                pool = pool
                    .checked_sub(level_amount)
                    .ok_or(Error::Computation("consuming tree pool"))?;
                break;
            };

            let redirected_to = self.route_tree_amount(&ancestor, &level_amount, order_id, now)?;
            let entry = TreeCommissionEntry::builder()
                .recipient(ancestor_id)
                .level(level)
                .percent(*percent)
                .amount(level_amount);
            transaction.push_tree_entry(match redirected_to {
                Some(target) => entry.redirected_to(target).build(),
                None => entry.build(),
            });

            pool = pool
                .checked_sub(level_amount)
                .ok_or(Error::Computation("consuming tree pool"))?;
            cursor = ancestor.tree_parent();
        }

        // Development fund: its own percentage plus whatever the walk left
        // unconsumed.
        let development_amount = apply_percent(&amount, self.settings.development_percent())
            .ok_or(Error::Computation("calculating development allocation"))?;
        self.store.credit_fund(
            FundKind::Development,
            &development_amount,
            order_id,
            CreditReason::Development,
            "development allocation",
            now,
        )?;
        self.store.credit_fund(
            FundKind::Development,
            &pool,
            order_id,
            CreditReason::Remainder,
            "unconsumed tree pool",
            now,
        )?;
        transaction.set_development(development_amount, pool);

        // Reconciliation: every allocated amount must add up to the
        // configured share of the order.
        let allocated = transaction.allocated_total()?;
        let expected = apply_percent(&amount, &self.settings.total_allocation_percent()?)
            .ok_or(Error::Computation("calculating expected allocation"))?;
        let difference = allocated
            .checked_sub(expected)
            .ok_or(Error::Computation("reconciling allocation"))?
            .abs();
        if difference > TOLERANCE {
            tracing::error!(
                order = %order_id,
                %allocated,
                %expected,
                "commission allocation does not reconcile"
            );
            return Err(Error::InvariantViolation(
                "allocated amounts do not reconcile with the configured total",
            ));
        }
        Ok(())
    }

    /// Route one tree-walk amount to its concrete target: the ancestor's
    /// wallet, a virtual participant's owner, or the trust fund. Returns
    /// the redirect annotation for the receipt.
    fn route_tree_amount(
        &mut self,
        ancestor: &Participant,
        level_amount: &Decimal,
        order_id: OrderId,
        now: i64,
    ) -> crate::Result<Option<RedirectTarget>> {
        if ancestor.is_suspended() {
            self.store.credit_fund(
                FundKind::Trust,
                level_amount,
                order_id,
                CreditReason::TreeRedirect,
                "suspended tree ancestor",
                now,
            )?;
            return Ok(Some(RedirectTarget::TrustFund));
        }
        match ancestor.kind() {
            ParticipantKind::Real => {
                self.store
                    .credit_wallet(ancestor.id(), level_amount, CommissionKind::Tree)?;
                Ok(None)
            }
            ParticipantKind::Virtual { owner } => match self.store.find(owner)? {
                Some(owner) if !owner.is_suspended() => {
                    self.store
                        .credit_wallet(owner.id(), level_amount, CommissionKind::Tree)?;
                    Ok(Some(RedirectTarget::Owner(owner.id())))
                }
                _ => {
                    self.store.credit_fund(
                        FundKind::Trust,
                        level_amount,
                        order_id,
                        CreditReason::TreeRedirect,
                        "virtual participant with no resolvable owner",
                        now,
                    )?;
                    Ok(Some(RedirectTarget::TrustFund))
                }
            },
        }
    }
}
