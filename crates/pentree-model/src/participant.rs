use std::fmt;

use rust_decimal::Decimal;
use typed_builder::TypedBuilder;

use crate::Error;

/// Max number of direct children a placed participant can hold.
pub const MAX_TREE_CHILDREN: usize = 5;

/// Hard bound on tree traversal depth, both for the ancestor climb and the
/// breadth-first placement search.
pub const MAX_PLACEMENT_DEPTH: u32 = 20;

/// Participant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// Create a participant id from its raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ParticipantId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParticipantKind {
    /// A real, human-owned account.
    Real,
    /// A placeholder node with no independent identity whose earned
    /// commissions redirect to its owner.
    Virtual {
        /// The owning participant.
        owner: ParticipantId,
    },
}

/// The kind of wallet commission credits, selecting which accumulator the
/// credit updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::TryFromPrimitive)]
#[cfg_attr(
    feature = "strum",
    derive(strum::EnumIter, strum::EnumString, strum::Display)
)]
#[cfg_attr(feature = "strum", strum(serialize_all = "snake_case"))]
#[repr(u8)]
pub enum CommissionKind {
    /// Direct referral commission.
    Direct,
    /// Tree-ancestry commission.
    Tree,
}

/// A slot in the capped-fanout tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    /// The winning parent, or `None` for the tree root.
    pub parent: Option<ParticipantId>,
    /// Tree level. The root's level is `1`.
    pub level: u32,
    /// 0-indexed position among the parent's children.
    pub position: u32,
}

/// A participant record in the user directory.
///
/// Tree membership is stored as identifiers (an arena of records), never as
/// embedded participants; traversal is explicit and bounded by
/// [`MAX_PLACEMENT_DEPTH`].
#[derive(Debug, Clone, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Participant {
    id: ParticipantId,
    #[builder(setter(into))]
    referral_code: String,
    #[builder(default, setter(strip_option, into))]
    referred_by: Option<String>,
    #[builder(default = Decimal::ZERO)]
    wallet_balance: Decimal,
    #[builder(default)]
    tree_parent: Option<ParticipantId>,
    #[builder(default)]
    tree_children: Vec<ParticipantId>,
    #[builder(default = 0)]
    tree_level: u32,
    #[builder(default = 0)]
    tree_position: u32,
    #[builder(default = false)]
    first_purchase_done: bool,
    #[builder(default)]
    first_purchase_at: Option<i64>,
    #[builder(default = Decimal::ZERO)]
    direct_commission_earned: Decimal,
    #[builder(default = Decimal::ZERO)]
    tree_commission_earned: Decimal,
    #[builder(default = false)]
    suspended: bool,
    #[builder(default = ParticipantKind::Real)]
    kind: ParticipantKind,
}

impl Participant {
    /// Get the id.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Get the referral code.
    pub fn referral_code(&self) -> &str {
        &self.referral_code
    }

    /// Get the referral code of the referrer, if any.
    pub fn referred_by(&self) -> Option<&str> {
        self.referred_by.as_deref()
    }

    /// Get the wallet balance.
    pub fn wallet_balance(&self) -> &Decimal {
        &self.wallet_balance
    }

    /// Get the tree parent.
    pub fn tree_parent(&self) -> Option<ParticipantId> {
        self.tree_parent
    }

    /// Get the tree children, ordered by position.
    pub fn tree_children(&self) -> &[ParticipantId] {
        &self.tree_children
    }

    /// Get the tree level. `0` means not yet placed.
    pub fn tree_level(&self) -> u32 {
        self.tree_level
    }

    /// Get the position among siblings.
    pub fn tree_position(&self) -> u32 {
        self.tree_position
    }

    /// Get whether the first purchase has been consumed.
    pub fn first_purchase_done(&self) -> bool {
        self.first_purchase_done
    }

    /// Get the first purchase timestamp (unix seconds), the tree ordering
    /// key.
    pub fn first_purchase_at(&self) -> Option<i64> {
        self.first_purchase_at
    }

    /// Get the accumulated direct commission.
    pub fn direct_commission_earned(&self) -> &Decimal {
        &self.direct_commission_earned
    }

    /// Get the accumulated tree commission.
    pub fn tree_commission_earned(&self) -> &Decimal {
        &self.tree_commission_earned
    }

    /// Get whether the participant is suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Get the participant kind.
    pub fn kind(&self) -> ParticipantKind {
        self.kind
    }

    /// Get whether the participant is a virtual placeholder.
    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, ParticipantKind::Virtual { .. })
    }

    /// Get whether the participant is tree-placed.
    pub fn is_placed(&self) -> bool {
        self.tree_level > 0
    }

    /// Get whether the participant can take another child.
    pub fn has_free_slot(&self) -> bool {
        self.tree_children.len() < MAX_TREE_CHILDREN
    }

    /// Get the placement of a placed participant.
    pub fn placement(&self) -> Option<Placement> {
        self.is_placed().then_some(Placement {
            parent: self.tree_parent,
            level: self.tree_level,
            position: self.tree_position,
        })
    }

    /// Credit the wallet, updating the accumulator selected by `kind`.
    ///
    /// Credits are non-negative by contract; amounts with no eligible
    /// recipient flow to the trust fund instead of a wallet.
    pub fn credit_wallet(&mut self, amount: &Decimal, kind: CommissionKind) -> crate::Result<()> {
        if amount.is_sign_negative() {
            return Err(Error::InvalidArgument("negative wallet credit"));
        }
        self.wallet_balance = self
            .wallet_balance
            .checked_add(*amount)
            .ok_or(Error::Computation("crediting wallet"))?;
        let accumulator = match kind {
            CommissionKind::Direct => &mut self.direct_commission_earned,
            CommissionKind::Tree => &mut self.tree_commission_earned,
        };
        *accumulator = accumulator
            .checked_add(*amount)
            .ok_or(Error::Computation("accumulating commission"))?;
        Ok(())
    }

    /// Append a child, returning its 0-indexed position.
    pub fn push_child(&mut self, child: ParticipantId) -> crate::Result<u32> {
        if !self.has_free_slot() {
            return Err(Error::InvariantViolation("tree fanout cap exceeded"));
        }
        let position = self.tree_children.len() as u32;
        self.tree_children.push(child);
        Ok(position)
    }

    /// Set the tree placement. Placement is permanent; a second call is an
    /// invariant violation.
    pub fn set_placement(&mut self, placement: &Placement) -> crate::Result<()> {
        if self.is_placed() {
            return Err(Error::InvariantViolation("participant already tree-placed"));
        }
        if placement.level == 0 {
            return Err(Error::InvalidArgument("placement level must be positive"));
        }
        self.tree_parent = placement.parent;
        self.tree_level = placement.level;
        self.tree_position = placement.position;
        Ok(())
    }

    /// Set the suspension flag.
    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    /// Consume the first-purchase semantic, recording the timestamp on the
    /// first call only.
    pub fn mark_first_purchase(&mut self, at: i64) {
        if !self.first_purchase_done {
            self.first_purchase_done = true;
            self.first_purchase_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn participant() -> Participant {
        Participant::builder()
            .id(ParticipantId::new(1))
            .referral_code("PENT-0001")
            .build()
    }

    #[test]
    fn wallet_credit_updates_the_matching_accumulator() -> crate::Result<()> {
        let mut p = participant();
        p.credit_wallet(&dec!(60), CommissionKind::Direct)?;
        p.credit_wallet(&dec!(7.5), CommissionKind::Tree)?;
        assert_eq!(*p.wallet_balance(), dec!(67.5));
        assert_eq!(*p.direct_commission_earned(), dec!(60));
        assert_eq!(*p.tree_commission_earned(), dec!(7.5));
        Ok(())
    }

    #[test]
    fn negative_wallet_credit_is_rejected() {
        let mut p = participant();
        assert!(matches!(
            p.credit_wallet(&dec!(-1), CommissionKind::Direct),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(*p.wallet_balance(), Decimal::ZERO);
    }

    #[test]
    fn fanout_is_capped_at_five() -> crate::Result<()> {
        let mut p = participant();
        for child in 0..MAX_TREE_CHILDREN as u64 {
            let position = p.push_child(ParticipantId::new(10 + child))?;
            assert_eq!(position, child as u32);
        }
        assert!(!p.has_free_slot());
        assert!(matches!(
            p.push_child(ParticipantId::new(99)),
            Err(Error::InvariantViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn placement_is_permanent() -> crate::Result<()> {
        let mut p = participant();
        let placement = Placement {
            parent: Some(ParticipantId::new(7)),
            level: 2,
            position: 3,
        };
        p.set_placement(&placement)?;
        assert_eq!(p.placement(), Some(placement));
        assert!(matches!(
            p.set_placement(&placement),
            Err(Error::InvariantViolation(_))
        ));
        Ok(())
    }

    #[test]
    fn first_purchase_timestamp_is_recorded_once() {
        let mut p = participant();
        p.mark_first_purchase(100);
        p.mark_first_purchase(200);
        assert!(p.first_purchase_done());
        assert_eq!(p.first_purchase_at(), Some(100));
    }
}
