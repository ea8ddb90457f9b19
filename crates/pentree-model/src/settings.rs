use rust_decimal::Decimal;
use typed_builder::TypedBuilder;

use crate::{participant::MAX_PLACEMENT_DEPTH, Error};

/// Versioned commission settings.
///
/// Internal consistency is enforced by [`validate`](Self::validate) at
/// configuration time; the distribution hot path trusts a validated value.
/// Callers pass settings explicitly per distribution call, so whether to pin
/// a version per order or use the live one is a caller decision.
#[derive(Debug, Clone, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommissionSettings {
    #[builder(default = 1)]
    version: u32,
    /// Percentage of the order amount credited to the direct referrer.
    direct_percent: Decimal,
    /// Percentage allocated to the trust fund unconditionally.
    trust_percent: Decimal,
    /// Percentage allocated to the development fund.
    development_percent: Decimal,
    /// Per-level tree-commission percentages, top ancestor first.
    /// Typically a halving sequence, e.g. `1.5, 0.75, 0.375, ...`.
    tree_level_percents: Vec<Decimal>,
    /// Minimum order amount required to trigger tree placement.
    min_placement_amount: Decimal,
}

impl CommissionSettings {
    /// Get the settings version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Get the direct-commission percentage.
    pub fn direct_percent(&self) -> &Decimal {
        &self.direct_percent
    }

    /// Get the trust-fund percentage.
    pub fn trust_percent(&self) -> &Decimal {
        &self.trust_percent
    }

    /// Get the development-fund percentage.
    pub fn development_percent(&self) -> &Decimal {
        &self.development_percent
    }

    /// Get the per-level tree-commission percentages.
    pub fn tree_level_percents(&self) -> &[Decimal] {
        &self.tree_level_percents
    }

    /// Get the minimum order amount required for tree placement.
    pub fn min_placement_amount(&self) -> &Decimal {
        &self.min_placement_amount
    }

    /// Get the total tree pool percentage (sum of the level table).
    pub fn tree_pool_percent(&self) -> crate::Result<Decimal> {
        self.tree_level_percents
            .iter()
            .try_fold(Decimal::ZERO, |acc, percent| acc.checked_add(*percent))
            .ok_or(Error::Computation("summing tree level percents"))
    }

    /// Get the total percentage of the order amount allocated by one
    /// distribution: direct + trust + development + tree pool.
    pub fn total_allocation_percent(&self) -> crate::Result<Decimal> {
        self.direct_percent
            .checked_add(self.trust_percent)
            .and_then(|acc| acc.checked_add(self.development_percent))
            .ok_or(Error::Computation("summing allocation percents"))?
            .checked_add(self.tree_pool_percent()?)
            .ok_or(Error::Computation("summing allocation percents"))
    }

    /// Validate internal consistency.
    pub fn validate(&self) -> crate::Result<()> {
        if self.direct_percent.is_sign_negative()
            || self.trust_percent.is_sign_negative()
            || self.development_percent.is_sign_negative()
        {
            return Err(Error::InvalidSettings("negative top-level percentage"));
        }
        if self.min_placement_amount.is_sign_negative() {
            return Err(Error::InvalidSettings("negative minimum placement amount"));
        }
        if self.tree_level_percents.is_empty() {
            return Err(Error::InvalidSettings("empty tree level table"));
        }
        if self.tree_level_percents.len() > MAX_PLACEMENT_DEPTH as usize {
            return Err(Error::InvalidSettings(
                "tree level table exceeds the placement depth bound",
            ));
        }
        let mut previous: Option<&Decimal> = None;
        for percent in &self.tree_level_percents {
            if percent.is_sign_negative() {
                return Err(Error::InvalidSettings("negative tree level percentage"));
            }
            if let Some(previous) = previous {
                if percent > previous {
                    return Err(Error::InvalidSettings(
                        "tree level percentages must decay monotonically",
                    ));
                }
            }
            previous = Some(percent);
        }
        if self.total_allocation_percent()? > Decimal::ONE_HUNDRED {
            return Err(Error::InvalidSettings(
                "total allocation exceeds the order amount",
            ));
        }
        Ok(())
    }
}
