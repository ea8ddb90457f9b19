use rust_decimal::Decimal;

/// Reconciliation and pool-depletion tolerance, in currency units (`0.01`).
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Apply a percentage to an amount.
///
/// Returns `None` if the computation fails.
pub fn apply_percent(amount: &Decimal, percent: &Decimal) -> Option<Decimal> {
    amount
        .checked_mul(*percent)?
        .checked_div(Decimal::ONE_HUNDRED)
}
