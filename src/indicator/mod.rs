pub mod sma;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::Overflow;

/// Decimal places kept for `change` and `change_percent`.
pub const MONEY_DP: u32 = 2;

/// Round to cents using banker's rounding (midpoint to even).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointNearestEven)
}

/// Unweighted mean of open, high, low and last price.
pub fn typical_price(
    open: Decimal,
    high: Decimal,
    low: Decimal,
    price: Decimal,
) -> Result<Decimal, Overflow> {
    let sum = open
        .checked_add(high)
        .and_then(|s| s.checked_add(low))
        .and_then(|s| s.checked_add(price))
        .ok_or(Overflow("moving_average"))?;
    let mean = sum
        .checked_div(Decimal::from(4u32))
        .ok_or(Overflow("moving_average"))?;
    Ok(mean.normalize())
}
