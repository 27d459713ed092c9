use rust_decimal::Decimal;

use crate::error::Overflow;

/// Simple moving average of the last `period` values.
///
/// Returns `Decimal::ZERO` when fewer than `period` values are available (or
/// when `period` is zero). The zero is a sentinel for "not enough data" and
/// must never be compared as if it were a real average; callers gate on
/// [`has_enough`] or the window length first.
pub fn sma(values: &[Decimal], period: usize) -> Result<Decimal, Overflow> {
    if period == 0 || values.len() < period {
        return Ok(Decimal::ZERO);
    }
    let sum = values[values.len() - period..]
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
        .ok_or(Overflow("sma"))?;
    sum.checked_div(Decimal::from(period as u64))
        .ok_or(Overflow("sma"))
}

pub fn has_enough(values: &[Decimal], period: usize) -> bool {
    period > 0 && values.len() >= period
}
