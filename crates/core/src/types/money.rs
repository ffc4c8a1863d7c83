//! Invoice and voucher arithmetic using decimal amounts (VND).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Invalid line input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("quantity must be greater than 0")]
    NonPositiveQuantity,
    #[error("unit price must not be negative")]
    NegativePrice,
    #[error("VAT rate must be between 0 and 100")]
    InvalidVatRate,
    #[error("total amount must be greater than 0")]
    NonPositiveTotal,
    #[error("amount is too large")]
    Overflow,
}

/// Round to whole đồng, halves away from zero.
#[must_use]
pub fn round_vnd(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// `a × b`, failing instead of overflowing.
///
/// # Errors
///
/// Returns [`MoneyError::Overflow`] when the product does not fit.
pub fn checked_product(a: Decimal, b: Decimal) -> Result<Decimal, MoneyError> {
    a.checked_mul(b).ok_or(MoneyError::Overflow)
}

/// Amount and VAT of a single invoice line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    pub amount: Decimal,
    pub vat_amount: Decimal,
}

/// Compute a line's amount (`quantity × unit_price`) and VAT
/// (`amount × rate / 100`), both rounded to whole đồng.
///
/// # Errors
///
/// Rejects a non-positive quantity, a negative price, a VAT rate outside
/// 0..=100 and amounts too large to represent.
pub fn line_amounts(
    quantity: Decimal,
    unit_price: Decimal,
    vat_rate: Option<Decimal>,
) -> Result<LineAmounts, MoneyError> {
    if quantity <= Decimal::ZERO {
        return Err(MoneyError::NonPositiveQuantity);
    }
    if unit_price < Decimal::ZERO {
        return Err(MoneyError::NegativePrice);
    }
    let rate = vat_rate.unwrap_or(Decimal::ZERO);
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(MoneyError::InvalidVatRate);
    }
    let amount = round_vnd(checked_product(quantity, unit_price)?);
    let vat_amount = checked_product(amount, rate)?
        .checked_div(Decimal::ONE_HUNDRED)
        .map(round_vnd)
        .ok_or(MoneyError::Overflow)?;
    Ok(LineAmounts { amount, vat_amount })
}

/// Invoice header totals derived from its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl InvoiceTotals {
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if a sum does not fit.
    pub fn from_lines<'a, I>(lines: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = &'a LineAmounts>,
    {
        let (subtotal_amount, tax_amount) = lines.into_iter().try_fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(sub, tax), line| {
                Some((
                    sub.checked_add(line.amount)?,
                    tax.checked_add(line.vat_amount)?,
                ))
            },
        ).ok_or(MoneyError::Overflow)?;
        Ok(Self {
            subtotal_amount,
            tax_amount,
            total_amount: subtotal_amount
                .checked_add(tax_amount)
                .ok_or(MoneyError::Overflow)?,
        })
    }
}

/// Sum voucher items, which must come to a positive total.
///
/// # Errors
///
/// Returns [`MoneyError::NonPositiveTotal`] if the sum is zero or negative
/// and [`MoneyError::Overflow`] if it does not fit.
pub fn voucher_total<I>(amounts: I) -> Result<Decimal, MoneyError>
where
    I: IntoIterator<Item = Decimal>,
{
    let total = amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or(MoneyError::Overflow)?;
    if total <= Decimal::ZERO {
        return Err(MoneyError::NonPositiveTotal);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("decimal")
    }

    #[test]
    fn test_line_amounts_with_vat() {
        let line = line_amounts(dec("2"), dec("150000"), Some(dec("10"))).expect("line");
        assert_eq!(line.amount, dec("300000"));
        assert_eq!(line.vat_amount, dec("30000"));
    }

    #[test]
    fn test_line_amounts_without_vat() {
        let line = line_amounts(dec("65.5"), dec("12000"), None).expect("line");
        assert_eq!(line.amount, dec("786000"));
        assert_eq!(line.vat_amount, Decimal::ZERO);
    }

    #[test]
    fn test_line_amounts_rejects_bad_input() {
        assert_eq!(
            line_amounts(Decimal::ZERO, dec("1"), None),
            Err(MoneyError::NonPositiveQuantity)
        );
        assert_eq!(
            line_amounts(dec("1"), dec("-1"), None),
            Err(MoneyError::NegativePrice)
        );
        assert_eq!(
            line_amounts(dec("1"), dec("1"), Some(dec("101"))),
            Err(MoneyError::InvalidVatRate)
        );
    }

    #[test]
    fn test_totals_sum_lines() {
        let lines = [
            line_amounts(dec("1"), dec("100000"), Some(dec("8"))).expect("line"),
            line_amounts(dec("3"), dec("20000"), None).expect("line"),
        ];
        let totals = InvoiceTotals::from_lines(&lines).expect("totals");
        assert_eq!(totals.subtotal_amount, dec("160000"));
        assert_eq!(totals.tax_amount, dec("8000"));
        assert_eq!(totals.total_amount, dec("168000"));
        assert_eq!(InvoiceTotals::from_lines(&[]), Ok(InvoiceTotals::default()));
    }

    #[test]
    fn test_line_amounts_overflow_is_an_error() {
        assert_eq!(
            line_amounts(dec("100000000000000"), dec("100000000000000"), Some(dec("10"))),
            Err(MoneyError::Overflow)
        );
        assert_eq!(
            line_amounts(dec("1000000000000000"), dec("1000000000000000"), None),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_totals_overflow_is_an_error() {
        let big = LineAmounts {
            amount: Decimal::MAX,
            vat_amount: Decimal::ZERO,
        };
        assert_eq!(
            InvoiceTotals::from_lines(&[big, big]),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn test_halves_round_away_from_zero() {
        let line = line_amounts(dec("0.5"), dec("5"), Some(dec("10"))).expect("line");
        assert_eq!(line.amount, dec("3"));
        assert_eq!(line.vat_amount, Decimal::ZERO);

        let line = line_amounts(dec("1"), dec("25"), Some(dec("10"))).expect("line");
        assert_eq!(line.vat_amount, dec("3"));
        assert_eq!(round_vnd(dec("4.5")), dec("5"));
        assert_eq!(round_vnd(dec("-4.5")), dec("-5"));
    }

    #[test]
    fn test_voucher_total() {
        assert_eq!(voucher_total([dec("10"), dec("5")]), Ok(dec("15")));
        assert_eq!(voucher_total([]), Err(MoneyError::NonPositiveTotal));
        assert_eq!(
            voucher_total([Decimal::MAX, dec("1")]),
            Err(MoneyError::Overflow)
        );
    }
}
