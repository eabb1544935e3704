//! Fixed-rate commission arithmetic.
//!
//! Commission is computed from attributed revenue with pure integer
//! arithmetic: the rate is carried in basis points and the result is
//! rounded half-up. The same revenue and rate always produce the same
//! commission, on every platform.

use suds_types::{Cents, BPS_DENOMINATOR};

use crate::{LedgerError, Result};

/// Commission owed on `revenue_cents` at `rate_bps` basis points,
/// rounded half-up to the nearest cent.
///
/// # Errors
///
/// - [`LedgerError::Overflow`] if the intermediate product overflows `i64`
pub fn commission_for(revenue_cents: Cents, rate_bps: i64) -> Result<Cents> {
    let scaled = revenue_cents
        .checked_mul(rate_bps)
        .and_then(|product| product.checked_add(BPS_DENOMINATOR / 2))
        .ok_or(LedgerError::Overflow)?;
    Ok(scaled / BPS_DENOMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use suds_types::COMMISSION_RATE_BPS;

    #[test]
    fn test_ten_percent_of_12500() {
        assert_eq!(commission_for(12_500, COMMISSION_RATE_BPS).expect("commission"), 1_250);
    }

    #[test]
    fn test_zero_revenue() {
        assert_eq!(commission_for(0, COMMISSION_RATE_BPS).expect("commission"), 0);
    }

    #[test]
    fn test_exact_half_rounds_up() {
        // 25 cents at 10% is 2.5 cents.
        assert_eq!(commission_for(25, COMMISSION_RATE_BPS).expect("commission"), 3);
        // 15 cents at 10% is 1.5 cents.
        assert_eq!(commission_for(15, COMMISSION_RATE_BPS).expect("commission"), 2);
    }

    #[test]
    fn test_below_half_rounds_down() {
        // 14 cents at 10% is 1.4 cents.
        assert_eq!(commission_for(14, COMMISSION_RATE_BPS).expect("commission"), 1);
        // 4 cents at 10% is 0.4 cents.
        assert_eq!(commission_for(4, COMMISSION_RATE_BPS).expect("commission"), 0);
    }

    #[test]
    fn test_full_rate() {
        assert_eq!(commission_for(12_500, 10_000).expect("commission"), 12_500);
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(matches!(
            commission_for(i64::MAX, COMMISSION_RATE_BPS),
            Err(LedgerError::Overflow)
        ));
    }
}
