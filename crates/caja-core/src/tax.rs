//! # Tax Policy
//!
//! The configurable rule converting a sale subtotal into tax.
//!
//! ## Default Policy: Fixed-Rate VAT
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal (cents) ──► tax = subtotal × rate_bps / 10000 ──► total       │
//! │                                                                         │
//! │  Rates are basis points: 1 bps = 0.01%, so 1300 bps = 13% VAT.          │
//! │  Integer math in i128 with half-up rounding; no floats anywhere.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A zero rate is a valid policy (tax-exempt jurisdictions, test setups).

use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 1300 bps = 13%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Tax Policy
// =============================================================================

/// Fixed-rate VAT policy applied by the sale coordinator.
///
/// The coordinator never hard-codes a rate; whoever constructs it decides
/// the policy, and tests exercise zero and non-zero rates alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TaxPolicy {
    rate: TaxRate,
}

impl TaxPolicy {
    /// Creates a policy with the given rate.
    pub const fn new(rate: TaxRate) -> Self {
        TaxPolicy { rate }
    }

    /// A policy that charges no tax.
    pub const fn zero_rated() -> Self {
        TaxPolicy {
            rate: TaxRate::zero(),
        }
    }

    /// Returns the configured rate.
    pub const fn rate(&self) -> TaxRate {
        self.rate
    }

    /// Computes the tax on a subtotal.
    ///
    /// Integer formula: `(subtotal × bps + 5000) / 10000`. The +5000 rounds
    /// half-up; i128 intermediate prevents overflow on large subtotals.
    pub fn tax_for(&self, subtotal: Money) -> Money {
        if self.rate.is_zero() {
            return Money::zero();
        }
        let tax_cents = (subtotal.cents() as i128 * self.rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1300);
        assert_eq!(rate.bps(), 1300);
        assert!((rate.percentage() - 13.0).abs() < 0.001);
    }

    #[test]
    fn test_zero_rated_policy() {
        let policy = TaxPolicy::zero_rated();
        assert_eq!(policy.tax_for(Money::from_cents(5000)), Money::zero());
    }

    #[test]
    fn test_fixed_rate_policy() {
        // $50.00 at 13% = $6.50
        let policy = TaxPolicy::new(TaxRate::from_bps(1300));
        let tax = policy.tax_for(Money::from_cents(5000));
        assert_eq!(tax.cents(), 650);
    }

    #[test]
    fn test_rounding_half_up() {
        // $10.00 at 8.25% = $0.825 -> rounds to $0.83
        let policy = TaxPolicy::new(TaxRate::from_bps(825));
        let tax = policy.tax_for(Money::from_cents(1000));
        assert_eq!(tax.cents(), 83);
    }

    #[test]
    fn test_default_is_zero() {
        let policy = TaxPolicy::default();
        assert!(policy.rate().is_zero());
    }
}
