use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{CarneError, Result};

/// process-wide accrual rates, validated at construction
///
/// Passed explicitly into the accrual engine rather than read from ambient
/// globals, so tests can inject deterministic rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// one-shot late fee as a fraction of the outstanding principal
    fine: Rate,
    /// monthly interest, pro-rated daily over a 30-day commercial month
    monthly_interest: Rate,
}

impl AccrualConfig {
    /// create from percentage figures (e.g., 2 and 3 for 2% fine, 3%/month)
    pub fn new(fine_percent: Decimal, monthly_interest_percent: Decimal) -> Result<Self> {
        let fine = Rate::from_percentage(fine_percent);
        let monthly_interest = Rate::from_percentage(monthly_interest_percent);

        if fine.is_negative() {
            return Err(CarneError::InvalidRate { rate: fine });
        }
        if monthly_interest.is_negative() {
            return Err(CarneError::InvalidRate { rate: monthly_interest });
        }

        Ok(Self { fine, monthly_interest })
    }

    /// common retail terms: 2% fine plus 3% monthly interest
    pub fn retail_default() -> Self {
        Self {
            fine: Rate::from_percentage(dec!(2)),
            monthly_interest: Rate::from_percentage(dec!(3)),
        }
    }

    /// no fine, no interest; overdue installments keep their face value
    pub fn interest_free() -> Self {
        Self {
            fine: Rate::ZERO,
            monthly_interest: Rate::ZERO,
        }
    }

    pub fn fine_rate(&self) -> Rate {
        self.fine
    }

    pub fn monthly_interest_rate(&self) -> Rate {
        self.monthly_interest
    }

    /// daily interest rate over the 30-day commercial month
    pub fn daily_interest_rate(&self) -> Rate {
        self.monthly_interest.daily_from_monthly()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_rates() {
        let config = AccrualConfig::new(dec!(2), dec!(3)).unwrap();
        assert_eq!(config.fine_rate().as_percentage(), dec!(2));
        assert_eq!(config.daily_interest_rate().as_decimal(), dec!(0.001));
    }

    #[test]
    fn test_zero_rates_allowed() {
        let config = AccrualConfig::new(dec!(0), dec!(0)).unwrap();
        assert_eq!(config, AccrualConfig::interest_free());
    }

    #[test]
    fn test_negative_rates_rejected() {
        assert!(AccrualConfig::new(dec!(-1), dec!(3)).is_err());
        assert!(AccrualConfig::new(dec!(2), dec!(-0.5)).is_err());
    }

    #[test]
    fn test_retail_default_matches_explicit() {
        let explicit = AccrualConfig::new(dec!(2), dec!(3)).unwrap();
        assert_eq!(explicit, AccrualConfig::retail_default());
    }
}
