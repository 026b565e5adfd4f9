use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::AccrualConfig;
use crate::decimal::Money;
use crate::state::Installment;
use crate::types::InstallmentStatus;

/// engine recomputing an installment's fine, interest, balance, and status
///
/// `refresh` is idempotent: a second call with the same "today" and no
/// intervening payment writes nothing further.
pub struct AccrualEngine {
    config: AccrualConfig,
}

impl AccrualEngine {
    pub fn new(config: AccrualConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AccrualConfig {
        &self.config
    }

    /// bring one installment current as of `today`
    ///
    /// Returns whether any field was written, so batch callers can skip
    /// persisting untouched rows.
    pub fn refresh(&self, installment: &mut Installment, today: NaiveDate) -> bool {
        // settled and cancelled installments are closed with respect to
        // accrual; clear any stray prior figure and exit
        if installment.status.is_closed() {
            if installment.accrued.is_zero() && installment.last_applied_accrued.is_zero() {
                return false;
            }
            installment.zero_accrual();
            installment.balance = installment.balance.min(installment.principal_outstanding());
            return true;
        }

        let mut changed = false;
        let principal = installment.principal_outstanding();

        if installment.due_date < today {
            let new_accrued = self.compute_accrual(principal, installment.due_date, today);

            // only rewrite when the figure actually moved
            if new_accrued != installment.last_applied_accrued {
                installment.accrued = new_accrued;
                installment.last_applied_accrued = new_accrued;
                changed = true;
            }
        }

        let new_balance = (principal + installment.accrued).clamp_zero_band();
        if new_balance != installment.balance {
            installment.balance = new_balance;
            changed = true;
        }

        let new_status = self.derive_status(installment, today);
        if new_status != installment.status {
            installment.status = new_status;
            changed = true;
        }

        // settlement closes the accrual; the balance is already zero here
        if new_status.is_settled()
            && !(installment.accrued.is_zero() && installment.last_applied_accrued.is_zero())
        {
            installment.zero_accrual();
            changed = true;
        }

        changed
    }

    /// fine plus daily pro-rated interest on the outstanding principal
    fn compute_accrual(&self, principal: Money, due_date: NaiveDate, today: NaiveDate) -> Money {
        if principal.is_zero() {
            return Money::ZERO;
        }

        let days_late = (today - due_date).num_days();
        let fine = principal * self.config.fine_rate().as_decimal();
        let interest = Money::from_decimal(
            principal.as_decimal()
                * self.config.daily_interest_rate().as_decimal()
                * Decimal::from(days_late),
        );

        fine + interest
    }

    fn derive_status(&self, installment: &Installment, today: NaiveDate) -> InstallmentStatus {
        if !installment.balance.is_positive() {
            // settled; late iff full payment landed after the due date
            let settled_on = installment.full_payment_date.unwrap_or(today);
            if settled_on > installment.due_date {
                InstallmentStatus::PaidLate
            } else {
                InstallmentStatus::Paid
            }
        } else if installment.due_date < today {
            InstallmentStatus::Overdue
        } else if installment.status == InstallmentStatus::Renegotiated {
            // renegotiated terms stand until settled or overdue
            InstallmentStatus::Renegotiated
        } else if installment.amount_paid.is_positive() {
            InstallmentStatus::PartiallyPaid
        } else {
            InstallmentStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use uuid::Uuid;

    fn engine() -> AccrualEngine {
        AccrualEngine::new(AccrualConfig::retail_default())
    }

    fn installment_due(due: NaiveDate) -> Installment {
        Installment::new(Uuid::new_v4(), 1, Money::from_major(300), due)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_thirty_days_late() {
        // 2% fine = 6.00, 3%/month over 30 days on 300.00 = 9.00
        let mut inst = installment_due(date(2024, 1, 10));
        let changed = engine().refresh(&mut inst, date(2024, 2, 9));

        assert!(changed);
        assert_eq!(inst.accrued, Money::from_str_exact("15.00").unwrap());
        assert_eq!(inst.balance, Money::from_str_exact("315.00").unwrap());
        assert_eq!(inst.status, InstallmentStatus::Overdue);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let mut inst = installment_due(date(2024, 1, 10));
        let today = date(2024, 2, 9);

        assert!(engine().refresh(&mut inst, today));
        let snapshot = inst.clone();
        assert!(!engine().refresh(&mut inst, today));

        assert_eq!(inst.accrued, snapshot.accrued);
        assert_eq!(inst.balance, snapshot.balance);
        assert_eq!(inst.status, snapshot.status);
    }

    #[test]
    fn test_accrual_grows_with_time() {
        let mut inst = installment_due(date(2024, 1, 10));
        let eng = engine();

        eng.refresh(&mut inst, date(2024, 2, 9));
        let first = inst.accrued;
        assert!(eng.refresh(&mut inst, date(2024, 2, 10)));
        assert!(inst.accrued > first);
    }

    #[test]
    fn test_not_yet_due_accrues_nothing() {
        let mut inst = installment_due(date(2024, 1, 10));
        engine().refresh(&mut inst, date(2024, 1, 10));

        assert_eq!(inst.accrued, Money::ZERO);
        assert_eq!(inst.balance, Money::from_major(300));
        assert_eq!(inst.status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_partial_payment_before_due() {
        let mut inst = installment_due(date(2024, 1, 10));
        inst.amount_paid = Money::from_major(100);

        engine().refresh(&mut inst, date(2024, 1, 5));
        assert_eq!(inst.status, InstallmentStatus::PartiallyPaid);
        assert_eq!(inst.balance, Money::from_major(200));
    }

    #[test]
    fn test_interest_charged_on_outstanding_principal_only() {
        let mut inst = installment_due(date(2024, 1, 10));
        inst.amount_paid = Money::from_major(100);

        engine().refresh(&mut inst, date(2024, 2, 9));
        // fine 4.00 + interest 200 * 0.001 * 30 = 6.00
        assert_eq!(inst.accrued, Money::from_str_exact("10.00").unwrap());
        assert_eq!(inst.balance, Money::from_str_exact("210.00").unwrap());
    }

    #[test]
    fn test_no_negative_interest_on_over_payment() {
        let mut inst = installment_due(date(2024, 1, 10));
        inst.amount_paid = Money::from_major(350);

        engine().refresh(&mut inst, date(2024, 2, 9));
        assert_eq!(inst.accrued, Money::ZERO);
        assert_eq!(inst.balance, Money::ZERO);
        assert!(inst.status.is_settled());
    }

    #[test]
    fn test_settlement_on_time_vs_late() {
        let due = date(2024, 1, 10);

        let mut on_time = installment_due(due);
        on_time.amount_paid = Money::from_major(300);
        on_time.full_payment_date = Some(date(2024, 1, 8));
        engine().refresh(&mut on_time, date(2024, 2, 9));
        assert_eq!(on_time.status, InstallmentStatus::Paid);

        let mut late = installment_due(due);
        late.amount_paid = Money::from_major(300);
        late.full_payment_date = Some(date(2024, 1, 20));
        engine().refresh(&mut late, date(2024, 2, 9));
        assert_eq!(late.status, InstallmentStatus::PaidLate);
    }

    #[test]
    fn test_closed_installment_clears_stray_accrual() {
        let mut inst = installment_due(date(2024, 1, 10));
        engine().refresh(&mut inst, date(2024, 2, 9));
        assert!(inst.accrued.is_positive());

        inst.status = InstallmentStatus::Cancelled;
        assert!(engine().refresh(&mut inst, date(2024, 2, 9)));
        assert_eq!(inst.accrued, Money::ZERO);
        assert_eq!(inst.last_applied_accrued, Money::ZERO);
        assert!(!engine().refresh(&mut inst, date(2024, 3, 9)));
    }

    #[test]
    fn test_near_zero_balance_clamped() {
        let mut inst = installment_due(date(2024, 1, 10));
        inst.amount_paid = Money::from_str_exact("299.99").unwrap();

        engine().refresh(&mut inst, date(2024, 1, 5));
        assert_eq!(inst.balance, Money::ZERO);
        assert_eq!(inst.status, InstallmentStatus::Paid);
    }

    #[test]
    fn test_renegotiated_status_preserved_until_overdue() {
        let mut inst = installment_due(date(2024, 3, 10));
        inst.status = InstallmentStatus::Renegotiated;

        engine().refresh(&mut inst, date(2024, 2, 1));
        assert_eq!(inst.status, InstallmentStatus::Renegotiated);

        engine().refresh(&mut inst, date(2024, 3, 11));
        assert_eq!(inst.status, InstallmentStatus::Overdue);
    }

    #[test]
    fn test_interest_free_config() {
        let eng = AccrualEngine::new(AccrualConfig::interest_free());
        let mut inst = installment_due(date(2024, 1, 10));

        eng.refresh(&mut inst, date(2024, 6, 1));
        assert_eq!(inst.accrued, Money::ZERO);
        assert_eq!(inst.balance, Money::from_major(300));
        assert_eq!(inst.status, InstallmentStatus::Overdue);
    }
}
