use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;

/// unique identifier for a contract (carne)
pub type ContractId = Uuid;

/// unique identifier for an installment (parcela)
pub type InstallmentId = Uuid;

/// unique identifier for a payment receipt
pub type PaymentId = Uuid;

/// unique identifier for the client the contract belongs to
pub type ClientId = Uuid;

/// unique identifier for the user recording a payment
pub type UserId = Uuid;

/// contract status, derived from installment statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    /// contract has open installments, none overdue
    Active,
    /// at least one installment is overdue
    Overdue,
    /// every installment paid or paid late
    Settled,
    /// administratively cancelled, never auto-changed
    Cancelled,
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentStatus {
    /// not yet due, nothing paid
    Pending,
    /// not yet due, partially paid
    PartiallyPaid,
    /// past due date with an open balance
    Overdue,
    /// settled on or before the due date
    Paid,
    /// settled after the due date
    PaidLate,
    /// terms rewritten outside the normal schedule
    Renegotiated,
    /// administratively cancelled
    Cancelled,
}

impl InstallmentStatus {
    /// settled or cancelled installments are closed for accrual
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            InstallmentStatus::Paid | InstallmentStatus::PaidLate | InstallmentStatus::Cancelled
        )
    }

    /// settled one way or the other
    pub fn is_settled(&self) -> bool {
        matches!(self, InstallmentStatus::Paid | InstallmentStatus::PaidLate)
    }
}

/// due-date stepping between installments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentFrequency {
    /// +1 calendar month
    Monthly,
    /// +15 days
    Biweekly,
    /// +3 calendar months
    Quarterly,
    /// one lump installment, no stepping
    Single,
}

/// financial parameters of a contract, compared by value
///
/// Any inequality between the stored terms and a proposed update means the
/// installment schedule must be regenerated, which is only allowed while no
/// payment exists on the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialTerms {
    /// total original sale amount, must be > 0
    pub total_amount: Money,
    /// amount paid up front, 0 <= down_payment <= total_amount
    pub down_payment: Money,
    /// number of installments, meaningful only when fixed_installment
    pub installment_count: u32,
    /// explicit per-installment amount overriding the even division
    pub installment_amount: Option<Money>,
    /// due date of the first installment
    pub first_due_date: NaiveDate,
    pub frequency: PaymentFrequency,
    /// true: evenly divided fixed schedule; false: one lump installment
    pub fixed_installment: bool,
}

impl FinancialTerms {
    /// the amount left to finance after the down payment
    pub fn financed_amount(&self) -> Money {
        self.total_amount - self.down_payment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_statuses() {
        assert!(InstallmentStatus::Paid.is_closed());
        assert!(InstallmentStatus::PaidLate.is_closed());
        assert!(InstallmentStatus::Cancelled.is_closed());
        assert!(!InstallmentStatus::Overdue.is_closed());
        assert!(!InstallmentStatus::Renegotiated.is_closed());
        assert!(!InstallmentStatus::Cancelled.is_settled());
    }

    #[test]
    fn test_terms_compare_by_value() {
        let terms = FinancialTerms {
            total_amount: Money::from_major(1000),
            down_payment: Money::from_major(100),
            installment_count: 3,
            installment_amount: None,
            first_due_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            frequency: PaymentFrequency::Monthly,
            fixed_installment: true,
        };
        let mut changed = terms.clone();
        assert_eq!(terms, changed);
        changed.installment_count = 4;
        assert_ne!(terms, changed);
        assert_eq!(terms.financed_amount(), Money::from_major(900));
    }
}
