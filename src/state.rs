use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{
    ClientId, ContractId, ContractStatus, FinancialTerms, InstallmentId, InstallmentStatus,
    PaymentId, UserId,
};

/// a carne: one sale financed over time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub client_id: ClientId,
    pub sale_date: Option<NaiveDate>,
    pub terms: FinancialTerms,
    pub status: ContractStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// a parcela: one scheduled debt unit within a contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub contract_id: ContractId,
    /// 1-based position, unique within the contract
    pub sequence: u32,
    /// original principal owed
    pub amount_due: Money,
    pub due_date: NaiveDate,
    /// total received so far, rolled back only by payment reversal
    pub amount_paid: Money,
    /// current fine + interest
    pub accrued: Money,
    /// last accrual figure actually written, for change detection
    pub last_applied_accrued: Money,
    /// amount_due - amount_paid + accrued, never negative once persisted
    pub balance: Money,
    /// set once the balance reaches zero, cleared if a reversal reopens it
    pub full_payment_date: Option<NaiveDate>,
    pub status: InstallmentStatus,
    pub note: Option<String>,
    /// receipts applied to this installment, owned exclusively by it
    pub payments: Vec<Payment>,
}

/// an atomic receipt applied to one installment, never mutated after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub installment_id: InstallmentId,
    pub paid_at: DateTime<Utc>,
    pub amount: Money,
    pub method: String,
    pub recorded_by: UserId,
    pub note: Option<String>,
}

impl Installment {
    /// create a freshly scheduled installment
    pub fn new(
        contract_id: ContractId,
        sequence: u32,
        amount_due: Money,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            contract_id,
            sequence,
            amount_due,
            due_date,
            amount_paid: Money::ZERO,
            accrued: Money::ZERO,
            last_applied_accrued: Money::ZERO,
            balance: amount_due,
            full_payment_date: None,
            status: InstallmentStatus::Pending,
            note: None,
            payments: Vec::new(),
        }
    }

    /// principal still owed, floored at zero against over-payment
    pub fn principal_outstanding(&self) -> Money {
        (self.amount_due - self.amount_paid).max(Money::ZERO)
    }

    /// drop any standing accrual, including the change-detection figure
    ///
    /// Both fields must go together: if last_applied kept its old value, a
    /// later reopen computing the same figure would skip the write and leave
    /// the balance short.
    pub fn zero_accrual(&mut self) {
        self.accrued = Money::ZERO;
        self.last_applied_accrued = Money::ZERO;
    }
}

/// contract aggregate: the carne plus the installments it owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carne {
    pub contract: Contract,
    pub installments: Vec<Installment>,
}

impl Carne {
    pub fn id(&self) -> ContractId {
        self.contract.id
    }

    pub fn installment(&self, id: InstallmentId) -> Option<&Installment> {
        self.installments.iter().find(|i| i.id == id)
    }

    pub fn installment_mut(&mut self, id: InstallmentId) -> Option<&mut Installment> {
        self.installments.iter_mut().find(|i| i.id == id)
    }

    /// true once any installment has a recorded payment
    pub fn has_payments(&self) -> bool {
        self.installments.iter().any(|i| !i.payments.is_empty())
    }

    /// sum of open balances across unsettled installments
    pub fn outstanding_balance(&self) -> Money {
        self.installments
            .iter()
            .filter(|i| !i.status.is_closed())
            .map(|i| i.balance)
            .sum()
    }

    /// sum of accrued fines and interest across open installments
    pub fn accrued_total(&self) -> Money {
        self.installments
            .iter()
            .filter(|i| !i.status.is_closed())
            .map(|i| i.accrued)
            .sum()
    }

    /// locate a payment and its installment
    pub fn find_payment(&self, payment_id: PaymentId) -> Option<(&Installment, &Payment)> {
        self.installments.iter().find_map(|installment| {
            installment
                .payments
                .iter()
                .find(|p| p.id == payment_id)
                .map(|p| (installment, p))
        })
    }
}
