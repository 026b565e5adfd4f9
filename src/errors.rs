use chrono::NaiveDate;
use thiserror::Error;

use crate::decimal::{Money, Rate};
use crate::types::{ContractId, InstallmentId, InstallmentStatus, PaymentId};

#[derive(Error, Debug)]
pub enum CarneError {
    // validation: rejected before any mutation
    #[error("invalid total amount: {amount}")]
    InvalidTotalAmount {
        amount: Money,
    },

    #[error("down payment {down_payment} exceeds total {total}")]
    DownPaymentExceedsTotal {
        down_payment: Money,
        total: Money,
    },

    #[error("first due date {first_due} is before sale date {sale_date}")]
    DueDateBeforeSale {
        first_due: NaiveDate,
        sale_date: NaiveDate,
    },

    #[error("installment count must be at least 1 for a fixed schedule")]
    InvalidInstallmentCount,

    #[error("invalid installment amount: {amount}")]
    InvalidInstallmentAmount {
        amount: Money,
    },

    #[error("invalid down payment: {amount}")]
    InvalidDownPayment {
        amount: Money,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("invalid rate: {rate}")]
    InvalidRate {
        rate: Rate,
    },

    // not found: no mutation attempted
    #[error("contract not found: {id}")]
    ContractNotFound {
        id: ContractId,
    },

    #[error("installment not found: {id}")]
    InstallmentNotFound {
        id: InstallmentId,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: PaymentId,
    },

    // conflict: current state forbids the operation
    #[error("financial terms are locked: contract {contract_id} already has payments")]
    TermsLocked {
        contract_id: ContractId,
    },

    #[error("installment {id} is settled ({status:?}) and cannot be renegotiated")]
    InstallmentSettled {
        id: InstallmentId,
        status: InstallmentStatus,
    },

    #[error("installment {id} is cancelled and cannot accept payments")]
    InstallmentCancelled {
        id: InstallmentId,
    },

    #[error("contract {id} is cancelled")]
    ContractCancelled {
        id: ContractId,
    },

    // integrity: a storage invariant was already broken before this call
    #[error("integrity fault: payment {payment_id} references missing installment {installment_id}")]
    OrphanedPayment {
        payment_id: PaymentId,
        installment_id: InstallmentId,
    },
}

impl CarneError {
    /// true for bad-input rejections surfaced before any mutation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CarneError::InvalidTotalAmount { .. }
                | CarneError::DownPaymentExceedsTotal { .. }
                | CarneError::DueDateBeforeSale { .. }
                | CarneError::InvalidInstallmentCount
                | CarneError::InvalidInstallmentAmount { .. }
                | CarneError::InvalidDownPayment { .. }
                | CarneError::InvalidPaymentAmount { .. }
                | CarneError::InvalidRate { .. }
        )
    }

    /// true for missing-entity rejections
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CarneError::ContractNotFound { .. }
                | CarneError::InstallmentNotFound { .. }
                | CarneError::PaymentNotFound { .. }
        )
    }

    /// true when a storage-layer invariant was already broken
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, CarneError::OrphanedPayment { .. })
    }
}

pub type Result<T> = std::result::Result<T, CarneError>;
