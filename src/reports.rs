use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::book::CarneBook;
use crate::decimal::Money;
use crate::types::{ClientId, ContractId, ContractStatus, InstallmentId, InstallmentStatus, PaymentId};

/// point-in-time totals across the whole book
///
/// Read-only; callers refresh the book first so the figures are current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub active_contracts: u32,
    pub overdue_contracts: u32,
    pub settled_contracts: u32,
    pub cancelled_contracts: u32,
    pub overdue_installments: u32,
    /// open balances, accrual included
    pub outstanding_balance: Money,
    /// standing fines and interest within that balance
    pub accrued_total: Money,
}

/// one receipt within a reporting window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptEntry {
    pub payment_id: PaymentId,
    pub contract_id: ContractId,
    pub installment_id: InstallmentId,
    pub client_id: ClientId,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    pub method: String,
}

/// receipts inside a half-open window `[from, to)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptsReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total: Money,
    pub receipts: Vec<ReceiptEntry>,
}

/// outstanding debt grouped by client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDebt {
    pub client_id: ClientId,
    pub open_contracts: u32,
    pub outstanding_balance: Money,
}

/// summarize contract and installment state across the book
pub fn dashboard(book: &CarneBook) -> DashboardSummary {
    let mut summary = DashboardSummary {
        active_contracts: 0,
        overdue_contracts: 0,
        settled_contracts: 0,
        cancelled_contracts: 0,
        overdue_installments: 0,
        outstanding_balance: Money::ZERO,
        accrued_total: Money::ZERO,
    };

    for carne in book.contracts() {
        match carne.contract.status {
            ContractStatus::Active => summary.active_contracts += 1,
            ContractStatus::Overdue => summary.overdue_contracts += 1,
            ContractStatus::Settled => summary.settled_contracts += 1,
            ContractStatus::Cancelled => summary.cancelled_contracts += 1,
        }

        summary.overdue_installments += carne
            .installments
            .iter()
            .filter(|i| i.status == InstallmentStatus::Overdue)
            .count() as u32;
        summary.outstanding_balance += carne.outstanding_balance();
        summary.accrued_total += carne.accrued_total();
    }

    summary
}

/// list payments whose timestamp falls in `[from, to)`, newest last
pub fn receipts_between(
    book: &CarneBook,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> ReceiptsReport {
    let mut receipts = Vec::new();

    for carne in book.contracts() {
        for installment in &carne.installments {
            for payment in &installment.payments {
                if payment.paid_at >= from && payment.paid_at < to {
                    receipts.push(ReceiptEntry {
                        payment_id: payment.id,
                        contract_id: carne.id(),
                        installment_id: installment.id,
                        client_id: carne.contract.client_id,
                        amount: payment.amount,
                        paid_at: payment.paid_at,
                        method: payment.method.clone(),
                    });
                }
            }
        }
    }

    receipts.sort_by_key(|r| r.paid_at);
    let total = receipts.iter().map(|r| r.amount).sum();

    ReceiptsReport { from, to, total, receipts }
}

/// outstanding balances per client over unsettled contracts, largest first
pub fn pending_debt_by_client(book: &CarneBook) -> Vec<ClientDebt> {
    let mut by_client: BTreeMap<ClientId, ClientDebt> = BTreeMap::new();

    for carne in book.contracts() {
        let outstanding = carne.outstanding_balance();
        if matches!(
            carne.contract.status,
            ContractStatus::Settled | ContractStatus::Cancelled
        ) || !outstanding.is_positive()
        {
            continue;
        }

        let entry = by_client
            .entry(carne.contract.client_id)
            .or_insert(ClientDebt {
                client_id: carne.contract.client_id,
                open_contracts: 0,
                outstanding_balance: Money::ZERO,
            });
        entry.open_contracts += 1;
        entry.outstanding_balance += outstanding;
    }

    let mut debts: Vec<ClientDebt> = by_client.into_values().collect();
    debts.sort_by(|a, b| b.outstanding_balance.cmp(&a.outstanding_balance));
    debts
}
