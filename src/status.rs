use crate::state::Installment;
use crate::types::{ContractStatus, InstallmentStatus};

/// derive a contract's status from its installments
///
/// Pure function, invoked after every status-affecting installment mutation.
/// Precedence is fixed: Settled > Overdue > Active. `Cancelled` is sticky
/// and never overridden.
pub fn derive_contract_status(
    current: ContractStatus,
    installments: &[Installment],
) -> ContractStatus {
    if current == ContractStatus::Cancelled {
        return ContractStatus::Cancelled;
    }

    if !installments.is_empty() && installments.iter().all(|i| i.status.is_settled()) {
        return ContractStatus::Settled;
    }

    if installments
        .iter()
        .any(|i| i.status == InstallmentStatus::Overdue)
    {
        return ContractStatus::Overdue;
    }

    ContractStatus::Active
}
