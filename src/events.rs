use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{
    ContractId, ContractStatus, InstallmentId, InstallmentStatus, PaymentId, UserId,
};

/// all events emitted by book operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    ScheduleGenerated {
        contract_id: ContractId,
        installment_count: u32,
        financed_amount: Money,
    },
    ScheduleRegenerated {
        contract_id: ContractId,
        installment_count: u32,
        financed_amount: Money,
    },
    ContractCancelled {
        contract_id: ContractId,
        cancelled_installments: u32,
    },
    ContractDeleted {
        contract_id: ContractId,
    },

    // payment events
    PaymentRecorded {
        payment_id: PaymentId,
        installment_id: InstallmentId,
        amount: Money,
        method: String,
        recorded_by: UserId,
        timestamp: DateTime<Utc>,
    },
    PaymentReversed {
        payment_id: PaymentId,
        installment_id: InstallmentId,
        amount: Money,
    },

    // installment events
    AccrualApplied {
        installment_id: InstallmentId,
        accrued: Money,
        balance: Money,
        as_of: NaiveDate,
    },
    InstallmentSettled {
        installment_id: InstallmentId,
        settled_on: NaiveDate,
        late: bool,
    },
    InstallmentReopened {
        installment_id: InstallmentId,
        balance: Money,
    },
    InstallmentRenegotiated {
        installment_id: InstallmentId,
        new_due_date: NaiveDate,
        new_amount_due: Option<Money>,
        new_status: InstallmentStatus,
    },

    // status events
    ContractStatusChanged {
        contract_id: ContractId,
        old_status: ContractStatus,
        new_status: ContractStatus,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
