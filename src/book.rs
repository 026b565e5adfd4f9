use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accrual::AccrualEngine;
use crate::config::AccrualConfig;
use crate::decimal::Money;
use crate::errors::{CarneError, Result};
use crate::events::{Event, EventStore};
use crate::schedule;
use crate::state::{Carne, Contract, Installment, Payment};
use crate::status::derive_contract_status;
use crate::types::{
    ClientId, ContractId, ContractStatus, FinancialTerms, InstallmentId, InstallmentStatus,
    PaymentFrequency, PaymentId, UserId,
};

/// input for opening a new contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContract {
    pub client_id: ClientId,
    pub sale_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub terms: FinancialTerms,
}

/// input for recording a payment against an installment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    pub method: String,
    /// effective timestamp; defaults to the clock's now
    pub timestamp: Option<DateTime<Utc>>,
    pub recorded_by: UserId,
    pub note: Option<String>,
}

/// input for rewriting an installment's terms outside the normal schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenegotiationRequest {
    pub new_due_date: NaiveDate,
    /// restart the debt at this amount, wiping prior progress
    pub new_amount_due: Option<Money>,
    /// explicit status override; defaults to Renegotiated
    pub new_status: Option<InstallmentStatus>,
}

/// the carne book: every contract with its installments and payments
///
/// Stands in for the durable relational store. Mutating operations work on a
/// copy of the contract aggregate and commit it only on success, so a failed
/// call leaves no partial state. Queries take `&self` and never mutate;
/// accrual is recomputed only through the explicit `refresh_*` operations
/// and the mutating ledger calls.
pub struct CarneBook {
    config: AccrualConfig,
    carnes: BTreeMap<ContractId, Carne>,
    installment_index: BTreeMap<InstallmentId, ContractId>,
    payment_index: BTreeMap<PaymentId, (ContractId, InstallmentId)>,
    events: EventStore,
}

impl CarneBook {
    pub fn new(config: AccrualConfig) -> Self {
        Self {
            config,
            carnes: BTreeMap::new(),
            installment_index: BTreeMap::new(),
            payment_index: BTreeMap::new(),
            events: EventStore::new(),
        }
    }

    pub fn config(&self) -> AccrualConfig {
        self.config
    }

    /// drain events collected by operations since the last call
    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    // ---- contract lifecycle ----

    /// validate terms, generate the schedule, and store the contract
    pub fn create_contract(
        &mut self,
        new: NewContract,
        time_provider: &SafeTimeProvider,
    ) -> Result<ContractId> {
        let contract_id = Uuid::new_v4();
        let terms = normalize_terms(new.terms);
        let installments = schedule::generate(contract_id, &terms, new.sale_date)?;
        let count = installments.len() as u32;
        let financed = terms.financed_amount();

        let contract = Contract {
            id: contract_id,
            client_id: new.client_id,
            sale_date: new.sale_date,
            terms,
            status: ContractStatus::Active,
            description: new.description,
            created_at: time_provider.now(),
        };

        let carne = Carne { contract, installments };
        self.index_carne(&carne);
        self.carnes.insert(contract_id, carne);

        self.events.emit(Event::ScheduleGenerated {
            contract_id,
            installment_count: count,
            financed_amount: financed,
        });

        Ok(contract_id)
    }

    /// replace the financial terms, regenerating the schedule
    ///
    /// Rejected once any payment exists on the contract. Equal terms are a
    /// no-op; unequal terms destroy and regenerate every installment.
    pub fn update_terms(&mut self, contract_id: ContractId, terms: FinancialTerms) -> Result<()> {
        let carne = self
            .carnes
            .get(&contract_id)
            .ok_or(CarneError::ContractNotFound { id: contract_id })?;

        if carne.contract.status == ContractStatus::Cancelled {
            return Err(CarneError::ContractCancelled { id: contract_id });
        }

        let terms = normalize_terms(terms);
        if carne.contract.terms == terms {
            return Ok(());
        }

        if carne.has_payments() {
            return Err(CarneError::TermsLocked { contract_id });
        }

        let sale_date = carne.contract.sale_date;
        let installments = schedule::generate(contract_id, &terms, sale_date)?;
        let count = installments.len() as u32;
        let financed = terms.financed_amount();

        self.with_carne(contract_id, |carne, events| {
            carne.contract.terms = terms;
            carne.installments = installments;
            sync_contract_status(carne, events);

            events.push(Event::ScheduleRegenerated {
                contract_id,
                installment_count: count,
                financed_amount: financed,
            });
            Ok(())
        })
    }

    /// edit non-financial contract fields, always permitted
    ///
    /// `None` keeps the stored value, so one field can be edited without
    /// restating the others.
    pub fn update_details(
        &mut self,
        contract_id: ContractId,
        description: Option<String>,
        sale_date: Option<NaiveDate>,
    ) -> Result<()> {
        let carne = self
            .carnes
            .get_mut(&contract_id)
            .ok_or(CarneError::ContractNotFound { id: contract_id })?;

        if let Some(description) = description {
            carne.contract.description = Some(description);
        }
        if let Some(sale_date) = sale_date {
            carne.contract.sale_date = Some(sale_date);
        }
        Ok(())
    }

    /// edit an installment's free-text note, then re-apply accrual
    pub fn update_installment_note(
        &mut self,
        installment_id: InstallmentId,
        note: Option<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let contract_id = self.contract_of_installment(installment_id)?;
        let engine = AccrualEngine::new(self.config);
        let today = today(time_provider);

        self.with_carne(contract_id, |carne, events| {
            let installment = carne
                .installment_mut(installment_id)
                .ok_or(CarneError::InstallmentNotFound { id: installment_id })?;

            installment.note = note;
            refresh_and_report(&engine, installment, today, events);
            sync_contract_status(carne, events);
            Ok(())
        })
    }

    /// cancel the contract; the status is sticky from here on
    pub fn cancel_contract(&mut self, contract_id: ContractId) -> Result<()> {
        self.with_carne(contract_id, |carne, events| {
            let old_status = carne.contract.status;
            carne.contract.status = ContractStatus::Cancelled;

            let mut cancelled = 0;
            for installment in &mut carne.installments {
                if !installment.status.is_settled() {
                    installment.status = InstallmentStatus::Cancelled;
                    installment.zero_accrual();
                    installment.balance = installment.principal_outstanding();
                    cancelled += 1;
                }
            }

            if old_status != ContractStatus::Cancelled {
                events.push(Event::ContractStatusChanged {
                    contract_id,
                    old_status,
                    new_status: ContractStatus::Cancelled,
                });
            }
            events.push(Event::ContractCancelled {
                contract_id,
                cancelled_installments: cancelled,
            });
            Ok(())
        })
    }

    /// remove the contract with every installment and payment it owns
    pub fn delete_contract(&mut self, contract_id: ContractId) -> Result<()> {
        let carne = self
            .carnes
            .remove(&contract_id)
            .ok_or(CarneError::ContractNotFound { id: contract_id })?;

        self.unindex_carne(&carne);
        self.events.emit(Event::ContractDeleted { contract_id });
        Ok(())
    }

    // ---- queries (never mutate) ----

    pub fn contract(&self, contract_id: ContractId) -> Result<&Carne> {
        self.carnes
            .get(&contract_id)
            .ok_or(CarneError::ContractNotFound { id: contract_id })
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Carne> {
        self.carnes.values()
    }

    pub fn installment(&self, installment_id: InstallmentId) -> Result<&Installment> {
        let contract_id = self.contract_of_installment(installment_id)?;
        self.carnes
            .get(&contract_id)
            .and_then(|c| c.installment(installment_id))
            .ok_or(CarneError::InstallmentNotFound { id: installment_id })
    }

    pub fn installments(&self, contract_id: ContractId) -> Result<&[Installment]> {
        self.contract(contract_id).map(|c| c.installments.as_slice())
    }

    pub fn payment(&self, payment_id: PaymentId) -> Result<&Payment> {
        let (contract_id, _) = *self
            .payment_index
            .get(&payment_id)
            .ok_or(CarneError::PaymentNotFound { id: payment_id })?;
        self.carnes
            .get(&contract_id)
            .and_then(|c| c.find_payment(payment_id))
            .map(|(_, payment)| payment)
            .ok_or(CarneError::PaymentNotFound { id: payment_id })
    }

    // ---- accrual refresh ----

    /// bring one contract current as of the clock's today
    pub fn refresh_contract(
        &mut self,
        contract_id: ContractId,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let engine = AccrualEngine::new(self.config);
        let today = today(time_provider);

        self.with_carne(contract_id, |carne, events| {
            for installment in &mut carne.installments {
                refresh_and_report(&engine, installment, today, events);
            }
            sync_contract_status(carne, events);
            Ok(())
        })
    }

    /// bring every contract current; one pass, committed contract by contract
    pub fn refresh_all(&mut self, time_provider: &SafeTimeProvider) {
        let ids: Vec<ContractId> = self.carnes.keys().copied().collect();
        for id in ids {
            // ids were just collected, so a failure means the map changed
            // out from under the iteration
            if let Err(error) = self.refresh_contract(id, time_provider) {
                debug_assert!(false, "refresh failed for contract {id}: {error}");
            }
        }
    }

    // ---- payment ledger ----

    /// record a receipt against an installment
    pub fn record_payment(
        &mut self,
        installment_id: InstallmentId,
        request: PaymentRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentId> {
        if !request.amount.is_positive() {
            return Err(CarneError::InvalidPaymentAmount { amount: request.amount });
        }

        let contract_id = self.contract_of_installment(installment_id)?;
        let engine = AccrualEngine::new(self.config);
        let today = today(time_provider);
        let effective = request.timestamp.unwrap_or_else(|| time_provider.now());
        let payment_id = Uuid::new_v4();

        self.with_carne(contract_id, |carne, events| {
            let installment = carne
                .installment_mut(installment_id)
                .ok_or(CarneError::InstallmentNotFound { id: installment_id })?;

            // a cancelled debt never accepts money; accrual would skip the
            // balance rewrite and leave the paid figure dangling
            if installment.status == InstallmentStatus::Cancelled {
                return Err(CarneError::InstallmentCancelled { id: installment_id });
            }

            // bring accrual current before touching balances
            engine.refresh(installment, today);
            let was_settled = installment.status.is_settled();

            installment.amount_paid += request.amount;
            refresh_and_report(&engine, installment, today, events);

            // stamp the settlement date with the payment's effective date;
            // the derivation above used today as a stand-in
            if !installment.balance.is_positive() && installment.full_payment_date.is_none() {
                let settled_on = effective.date_naive();
                installment.full_payment_date = Some(settled_on);
                installment.status = if settled_on > installment.due_date {
                    InstallmentStatus::PaidLate
                } else {
                    InstallmentStatus::Paid
                };
            }

            installment.payments.push(Payment {
                id: payment_id,
                installment_id,
                paid_at: effective,
                amount: request.amount,
                method: request.method.clone(),
                recorded_by: request.recorded_by,
                note: request.note.clone(),
            });

            events.push(Event::PaymentRecorded {
                payment_id,
                installment_id,
                amount: request.amount,
                method: request.method,
                recorded_by: request.recorded_by,
                timestamp: effective,
            });

            if installment.status.is_settled() && !was_settled {
                events.push(Event::InstallmentSettled {
                    installment_id,
                    settled_on: effective.date_naive(),
                    late: installment.status == InstallmentStatus::PaidLate,
                });
            }

            sync_contract_status(carne, events);
            Ok(payment_id)
        })
    }

    /// reverse a receipt, rolling the installment back and reopening it
    pub fn reverse_payment(
        &mut self,
        payment_id: PaymentId,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let (contract_id, installment_id) = *self
            .payment_index
            .get(&payment_id)
            .ok_or(CarneError::PaymentNotFound { id: payment_id })?;

        // an indexed payment whose installment is gone means storage was
        // already corrupted before this call
        if !self.carnes.contains_key(&contract_id) {
            return Err(CarneError::OrphanedPayment { payment_id, installment_id });
        }

        let engine = AccrualEngine::new(self.config);
        let today = today(time_provider);

        self.with_carne(contract_id, |carne, events| {
            let installment = carne
                .installment_mut(installment_id)
                .ok_or(CarneError::OrphanedPayment { payment_id, installment_id })?;

            let position = installment
                .payments
                .iter()
                .position(|p| p.id == payment_id)
                .ok_or(CarneError::PaymentNotFound { id: payment_id })?;
            let payment = installment.payments.remove(position);

            installment.amount_paid =
                (installment.amount_paid - payment.amount).max(Money::ZERO);

            // reopen a settled installment before accrual re-runs, otherwise
            // the closed-state guard would freeze it
            if installment.principal_outstanding().is_positive() {
                installment.full_payment_date = None;
                if installment.status.is_settled() {
                    installment.status = if installment.amount_paid.is_positive() {
                        InstallmentStatus::PartiallyPaid
                    } else {
                        InstallmentStatus::Pending
                    };
                    events.push(Event::InstallmentReopened {
                        installment_id,
                        balance: installment.balance,
                    });
                }
            }

            refresh_and_report(&engine, installment, today, events);

            events.push(Event::PaymentReversed {
                payment_id,
                installment_id,
                amount: payment.amount,
            });

            sync_contract_status(carne, events);
            Ok(())
        })
    }

    // ---- renegotiation ----

    /// rewrite an installment's due date and optionally its amount
    pub fn renegotiate(
        &mut self,
        installment_id: InstallmentId,
        request: RenegotiationRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let contract_id = self.contract_of_installment(installment_id)?;
        let engine = AccrualEngine::new(self.config);
        let today = today(time_provider);

        self.with_carne(contract_id, |carne, events| {
            let installment = carne
                .installment_mut(installment_id)
                .ok_or(CarneError::InstallmentNotFound { id: installment_id })?;

            if installment.status.is_settled() {
                return Err(CarneError::InstallmentSettled {
                    id: installment_id,
                    status: installment.status,
                });
            }

            installment.due_date = request.new_due_date;

            match request.new_amount_due {
                Some(amount) => {
                    if !amount.is_positive() {
                        return Err(CarneError::InvalidInstallmentAmount { amount });
                    }
                    // the debt restarts from scratch at the new terms
                    installment.amount_due = amount;
                    installment.amount_paid = Money::ZERO;
                    installment.zero_accrual();
                    installment.balance = amount;
                    installment.full_payment_date = None;
                }
                None => {
                    // keep progress; accrual recomputes against the new date
                    installment.zero_accrual();
                }
            }

            let new_status = request.new_status.unwrap_or(InstallmentStatus::Renegotiated);
            installment.status = new_status;

            refresh_and_report(&engine, installment, today, events);

            events.push(Event::InstallmentRenegotiated {
                installment_id,
                new_due_date: request.new_due_date,
                new_amount_due: request.new_amount_due,
                new_status,
            });

            sync_contract_status(carne, events);
            Ok(())
        })
    }

    // ---- persistence ----

    /// serialize every contract aggregate to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        let carnes: Vec<&Carne> = self.carnes.values().collect();
        serde_json::to_string_pretty(&carnes)
    }

    /// restore a book from JSON produced by `to_json`
    pub fn from_json(config: AccrualConfig, json: &str) -> serde_json::Result<Self> {
        let carnes: Vec<Carne> = serde_json::from_str(json)?;
        let mut book = Self::new(config);
        for carne in carnes {
            book.index_carne(&carne);
            book.carnes.insert(carne.id(), carne);
        }
        Ok(book)
    }

    // ---- internals ----

    fn contract_of_installment(&self, installment_id: InstallmentId) -> Result<ContractId> {
        self.installment_index
            .get(&installment_id)
            .copied()
            .ok_or(CarneError::InstallmentNotFound { id: installment_id })
    }

    /// run `f` against a working copy; commit state, indices, and events
    /// only when it succeeds
    fn with_carne<T, F>(&mut self, contract_id: ContractId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Carne, &mut Vec<Event>) -> Result<T>,
    {
        let carne = self
            .carnes
            .get(&contract_id)
            .ok_or(CarneError::ContractNotFound { id: contract_id })?;

        let mut working = carne.clone();
        let mut pending = Vec::new();
        let out = f(&mut working, &mut pending)?;

        let new_index = collect_index(&working);
        if let Some(old) = self.carnes.insert(contract_id, working) {
            self.unindex_carne(&old);
        }
        self.index_carne_owned(contract_id, new_index);

        for event in pending {
            self.events.emit(event);
        }
        Ok(out)
    }

    fn index_carne(&mut self, carne: &Carne) {
        self.index_carne_owned(carne.id(), collect_index(carne));
    }

    fn index_carne_owned(
        &mut self,
        contract_id: ContractId,
        entries: (Vec<InstallmentId>, Vec<(PaymentId, InstallmentId)>),
    ) {
        let (installments, payments) = entries;
        for installment_id in installments {
            self.installment_index.insert(installment_id, contract_id);
        }
        for (payment_id, installment_id) in payments {
            self.payment_index
                .insert(payment_id, (contract_id, installment_id));
        }
    }

    fn unindex_carne(&mut self, carne: &Carne) {
        for installment in &carne.installments {
            self.installment_index.remove(&installment.id);
            for payment in &installment.payments {
                self.payment_index.remove(&payment.id);
            }
        }
    }
}

fn collect_index(carne: &Carne) -> (Vec<InstallmentId>, Vec<(PaymentId, InstallmentId)>) {
    let installments = carne.installments.iter().map(|i| i.id).collect();
    let payments = carne
        .installments
        .iter()
        .flat_map(|i| i.payments.iter().map(|p| (p.id, i.id)))
        .collect();
    (installments, payments)
}

fn today(time_provider: &SafeTimeProvider) -> NaiveDate {
    time_provider.now().date_naive()
}

/// refresh one installment, reporting the write as an event
fn refresh_and_report(
    engine: &AccrualEngine,
    installment: &mut Installment,
    today: NaiveDate,
    events: &mut Vec<Event>,
) {
    if engine.refresh(installment, today) {
        events.push(Event::AccrualApplied {
            installment_id: installment.id,
            accrued: installment.accrued,
            balance: installment.balance,
            as_of: today,
        });
    }
}

/// re-derive the contract status from its installments
fn sync_contract_status(carne: &mut Carne, events: &mut Vec<Event>) {
    let old_status = carne.contract.status;
    let new_status = derive_contract_status(old_status, &carne.installments);
    if new_status != old_status {
        carne.contract.status = new_status;
        events.push(Event::ContractStatusChanged {
            contract_id: carne.contract.id,
            old_status,
            new_status,
        });
    }
}

/// a non-fixed contract is stored as a single lump installment
fn normalize_terms(mut terms: FinancialTerms) -> FinancialTerms {
    if !terms.fixed_installment {
        terms.frequency = PaymentFrequency::Single;
        terms.installment_count = 1;
        terms.installment_amount = None;
    }
    terms
}
