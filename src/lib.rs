pub mod accrual;
pub mod book;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod reports;
pub mod schedule;
pub mod state;
pub mod status;
pub mod types;

// re-export key types
pub use accrual::AccrualEngine;
pub use book::{CarneBook, NewContract, PaymentRequest, RenegotiationRequest};
pub use config::AccrualConfig;
pub use decimal::{Money, Rate};
pub use errors::{CarneError, Result};
pub use events::{Event, EventStore};
pub use reports::{ClientDebt, DashboardSummary, ReceiptsReport};
pub use state::{Carne, Contract, Installment, Payment};
pub use status::derive_contract_status;
pub use types::{
    ClientId, ContractId, ContractStatus, FinancialTerms, InstallmentId, InstallmentStatus,
    PaymentFrequency, PaymentId, UserId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
