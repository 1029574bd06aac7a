//! Core business logic - framework-agnostic ledger, accrual and request workflows.
//!
//! Every function takes the database handle explicitly. Money crosses this boundary as
//! `Decimal` reais and is stored as integer centavos (see [`money`]).

/// Profit accrual engine (`distribute_profits`)
pub mod accrual;
/// Atomic balance mutations and admin adjustments
pub mod balance;
/// Deposit and withdrawal request workflows
pub mod funding;
/// Investment ledger (`create_investment`, `list_investments`)
pub mod investment;
/// Decimal/centavo conversion and profit arithmetic
pub mod money;
/// Investment plan catalog
pub mod plan;
/// Referral chain and commission payouts
pub mod referral;
/// Admin dashboard figures
pub mod report;
/// Platform settings stored as key/value rows
pub mod settings;
/// Audit transaction log
pub mod transaction;
/// User registration, approval and dashboard
pub mod user;

/// Generates a new opaque record identifier.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
