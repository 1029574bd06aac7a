//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test users and plans with sensible defaults.

use crate::{
    config::PlanConfig,
    core::{funding, plan, user},
    entities::{self, PaymentMethod},
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A file-backed `SQLite` database living in a temporary directory.
pub struct FileTestDb {
    /// Pooled connection with several connections, so queries really overlap
    pub db: Arc<DatabaseConnection>,
    // Removed with the database files when dropped
    _dir: TempDir,
}

/// Creates a file-backed `SQLite` database with all tables initialized.
///
/// `sqlite::memory:` is limited to a single pooled connection; tests exercising concurrent
/// writers need this instead.
pub async fn setup_file_test_db() -> Result<FileTestDb> {
    let dir = tempdir()?;
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("yield_ledger.sqlite").display()
    );
    let mut options = ConnectOptions::new(url);
    options.max_connections(8).min_connections(2).sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(FileTestDb {
        db: Arc::new(db),
        _dir: dir,
    })
}

/// Registers and approves a user with zero balances.
///
/// # Defaults
/// * `email`: `{username}@example.com`
/// * `full_name`: `Test {username}`
/// * no transactions are recorded
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
) -> Result<entities::user::Model> {
    let registered = user::register_user(
        db,
        user::NewUser {
            email: format!("{username}@example.com"),
            username: username.to_string(),
            full_name: format!("Test {username}"),
            ..Default::default()
        },
    )
    .await?;
    user::approve_user(db, "test_admin", &registered.id).await
}

/// Creates an approved user funded through an approved PIX deposit of `amount`.
pub async fn create_funded_user(
    db: &DatabaseConnection,
    username: &str,
    amount: Decimal,
) -> Result<entities::user::Model> {
    let created = create_test_user(db, username).await?;
    let deposit = funding::create_deposit(
        db,
        &created.id,
        funding::DepositRequest {
            amount,
            payment_method: PaymentMethod::Pix,
            payment_proof: None,
            notes: None,
        },
    )
    .await?;
    funding::approve_transaction(db, "test_admin", &deposit.id).await?;
    get_test_user(db, &created.id).await
}

/// Reloads a user, failing if it no longer exists.
pub async fn get_test_user(db: &DatabaseConnection, user_id: &str) -> Result<entities::user::Model> {
    user::get_user(db, user_id).await
}

/// Plan configuration with the seeded terms: R$200 to R$5000, 20% per cycle.
///
/// # Defaults
/// * `name`: `Test {id}`
/// * `active`: true
pub fn test_plan_config(id: &str, lock_hours: i32, profit_interval_hours: i32) -> PlanConfig {
    PlanConfig {
        id: id.to_string(),
        name: format!("Test {id}"),
        description: None,
        lock_hours,
        min_amount: Decimal::from(200),
        max_amount: Decimal::from(5000),
        profit_rate: Decimal::new(20, 2),
        profit_interval_hours,
        popular: false,
        active: true,
    }
}

/// Inserts an active test plan.
pub async fn create_test_plan(
    db: &DatabaseConnection,
    id: &str,
    lock_hours: i32,
    profit_interval_hours: i32,
) -> Result<entities::investment_plan::Model> {
    plan::upsert_plan(db, &test_plan_config(id, lock_hours, profit_interval_hours)).await
}
