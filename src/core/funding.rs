//! Deposit and withdrawal request workflows.
//!
//! Deposits are credited only when an admin approves them. Withdrawals debit the balance when
//! requested and are refunded if an admin rejects them. Every status change is conditioned on
//! the status read before it, so two admins acting on the same request cannot both apply it.

use super::{
    balance::{BalanceDelta, apply_delta, debit_available},
    investment::count_active_investments,
    money,
    settings::load_settings,
    transaction::{NewTransaction, get_transaction_by_id, record_transaction},
};
use crate::{
    entities::{
        PaymentMethod, Transaction, TransactionStatus, TransactionType, User, transaction,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::info;

/// A deposit the user claims to have made.
#[derive(Debug, Clone)]
pub struct DepositRequest {
    /// Amount in reais
    pub amount: Decimal,
    /// Rail the money was sent through
    pub payment_method: PaymentMethod,
    /// Receipt reference
    pub payment_proof: Option<String>,
    /// Free text
    pub notes: Option<String>,
}

/// A withdrawal the user asks for.
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    /// Amount in reais
    pub amount: Decimal,
    /// Rail to pay out through
    pub payment_method: PaymentMethod,
    /// Receipt of the fee payment, when the fee is paid by deposit
    pub fee_payment_proof: Option<String>,
}

/// A created withdrawal and the fee terms that apply to it.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalReceipt {
    /// The `processing` withdrawal record
    pub transaction: transaction::Model,
    /// Fee in reais
    pub withdrawal_fee: Decimal,
    /// How the fee is collected
    pub fee_method: String,
}

fn positive_cents(amount: Decimal) -> Result<i64> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation("Amount must be positive"));
    }
    money::to_cents(amount)
}

/// Records a pending deposit. Balances change only on approval.
pub async fn create_deposit(
    db: &DatabaseConnection,
    user_id: &str,
    request: DepositRequest,
) -> Result<transaction::Model> {
    if request.amount <= Decimal::ZERO {
        return Err(Error::validation("Amount must be positive"));
    }
    let settings = load_settings(db).await?;
    money::check_bounds(request.amount, settings.min_deposit, settings.max_deposit)?;
    let cents = money::to_cents(request.amount)?;
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let mut new = NewTransaction::request(
        user_id,
        TransactionType::Deposit,
        cents,
        TransactionStatus::Pending,
        request.payment_method,
    );
    new.payment_proof = request.payment_proof;
    new.notes = request.notes;
    let record = record_transaction(db, new, Utc::now()).await?;

    info!(transaction_id = %record.id, user_id, amount = %request.amount, "deposit requested");
    Ok(record)
}

/// Creates a withdrawal request and debits the balance immediately.
///
/// # Errors
/// Checked in this order:
/// - `Validation` below the minimum withdrawal
/// - `InsufficientBalance` if `available_for_withdrawal < amount`
/// - `Validation` while investments are active
pub async fn create_withdrawal(
    db: &DatabaseConnection,
    user_id: &str,
    request: WithdrawalRequest,
) -> Result<WithdrawalReceipt> {
    let cents = positive_cents(request.amount)?;
    let txn = db.begin().await?;

    let settings = load_settings(&txn).await?;
    if request.amount < settings.min_withdrawal {
        return Err(Error::validation(format!(
            "Minimum withdrawal is R$ {:.2}",
            settings.min_withdrawal
        )));
    }
    let user = User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    if user.available_for_withdrawal < cents {
        return Err(Error::InsufficientBalance {
            available: money::from_cents(user.available_for_withdrawal),
            required: request.amount,
        });
    }
    if count_active_investments(&txn, user_id).await? > 0 {
        return Err(Error::validation(
            "Withdrawals are not allowed while investments are active",
        ));
    }

    debit_available(&txn, user_id, &BalanceDelta::default().liquid(-cents), cents).await?;

    let mut new = NewTransaction::request(
        user_id,
        TransactionType::Withdrawal,
        cents,
        TransactionStatus::Processing,
        request.payment_method,
    );
    new.payment_proof = request.fee_payment_proof;
    new.notes = Some(format!(
        "Withdrawal fee: R$ {:.2} - Method: {}",
        settings.withdrawal_fee, settings.withdrawal_fee_method
    ));
    let record = record_transaction(&txn, new, Utc::now()).await?;

    txn.commit().await?;

    info!(transaction_id = %record.id, user_id, amount = %request.amount, "withdrawal requested");
    Ok(WithdrawalReceipt {
        transaction: record,
        withdrawal_fee: settings.withdrawal_fee,
        fee_method: settings.withdrawal_fee_method,
    })
}

async fn load_open<C>(conn: &C, transaction_id: &str) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let record = get_transaction_by_id(conn, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("transaction", transaction_id))?;
    if record.status.is_terminal() {
        return Err(Error::AlreadyProcessed {
            id: record.id,
            status: record.status.to_string(),
        });
    }
    Ok(record)
}

/// Moves `record` to `status` if it is still in the status it was read with.
async fn transition<C>(
    conn: &C,
    record: &transaction::Model,
    status: TransactionStatus,
    admin_id: &str,
    notes: Option<String>,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let mut update = Transaction::update_many()
        .col_expr(transaction::Column::Status, Expr::value(status))
        .col_expr(
            transaction::Column::ProcessedBy,
            Expr::value(Some(admin_id.to_string())),
        )
        .col_expr(
            transaction::Column::ProcessedAt,
            Expr::value(Some(Utc::now())),
        );
    if let Some(notes) = notes {
        update = update.col_expr(transaction::Column::Notes, Expr::value(Some(notes)));
    }
    let result = update
        .filter(transaction::Column::Id.eq(record.id.as_str()))
        .filter(transaction::Column::Status.eq(record.status))
        .exec(conn)
        .await?;

    let current = get_transaction_by_id(conn, &record.id)
        .await?
        .ok_or_else(|| Error::not_found("transaction", record.id.as_str()))?;
    if result.rows_affected == 0 {
        return Err(Error::AlreadyProcessed {
            id: current.id,
            status: current.status.to_string(),
        });
    }
    Ok(current)
}

/// Approves a pending deposit or withdrawal.
///
/// Deposits become `approved` and are credited to the user; withdrawals become `completed`
/// (their balance was debited on creation).
pub async fn approve_transaction(
    db: &DatabaseConnection,
    admin_id: &str,
    transaction_id: &str,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;
    let record = load_open(&txn, transaction_id).await?;

    let status = match record.transaction_type {
        TransactionType::Deposit => TransactionStatus::Approved,
        TransactionType::Withdrawal => TransactionStatus::Completed,
        other => {
            return Err(Error::validation(format!(
                "Only deposits and withdrawals can be approved, not {other}"
            )));
        }
    };
    let updated = transition(&txn, &record, status, admin_id, None).await?;
    if record.transaction_type == TransactionType::Deposit {
        apply_delta(&txn, &record.user_id, &BalanceDelta::default().liquid(record.amount)).await?;
    }

    txn.commit().await?;

    info!(
        admin_id,
        transaction_id,
        user_id = %record.user_id,
        kind = %record.transaction_type,
        amount = record.amount,
        "transaction approved"
    );
    Ok(updated)
}

/// Rejects a pending request. A rejected withdrawal is refunded.
pub async fn reject_transaction(
    db: &DatabaseConnection,
    admin_id: &str,
    transaction_id: &str,
    reason: Option<String>,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;
    let record = load_open(&txn, transaction_id).await?;

    let updated = transition(&txn, &record, TransactionStatus::Rejected, admin_id, reason).await?;
    if record.transaction_type == TransactionType::Withdrawal {
        apply_delta(&txn, &record.user_id, &BalanceDelta::default().liquid(record.amount)).await?;
    }

    txn.commit().await?;

    info!(
        admin_id,
        transaction_id,
        user_id = %record.user_id,
        kind = %record.transaction_type,
        refunded = record.transaction_type == TransactionType::Withdrawal,
        "transaction rejected"
    );
    Ok(updated)
}

/// Sets the progress status of a withdrawal: `pending`, `processing` or `completed`.
pub async fn update_withdrawal_status(
    db: &DatabaseConnection,
    admin_id: &str,
    transaction_id: &str,
    status: TransactionStatus,
) -> Result<transaction::Model> {
    if !matches!(
        status,
        TransactionStatus::Pending | TransactionStatus::Processing | TransactionStatus::Completed
    ) {
        return Err(Error::validation(format!("Invalid withdrawal status: {status}")));
    }

    let txn = db.begin().await?;
    let record = load_open(&txn, transaction_id).await?;
    if record.transaction_type != TransactionType::Withdrawal {
        return Err(Error::validation("Only withdrawals can have their status changed"));
    }
    let updated = transition(&txn, &record, status, admin_id, None).await?;
    txn.commit().await?;

    info!(admin_id, transaction_id, status = %status, "withdrawal status updated");
    Ok(updated)
}
