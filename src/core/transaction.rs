//! Transaction audit log - Records and queries the money movements of every user.
//!
//! Transactions are append-only: they are inserted by the operation that moved money and,
//! for deposit and withdrawal requests, later flipped to a terminal status by an admin.
//! Nothing here changes a balance; callers pair each balance mutation with exactly one
//! record written through [`record_transaction`], inside the same database transaction.

use crate::{
    entities::{PaymentMethod, Transaction, TransactionStatus, TransactionType, transaction},
    errors::Result,
};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use tracing::debug;

/// Data for a new audit record.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// User whose balance moved
    pub user_id: String,
    /// Cause of the movement
    pub transaction_type: TransactionType,
    /// Amount in centavos
    pub amount: i64,
    /// Initial status
    pub status: TransactionStatus,
    /// Payment rail, for deposits and withdrawals
    pub payment_method: Option<PaymentMethod>,
    /// Receipt reference
    pub payment_proof: Option<String>,
    /// Free text
    pub notes: Option<String>,
    /// Admin responsible for the movement
    pub processed_by: Option<String>,
}

impl NewTransaction {
    /// A record that is final as soon as it is written.
    pub fn completed(
        user_id: impl Into<String>,
        transaction_type: TransactionType,
        amount: i64,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_type,
            amount,
            status: TransactionStatus::Completed,
            payment_method: None,
            payment_proof: None,
            notes: Some(notes.into()),
            processed_by: None,
        }
    }

    /// A request that waits for an admin.
    pub fn request(
        user_id: impl Into<String>,
        transaction_type: TransactionType,
        amount: i64,
        status: TransactionStatus,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            transaction_type,
            amount,
            status,
            payment_method: Some(payment_method),
            payment_proof: None,
            notes: None,
            processed_by: None,
        }
    }

    /// Sets the admin responsible for the movement.
    #[must_use]
    pub fn processed_by(mut self, admin_id: impl Into<String>) -> Self {
        self.processed_by = Some(admin_id.into());
        self
    }
}

/// Appends one audit record.
///
/// Terminal records get `processed_at = now`; pending and processing requests leave it empty
/// until an admin acts on them.
pub async fn record_transaction<C>(
    conn: &C,
    new: NewTransaction,
    now: DateTimeUtc,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let processed_at = new.status.is_terminal().then_some(now);
    let model = transaction::ActiveModel {
        id: Set(super::new_id()),
        user_id: Set(new.user_id),
        transaction_type: Set(new.transaction_type),
        amount: Set(new.amount),
        status: Set(new.status),
        payment_method: Set(new.payment_method),
        payment_proof: Set(new.payment_proof),
        notes: Set(new.notes),
        processed_by: Set(new.processed_by),
        created_at: Set(now),
        processed_at: Set(processed_at),
    };

    let record = model.insert(conn).await?;
    debug!(
        transaction_id = %record.id,
        user_id = %record.user_id,
        kind = %record.transaction_type,
        amount = record.amount,
        status = %record.status,
        "recorded transaction"
    );
    Ok(record)
}

/// Retrieves all transactions of a user, newest first.
pub async fn get_transactions_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the `limit` most recent transactions of a user.
pub async fn get_recent_transactions<C>(
    conn: &C,
    user_id: &str,
    limit: u64,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .limit(limit)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific transaction by its unique ID.
pub async fn get_transaction_by_id<C>(
    conn: &C,
    transaction_id: &str,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Optional filters for the admin transaction listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFilter {
    /// Only this kind of transaction
    pub transaction_type: Option<TransactionType>,
    /// Only this status
    pub status: Option<TransactionStatus>,
}

/// Lists transactions of all users, newest first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    filter: TransactionFilter,
) -> Result<Vec<transaction::Model>> {
    let mut query = Transaction::find();
    if let Some(kind) = filter.transaction_type {
        query = query.filter(transaction::Column::TransactionType.eq(kind));
    }
    if let Some(status) = filter.status {
        query = query.filter(transaction::Column::Status.eq(status));
    }
    query
        .order_by_desc(transaction::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}
