//! Platform report for the admin dashboard.
//!
//! Counts users, investments and open requests. Amounts are summed in centavos and returned
//! in reais.

use super::money;
use crate::{
    entities::{
        Investment, InvestmentStatus, Transaction, TransactionStatus, TransactionType, User,
        UserStatus, investment, transaction, user,
    },
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::{PaginatorTrait, QuerySelect, prelude::*};
use serde::Serialize;

/// User counts. Admin accounts are excluded from `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    /// Non-admin accounts
    pub total: u64,
    /// Awaiting approval
    pub pending: u64,
    /// Approved
    pub active: u64,
}

/// Investment counts and totals over all investments ever created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvestmentStats {
    /// Still accruing
    pub active: u64,
    /// All investments
    pub total: u64,
    /// Sum of principals
    pub total_invested: Decimal,
    /// Sum of scheduled profits
    pub total_profit: Decimal,
}

/// Requests waiting for an admin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    /// Deposits in `pending`
    pub pending_deposits: u64,
    /// Withdrawals in `pending` or `processing`
    pub pending_withdrawals: u64,
}

/// Admin dashboard figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformReport {
    /// User counts
    pub users: UserStats,
    /// Investment counts and totals
    pub investments: InvestmentStats,
    /// Open request counts
    pub transactions: RequestStats,
}

async fn sum_column(db: &DatabaseConnection, column: investment::Column) -> Result<i64> {
    let total: Option<Option<i64>> = Investment::find()
        .select_only()
        .column_as(column.sum(), "total")
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

/// Builds the platform report.
pub async fn generate_platform_report(db: &DatabaseConnection) -> Result<PlatformReport> {
    let users = UserStats {
        total: User::find()
            .filter(user::Column::IsAdmin.eq(false))
            .count(db)
            .await?,
        pending: User::find()
            .filter(user::Column::Status.eq(UserStatus::Pending))
            .count(db)
            .await?,
        active: User::find()
            .filter(user::Column::Status.eq(UserStatus::Active))
            .count(db)
            .await?,
    };

    let investments = InvestmentStats {
        active: Investment::find()
            .filter(investment::Column::Status.eq(InvestmentStatus::Active))
            .count(db)
            .await?,
        total: Investment::find().count(db).await?,
        total_invested: money::from_cents(sum_column(db, investment::Column::Amount).await?),
        total_profit: money::from_cents(sum_column(db, investment::Column::TotalProfit).await?),
    };

    let transactions = RequestStats {
        pending_deposits: Transaction::find()
            .filter(transaction::Column::TransactionType.eq(TransactionType::Deposit))
            .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
            .count(db)
            .await?,
        pending_withdrawals: Transaction::find()
            .filter(transaction::Column::TransactionType.eq(TransactionType::Withdrawal))
            .filter(
                transaction::Column::Status
                    .is_in([TransactionStatus::Pending, TransactionStatus::Processing]),
            )
            .count(db)
            .await?,
    };

    Ok(PlatformReport {
        users,
        investments,
        transactions,
    })
}
