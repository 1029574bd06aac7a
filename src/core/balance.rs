//! Balance mutations - the only code that writes the balance columns of `users`.
//!
//! Every change is a single `UPDATE users SET col = col + ? ... WHERE id = ?` statement, so
//! concurrent credits and debits on the same user never lose an update. Debits that must not
//! overdraw add `available_for_withdrawal >= required` to the WHERE clause instead of reading
//! the balance first.

use super::{
    money,
    transaction::{NewTransaction, record_transaction},
};
use crate::{
    entities::{TransactionType, User, transaction, user},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::str::FromStr;
use tracing::info;

/// A balance column of the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceField {
    /// Total fiat balance
    BrlBalance,
    /// Withdrawable part of the fiat balance
    AvailableForWithdrawal,
    /// Principal locked in active investments
    TotalInvested,
    /// Cumulative profit
    TotalReturns,
    /// Cumulative referral commissions
    ReferralBonus,
    /// Promotional balance
    BonusBalance,
}

impl BalanceField {
    /// Column backing this field.
    #[must_use]
    pub const fn column(self) -> user::Column {
        match self {
            Self::BrlBalance => user::Column::BrlBalance,
            Self::AvailableForWithdrawal => user::Column::AvailableForWithdrawal,
            Self::TotalInvested => user::Column::TotalInvested,
            Self::TotalReturns => user::Column::TotalReturns,
            Self::ReferralBonus => user::Column::ReferralBonus,
            Self::BonusBalance => user::Column::BonusBalance,
        }
    }

    /// Column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BrlBalance => "brl_balance",
            Self::AvailableForWithdrawal => "available_for_withdrawal",
            Self::TotalInvested => "total_invested",
            Self::TotalReturns => "total_returns",
            Self::ReferralBonus => "referral_bonus",
            Self::BonusBalance => "bonus_balance",
        }
    }
}

impl FromStr for BalanceField {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "brl_balance" => Ok(Self::BrlBalance),
            "available_for_withdrawal" => Ok(Self::AvailableForWithdrawal),
            "total_invested" => Ok(Self::TotalInvested),
            "total_returns" => Ok(Self::TotalReturns),
            "referral_bonus" => Ok(Self::ReferralBonus),
            "bonus_balance" => Ok(Self::BonusBalance),
            other => Err(Error::validation(format!("Unknown balance field: {other}"))),
        }
    }
}

/// Signed per-field changes in centavos, applied together in one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceDelta {
    brl_balance: i64,
    available_for_withdrawal: i64,
    total_invested: i64,
    total_returns: i64,
    referral_bonus: i64,
    bonus_balance: i64,
}

impl BalanceDelta {
    /// Adds `cents` to `brl_balance`.
    #[must_use]
    pub const fn brl(mut self, cents: i64) -> Self {
        self.brl_balance += cents;
        self
    }

    /// Adds `cents` to `available_for_withdrawal`.
    #[must_use]
    pub const fn available(mut self, cents: i64) -> Self {
        self.available_for_withdrawal += cents;
        self
    }

    /// Adds `cents` to `total_invested`.
    #[must_use]
    pub const fn invested(mut self, cents: i64) -> Self {
        self.total_invested += cents;
        self
    }

    /// Adds `cents` to `total_returns`.
    #[must_use]
    pub const fn returns(mut self, cents: i64) -> Self {
        self.total_returns += cents;
        self
    }

    /// Adds `cents` to `referral_bonus`.
    #[must_use]
    pub const fn referral_bonus(mut self, cents: i64) -> Self {
        self.referral_bonus += cents;
        self
    }

    /// Adds `cents` to the given field.
    #[must_use]
    pub const fn field(mut self, field: BalanceField, cents: i64) -> Self {
        match field {
            BalanceField::BrlBalance => self.brl_balance += cents,
            BalanceField::AvailableForWithdrawal => self.available_for_withdrawal += cents,
            BalanceField::TotalInvested => self.total_invested += cents,
            BalanceField::TotalReturns => self.total_returns += cents,
            BalanceField::ReferralBonus => self.referral_bonus += cents,
            BalanceField::BonusBalance => self.bonus_balance += cents,
        }
        self
    }

    /// Credits both `brl_balance` and `available_for_withdrawal`.
    #[must_use]
    pub const fn liquid(self, cents: i64) -> Self {
        self.brl(cents).available(cents)
    }

    fn entries(&self) -> impl Iterator<Item = (user::Column, i64)> {
        [
            (user::Column::BrlBalance, self.brl_balance),
            (user::Column::AvailableForWithdrawal, self.available_for_withdrawal),
            (user::Column::TotalInvested, self.total_invested),
            (user::Column::TotalReturns, self.total_returns),
            (user::Column::ReferralBonus, self.referral_bonus),
            (user::Column::BonusBalance, self.bonus_balance),
        ]
        .into_iter()
        .filter(|(_, cents)| *cents != 0)
    }

    /// True when no field changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }
}

fn increment_statement(user_id: &str, delta: &BalanceDelta) -> sea_orm::UpdateMany<User> {
    delta
        .entries()
        .fold(User::update_many(), |update, (column, cents)| {
            update.col_expr(column, Expr::col(column).add(cents))
        })
        .filter(user::Column::Id.eq(user_id))
}

/// Applies `delta` to a user in one atomic statement.
///
/// # Errors
/// `NotFound` if the user does not exist.
pub async fn apply_delta<C>(conn: &C, user_id: &str, delta: &BalanceDelta) -> Result<()>
where
    C: ConnectionTrait,
{
    if delta.is_empty() {
        return Ok(());
    }
    let result = increment_statement(user_id, delta).exec(conn).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("user", user_id));
    }
    Ok(())
}

/// Applies `delta` only if the user still has at least `required` centavos available.
///
/// The balance condition is part of the UPDATE, so two concurrent debits can never both pass
/// a check that only one of them fits.
///
/// # Errors
/// `InsufficientBalance` if the guard fails, `NotFound` if the user does not exist.
pub async fn debit_available<C>(
    conn: &C,
    user_id: &str,
    delta: &BalanceDelta,
    required: i64,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = increment_statement(user_id, delta)
        .filter(user::Column::AvailableForWithdrawal.gte(required))
        .exec(conn)
        .await?;
    if result.rows_affected > 0 {
        return Ok(());
    }

    let user = User::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    Err(Error::InsufficientBalance {
        available: money::from_cents(user.available_for_withdrawal),
        required: money::from_cents(required),
    })
}

/// Balance fields of a user in reais.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    /// Total fiat balance
    pub brl_balance: Decimal,
    /// Withdrawable part
    pub available_for_withdrawal: Decimal,
    /// Principal locked in active investments
    pub total_invested: Decimal,
    /// Cumulative profit
    pub total_returns: Decimal,
    /// Cumulative referral commissions
    pub referral_bonus: Decimal,
    /// Promotional balance
    pub bonus_balance: Decimal,
}

impl From<&user::Model> for BalanceSnapshot {
    fn from(user: &user::Model) -> Self {
        Self {
            brl_balance: money::from_cents(user.brl_balance),
            available_for_withdrawal: money::from_cents(user.available_for_withdrawal),
            total_invested: money::from_cents(user.total_invested),
            total_returns: money::from_cents(user.total_returns),
            referral_bonus: money::from_cents(user.referral_bonus),
            bonus_balance: money::from_cents(user.bonus_balance),
        }
    }
}

/// Kind of manual balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentKind {
    /// Increase the field
    Add,
    /// Decrease the field
    Subtract,
    /// Overwrite the field
    Set,
}

impl AdjustmentKind {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Set => "set",
        }
    }
}

impl FromStr for AdjustmentKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            "set" => Ok(Self::Set),
            other => Err(Error::validation(format!("Invalid adjustment type: {other}"))),
        }
    }
}

/// A manual balance correction requested by an admin.
#[derive(Debug, Clone)]
pub struct BalanceAdjustment {
    /// Target user
    pub user_id: String,
    /// Add, subtract or set
    pub kind: AdjustmentKind,
    /// Field to change
    pub field: BalanceField,
    /// Non-negative amount in reais
    pub amount: Decimal,
    /// Reason shown in the audit log
    pub notes: Option<String>,
}

fn ensure_consistent(user: &user::Model) -> Result<()> {
    let balances = [
        user.brl_balance,
        user.available_for_withdrawal,
        user.total_invested,
        user.total_returns,
        user.referral_bonus,
        user.bonus_balance,
    ];
    if balances.iter().any(|cents| *cents < 0) {
        return Err(Error::validation("Adjustment would make a balance negative"));
    }
    if user.available_for_withdrawal > user.brl_balance {
        return Err(Error::validation(
            "Adjustment would make available_for_withdrawal exceed brl_balance",
        ));
    }
    Ok(())
}

/// Applies an admin adjustment and appends one `admin_adjustment` transaction.
///
/// The mutation and the audit record are committed together. Adjustments leaving a negative
/// balance, or more available than the total balance, are rolled back.
pub async fn adjust_balance(
    db: &DatabaseConnection,
    admin_id: &str,
    adjustment: BalanceAdjustment,
) -> Result<transaction::Model> {
    if adjustment.amount < Decimal::ZERO {
        return Err(Error::validation("Adjustment amount cannot be negative"));
    }
    let cents = money::to_cents(adjustment.amount)?;
    let user_id = adjustment.user_id.as_str();
    let column = adjustment.field.column();

    let txn = db.begin().await?;

    User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    match adjustment.kind {
        AdjustmentKind::Add => {
            apply_delta(&txn, user_id, &BalanceDelta::default().field(adjustment.field, cents))
                .await?;
        }
        AdjustmentKind::Subtract => {
            apply_delta(&txn, user_id, &BalanceDelta::default().field(adjustment.field, -cents))
                .await?;
        }
        AdjustmentKind::Set => {
            User::update_many()
                .col_expr(column, Expr::value(cents))
                .filter(user::Column::Id.eq(user_id))
                .exec(&txn)
                .await?;
        }
    }

    let updated = User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    ensure_consistent(&updated)?;

    let notes = adjustment.notes.unwrap_or_else(|| {
        format!(
            "Admin adjustment - {} - {}",
            adjustment.kind.as_str(),
            adjustment.field.as_str()
        )
    });
    let record = record_transaction(
        &txn,
        NewTransaction::completed(user_id, TransactionType::AdminAdjustment, cents, notes)
            .processed_by(admin_id),
        Utc::now(),
    )
    .await?;

    txn.commit().await?;

    info!(
        admin_id,
        user_id,
        kind = adjustment.kind.as_str(),
        field = adjustment.field.as_str(),
        amount = %adjustment.amount,
        "balance adjusted"
    );
    Ok(record)
}
