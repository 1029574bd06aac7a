//! Investment ledger - creates investments against a plan and lists them.
//!
//! Creation checks, in this order: the plan exists and is active, the amount lies within the
//! plan bounds, the user has enough withdrawable balance. The balance debit, the investment
//! insert and the audit record are committed in one database transaction.

use super::{
    balance::{BalanceDelta, debit_available},
    money,
    plan::get_plan,
    referral,
    transaction::{NewTransaction, record_transaction},
};
use crate::{
    entities::{Investment, InvestmentStatus, TransactionType, User, investment, investment_plan},
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, warn};

/// Cycle terms derived from a plan at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSchedule {
    /// Profit credited per cycle (centavos)
    pub profit_per_cycle: i64,
    /// Number of cycles; a partial trailing cycle is dropped
    pub total_cycles: i32,
    /// `profit_per_cycle * total_cycles` (centavos)
    pub total_profit: i64,
}

/// Computes the cycle schedule of an `amount_cents` investment under `plan`.
///
/// `total_cycles` is `lock_hours / profit_interval_hours`, truncated.
pub fn cycle_schedule(plan: &investment_plan::Model, amount_cents: i64) -> Result<CycleSchedule> {
    if plan.profit_interval_hours <= 0 {
        return Err(Error::validation(format!(
            "Plan {} has no positive profit interval",
            plan.id
        )));
    }
    let total_cycles = plan.lock_hours / plan.profit_interval_hours;
    if total_cycles <= 0 {
        return Err(Error::validation(format!(
            "Plan {} lock period is shorter than one profit interval",
            plan.id
        )));
    }
    let profit_per_cycle = money::profit_per_cycle(amount_cents)?;
    let total_profit = profit_per_cycle
        .checked_mul(i64::from(total_cycles))
        .ok_or_else(|| Error::validation("Total profit out of range"))?;

    Ok(CycleSchedule {
        profit_per_cycle,
        total_cycles,
        total_profit,
    })
}

/// Creates an investment for `user_id` under `plan_id`, starting now.
pub async fn create_investment(
    db: &DatabaseConnection,
    user_id: &str,
    plan_id: &str,
    amount: Decimal,
) -> Result<investment::Model> {
    create_investment_at(db, user_id, plan_id, amount, Utc::now()).await
}

/// Creates an investment with an explicit start time.
///
/// # Errors
/// - `Validation` for a non-positive amount or a plan without a full cycle
/// - `NotFound` if the plan does not exist or is inactive
/// - `InvalidAmount` if the amount is outside the plan bounds
/// - `InsufficientBalance` if `available_for_withdrawal < amount`
pub async fn create_investment_at(
    db: &DatabaseConnection,
    user_id: &str,
    plan_id: &str,
    amount: Decimal,
    now: DateTimeUtc,
) -> Result<investment::Model> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation("Investment amount must be positive"));
    }

    let txn = db.begin().await?;

    let plan = get_plan(&txn, plan_id)
        .await?
        .filter(|plan| plan.active)
        .ok_or_else(|| Error::not_found("investment plan", plan_id))?;

    money::check_bounds(
        amount,
        money::from_cents(plan.min_amount),
        money::from_cents(plan.max_amount),
    )?;
    let amount_cents = money::to_cents(amount)?;

    let user = User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    if user.available_for_withdrawal < amount_cents {
        return Err(Error::InsufficientBalance {
            available: money::from_cents(user.available_for_withdrawal),
            required: amount,
        });
    }

    let schedule = cycle_schedule(&plan, amount_cents)?;

    // The guard re-checks the balance at write time
    debit_available(
        &txn,
        user_id,
        &BalanceDelta::default()
            .available(-amount_cents)
            .invested(amount_cents),
        amount_cents,
    )
    .await?;

    let interval = Duration::hours(i64::from(plan.profit_interval_hours));
    let new_investment = investment::ActiveModel {
        id: Set(super::new_id()),
        user_id: Set(user_id.to_string()),
        plan_id: Set(plan.id.clone()),
        plan_name: Set(plan.name.clone()),
        amount: Set(amount_cents),
        total_profit: Set(schedule.total_profit),
        profit_per_cycle: Set(schedule.profit_per_cycle),
        profit_interval_hours: Set(plan.profit_interval_hours),
        total_cycles: Set(schedule.total_cycles),
        completed_cycles: Set(0),
        status: Set(InvestmentStatus::Active),
        start_date: Set(now),
        end_date: Set(now + Duration::hours(i64::from(plan.lock_hours))),
        last_profit_at: Set(None),
        next_profit_at: Set(now + interval),
        created_at: Set(now),
    };
    let created = new_investment.insert(&txn).await?;

    record_transaction(
        &txn,
        NewTransaction::completed(
            user_id,
            TransactionType::Investment,
            amount_cents,
            format!("Investment - {}", plan.name),
        ),
        now,
    )
    .await?;

    txn.commit().await?;

    info!(
        investment_id = %created.id,
        user_id,
        plan_id,
        amount = %amount,
        total_cycles = created.total_cycles,
        "investment created"
    );

    // Commissions never undo a committed investment
    if let Err(e) = referral::pay_commissions(db, &created).await {
        warn!(investment_id = %created.id, error = %e, "failed to pay referral commissions");
    }

    Ok(created)
}

/// Retrieves all investments of a user, newest first.
pub async fn list_investments(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<investment::Model>> {
    Investment::find()
        .filter(investment::Column::UserId.eq(user_id))
        .order_by_desc(investment::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the investments of all users, newest first.
pub async fn list_all_investments(db: &DatabaseConnection) -> Result<Vec<investment::Model>> {
    Investment::find()
        .order_by_desc(investment::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds an investment by id.
pub async fn get_investment<C>(conn: &C, investment_id: &str) -> Result<Option<investment::Model>>
where
    C: ConnectionTrait,
{
    Investment::find_by_id(investment_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Counts the active investments of a user.
pub async fn count_active_investments<C>(conn: &C, user_id: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    Investment::find()
        .filter(investment::Column::UserId.eq(user_id))
        .filter(investment::Column::Status.eq(InvestmentStatus::Active))
        .count(conn)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::transaction::get_transactions_for_user;
    use crate::entities::TransactionStatus;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_investment_schedule() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_plan(&db, "plan_48h", 48, 6).await?;
        let user = create_funded_user(&db, "alice", Decimal::from(300)).await?;
        let now = Utc::now();

        let created =
            create_investment_at(&db, &user.id, "plan_48h", Decimal::from(200), now).await?;

        assert_eq!(created.total_cycles, 8);
        assert_eq!(created.profit_per_cycle, 4_000);
        assert_eq!(created.total_profit, 32_000);
        assert_eq!(created.completed_cycles, 0);
        assert_eq!(created.status, InvestmentStatus::Active);
        assert_eq!(created.end_date, now + Duration::hours(48));
        assert_eq!(created.next_profit_at, now + Duration::hours(6));
        assert!(created.last_profit_at.is_none());

        let updated = get_test_user(&db, &user.id).await?;
        assert_eq!(updated.available_for_withdrawal, 10_000);
        assert_eq!(updated.total_invested, 20_000);
        assert_eq!(updated.brl_balance, 30_000);

        let transactions = get_transactions_for_user(&db, &user.id).await?;
        let audit = transactions
            .iter()
            .find(|t| t.transaction_type == TransactionType::Investment)
            .unwrap();
        assert_eq!(audit.amount, 20_000);
        assert_eq!(audit.status, TransactionStatus::Completed);
        assert_eq!(audit.notes.as_deref(), Some("Investment - Test plan_48h"));
        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_balance_with_valid_amount() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_plan(&db, "plan_48h", 48, 6).await?;
        let user = create_funded_user(&db, "alice", Decimal::from(150)).await?;

        let result = create_investment(&db, &user.id, "plan_48h", Decimal::from(200)).await;
        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));

        let unchanged = get_test_user(&db, &user.id).await?;
        assert_eq!(unchanged.available_for_withdrawal, 15_000);
        assert_eq!(unchanged.total_invested, 0);
        assert!(list_investments(&db, &user.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_amount_bounds_checked_before_balance() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_plan(&db, "plan_48h", 48, 6).await?;
        let funded = create_funded_user(&db, "alice", Decimal::from(300)).await?;
        let broke = create_test_user(&db, "bob").await?;

        let below = create_investment(&db, &funded.id, "plan_48h", Decimal::from(199)).await;
        match below {
            Err(Error::InvalidAmount { amount, min, max }) => {
                assert_eq!(amount, Decimal::from(199));
                assert_eq!(min, Decimal::from(200));
                assert_eq!(max, Decimal::from(5000));
            }
            other => panic!("expected InvalidAmount, got {other:?}"),
        }

        // Out of range and unfunded still reports the range
        let above = create_investment(&db, &broke.id, "plan_48h", Decimal::from(5001)).await;
        assert!(matches!(above, Err(Error::InvalidAmount { .. })));

        // Bounds are inclusive
        create_investment(&db, &funded.id, "plan_48h", Decimal::from(200)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_sub_cent_amounts_outside_bounds_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_plan(&db, "plan_48h", 48, 6).await?;
        let user = create_funded_user(&db, "alice", Decimal::from(6000)).await?;

        for amount in [Decimal::new(199_995, 3), Decimal::new(5_000_004, 3)] {
            let result = create_investment(&db, &user.id, "plan_48h", amount).await;
            assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        }
        assert!(list_investments(&db, &user.id).await?.is_empty());
        assert_eq!(get_test_user(&db, &user.id).await?.available_for_withdrawal, 600_000);

        // Inside the bounds the amount is stored to the cent
        let created =
            create_investment(&db, &user.id, "plan_48h", Decimal::new(200_004, 3)).await?;
        assert_eq!(created.amount, 20_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_plan() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_plan(&db, "plan_48h", 48, 6).await?;
        crate::core::plan::set_plan_active(&db, "plan_48h", false).await?;
        let user = create_funded_user(&db, "alice", Decimal::from(300)).await?;

        for plan_id in ["plan_48h", "missing"] {
            let result = create_investment(&db, &user.id, plan_id, Decimal::from(200)).await;
            assert!(matches!(
                result,
                Err(Error::NotFound {
                    entity: "investment plan",
                    ..
                })
            ));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_plan_not_found_with_mock_database() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<investment_plan::Model>::new()])
            .into_connection();

        let result = create_investment(&db, "user_1", "nope", Decimal::from(200)).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_plan(&db, "plan_48h", 48, 6).await?;
        let user = create_funded_user(&db, "alice", Decimal::from(300)).await?;

        for amount in [Decimal::ZERO, Decimal::from(-200)] {
            let result = create_investment(&db, &user.id, "plan_48h", amount).await;
            assert!(matches!(result, Err(Error::Validation { .. })));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_cycle_is_truncated() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_plan(&db, "plan_odd", 50, 6).await?;
        let user = create_funded_user(&db, "alice", Decimal::from(300)).await?;

        let created = create_investment(&db, &user.id, "plan_odd", Decimal::from(250)).await?;
        assert_eq!(created.total_cycles, 8);
        assert_eq!(created.profit_per_cycle, 5_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_investments_newest_first() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_plan(&db, "plan_48h", 48, 6).await?;
        let alice = create_funded_user(&db, "alice", Decimal::from(1000)).await?;
        let bob = create_funded_user(&db, "bob", Decimal::from(1000)).await?;
        let now = Utc::now();

        let first = create_investment_at(
            &db,
            &alice.id,
            "plan_48h",
            Decimal::from(200),
            now - Duration::hours(1),
        )
        .await?;
        let second =
            create_investment_at(&db, &alice.id, "plan_48h", Decimal::from(300), now).await?;
        create_investment_at(&db, &bob.id, "plan_48h", Decimal::from(200), now).await?;

        let listed = list_investments(&db, &alice.id).await?;
        assert_eq!(listed, vec![second, first]);
        assert_eq!(list_all_investments(&db).await?.len(), 3);
        assert_eq!(count_active_investments(&db, &alice.id).await?, 2);
        Ok(())
    }
}
