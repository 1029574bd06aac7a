//! Profit accrual engine.
//!
//! `distribute_profits` selects every active investment whose `next_profit_at` has passed and
//! accrues one cycle for each. The cycle advance is a compare-and-swap keyed on the values
//! read during selection, so two overlapping runs credit a given cycle at most once: the
//! second writer matches zero rows and skips the investment.

use super::{
    balance::{BalanceDelta, apply_delta},
    transaction::{NewTransaction, record_transaction},
};
use crate::{
    entities::{Investment, InvestmentStatus, TransactionType, investment},
    errors::Result,
};
use chrono::Duration;
use sea_orm::{QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, error, info};

/// Result of one accrual attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccrualOutcome {
    /// One cycle was credited
    Credited {
        /// The investment completed and the principal was returned
        final_cycle: bool,
    },
    /// The investment changed since it was read; nothing was written
    Skipped,
}

/// Retrieves active investments due at `now`, oldest due first.
pub async fn due_investments(
    db: &DatabaseConnection,
    now: DateTimeUtc,
) -> Result<Vec<investment::Model>> {
    Investment::find()
        .filter(investment::Column::Status.eq(InvestmentStatus::Active))
        .filter(investment::Column::NextProfitAt.lte(now))
        .order_by_asc(investment::Column::NextProfitAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Accrues one cycle for every due investment.
///
/// Returns the number of investments credited. Failures of a single investment are logged
/// and skipped; it stays due and is retried by the next run.
pub async fn distribute_profits(db: &DatabaseConnection, now: DateTimeUtc) -> Result<usize> {
    let due = due_investments(db, now).await?;
    if due.is_empty() {
        debug!("no investments due for profit");
        return Ok(0);
    }
    info!(count = due.len(), "distributing profits");

    let mut credited = 0;
    for snapshot in &due {
        match accrue_investment(db, snapshot, now).await {
            Ok(AccrualOutcome::Credited { .. }) => credited += 1,
            Ok(AccrualOutcome::Skipped) => {}
            Err(e) => {
                error!(
                    investment_id = %snapshot.id,
                    user_id = %snapshot.user_id,
                    error = %e,
                    "profit accrual failed"
                );
            }
        }
    }

    info!(credited, due = due.len(), "profit distribution finished");
    Ok(credited)
}

/// Accrues one cycle of `snapshot`, the investment as read during selection.
///
/// The investment update, the user credit and the `profit` transaction commit together.
/// Returns `Skipped` when the investment no longer matches `snapshot` or is not due at `now`.
pub async fn accrue_investment(
    db: &DatabaseConnection,
    snapshot: &investment::Model,
    now: DateTimeUtc,
) -> Result<AccrualOutcome> {
    let cycle = snapshot.completed_cycles + 1;
    let is_final = cycle >= snapshot.total_cycles;

    let mut update = Investment::update_many()
        .col_expr(investment::Column::LastProfitAt, Expr::value(Some(now)));
    update = if is_final {
        update
            .col_expr(
                investment::Column::CompletedCycles,
                Expr::value(snapshot.total_cycles),
            )
            .col_expr(
                investment::Column::Status,
                Expr::value(InvestmentStatus::Completed),
            )
    } else {
        let next_profit_at =
            now + Duration::hours(i64::from(snapshot.profit_interval_hours));
        update
            .col_expr(investment::Column::CompletedCycles, Expr::value(cycle))
            .col_expr(investment::Column::NextProfitAt, Expr::value(next_profit_at))
    };

    let txn = db.begin().await?;

    let swapped = update
        .filter(investment::Column::Id.eq(snapshot.id.as_str()))
        .filter(investment::Column::Status.eq(InvestmentStatus::Active))
        .filter(investment::Column::CompletedCycles.eq(snapshot.completed_cycles))
        .filter(investment::Column::NextProfitAt.eq(snapshot.next_profit_at))
        .filter(investment::Column::NextProfitAt.lte(now))
        .exec(&txn)
        .await?;
    if swapped.rows_affected == 0 {
        debug!(investment_id = %snapshot.id, "investment changed since selection, skipping");
        return Ok(AccrualOutcome::Skipped);
    }

    let mut delta = BalanceDelta::default()
        .liquid(snapshot.profit_per_cycle)
        .returns(snapshot.profit_per_cycle);
    let notes = if is_final {
        delta = delta.liquid(snapshot.amount).invested(-snapshot.amount);
        format!(
            "Final profit - {} (cycle {}/{}, principal returned)",
            snapshot.plan_name, snapshot.total_cycles, snapshot.total_cycles
        )
    } else {
        format!(
            "Automatic profit - {} (cycle {}/{})",
            snapshot.plan_name, cycle, snapshot.total_cycles
        )
    };
    apply_delta(&txn, &snapshot.user_id, &delta).await?;

    record_transaction(
        &txn,
        NewTransaction::completed(
            &snapshot.user_id,
            TransactionType::Profit,
            snapshot.profit_per_cycle,
            notes,
        ),
        now,
    )
    .await?;

    txn.commit().await?;

    info!(
        investment_id = %snapshot.id,
        user_id = %snapshot.user_id,
        cycle = cycle.min(snapshot.total_cycles),
        total_cycles = snapshot.total_cycles,
        profit = snapshot.profit_per_cycle,
        completed = is_final,
        "profit credited"
    );
    Ok(AccrualOutcome::Credited {
        final_cycle: is_final,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::investment::{create_investment, create_investment_at, get_investment};
    use crate::core::transaction::get_transactions_for_user;
    use crate::entities::{TransactionStatus, transaction};
    use crate::errors::Error;
    use crate::test_utils::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sea_orm::Set;
    use std::sync::Arc;

    async fn profit_transactions(
        db: &DatabaseConnection,
        user_id: &str,
    ) -> Result<Vec<transaction::Model>> {
        Ok(get_transactions_for_user(db, user_id)
            .await?
            .into_iter()
            .filter(|t| t.transaction_type == TransactionType::Profit)
            .collect())
    }

    /// Creates a R$200 investment under a 48h/6h plan, started at `start`.
    async fn setup_investment(
        db: &DatabaseConnection,
        start: DateTimeUtc,
    ) -> Result<(String, investment::Model)> {
        create_test_plan(db, "plan_48h", 48, 6).await?;
        let user = create_funded_user(db, "alice", Decimal::from(200)).await?;
        let created =
            create_investment_at(db, &user.id, "plan_48h", Decimal::from(200), start).await?;
        Ok((user.id, created))
    }

    #[tokio::test]
    async fn test_nothing_due_before_first_interval() -> Result<()> {
        let db = setup_test_db().await?;
        let start = Utc::now();
        let (user_id, _) = setup_investment(&db, start).await?;

        assert_eq!(distribute_profits(&db, start + Duration::hours(5)).await?, 0);
        assert!(profit_transactions(&db, &user_id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_first_cycle_credit() -> Result<()> {
        let db = setup_test_db().await?;
        let start = Utc::now();
        let (user_id, created) = setup_investment(&db, start).await?;
        let run_at = start + Duration::hours(6);

        assert_eq!(distribute_profits(&db, run_at).await?, 1);

        let updated = get_investment(&db, &created.id).await?.unwrap();
        assert_eq!(updated.completed_cycles, 1);
        assert_eq!(updated.status, InvestmentStatus::Active);
        assert_eq!(updated.last_profit_at, Some(run_at));
        assert_eq!(updated.next_profit_at, run_at + Duration::hours(6));

        let user = get_test_user(&db, &user_id).await?;
        assert_eq!(user.available_for_withdrawal, 4_000);
        assert_eq!(user.brl_balance, 24_000);
        assert_eq!(user.total_returns, 4_000);
        assert_eq!(user.total_invested, 20_000);

        let profits = profit_transactions(&db, &user_id).await?;
        assert_eq!(profits.len(), 1);
        assert_eq!(profits[0].amount, 4_000);
        assert_eq!(profits[0].status, TransactionStatus::Completed);
        assert_eq!(
            profits[0].notes.as_deref(),
            Some("Automatic profit - Test plan_48h (cycle 1/8)")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_run_credits_once() -> Result<()> {
        let db = setup_test_db().await?;
        let start = Utc::now();
        let (user_id, _) = setup_investment(&db, start).await?;
        let run_at = start + Duration::hours(7);

        assert_eq!(distribute_profits(&db, run_at).await?, 1);
        assert_eq!(distribute_profits(&db, run_at).await?, 0);

        assert_eq!(profit_transactions(&db, &user_id).await?.len(), 1);
        assert_eq!(get_test_user(&db, &user_id).await?.total_returns, 4_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_skipped() -> Result<()> {
        let db = setup_test_db().await?;
        let start = Utc::now();
        let (user_id, _) = setup_investment(&db, start).await?;
        let run_at = start + Duration::hours(6);

        // Both runs read the same due investment before either writes
        let snapshot = due_investments(&db, run_at).await?.remove(0);

        let first = accrue_investment(&db, &snapshot, run_at).await?;
        let second = accrue_investment(&db, &snapshot, run_at).await?;
        assert_eq!(first, AccrualOutcome::Credited { final_cycle: false });
        assert_eq!(second, AccrualOutcome::Skipped);

        assert_eq!(profit_transactions(&db, &user_id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_snapshot_not_due_is_skipped() -> Result<()> {
        let db = setup_test_db().await?;
        let start = Utc::now();
        let (_, created) = setup_investment(&db, start).await?;

        let outcome = accrue_investment(&db, &created, start + Duration::hours(1)).await?;
        assert_eq!(outcome, AccrualOutcome::Skipped);
        Ok(())
    }

    #[tokio::test]
    async fn test_overlapping_runs_credit_once() -> Result<()> {
        let db = setup_test_db().await?;
        let start = Utc::now();
        let (user_id, _) = setup_investment(&db, start).await?;
        let run_at = start + Duration::hours(6);

        let (coarse, safety_net) = tokio::join!(
            distribute_profits(&db, run_at),
            distribute_profits(&db, run_at)
        );
        assert_eq!(coarse? + safety_net?, 1);
        assert_eq!(profit_transactions(&db, &user_id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_final_cycle_completes_investment() -> Result<()> {
        let db = setup_test_db().await?;
        let start = Utc::now() - Duration::hours(48);
        let (user_id, created) = setup_investment(&db, start).await?;

        // Seven cycles already paid, the last one overdue
        let due_at = Utc::now() - Duration::minutes(5);
        let mut model: investment::ActiveModel = created.clone().into();
        model.completed_cycles = Set(7);
        model.next_profit_at = Set(due_at);
        model.update(&db).await?;

        let now = Utc::now();
        assert_eq!(distribute_profits(&db, now).await?, 1);

        let completed = get_investment(&db, &created.id).await?.unwrap();
        assert_eq!(completed.status, InvestmentStatus::Completed);
        assert_eq!(completed.completed_cycles, completed.total_cycles);
        assert_eq!(completed.next_profit_at, due_at);
        assert_eq!(completed.last_profit_at, Some(now));

        let user = get_test_user(&db, &user_id).await?;
        assert_eq!(user.total_invested, 0);
        assert_eq!(user.available_for_withdrawal, 4_000 + 20_000);

        let profits = profit_transactions(&db, &user_id).await?;
        assert_eq!(profits.len(), 1);
        assert_eq!(
            profits[0].notes.as_deref(),
            Some("Final profit - Test plan_48h (cycle 8/8, principal returned)")
        );

        // Completed investments are never selected again
        assert_eq!(distribute_profits(&db, now + Duration::hours(24)).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_full_lifecycle_returns_principal() -> Result<()> {
        let db = setup_test_db().await?;
        let start = Utc::now();
        let (user_id, created) = setup_investment(&db, start).await?;
        let before = get_test_user(&db, &user_id).await?;
        assert_eq!(before.total_invested, 20_000);

        for cycle in 1..=8 {
            let run_at = start + Duration::hours(6 * cycle);
            assert_eq!(distribute_profits(&db, run_at).await?, 1);
            let current = get_investment(&db, &created.id).await?.unwrap();
            assert!(current.completed_cycles <= current.total_cycles);
            assert_eq!(
                current.status == InvestmentStatus::Completed,
                current.completed_cycles == current.total_cycles
            );
        }

        let finished = get_investment(&db, &created.id).await?.unwrap();
        assert_eq!(finished.status, InvestmentStatus::Completed);
        assert_eq!(finished.completed_cycles, 8);

        let user = get_test_user(&db, &user_id).await?;
        assert_eq!(user.total_returns, 32_000);
        assert_eq!(user.total_invested, 0);
        // 320 profit plus the 200 principal back
        assert_eq!(user.available_for_withdrawal, 52_000);
        assert_eq!(profit_transactions(&db, &user_id).await?.len(), 8);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_item_does_not_stop_batch() -> Result<()> {
        let db = setup_test_db().await?;
        let start = Utc::now();
        let (user_id, healthy) = setup_investment(&db, start).await?;

        // An investment whose owner no longer exists
        db.execute_unprepared("PRAGMA foreign_keys = OFF").await?;
        let mut orphan: investment::ActiveModel = healthy.clone().into();
        orphan.id = Set(crate::core::new_id());
        orphan.user_id = Set("ghost".to_string());
        orphan.next_profit_at = Set(start + Duration::hours(1));
        let orphan = orphan.insert(&db).await?;

        let run_at = start + Duration::hours(6);
        assert_eq!(distribute_profits(&db, run_at).await?, 1);

        assert_eq!(profit_transactions(&db, &user_id).await?.len(), 1);
        // Rolled back, so it stays due
        let untouched = get_investment(&db, &orphan.id).await?.unwrap();
        assert_eq!(untouched.completed_cycles, 0);
        assert_eq!(untouched.next_profit_at, start + Duration::hours(1));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_on_pooled_db_credit_once() -> Result<()> {
        let file = setup_file_test_db().await?;
        let db = Arc::clone(&file.db);
        let start = Utc::now() - Duration::hours(7);
        create_test_plan(&db, "plan_48h", 48, 6).await?;
        let user = create_funded_user(&db, "alice", Decimal::from(4000)).await?;
        let mut ids = Vec::new();
        for _ in 0..20 {
            let created =
                create_investment_at(&db, &user.id, "plan_48h", Decimal::from(200), start).await?;
            ids.push(created.id);
        }

        let run_at = Utc::now();
        let runs: Vec<_> = (0..3)
            .map(|_| {
                let db = Arc::clone(&db);
                tokio::spawn(async move { distribute_profits(&db, run_at).await })
            })
            .collect();
        let mut credited = 0;
        for run in runs {
            credited += run.await.map_err(|e| Error::validation(e.to_string()))??;
        }
        // Items that lost a lock race are left due, a later run picks them up
        credited += distribute_profits(&db, run_at).await?;
        assert_eq!(credited, 20);
        assert_eq!(distribute_profits(&db, run_at).await?, 0);

        for id in &ids {
            let current = get_investment(&*db, id).await?.unwrap();
            assert_eq!(current.completed_cycles, 1);
        }
        assert_eq!(profit_transactions(&db, &user.id).await?.len(), 20);
        let updated = get_test_user(&db, &user.id).await?;
        assert_eq!(updated.total_returns, 20 * 4_000);
        assert_eq!(updated.available_for_withdrawal, 20 * 4_000);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_and_accrual_lose_no_update() -> Result<()> {
        let file = setup_file_test_db().await?;
        let db = Arc::clone(&file.db);
        let start = Utc::now() - Duration::hours(7);
        create_test_plan(&db, "plan_48h", 48, 6).await?;
        let user = create_funded_user(&db, "alice", Decimal::from(4000)).await?;
        for _ in 0..10 {
            create_investment_at(&db, &user.id, "plan_48h", Decimal::from(200), start).await?;
        }

        let run_at = Utc::now();
        let accruals: Vec<_> = (0..2)
            .map(|_| {
                let db = Arc::clone(&db);
                tokio::spawn(async move { distribute_profits(&db, run_at).await })
            })
            .collect();
        let creations: Vec<_> = (0..5)
            .map(|_| {
                let db = Arc::clone(&db);
                let user_id = user.id.clone();
                tokio::spawn(async move {
                    create_investment(&db, &user_id, "plan_48h", Decimal::from(200)).await
                })
            })
            .collect();

        let mut credited = 0;
        for run in accruals {
            credited += run.await.map_err(|e| Error::validation(e.to_string()))??;
        }
        let mut created = 0;
        for creation in creations {
            // A creation that hits a locked database fails as a whole
            if creation
                .await
                .map_err(|e| Error::validation(e.to_string()))?
                .is_ok()
            {
                created += 1;
            }
        }

        let credited_i64 = i64::try_from(credited).unwrap();
        let updated = get_test_user(&db, &user.id).await?;
        assert_eq!(
            updated.available_for_withdrawal,
            400_000 - (10 + created) * 20_000 + credited_i64 * 4_000
        );
        assert_eq!(updated.total_invested, (10 + created) * 20_000);
        assert_eq!(updated.total_returns, credited_i64 * 4_000);
        assert_eq!(updated.brl_balance, 400_000 + credited_i64 * 4_000);
        assert_eq!(profit_transactions(&db, &user.id).await?.len(), credited);
        assert_eq!(
            crate::core::investment::list_investments(&db, &user.id).await?.len(),
            usize::try_from(10 + created).unwrap()
        );
        Ok(())
    }
}
