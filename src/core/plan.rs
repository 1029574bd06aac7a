//! Investment plan catalog.
//!
//! Plans are seeded from configuration on first start and read by the investment ledger.

use super::money;
use crate::{
    config::PlanConfig,
    entities::{InvestmentPlan, investment_plan},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use tracing::info;

/// Retrieves all plans accepting new investments, shortest lock first.
pub async fn list_active_plans(db: &DatabaseConnection) -> Result<Vec<investment_plan::Model>> {
    InvestmentPlan::find()
        .filter(investment_plan::Column::Active.eq(true))
        .order_by_asc(investment_plan::Column::LockHours)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a plan by id, active or not.
pub async fn get_plan<C>(conn: &C, plan_id: &str) -> Result<Option<investment_plan::Model>>
where
    C: ConnectionTrait,
{
    InvestmentPlan::find_by_id(plan_id)
        .one(conn)
        .await
        .map_err(Into::into)
}

fn active_model(config: &PlanConfig) -> Result<investment_plan::ActiveModel> {
    if config.min_amount > config.max_amount {
        return Err(Error::Config {
            message: format!("Plan {}: min_amount exceeds max_amount", config.id),
        });
    }
    if config.profit_interval_hours <= 0 || config.lock_hours < config.profit_interval_hours {
        return Err(Error::Config {
            message: format!(
                "Plan {}: lock_hours must cover at least one positive profit interval",
                config.id
            ),
        });
    }
    let profit_rate_bps = (config.profit_rate * Decimal::from(10_000))
        .round()
        .to_i32()
        .ok_or_else(|| Error::Config {
            message: format!("Plan {}: profit_rate out of range", config.id),
        })?;

    Ok(investment_plan::ActiveModel {
        id: Set(config.id.clone()),
        name: Set(config.name.clone()),
        description: Set(config.description.clone()),
        lock_hours: Set(config.lock_hours),
        min_amount: Set(money::to_cents(config.min_amount)?),
        max_amount: Set(money::to_cents(config.max_amount)?),
        profit_rate_bps: Set(profit_rate_bps),
        profit_interval_hours: Set(config.profit_interval_hours),
        popular: Set(config.popular),
        active: Set(config.active),
    })
}

/// Inserts a plan or overwrites the existing plan with the same id.
///
/// Existing investments keep the terms they were created with.
pub async fn upsert_plan(
    db: &DatabaseConnection,
    config: &PlanConfig,
) -> Result<investment_plan::Model> {
    let model = active_model(config)?;
    let saved = if get_plan(db, &config.id).await?.is_some() {
        model.update(db).await?
    } else {
        model.insert(db).await?
    };
    Ok(saved)
}

/// Seeds the catalog when it is empty. Returns the number of plans inserted.
pub async fn seed_plans(db: &DatabaseConnection, plans: &[PlanConfig]) -> Result<usize> {
    if InvestmentPlan::find().count(db).await? > 0 {
        return Ok(0);
    }
    for plan in plans {
        upsert_plan(db, plan).await?;
    }
    info!(count = plans.len(), "Investment plans seeded");
    Ok(plans.len())
}

/// Enables or disables a plan for new investments.
pub async fn set_plan_active(
    db: &DatabaseConnection,
    plan_id: &str,
    active: bool,
) -> Result<investment_plan::Model> {
    let plan = get_plan(db, plan_id)
        .await?
        .ok_or_else(|| Error::not_found("investment plan", plan_id))?;
    let mut model: investment_plan::ActiveModel = plan.into();
    model.active = Set(active);
    Ok(model.update(db).await?)
}
