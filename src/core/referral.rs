//! Referral chain and commission payouts.
//!
//! When a user registers with a referral code, one `referrals` row is written per upline
//! level: level 1 is the owner of the code, level 2 that user's referrer, and so on up to the
//! number of configured commission levels. Each new investment pays every level its
//! percentage of the principal.

use super::{
    balance::{BalanceDelta, apply_delta},
    money,
    settings::load_settings,
    transaction::{NewTransaction, record_transaction},
};
use crate::{
    entities::{Commission, Referral, TransactionType, User, commission, investment, referral},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{debug, info, warn};

const ACTIVE: &str = "active";

/// Records the referral chain of a newly registered user.
///
/// Returns the number of levels written.
pub async fn record_referral_chain<C>(
    conn: &C,
    referrer_id: &str,
    referred_user_id: &str,
    max_levels: usize,
    now: DateTimeUtc,
) -> Result<usize>
where
    C: ConnectionTrait,
{
    if max_levels == 0 {
        return Ok(0);
    }

    let mut chain = vec![referrer_id.to_string()];
    // The referrer's own upline, nearest first
    let upline = Referral::find()
        .filter(referral::Column::ReferredUserId.eq(referrer_id))
        .order_by_asc(referral::Column::Level)
        .all(conn)
        .await?;
    chain.extend(upline.into_iter().map(|r| r.referrer_id));
    chain.truncate(max_levels);

    for (index, ancestor) in chain.iter().enumerate() {
        let level = i32::try_from(index + 1)
            .map_err(|_| Error::validation("Referral chain too deep"))?;
        referral::ActiveModel {
            id: Set(super::new_id()),
            referrer_id: Set(ancestor.clone()),
            referred_user_id: Set(referred_user_id.to_string()),
            level: Set(level),
            status: Set(ACTIVE.to_string()),
            total_commission: Set(0),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;
    }

    debug!(referred_user_id, levels = chain.len(), "referral chain recorded");
    Ok(chain.len())
}

fn rate_bps(rate: Decimal) -> Result<i32> {
    (rate * Decimal::ONE_HUNDRED)
        .round()
        .to_i32()
        .ok_or_else(|| Error::validation(format!("Commission rate out of range: {rate}")))
}

async fn pay_level(
    db: &DatabaseConnection,
    link: &referral::Model,
    investment: &investment::Model,
    rate: Decimal,
) -> Result<Option<commission::Model>> {
    let amount = money::percent_of(investment.amount, rate)?;
    if amount <= 0 {
        return Ok(None);
    }
    let now = Utc::now();

    let txn = db.begin().await?;

    apply_delta(
        &txn,
        &link.referrer_id,
        &BalanceDelta::default().referral_bonus(amount).liquid(amount),
    )
    .await?;

    let paid = commission::ActiveModel {
        id: Set(super::new_id()),
        referral_id: Set(link.id.clone()),
        referrer_id: Set(link.referrer_id.clone()),
        referred_user_id: Set(investment.user_id.clone()),
        investment_id: Set(investment.id.clone()),
        level: Set(link.level),
        rate_bps: Set(rate_bps(rate)?),
        amount: Set(amount),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    Referral::update_many()
        .col_expr(
            referral::Column::TotalCommission,
            Expr::col(referral::Column::TotalCommission).add(amount),
        )
        .filter(referral::Column::Id.eq(link.id.as_str()))
        .exec(&txn)
        .await?;

    record_transaction(
        &txn,
        NewTransaction::completed(
            &link.referrer_id,
            TransactionType::ReferralBonus,
            amount,
            format!(
                "Referral commission - level {} - {}",
                link.level, investment.plan_name
            ),
        ),
        now,
    )
    .await?;

    txn.commit().await?;
    Ok(Some(paid))
}

/// Pays referral commissions for a new investment.
///
/// Each level is committed on its own; a failing level is logged and skipped. Returns the
/// number of commissions paid.
pub async fn pay_commissions(
    db: &DatabaseConnection,
    investment: &investment::Model,
) -> Result<usize> {
    let rates = load_settings(db).await?.commission_rates;
    let links = Referral::find()
        .filter(referral::Column::ReferredUserId.eq(investment.user_id.as_str()))
        .filter(referral::Column::Status.eq(ACTIVE))
        .order_by_asc(referral::Column::Level)
        .all(db)
        .await?;

    let mut paid = 0;
    for link in &links {
        let Some(rate) = usize::try_from(link.level - 1)
            .ok()
            .and_then(|index| rates.get(index))
        else {
            continue;
        };
        match pay_level(db, link, investment, *rate).await {
            Ok(Some(commission)) => {
                info!(
                    referrer_id = %commission.referrer_id,
                    investment_id = %investment.id,
                    level = commission.level,
                    amount = commission.amount,
                    "referral commission paid"
                );
                paid += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    referral_id = %link.id,
                    investment_id = %investment.id,
                    error = %e,
                    "failed to pay referral commission"
                );
            }
        }
    }
    Ok(paid)
}

/// Referral summary shown to a user.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralOverview {
    /// Code other users register with
    pub referral_code: String,
    /// Users in this user's downline, all levels
    pub referrals: Vec<referral::Model>,
    /// Commissions received, newest first
    pub commissions: Vec<commission::Model>,
    /// Sum of all commissions received
    pub total_commission: Decimal,
}

/// Builds the referral summary of a user.
pub async fn referral_overview(db: &DatabaseConnection, user_id: &str) -> Result<ReferralOverview> {
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let referrals = Referral::find()
        .filter(referral::Column::ReferrerId.eq(user_id))
        .order_by_asc(referral::Column::Level)
        .order_by_desc(referral::Column::CreatedAt)
        .all(db)
        .await?;
    let commissions = Commission::find()
        .filter(commission::Column::ReferrerId.eq(user_id))
        .order_by_desc(commission::Column::CreatedAt)
        .all(db)
        .await?;
    let total: i64 = commissions.iter().map(|c| c.amount).sum();

    Ok(ReferralOverview {
        referral_code: user.referral_code,
        referrals,
        commissions,
        total_commission: money::from_cents(total),
    })
}
