//! Referral entity - one row per (referrer, referred user, level) in the upline chain.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Referral database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "referrals")]
pub struct Model {
    /// Opaque UUID string
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// User earning commissions
    pub referrer_id: String,
    /// User whose investments generate commissions
    pub referred_user_id: String,
    /// 1 for a direct referral, 2 for a referral of a referral, ...
    pub level: i32,
    /// Always `"active"` for now
    pub status: String,
    /// Sum of commissions paid through this referral (centavos)
    pub total_commission: i64,
    /// When the referred user registered
    pub created_at: DateTimeUtc,
}

/// `Referral` points at two users, so the joins are written by hand
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
