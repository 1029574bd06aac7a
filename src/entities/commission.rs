//! Commission entity - a single commission paid to a referrer for one investment.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Commission database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commissions")]
pub struct Model {
    /// Opaque UUID string
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Referral the commission was paid through
    pub referral_id: String,
    /// Beneficiary
    pub referrer_id: String,
    /// Investor
    pub referred_user_id: String,
    /// Investment that generated the commission
    pub investment_id: String,
    /// Referral level
    pub level: i32,
    /// Rate applied in basis points
    pub rate_bps: i32,
    /// Amount paid (centavos)
    pub amount: i64,
    /// Payment time
    pub created_at: DateTimeUtc,
}

/// `Commission` has no declared relationships
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
