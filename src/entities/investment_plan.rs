//! Investment plan entity - catalog entry defining lock period, bounds and accrual cadence.
//!
//! Investments copy the terms they need at creation, so editing a plan never changes
//! existing investments.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Investment plan database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "investment_plans")]
pub struct Model {
    /// Plan identifier (e.g. `"plan_48h"`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Marketing description
    pub description: Option<String>,
    /// How long the principal stays locked
    pub lock_hours: i32,
    /// Minimum principal, inclusive (centavos)
    pub min_amount: i64,
    /// Maximum principal, inclusive (centavos)
    pub max_amount: i64,
    /// Advertised profit rate per cycle in basis points
    pub profit_rate_bps: i32,
    /// Length of one accrual cycle
    pub profit_interval_hours: i32,
    /// Highlighted in listings
    pub popular: bool,
    /// Only active plans accept new investments
    pub active: bool,
}

/// `InvestmentPlan` is referenced by value snapshot, not by foreign key
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
