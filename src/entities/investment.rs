//! Investment entity - principal locked under a plan and its accrual cycle state.
//!
//! Invariants: `0 <= completed_cycles <= total_cycles`, and `status == completed` exactly when
//! `completed_cycles == total_cycles`. Only the accrual engine advances the cycle state.

use super::enums::InvestmentStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Investment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "investments")]
pub struct Model {
    /// Opaque UUID string
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owner
    pub user_id: String,
    /// Plan the investment was created against
    pub plan_id: String,
    /// Plan name at creation time
    pub plan_name: String,
    /// Principal (centavos)
    pub amount: i64,
    /// `profit_per_cycle * total_cycles` (centavos)
    pub total_profit: i64,
    /// Profit credited per cycle (centavos)
    pub profit_per_cycle: i64,
    /// Cycle length copied from the plan
    pub profit_interval_hours: i32,
    /// `lock_hours / profit_interval_hours`, truncated
    pub total_cycles: i32,
    /// Cycles already paid
    pub completed_cycles: i32,
    /// Lifecycle state
    pub status: InvestmentStatus,
    /// Creation time
    pub start_date: DateTimeUtc,
    /// `start_date + lock_hours`
    pub end_date: DateTimeUtc,
    /// Time of the last accrual
    pub last_profit_at: Option<DateTimeUtc>,
    /// Earliest time the next accrual may run
    pub next_profit_at: DateTimeUtc,
    /// Insert time, used for listing order
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Investment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each investment belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
