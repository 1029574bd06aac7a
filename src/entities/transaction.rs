//! Transaction entity - append-only audit log of every money movement.
//!
//! Rows in a terminal status (`approved`, `rejected`, `completed`) are never reprocessed.
use super::enums::{PaymentMethod, TransactionStatus, TransactionType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Opaque UUID string
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// User whose balance moved
    pub user_id: String,
    /// Cause of the movement
    pub transaction_type: TransactionType,
    /// Amount moved, always non-negative (centavos)
    pub amount: i64,
    /// Processing state
    pub status: TransactionStatus,
    /// Payment rail for deposits and withdrawals
    pub payment_method: Option<PaymentMethod>,
    /// Link or reference to a payment receipt
    pub payment_proof: Option<String>,
    /// Free text
    pub notes: Option<String>,
    /// Admin who approved or rejected the request
    pub processed_by: Option<String>,
    /// When the row was written
    pub created_at: DateTimeUtc,
    /// When the row reached its current status
    pub processed_at: Option<DateTimeUtc>,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one user
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
