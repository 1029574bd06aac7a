//! User entity - account identity, approval state and the balance fields the ledger mutates.
//!
//! All money columns hold centavos. `available_for_withdrawal <= brl_balance` must hold at all
//! times, and every change to a balance column is paired with exactly one transaction row.

use super::enums::UserStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Opaque UUID string
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Login e-mail, unique
    #[sea_orm(unique)]
    pub email: String,
    /// Public handle, unique
    #[sea_orm(unique)]
    pub username: String,
    /// Display name
    pub full_name: String,
    /// Country of residence
    pub country: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Brazilian taxpayer id
    pub cpf: Option<String>,
    /// PIX key for payouts
    pub pix_key: Option<String>,
    /// USDT wallet for payouts
    pub usdt_wallet: Option<String>,
    /// Approval state
    pub status: UserStatus,
    /// Admin accounts may approve requests and adjust balances
    pub is_admin: bool,
    /// Total fiat balance (centavos)
    pub brl_balance: i64,
    /// Liquid, withdrawable part of `brl_balance` (centavos)
    pub available_for_withdrawal: i64,
    /// Principal locked in active investments (centavos)
    pub total_invested: i64,
    /// Cumulative profit paid (centavos)
    pub total_returns: i64,
    /// Cumulative referral commissions (centavos)
    pub referral_bonus: i64,
    /// Promotional balance (centavos)
    pub bonus_balance: i64,
    /// Code other users register with
    #[sea_orm(unique)]
    pub referral_code: String,
    /// Id of the user whose code was used at registration
    pub referred_by: Option<String>,
    /// Placeholder, verification is handled elsewhere
    pub kyc_verified: bool,
    /// Placeholder, verification is handled elsewhere
    pub kyc_percentage: i32,
    /// Registration time
    pub created_at: DateTimeUtc,
    /// When an admin approved the account
    pub approved_at: Option<DateTimeUtc>,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user owns many investments
    #[sea_orm(has_many = "super::investment::Entity")]
    Investments,
    /// One user owns many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::investment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Investments.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
