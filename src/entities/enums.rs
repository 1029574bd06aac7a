//! Active enums shared by several entities.
//!
//! All enums are stored as lowercase snake_case strings so the database stays readable and
//! matches the JSON representation used by the request layer.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Approval state of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Registered, waiting for admin approval
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Approved
    #[sea_orm(string_value = "active")]
    Active,
    /// Blocked by an admin after approval
    #[sea_orm(string_value = "suspended")]
    Suspended,
    /// Registration refused
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Lifecycle of an investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    /// Accruing profit
    #[sea_orm(string_value = "active")]
    Active,
    /// All cycles paid and principal returned
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Stopped before completion
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl InvestmentStatus {
    /// `completed` and `cancelled` are never processed again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Cause of a money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Money coming in, approved manually
    #[sea_orm(string_value = "deposit")]
    Deposit,
    /// Money going out, processed manually
    #[sea_orm(string_value = "withdrawal")]
    Withdrawal,
    /// Principal locked into an investment
    #[sea_orm(string_value = "investment")]
    Investment,
    /// One accrual cycle paid out
    #[sea_orm(string_value = "profit")]
    Profit,
    /// Commission earned from a referred user's investment
    #[sea_orm(string_value = "referral_bonus")]
    ReferralBonus,
    /// Manual balance correction
    #[sea_orm(string_value = "admin_adjustment")]
    AdminAdjustment,
}

impl TransactionType {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Investment => "investment",
            Self::Profit => "profit",
            Self::ReferralBonus => "referral_bonus",
            Self::AdminAdjustment => "admin_adjustment",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Waiting for an admin
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Deposit accepted and credited
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Refused by an admin
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Finished
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Withdrawal being paid out
    #[sea_orm(string_value = "processing")]
    Processing,
}

impl TransactionStatus {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Processing => "processing",
        }
    }

    /// Terminal statuses must never be reprocessed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Completed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment rail used for deposits and withdrawals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Brazilian instant payment
    #[sea_orm(string_value = "pix")]
    Pix,
    /// Tether transfer
    #[sea_orm(string_value = "usdt")]
    Usdt,
    /// Internal exchange transfer by UID
    #[sea_orm(string_value = "bybit_uid")]
    BybitUid,
}

impl PaymentMethod {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pix => "pix",
            Self::Usdt => "usdt",
            Self::BybitUid => "bybit_uid",
        }
    }
}
