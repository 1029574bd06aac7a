//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod commission;
pub mod enums;
pub mod investment;
pub mod investment_plan;
pub mod platform_setting;
pub mod referral;
pub mod transaction;
pub mod user;

// Re-export specific types to avoid conflicts
pub use commission::{Column as CommissionColumn, Entity as Commission, Model as CommissionModel};
pub use enums::{InvestmentStatus, PaymentMethod, TransactionStatus, TransactionType, UserStatus};
pub use investment::{Column as InvestmentColumn, Entity as Investment, Model as InvestmentModel};
pub use investment_plan::{
    Column as InvestmentPlanColumn, Entity as InvestmentPlan, Model as InvestmentPlanModel,
};
pub use platform_setting::{
    Column as PlatformSettingColumn, Entity as PlatformSetting, Model as PlatformSettingModel,
};
pub use referral::{Column as ReferralColumn, Entity as Referral, Model as ReferralModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
