/// Database configuration and connection management
pub mod database;

/// Application settings loaded from config.toml
pub mod settings;

pub use settings::{
    AppConfig, PaymentMethods, PlanConfig, PlatformConfig, ReferralConfig, SchedulerSettings,
};
