//! Application configuration loaded from `config.toml`.
//!
//! Every section has defaults reproducing the seeded production setup: four plans locking
//! principal for 48 hours up to one month, a six-hour accrual cycle with a one-minute
//! safety-net sweep, and a five-level referral commission table. An empty file is valid.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Accrual timers
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Investment plans to seed into an empty catalog
    #[serde(default = "default_plans")]
    pub plans: Vec<PlanConfig>,
    /// Defaults for platform settings missing from the database
    #[serde(default)]
    pub platform: PlatformConfig,
    /// Referral commission table
    #[serde(default)]
    pub referral: ReferralConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerSettings::default(),
            plans: default_plans(),
            platform: PlatformConfig::default(),
            referral: ReferralConfig::default(),
        }
    }
}

/// Timer configuration for the profit accrual scheduler
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Coarse cadence, equal to the profit cycle length
    #[serde(default = "default_accrual_interval_hours")]
    pub accrual_interval_hours: u64,
    /// Fine cadence catching investments that became due between coarse runs
    #[serde(default = "default_safety_net_interval_secs")]
    pub safety_net_interval_secs: u64,
}

impl SchedulerSettings {
    /// Coarse interval as a `Duration`.
    #[must_use]
    pub const fn accrual_interval(&self) -> Duration {
        Duration::from_secs(self.accrual_interval_hours.saturating_mul(3600))
    }

    /// Fine interval as a `Duration`.
    #[must_use]
    pub const fn safety_net_interval(&self) -> Duration {
        Duration::from_secs(self.safety_net_interval_secs)
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            accrual_interval_hours: default_accrual_interval_hours(),
            safety_net_interval_secs: default_safety_net_interval_secs(),
        }
    }
}

const fn default_accrual_interval_hours() -> u64 {
    6
}

const fn default_safety_net_interval_secs() -> u64 {
    60
}

/// Configuration for a single investment plan
#[derive(Debug, Deserialize, Clone)]
pub struct PlanConfig {
    /// Plan identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Marketing description
    #[serde(default)]
    pub description: Option<String>,
    /// Lock period in hours
    pub lock_hours: i32,
    /// Minimum principal in reais
    pub min_amount: Decimal,
    /// Maximum principal in reais
    pub max_amount: Decimal,
    /// Advertised profit rate per cycle (0.20 = 20%)
    pub profit_rate: Decimal,
    /// Cycle length in hours
    #[serde(default = "default_profit_interval_hours")]
    pub profit_interval_hours: i32,
    /// Highlighted in listings
    #[serde(default)]
    pub popular: bool,
    /// Accepts new investments
    #[serde(default = "default_true")]
    pub active: bool,
}

const fn default_profit_interval_hours() -> i32 {
    6
}

const fn default_true() -> bool {
    true
}

fn seeded_plan(id: &str, name: &str, lock_hours: i32, popular: bool, description: &str) -> PlanConfig {
    PlanConfig {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        lock_hours,
        min_amount: Decimal::new(200, 0),
        max_amount: Decimal::new(5000, 0),
        profit_rate: Decimal::new(20, 2),
        profit_interval_hours: default_profit_interval_hours(),
        popular,
        active: true,
    }
}

fn default_plans() -> Vec<PlanConfig> {
    vec![
        seeded_plan(
            "plan_48h",
            "Plano 48 Horas",
            48,
            false,
            "Bloqueio de 48 horas. R$40 de lucro por R$200 a cada 6 horas.",
        ),
        seeded_plan(
            "plan_5d",
            "Plano 5 Dias",
            120,
            true,
            "Bloqueio de 5 dias. R$40 de lucro por R$200 a cada 6 horas.",
        ),
        seeded_plan(
            "plan_1w",
            "Plano 1 Semana",
            168,
            false,
            "Bloqueio de 1 semana. R$40 de lucro por R$200 a cada 6 horas.",
        ),
        seeded_plan(
            "plan_1m",
            "Plano 1 Mês",
            720,
            false,
            "Bloqueio de 1 mês. R$40 de lucro por R$200 a cada 6 horas.",
        ),
    ]
}

/// Default platform settings, written to the database only when a key is missing
#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    /// Fee charged per withdrawal, in reais
    #[serde(default = "default_withdrawal_fee")]
    pub withdrawal_fee: Decimal,
    /// `"require_deposit"` or `"deduct_from_balance"`
    #[serde(default = "default_withdrawal_fee_method")]
    pub withdrawal_fee_method: String,
    /// Smallest deposit accepted
    #[serde(default = "default_min_deposit")]
    pub min_deposit: Decimal,
    /// Largest deposit accepted
    #[serde(default = "default_max_deposit")]
    pub max_deposit: Decimal,
    /// Smallest withdrawal accepted
    #[serde(default = "default_min_withdrawal")]
    pub min_withdrawal: Decimal,
    /// Deposit instructions shown to users
    #[serde(default)]
    pub payment_methods: PaymentMethods,
}

/// Where users send deposits and how they reach support. Unset entries are not shown.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PaymentMethods {
    /// CPF the PIX key is registered to
    #[serde(default)]
    pub pix_cpf: Option<String>,
    /// Bank holding the PIX account
    #[serde(default)]
    pub pix_bank: Option<String>,
    /// Account holder name
    #[serde(default)]
    pub pix_name: Option<String>,
    /// USDT deposit address on TRON
    #[serde(default)]
    pub usdt_wallet_trc20: Option<String>,
    /// USDT deposit address on BNB Smart Chain
    #[serde(default)]
    pub usdt_wallet_bep20: Option<String>,
    /// Bybit account for internal transfers
    #[serde(default)]
    pub bybit_uid: Option<String>,
    /// Support phone number
    #[serde(default)]
    pub whatsapp_support: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            withdrawal_fee: default_withdrawal_fee(),
            withdrawal_fee_method: default_withdrawal_fee_method(),
            min_deposit: default_min_deposit(),
            max_deposit: default_max_deposit(),
            min_withdrawal: default_min_withdrawal(),
            payment_methods: PaymentMethods::default(),
        }
    }
}

fn default_withdrawal_fee() -> Decimal {
    Decimal::new(500, 0)
}

fn default_withdrawal_fee_method() -> String {
    "require_deposit".to_string()
}

fn default_min_deposit() -> Decimal {
    Decimal::new(50, 0)
}

fn default_max_deposit() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_min_withdrawal() -> Decimal {
    Decimal::new(10, 0)
}

/// Referral commission configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReferralConfig {
    /// Commission percentage per level; index 0 is the direct referrer
    #[serde(default = "default_commission_rates")]
    pub commission_rates: Vec<Decimal>,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            commission_rates: default_commission_rates(),
        }
    }
}

fn default_commission_rates() -> Vec<Decimal> {
    [10, 5, 3, 2, 1].into_iter().map(Decimal::from).collect()
}

/// Loads the application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A field has the wrong type
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `CONFIG_PATH` (default `./config.toml`).
///
/// A missing file is not an error: the built-in defaults are used instead.
pub fn load_default_config() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        load_config(&path)
    } else {
        tracing::warn!(path = %path, "config file not found, using built-in defaults");
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_empty_config_uses_seeded_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.plans.len(), 4);
        assert_eq!(config.plans[0].id, "plan_48h");
        assert_eq!(config.plans[0].lock_hours, 48);
        assert_eq!(config.plans[0].min_amount, Decimal::new(200, 0));
        assert_eq!(config.scheduler.accrual_interval_hours, 6);
        assert_eq!(config.scheduler.safety_net_interval_secs, 60);
        assert_eq!(config.platform.min_withdrawal, Decimal::new(10, 0));
        assert_eq!(config.referral.commission_rates.len(), 5);
        assert_eq!(config.referral.commission_rates[0], Decimal::from(10));
    }

    #[test]
    fn test_parse_plan_config() {
        let toml_str = r#"
            [scheduler]
            accrual_interval_hours = 4
            safety_net_interval_secs = 30

            [[plans]]
            id = "plan_short"
            name = "Short"
            lock_hours = 24
            min_amount = "100"
            max_amount = "1000"
            profit_rate = "0.10"
            profit_interval_hours = 4

            [platform.payment_methods]
            pix_cpf = "000.000.000-00"
            whatsapp_support = "+55 11 90000-0000"

            [referral]
            commission_rates = ["7", "3"]
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.plans.len(), 1);
        let plan = &config.plans[0];
        assert_eq!(plan.id, "plan_short");
        assert_eq!(plan.max_amount, Decimal::new(1000, 0));
        assert_eq!(plan.profit_rate, Decimal::new(10, 2));
        assert!(plan.active);
        assert!(!plan.popular);
        assert_eq!(config.scheduler.accrual_interval(), Duration::from_secs(4 * 3600));
        assert_eq!(config.scheduler.safety_net_interval(), Duration::from_secs(30));
        assert_eq!(config.referral.commission_rates, vec![Decimal::from(7), Decimal::from(3)]);
        let methods = &config.platform.payment_methods;
        assert_eq!(methods.pix_cpf.as_deref(), Some("000.000.000-00"));
        assert_eq!(methods.whatsapp_support.as_deref(), Some("+55 11 90000-0000"));
        assert!(methods.usdt_wallet_trc20.is_none());
        assert_eq!(config.platform.min_withdrawal, Decimal::new(10, 0));
    }

    #[test]
    fn test_huge_accrual_interval_saturates() {
        let settings = SchedulerSettings {
            accrual_interval_hours: u64::MAX,
            safety_net_interval_secs: 60,
        };
        assert_eq!(settings.accrual_interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("plans = 3");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
