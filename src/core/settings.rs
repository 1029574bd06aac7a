//! Platform settings business logic
//!
//! Settings live in the `platform_settings` key/value table so admins can change them at
//! runtime. Missing keys fall back to the configured defaults; `seed_settings` writes those
//! defaults once without overwriting values an admin has already changed.

use crate::{
    config::{PaymentMethods, PlatformConfig, ReferralConfig},
    entities::{PlatformSetting, platform_setting},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::str::FromStr;
use tracing::info;

const WITHDRAWAL_FEE_KEY: &str = "withdrawal_fee";
const WITHDRAWAL_FEE_METHOD_KEY: &str = "withdrawal_fee_method";
const MIN_DEPOSIT_KEY: &str = "min_deposit";
const MAX_DEPOSIT_KEY: &str = "max_deposit";
const MIN_WITHDRAWAL_KEY: &str = "min_withdrawal";
const COMMISSION_RATES_KEY: &str = "commission_rates";
const PIX_CPF_KEY: &str = "pix_cpf";
const PIX_BANK_KEY: &str = "pix_bank";
const PIX_NAME_KEY: &str = "pix_name";
const USDT_WALLET_TRC20_KEY: &str = "usdt_wallet_trc20";
const USDT_WALLET_BEP20_KEY: &str = "usdt_wallet_bep20";
const BYBIT_UID_KEY: &str = "bybit_uid";
const WHATSAPP_SUPPORT_KEY: &str = "whatsapp_support";

/// Typed view of the platform settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformSettings {
    /// Fee charged per withdrawal, in reais
    pub withdrawal_fee: Decimal,
    /// How the fee is collected (`"require_deposit"` or `"deduct_from_balance"`)
    pub withdrawal_fee_method: String,
    /// Smallest deposit accepted
    pub min_deposit: Decimal,
    /// Largest deposit accepted
    pub max_deposit: Decimal,
    /// Smallest withdrawal accepted
    pub min_withdrawal: Decimal,
    /// Referral commission percentage per level, direct referrer first
    pub commission_rates: Vec<Decimal>,
    /// Deposit instructions and support contact
    pub payment_methods: PaymentMethods,
}

impl PlatformSettings {
    /// Builds settings from the configuration file sections.
    #[must_use]
    pub fn from_config(platform: &PlatformConfig, referral: &ReferralConfig) -> Self {
        Self {
            withdrawal_fee: platform.withdrawal_fee,
            withdrawal_fee_method: platform.withdrawal_fee_method.clone(),
            min_deposit: platform.min_deposit,
            max_deposit: platform.max_deposit,
            min_withdrawal: platform.min_withdrawal,
            commission_rates: referral.commission_rates.clone(),
            payment_methods: platform.payment_methods.clone(),
        }
    }

    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let methods = &self.payment_methods;
        vec![
            (WITHDRAWAL_FEE_KEY, self.withdrawal_fee.to_string()),
            (WITHDRAWAL_FEE_METHOD_KEY, self.withdrawal_fee_method.clone()),
            (MIN_DEPOSIT_KEY, self.min_deposit.to_string()),
            (MAX_DEPOSIT_KEY, self.max_deposit.to_string()),
            (MIN_WITHDRAWAL_KEY, self.min_withdrawal.to_string()),
            (COMMISSION_RATES_KEY, format_rates(&self.commission_rates)),
            // An empty value stands for an unset entry
            (PIX_CPF_KEY, text(methods.pix_cpf.as_deref())),
            (PIX_BANK_KEY, text(methods.pix_bank.as_deref())),
            (PIX_NAME_KEY, text(methods.pix_name.as_deref())),
            (USDT_WALLET_TRC20_KEY, text(methods.usdt_wallet_trc20.as_deref())),
            (USDT_WALLET_BEP20_KEY, text(methods.usdt_wallet_bep20.as_deref())),
            (BYBIT_UID_KEY, text(methods.bybit_uid.as_deref())),
            (WHATSAPP_SUPPORT_KEY, text(methods.whatsapp_support.as_deref())),
        ]
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            WITHDRAWAL_FEE_KEY => self.withdrawal_fee = parse_decimal(key, value)?,
            WITHDRAWAL_FEE_METHOD_KEY => self.withdrawal_fee_method = value.to_string(),
            MIN_DEPOSIT_KEY => self.min_deposit = parse_decimal(key, value)?,
            MAX_DEPOSIT_KEY => self.max_deposit = parse_decimal(key, value)?,
            MIN_WITHDRAWAL_KEY => self.min_withdrawal = parse_decimal(key, value)?,
            COMMISSION_RATES_KEY => self.commission_rates = parse_rates(value)?,
            PIX_CPF_KEY => self.payment_methods.pix_cpf = optional(value),
            PIX_BANK_KEY => self.payment_methods.pix_bank = optional(value),
            PIX_NAME_KEY => self.payment_methods.pix_name = optional(value),
            USDT_WALLET_TRC20_KEY => self.payment_methods.usdt_wallet_trc20 = optional(value),
            USDT_WALLET_BEP20_KEY => self.payment_methods.usdt_wallet_bep20 = optional(value),
            BYBIT_UID_KEY => self.payment_methods.bybit_uid = optional(value),
            WHATSAPP_SUPPORT_KEY => self.payment_methods.whatsapp_support = optional(value),
            // Unknown keys belong to other consumers of the table
            _ => {}
        }
        Ok(())
    }
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self::from_config(&PlatformConfig::default(), &ReferralConfig::default())
    }
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| Error::Config {
        message: format!("Invalid value for setting {key}: {e}"),
    })
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn format_rates(rates: &[Decimal]) -> String {
    rates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_rates(value: &str) -> Result<Vec<Decimal>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_decimal(COMMISSION_RATES_KEY, part))
        .collect()
}

/// Retrieves a raw value from the `platform_settings` table.
pub async fn get_setting_value<C>(conn: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let setting = PlatformSetting::find()
        .filter(platform_setting::Column::Key.eq(key))
        .one(conn)
        .await?;
    Ok(setting.map(|s| s.value))
}

/// Sets or updates a raw value in the `platform_settings` table.
pub async fn set_setting_value<C>(conn: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();

    // Check if the key exists
    let existing = PlatformSetting::find()
        .filter(platform_setting::Column::Key.eq(key))
        .one(conn)
        .await?;

    if let Some(setting) = existing {
        let mut active_model: platform_setting::ActiveModel = setting.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(conn).await?;
    } else {
        let new_setting = platform_setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        new_setting.insert(conn).await?;
    }

    Ok(())
}

/// Loads the platform settings, using defaults for missing keys.
pub async fn load_settings<C>(conn: &C) -> Result<PlatformSettings>
where
    C: ConnectionTrait,
{
    let mut settings = PlatformSettings::default();
    for row in PlatformSetting::find().all(conn).await? {
        settings.apply(&row.key, &row.value)?;
    }
    Ok(settings)
}

fn validate(settings: &PlatformSettings) -> Result<()> {
    if settings.min_deposit > settings.max_deposit {
        return Err(Error::validation("min_deposit cannot exceed max_deposit"));
    }
    let amounts = [
        settings.withdrawal_fee,
        settings.min_deposit,
        settings.min_withdrawal,
    ];
    if amounts.iter().any(Decimal::is_sign_negative)
        || settings.commission_rates.iter().any(Decimal::is_sign_negative)
    {
        return Err(Error::validation("Settings cannot be negative"));
    }
    Ok(())
}

/// Deposit instructions currently shown to users.
pub async fn get_payment_methods<C>(conn: &C) -> Result<PaymentMethods>
where
    C: ConnectionTrait,
{
    Ok(load_settings(conn).await?.payment_methods)
}

/// Replaces the deposit instructions, leaving the other settings untouched.
pub async fn update_payment_methods(db: &DatabaseConnection, methods: &PaymentMethods) -> Result<()> {
    let mut settings = load_settings(db).await?;
    settings.payment_methods = methods.clone();
    save_settings(db, &settings).await
}

/// Replaces all settings in one transaction.
pub async fn save_settings(db: &DatabaseConnection, settings: &PlatformSettings) -> Result<()> {
    validate(settings)?;
    let txn = db.begin().await?;
    for (key, value) in settings.to_pairs() {
        set_setting_value(&txn, key, &value).await?;
    }
    txn.commit().await?;
    info!("Platform settings updated");
    Ok(())
}

/// Writes defaults for keys that are not present yet. Returns the number of keys written.
pub async fn seed_settings(db: &DatabaseConnection, defaults: &PlatformSettings) -> Result<usize> {
    validate(defaults)?;
    let txn = db.begin().await?;
    let mut written = 0;
    for (key, value) in defaults.to_pairs() {
        // Unset entries stay missing so a later configured value can still be seeded
        if value.is_empty() {
            continue;
        }
        if get_setting_value(&txn, key).await?.is_none() {
            set_setting_value(&txn, key, &value).await?;
            written += 1;
        }
    }
    txn.commit().await?;
    if written > 0 {
        info!(written, "Platform settings seeded");
    }
    Ok(written)
}
