//! User business logic - registration, admin approval and the dashboard summary.
//!
//! New accounts start `pending` with zero balances and must be approved by an admin before
//! they can log in. Credentials live in the request layer; this module only owns the record.

use super::{
    balance::BalanceSnapshot,
    investment::count_active_investments,
    referral::record_referral_chain,
    settings::load_settings,
    transaction::get_recent_transactions,
};
use crate::{
    entities::{Referral, User, UserStatus, referral, transaction, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::info;

const DEFAULT_COUNTRY: &str = "Brasil";
const REFERRAL_PREFIX_LEN: usize = 6;
const REFERRAL_CODE_ATTEMPTS: usize = 5;
const DASHBOARD_TRANSACTIONS: u64 = 5;

/// Registration data, already validated for shape by the request layer.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Login e-mail, stored lowercased
    pub email: String,
    /// Public handle
    pub username: String,
    /// Display name
    pub full_name: String,
    /// Defaults to Brasil
    pub country: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Brazilian taxpayer id
    pub cpf: Option<String>,
    /// PIX key for payouts
    pub pix_key: Option<String>,
    /// USDT wallet for payouts
    pub usdt_wallet: Option<String>,
    /// Code of the user who referred this one
    pub referral_code: Option<String>,
}

/// Profile changes. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// Display name
    pub full_name: Option<String>,
    /// Public handle, must stay unique
    pub username: Option<String>,
    /// Login e-mail, must stay unique
    pub email: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Brazilian taxpayer id
    pub cpf: Option<String>,
    /// PIX key for payouts
    pub pix_key: Option<String>,
    /// USDT wallet for payouts
    pub usdt_wallet: Option<String>,
    /// Country of residence
    pub country: Option<String>,
    /// Approval state, admin updates only
    pub status: Option<UserStatus>,
}

fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() || !email.contains('@') {
        return Err(Error::validation("A valid email is required"));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<()> {
    if username.is_empty()
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(Error::validation(
            "Username may only contain letters, digits, '_' and '.'",
        ));
    }
    Ok(())
}

fn validate(new: &NewUser) -> Result<()> {
    validate_email(new.email.trim())?;
    validate_username(new.username.trim())?;
    if new.full_name.trim().is_empty() {
        return Err(Error::validation("Full name is required"));
    }
    Ok(())
}

fn referral_code_candidate(username: &str) -> String {
    let prefix: String = username
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(REFERRAL_PREFIX_LEN)
        .collect::<String>()
        .to_ascii_uppercase();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}{}", suffix[..4].to_ascii_uppercase())
}

async fn generate_referral_code<C>(conn: &C, username: &str) -> Result<String>
where
    C: ConnectionTrait,
{
    for _ in 0..REFERRAL_CODE_ATTEMPTS {
        let code = referral_code_candidate(username);
        let taken = User::find()
            .filter(user::Column::ReferralCode.eq(code.as_str()))
            .count(conn)
            .await?
            > 0;
        if !taken {
            return Ok(code);
        }
    }
    Err(Error::validation("Could not generate a unique referral code"))
}

/// Registers a new user in `pending` status.
///
/// # Errors
/// `Validation` for a malformed or duplicate email/username, or an unknown referral code.
pub async fn register_user(db: &DatabaseConnection, new: NewUser) -> Result<user::Model> {
    validate(&new)?;
    let email = new.email.trim().to_lowercase();
    let username = new.username.trim().to_string();
    let now = Utc::now();

    let txn = db.begin().await?;

    let email_taken = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .count(&txn)
        .await?
        > 0;
    if email_taken {
        return Err(Error::validation("Email already registered"));
    }
    let username_taken = User::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .count(&txn)
        .await?
        > 0;
    if username_taken {
        return Err(Error::validation("Username already taken"));
    }

    let referrer = match new.referral_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(
            User::find()
                .filter(user::Column::ReferralCode.eq(code))
                .one(&txn)
                .await?
                .ok_or_else(|| Error::validation(format!("Invalid referral code: {code}")))?,
        ),
        _ => None,
    };

    let referral_code = generate_referral_code(&txn, &username).await?;
    let created = user::ActiveModel {
        id: Set(super::new_id()),
        email: Set(email),
        username: Set(username),
        full_name: Set(new.full_name.trim().to_string()),
        country: Set(Some(
            new.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        )),
        phone: Set(new.phone),
        cpf: Set(new.cpf),
        pix_key: Set(new.pix_key),
        usdt_wallet: Set(new.usdt_wallet),
        status: Set(UserStatus::Pending),
        is_admin: Set(false),
        brl_balance: Set(0),
        available_for_withdrawal: Set(0),
        total_invested: Set(0),
        total_returns: Set(0),
        referral_bonus: Set(0),
        bonus_balance: Set(0),
        referral_code: Set(referral_code),
        referred_by: Set(referrer.as_ref().map(|r| r.id.clone())),
        kyc_verified: Set(false),
        kyc_percentage: Set(0),
        created_at: Set(now),
        approved_at: Set(None),
    }
    .insert(&txn)
    .await?;

    if let Some(referrer) = &referrer {
        let levels = load_settings(&txn).await?.commission_rates.len();
        record_referral_chain(&txn, &referrer.id, &created.id, levels, now).await?;
    }

    txn.commit().await?;

    info!(user_id = %created.id, username = %created.username, "user registered");
    Ok(created)
}

/// Retrieves a user by id.
pub async fn get_user(db: &DatabaseConnection, user_id: &str) -> Result<user::Model> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))
}

/// Retrieves a user by email.
pub async fn find_user_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists users, newest first, optionally only those in `status`.
pub async fn list_users(
    db: &DatabaseConnection,
    status: Option<UserStatus>,
) -> Result<Vec<user::Model>> {
    let mut query = User::find();
    if let Some(status) = status {
        query = query.filter(user::Column::Status.eq(status));
    }
    query
        .order_by_desc(user::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn set_status(
    db: &DatabaseConnection,
    admin_id: &str,
    user_id: &str,
    status: UserStatus,
) -> Result<user::Model> {
    let user = get_user(db, user_id).await?;
    let mut model: user::ActiveModel = user.into();
    model.status = Set(status);
    if status == UserStatus::Active {
        model.approved_at = Set(Some(Utc::now()));
    }
    let updated = model.update(db).await?;
    info!(admin_id, user_id, status = ?status, "user status changed");
    Ok(updated)
}

/// Approves a user so they can log in.
pub async fn approve_user(
    db: &DatabaseConnection,
    admin_id: &str,
    user_id: &str,
) -> Result<user::Model> {
    set_status(db, admin_id, user_id, UserStatus::Active).await
}

/// Rejects a pending registration.
pub async fn reject_user(
    db: &DatabaseConnection,
    admin_id: &str,
    user_id: &str,
) -> Result<user::Model> {
    set_status(db, admin_id, user_id, UserStatus::Rejected).await
}

/// Suspends an account.
pub async fn suspend_user(
    db: &DatabaseConnection,
    admin_id: &str,
    user_id: &str,
) -> Result<user::Model> {
    set_status(db, admin_id, user_id, UserStatus::Suspended).await
}

async fn ensure_unique<C>(
    conn: &C,
    column: user::Column,
    value: &str,
    user_id: &str,
    message: &str,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let taken = User::find()
        .filter(column.eq(value))
        .filter(user::Column::Id.ne(user_id))
        .count(conn)
        .await?
        > 0;
    if taken {
        return Err(Error::validation(message));
    }
    Ok(())
}

async fn apply_update(
    db: &DatabaseConnection,
    user_id: &str,
    update: UserUpdate,
) -> Result<user::Model> {
    let txn = db.begin().await?;
    let current = User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    let mut model: user::ActiveModel = current.into();

    if let Some(email) = update.email {
        let email = email.trim().to_lowercase();
        validate_email(&email)?;
        ensure_unique(&txn, user::Column::Email, &email, user_id, "Email already registered")
            .await?;
        model.email = Set(email);
    }
    if let Some(username) = update.username {
        let username = username.trim().to_string();
        validate_username(&username)?;
        ensure_unique(&txn, user::Column::Username, &username, user_id, "Username already taken")
            .await?;
        model.username = Set(username);
    }
    if let Some(full_name) = update.full_name {
        let full_name = full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(Error::validation("Full name is required"));
        }
        model.full_name = Set(full_name);
    }
    if let Some(phone) = update.phone {
        model.phone = Set(Some(phone));
    }
    if let Some(cpf) = update.cpf {
        model.cpf = Set(Some(cpf));
    }
    if let Some(pix_key) = update.pix_key {
        model.pix_key = Set(Some(pix_key));
    }
    if let Some(usdt_wallet) = update.usdt_wallet {
        model.usdt_wallet = Set(Some(usdt_wallet));
    }
    if let Some(country) = update.country {
        model.country = Set(Some(country));
    }
    if let Some(status) = update.status {
        model.status = Set(status);
        if status == UserStatus::Active {
            model.approved_at = Set(Some(Utc::now()));
        }
    }

    let updated = model.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Updates the caller's own profile.
///
/// # Errors
/// `Validation` if the update changes the status or breaks email/username rules.
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: &str,
    update: UserUpdate,
) -> Result<user::Model> {
    if update.status.is_some() {
        return Err(Error::validation("Account status is changed by admins only"));
    }
    let updated = apply_update(db, user_id, update).await?;
    info!(user_id, "profile updated");
    Ok(updated)
}

/// Updates any field of a user, status included.
///
/// # Errors
/// `NotFound` for an unknown user, `Validation` as for [`update_profile`].
pub async fn update_user(
    db: &DatabaseConnection,
    admin_id: &str,
    user_id: &str,
    update: UserUpdate,
) -> Result<user::Model> {
    let updated = apply_update(db, user_id, update).await?;
    info!(admin_id, user_id, "user updated by admin");
    Ok(updated)
}

/// Grants or revokes admin rights.
pub async fn set_admin(db: &DatabaseConnection, user_id: &str, is_admin: bool) -> Result<user::Model> {
    let user = get_user(db, user_id).await?;
    let mut model: user::ActiveModel = user.into();
    model.is_admin = Set(is_admin);
    Ok(model.update(db).await?)
}

/// Summary shown on the user's home screen.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// User id
    pub user_id: String,
    /// Display name
    pub full_name: String,
    /// Approval state
    pub status: UserStatus,
    /// Balance fields in reais
    pub balances: BalanceSnapshot,
    /// Investments still accruing
    pub active_investments: u64,
    /// Direct referrals only
    pub total_referrals: u64,
    /// Latest transactions, newest first
    pub recent_transactions: Vec<transaction::Model>,
}

/// Builds the dashboard of a user.
pub async fn dashboard(db: &DatabaseConnection, user_id: &str) -> Result<Dashboard> {
    let user = get_user(db, user_id).await?;
    let active_investments = count_active_investments(db, user_id).await?;
    let total_referrals = Referral::find()
        .filter(referral::Column::ReferrerId.eq(user_id))
        .filter(referral::Column::Level.eq(1))
        .count(db)
        .await?;
    let recent_transactions = get_recent_transactions(db, user_id, DASHBOARD_TRANSACTIONS).await?;

    Ok(Dashboard {
        balances: BalanceSnapshot::from(&user),
        user_id: user.id,
        full_name: user.full_name,
        status: user.status,
        active_investments,
        total_referrals,
        recent_transactions,
    })
}
