use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use yield_ledger::{
    config::{database, settings::load_default_config},
    core::{plan, settings, user},
    errors::Result,
    scheduler::ProfitScheduler,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file (non-fatal, env vars can be set externally)
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and ensure the schema
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed plans and platform settings on first start
    plan::seed_plans(&db, &app_config.plans)
        .await
        .inspect_err(|e| error!("Failed to seed investment plans: {}", e))?;
    let defaults = settings::PlatformSettings::from_config(&app_config.platform, &app_config.referral);
    settings::seed_settings(&db, &defaults)
        .await
        .inspect_err(|e| error!("Failed to seed platform settings: {}", e))?;

    // 6. Promote the configured admin account, if any
    if let Ok(email) = env::var("ADMIN_EMAIL") {
        match user::find_user_by_email(&db, &email).await? {
            Some(admin) if admin.is_admin => {}
            Some(admin) => {
                user::set_admin(&db, &admin.id, true).await?;
                info!(email = %email, "admin rights granted");
            }
            None => warn!(email = %email, "ADMIN_EMAIL does not match a registered user"),
        }
    }

    // 7. Run the accrual scheduler until Ctrl-C
    let scheduler = ProfitScheduler::start(Arc::new(db), &app_config.scheduler);
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown requested, waiting for in-flight accrual run");
    scheduler.shutdown().await;

    Ok(())
}
