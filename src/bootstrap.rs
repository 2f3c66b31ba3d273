use std::{sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{error, info};

use crate::{
    api::handlers::AppState,
    config::Config,
    distribution::DistributionSplitter,
    error::AppResult,
    ledger::{repository::LedgerRepository, store::LedgerStore},
    notify::{NotificationOutbox, NotificationSink},
    payout::{
        scheduler::{PayoutScheduleConfig, PayoutScheduler},
        PayoutBatcher, SettlementService,
    },
    processor::{StripeTransferClient, TransferGateway},
    reconciliation::ReconciliationHandler,
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components...");

    if config.stripe_secret_key.is_empty() {
        return Err(crate::error::AppError::Config(
            "STRIPE_SECRET_KEY must be set".to_string(),
        ));
    }

    let pool = initialize_database(&config.database_url).await?;

    let ledger: Arc<dyn LedgerStore> = Arc::new(LedgerRepository::new(pool.clone()));
    let gateway: Arc<dyn TransferGateway> = Arc::new(StripeTransferClient::new(
        config.stripe_secret_key.clone(),
        config.stripe_api_url.clone(),
    ));
    let notifier: Arc<dyn NotificationSink> = Arc::new(NotificationOutbox::new(pool.clone()));

    let settlement = Arc::new(SettlementService::new(
        ledger.clone(),
        gateway,
        notifier,
        config.min_payout_amount,
    ));
    let splitter = Arc::new(DistributionSplitter::new(ledger.clone()));
    let batcher = Arc::new(PayoutBatcher::new(
        ledger.clone(),
        settlement.clone(),
        config.min_payout_amount,
    ));
    let reconciliation = Arc::new(ReconciliationHandler::new(ledger.clone()));

    let scheduler = PayoutScheduler::new(
        PayoutScheduleConfig {
            frequency: config.payout_frequency,
            execution_hour: config.payout_hour_utc,
        },
        batcher.clone(),
    );
    scheduler.start();
    info!("Payout scheduler started ({:?})", config.payout_frequency);

    // Hourly sweep for claims interrupted between the claim commit and the
    // transfer call; releasing them puts the shares back in the unpaid pool.
    let sweep_ledger = ledger.clone();
    let stale_timeout = config.stale_payout_timeout_minutes;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;

            match sweep_ledger.release_stale_claims(stale_timeout).await {
                Ok(count) if count > 0 => info!("Released {} stale payout claims", count),
                Ok(_) => {}
                Err(err) => error!("Failed to release stale payout claims: {:?}", err),
            }
        }
    });
    info!("Stale claim sweep started (hourly)");

    Ok(AppState {
        ledger,
        splitter,
        batcher,
        settlement,
        reconciliation,
    })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("Database initialized");
    Ok(pool)
}
