use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handlers::{
    health_check, list_payouts, payment_webhook, retry_payout, run_payouts, transfer_webhook,
    AppState,
};

pub async fn create_app(state: AppState) -> Router {
    info!("Setting up HTTP routes...");

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // Inbound collaborator events
                .route("/webhook/payment", post(payment_webhook))
                .route("/webhook/transfer", post(transfer_webhook))
                // Operator surface
                .route("/admin/payouts/run", post(run_payouts))
                .route("/admin/payouts/:payout_id/retry", post(retry_payout))
                .route("/admin/payouts", get(list_payouts)),
        )
        .layer(CompressionLayer::new())
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
