// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use approval_risk_auditor::{
    api::router,
    config::{AppConfig, API_KEY_ENV},
    state::AppState,
    telemetry::init_tracing,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("Failed to load configuration");

    init_tracing(config.log_format).expect("Failed to initialize tracing");

    if config.indexer_api_key.is_none() {
        warn!(
            variable = API_KEY_ENV,
            "Indexer API key is not set; audit requests will fail until it is configured"
        );
    }
    match &config.payment {
        Some(payment) => info!(
            network = %payment.network,
            price = %payment.max_amount_required,
            pay_to = %payment.pay_to,
            "Payment gate enabled"
        ),
        None => info!("Payment gate disabled"),
    }

    let addr = config.bind_address();
    let state = AppState::new(config).expect("Failed to initialize application state");
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listen address");

    info!(address = %addr, "Approval risk auditor listening (docs at /docs)");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down gracefully");
}
