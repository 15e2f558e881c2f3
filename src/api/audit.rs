// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use tracing::info;

use crate::{
    audit::run_audit,
    config::API_KEY_ENV,
    error::ApiError,
    models::{AuditInput, AuditRequest, AuditResult},
    state::AppState,
};

/// Checked audit input.
#[derive(Debug, PartialEq, Eq)]
struct ValidatedInput {
    wallet: String,
    chains: Vec<String>,
}

fn validate(input: AuditInput) -> Result<ValidatedInput, ApiError> {
    let wallet = input.wallet.trim();
    if wallet.is_empty() {
        return Err(ApiError::bad_request("wallet must not be empty"));
    }
    let chains = input
        .chains
        .iter()
        .enumerate()
        .map(|(index, chain)| {
            let chain = chain.trim();
            if chain.is_empty() {
                Err(ApiError::bad_request(format!("chains[{index}] must not be empty")))
            } else {
                Ok(chain.to_string())
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedInput {
        wallet: wallet.to_string(),
        chains,
    })
}

#[utoipa::path(
    post,
    path = "/entrypoints/audit/invoke",
    request_body = AuditRequest,
    tag = "Audit",
    responses(
        (status = 200, body = AuditResult),
        (status = 400, description = "Blank wallet or chain slug"),
        (status = 402, description = "Payment required (when the payment gate is enabled)"),
        (status = 500, description = "Indexer credential not configured")
    )
)]
pub async fn invoke_audit(
    State(state): State<AppState>,
    Json(request): Json<AuditRequest>,
) -> Result<Json<AuditResult>, ApiError> {
    let input = validate(request.input)?;

    let client = state
        .indexer_client()
        .ok_or_else(|| ApiError::internal(format!("{API_KEY_ENV} is not set on the server.")))?;

    info!(wallet = %input.wallet, chains = ?input.chains, "Audit requested");
    let result = run_audit(
        &client,
        &input.wallet,
        &input.chains,
        state.config.chain_timeout,
    )
    .await;

    Ok(Json(result))
}
