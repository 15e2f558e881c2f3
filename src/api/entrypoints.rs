// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

pub const AGENT_NAME: &str = "approval-risk-auditor";
pub const AGENT_DESCRIPTION: &str = "Flag unlimited or stale ERC-20 / NFT approvals";
pub const AUDIT_DESCRIPTION: &str = "Audit a wallet for risky ERC-20 and NFT approvals.";
pub const AUDIT_INVOKE_PATH: &str = "/entrypoints/audit/invoke";

/// Service manifest.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub entrypoints: Vec<Entrypoint>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Entrypoint {
    pub key: String,
    pub description: String,
    pub path: String,
    /// Present only when the payment gate is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<EntrypointPrice>,
}

/// Per-call price in atomic units of `asset`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EntrypointPrice {
    pub amount: String,
    pub asset: String,
    pub network: String,
    pub pay_to: String,
}

#[utoipa::path(
    get,
    path = "/entrypoints",
    tag = "Audit",
    responses((status = 200, body = AgentManifest))
)]
pub async fn list_entrypoints(State(state): State<AppState>) -> Json<AgentManifest> {
    let price = state.payment_gate.as_ref().map(|gate| {
        let config = gate.config();
        EntrypointPrice {
            amount: config.max_amount_required.clone(),
            asset: config.asset.clone(),
            network: config.network.clone(),
            pay_to: config.pay_to.clone(),
        }
    });

    Json(AgentManifest {
        name: AGENT_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: AGENT_DESCRIPTION.to_string(),
        entrypoints: vec![Entrypoint {
            key: "audit".to_string(),
            description: AUDIT_DESCRIPTION.to_string(),
            path: AUDIT_INVOKE_PATH.to_string(),
            price,
        }],
    })
}
