// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        ApprovalDetails, ApprovalRecord, AuditInput, AuditRequest, AuditResult, RevocationPayload,
        RiskTag,
    },
    payment::require_payment,
    state::AppState,
};

pub mod audit;
pub mod entrypoints;
pub mod health;

use entrypoints::AUDIT_INVOKE_PATH;

pub fn router(state: AppState) -> Router {
    let mut audit_routes = Router::new().route(AUDIT_INVOKE_PATH, post(audit::invoke_audit));
    if let Some(gate) = state.payment_gate.clone() {
        audit_routes =
            audit_routes.route_layer(middleware::from_fn_with_state(gate, require_payment));
    }

    let routes = Router::new()
        .route("/entrypoints", get(entrypoints::list_entrypoints))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .merge(audit_routes)
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        audit::invoke_audit,
        entrypoints::list_entrypoints,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            AuditRequest,
            AuditInput,
            AuditResult,
            ApprovalRecord,
            ApprovalDetails,
            RiskTag,
            RevocationPayload,
            entrypoints::AgentManifest,
            entrypoints::Entrypoint,
            entrypoints::EntrypointPrice,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Audit", description = "Token approval risk audits"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;
