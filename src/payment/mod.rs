// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Pay-per-call Gate (x402)
//!
//! Axum middleware that puts a route behind an HTTP 402 payment challenge.
//!
//! ## Flow
//!
//! 1. No `X-PAYMENT` header: respond 402 with the accepted payment
//!    requirements.
//! 2. Header present: decode it and ask the facilitator to `/verify` it.
//!    Invalid proofs get another 402, an unreachable facilitator gets 502.
//! 3. Run the handler. On a 2xx result, `/settle` the payment and attach
//!    the receipt as `X-PAYMENT-RESPONSE`. A failed settlement withholds
//!    the result and answers 402.
//!
//! Signature checks and on-chain settlement belong to the facilitator. The
//! audit handler behind the gate never sees payment data.

pub mod facilitator;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub use facilitator::{FacilitatorClient, SettleResponse, VerifyResponse};

use crate::api::entrypoints::AUDIT_DESCRIPTION;
use crate::config::{ConfigError, EnvReader};
use crate::error::ApiError;

pub const X402_VERSION: u8 = 1;
pub const X_PAYMENT_HEADER: &str = "x-payment";
pub const X_PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

const DEFAULT_NETWORK: &str = "base";
const DEFAULT_PRICE: &str = "10000";
const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";
const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 60;
const FACILITATOR_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// USDC deployments the gate knows how to price in without extra config.
struct KnownAsset {
    network: &'static str,
    address: &'static str,
    name: &'static str,
    version: &'static str,
}

const KNOWN_ASSETS: &[KnownAsset] = &[
    KnownAsset {
        network: "base",
        address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        name: "USD Coin",
        version: "2",
    },
    KnownAsset {
        network: "base-sepolia",
        address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        name: "USDC",
        version: "2",
    },
];

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid X-PAYMENT header: {0}")]
    InvalidHeader(String),

    #[error("Payment facilitator error: {0}")]
    Facilitator(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Payment gate settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    pub pay_to: String,
    pub network: String,
    /// Price in atomic units of `asset`.
    pub max_amount_required: String,
    pub asset: String,
    pub asset_name: String,
    pub asset_version: String,
    pub facilitator_url: String,
    pub max_timeout_seconds: u64,
    pub public_base_url: Option<String>,
}

impl PaymentConfig {
    /// Read gate settings. Returns `Ok(None)` when `PAYMENT_PAY_TO` is unset.
    pub fn from_env(env: &EnvReader<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(pay_to) = env.optional("PAYMENT_PAY_TO") else {
            return Ok(None);
        };

        let network = env.or_default("PAYMENT_NETWORK", DEFAULT_NETWORK);
        let known = KNOWN_ASSETS.iter().find(|a| a.network == network);

        let asset = match (env.optional("PAYMENT_ASSET"), known) {
            (Some(asset), _) => asset,
            (None, Some(known)) => known.address.to_string(),
            (None, None) => {
                return Err(ConfigError::Missing(format!(
                    "PAYMENT_ASSET (no default asset for network `{network}`)"
                )))
            }
        };
        let asset_name = match (env.optional("PAYMENT_ASSET_NAME"), known) {
            (Some(name), _) => name,
            (None, Some(known)) => known.name.to_string(),
            (None, None) => env.required("PAYMENT_ASSET_NAME")?,
        };
        let asset_version = match (env.optional("PAYMENT_ASSET_VERSION"), known) {
            (Some(version), _) => version,
            (None, Some(known)) => known.version.to_string(),
            (None, None) => env.required("PAYMENT_ASSET_VERSION")?,
        };

        let price = env.or_default("PAYMENT_PRICE", DEFAULT_PRICE);
        if price.is_empty() || !price.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid {
                name: "PAYMENT_PRICE".to_string(),
                reason: format!("`{price}` is not an integer amount of atomic units"),
            });
        }

        Ok(Some(Self {
            pay_to,
            network,
            max_amount_required: price,
            asset,
            asset_name,
            asset_version,
            facilitator_url: env.url_or("PAYMENT_FACILITATOR_URL", DEFAULT_FACILITATOR_URL)?,
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            public_base_url: env.optional("PUBLIC_BASE_URL"),
        }))
    }

    /// Requirements advertised for `path`.
    pub fn requirements_for(&self, path: &str) -> PaymentRequirements {
        let resource = match &self.public_base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => path.to_string(),
        };

        PaymentRequirements {
            scheme: "exact".to_string(),
            network: self.network.clone(),
            max_amount_required: self.max_amount_required.clone(),
            resource,
            description: AUDIT_DESCRIPTION.to_string(),
            mime_type: "application/json".to_string(),
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.clone(),
            extra: AssetDomain {
                name: self.asset_name.clone(),
                version: self.asset_version.clone(),
            },
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    pub max_amount_required: String,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
    pub extra: AssetDomain,
}

/// EIP-712 domain of the payment asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetDomain {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChallenge {
    pub x402_version: u8,
    pub error: String,
    pub accepts: Vec<PaymentRequirements>,
}

// =============================================================================
// Middleware
// =============================================================================

/// Shared gate state for the middleware.
#[derive(Debug, Clone)]
pub struct PaymentGate {
    config: Arc<PaymentConfig>,
    facilitator: FacilitatorClient,
}

impl PaymentGate {
    pub fn new(config: PaymentConfig) -> Result<Self, PaymentError> {
        let facilitator =
            FacilitatorClient::new(&config.facilitator_url, FACILITATOR_HTTP_TIMEOUT)?;
        Ok(Self {
            config: Arc::new(config),
            facilitator,
        })
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }
}

/// 402 response listing what the caller must pay.
fn challenge(error: impl Into<String>, requirements: &PaymentRequirements) -> Response {
    let body = PaymentChallenge {
        x402_version: X402_VERSION,
        error: error.into(),
        accepts: vec![requirements.clone()],
    };
    (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
}

/// Decode a base64 `X-PAYMENT` header into its JSON payload.
pub fn decode_payment_header(raw: &[u8]) -> Result<Value, PaymentError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| PaymentError::InvalidHeader("not valid UTF-8".to_string()))?;
    let bytes = Base64::decode_vec(text.trim())
        .map_err(|e| PaymentError::InvalidHeader(format!("not valid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| PaymentError::InvalidHeader(format!("not valid JSON: {e}")))
}

/// Encode a settlement receipt for `X-PAYMENT-RESPONSE`.
pub fn encode_settlement(settlement: &SettleResponse) -> Result<String, PaymentError> {
    let json = serde_json::to_vec(settlement)
        .map_err(|e| PaymentError::Facilitator(format!("failed to encode settlement: {e}")))?;
    Ok(Base64::encode_string(&json))
}

/// Require a verified and settled x402 payment for the wrapped route.
pub async fn require_payment(
    State(gate): State<PaymentGate>,
    request: Request,
    next: Next,
) -> Response {
    let requirements = gate.config.requirements_for(request.uri().path());

    let payload = match request.headers().get(X_PAYMENT_HEADER) {
        None => return challenge("X-PAYMENT header is required", &requirements),
        Some(value) => match decode_payment_header(value.as_bytes()) {
            Ok(payload) => payload,
            Err(e) => return challenge(e.to_string(), &requirements),
        },
    };

    match gate.facilitator.verify(&payload, &requirements).await {
        Ok(verdict) if verdict.is_valid => {
            debug!(payer = ?verdict.payer, "Payment verified");
        }
        Ok(verdict) => {
            let reason = verdict
                .invalid_reason
                .unwrap_or_else(|| "payment is invalid".to_string());
            warn!(reason = %reason, payer = ?verdict.payer, "Payment rejected");
            return challenge(reason, &requirements);
        }
        Err(e) => {
            warn!(error = %e, "Payment verification unavailable");
            return ApiError::bad_gateway(e.to_string()).into_response();
        }
    }

    let mut response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let settlement = match gate.facilitator.settle(&payload, &requirements).await {
        Ok(settlement) if settlement.success => settlement,
        Ok(settlement) => {
            let reason = settlement
                .error_reason
                .unwrap_or_else(|| "settlement failed".to_string());
            warn!(reason = %reason, "Payment settlement rejected");
            return challenge(reason, &requirements);
        }
        Err(e) => {
            warn!(error = %e, "Payment settlement failed");
            return challenge(e.to_string(), &requirements);
        }
    };

    info!(
        transaction = %settlement.transaction,
        network = %settlement.network,
        "Payment settled"
    );

    match encode_settlement(&settlement).map(|encoded| HeaderValue::from_str(&encoded)) {
        Ok(Ok(value)) => {
            response
                .headers_mut()
                .insert(HeaderName::from_static(X_PAYMENT_RESPONSE_HEADER), value);
        }
        Ok(Err(e)) => warn!(error = %e, "Settlement receipt is not a valid header value"),
        Err(e) => warn!(error = %e, "Failed to encode settlement receipt"),
    }

    response
}
