// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! x402 facilitator client (`/verify` and `/settle`).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{PaymentError, PaymentRequirements, X402_VERSION};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorRequest<'a> {
    x402_version: u8,
    payment_payload: &'a Value,
    payment_requirements: &'a PaymentRequirements,
}

/// `/verify` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default)]
    pub invalid_reason: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
}

/// `/settle` response, echoed to the client in `X-PAYMENT-RESPONSE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default)]
    pub transaction: String,
    #[serde(default)]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    base_url: String,
    http: Client,
}

impl FacilitatorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PaymentError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Facilitator(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub async fn verify(
        &self,
        payload: &Value,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, PaymentError> {
        self.post("/verify", payload, requirements).await
    }

    pub async fn settle(
        &self,
        payload: &Value,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, PaymentError> {
        self.post("/settle", payload, requirements).await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &Value,
        requirements: &PaymentRequirements,
    ) -> Result<T, PaymentError> {
        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirements,
        };

        let response = self
            .http
            .post(format!("{}{}", self.base_url.trim_end_matches('/'), path))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Facilitator(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Facilitator(format!(
                "POST {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Facilitator(format!("POST {path} invalid JSON: {e}")))
    }
}
