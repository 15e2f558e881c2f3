// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use reqwest::Client;

use crate::config::AppConfig;
use crate::indexer::{IndexerClient, IndexerError};
use crate::payment::{PaymentError, PaymentGate};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Shared connection pool for indexer calls.
    pub http: Client,
    /// `None` when the payment gate is disabled.
    pub payment_gate: Option<PaymentGate>,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Indexer(#[from] IndexerError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, StateError> {
        let http = Client::builder()
            .timeout(config.indexer_http_timeout)
            .build()
            .map_err(|e| IndexerError::Request(format!("failed to build HTTP client: {e}")))?;

        let payment_gate = config.payment.clone().map(PaymentGate::new).transpose()?;

        Ok(Self {
            config: Arc::new(config),
            http,
            payment_gate,
        })
    }

    /// Indexer client for the configured key, or `None` when it is unset.
    pub fn indexer_client(&self) -> Option<IndexerClient> {
        self.config.indexer_api_key.as_ref().map(|key| {
            IndexerClient::with_http_client(
                self.config.indexer_base_url.clone(),
                key.clone(),
                self.http.clone(),
            )
        })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            config: Arc::new(AppConfig::default()),
            http: Client::new(),
            payment_gate: None,
        }
    }
}
