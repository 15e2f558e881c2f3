// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup. Empty values
//! are treated as unset.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `COVALENT_API_KEY` | Indexer API bearer key | Required to serve audits |
//! | `INDEXER_BASE_URL` | Indexer API root | `https://api.covalenthq.com/v1` |
//! | `AUDIT_CHAIN_TIMEOUT_SECS` | Upper bound for one chain's fetches | `20` |
//! | `INDEXER_HTTP_TIMEOUT_SECS` | Timeout for a single indexer request | `15` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `PAYMENT_PAY_TO` | Enables the x402 gate; payment recipient | Unset (gate off) |
//! | `PAYMENT_NETWORK` | x402 network | `base` |
//! | `PAYMENT_PRICE` | Price per call in asset atomic units | `10000` |
//! | `PAYMENT_ASSET` | Payment token contract | USDC on `base`/`base-sepolia` |
//! | `PAYMENT_ASSET_NAME` | EIP-712 domain name of the asset | Known for USDC |
//! | `PAYMENT_ASSET_VERSION` | EIP-712 domain version of the asset | Known for USDC |
//! | `PAYMENT_FACILITATOR_URL` | x402 facilitator root | `https://x402.org/facilitator` |
//! | `PUBLIC_BASE_URL` | Public origin used in payment `resource` URLs | Unset (path only) |

use std::time::Duration;

use crate::indexer::DEFAULT_BASE_URL;
use crate::payment::PaymentConfig;
use crate::telemetry::LogFormat;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const API_KEY_ENV: &str = "COVALENT_API_KEY";
pub const INDEXER_BASE_URL_ENV: &str = "INDEXER_BASE_URL";
pub const CHAIN_TIMEOUT_ENV: &str = "AUDIT_CHAIN_TIMEOUT_SECS";
pub const HTTP_TIMEOUT_ENV: &str = "INDEXER_HTTP_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CHAIN_TIMEOUT_SECS: u64 = 20;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration missing: {0}")]
    Missing(String),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Indexer credential. Audits fail with 500 while this is unset.
    pub indexer_api_key: Option<String>,
    pub indexer_base_url: String,
    pub chain_timeout: Duration,
    pub indexer_http_timeout: Duration,
    pub log_format: LogFormat,
    /// `None` disables the payment gate.
    pub payment: Option<PaymentConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            indexer_api_key: None,
            indexer_base_url: DEFAULT_BASE_URL.to_string(),
            chain_timeout: Duration::from_secs(DEFAULT_CHAIN_TIMEOUT_SECS),
            indexer_http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            log_format: LogFormat::Pretty,
            payment: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader::new(&lookup);

        Ok(Self {
            host: env.or_default(HOST_ENV, DEFAULT_HOST),
            port: env.parsed_or(PORT_ENV, DEFAULT_PORT),
            indexer_api_key: env.optional(API_KEY_ENV),
            indexer_base_url: env.url_or(INDEXER_BASE_URL_ENV, DEFAULT_BASE_URL)?,
            chain_timeout: Duration::from_secs(
                env.parsed_or(CHAIN_TIMEOUT_ENV, DEFAULT_CHAIN_TIMEOUT_SECS),
            ),
            indexer_http_timeout: Duration::from_secs(
                env.parsed_or(HTTP_TIMEOUT_ENV, DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            log_format: env
                .optional(LOG_FORMAT_ENV)
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            payment: PaymentConfig::from_env(&env)?,
        })
    }

    /// `host:port` bind string.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Trimmed environment access. Blank values read as unset.
pub struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> EnvReader<'a> {
    pub fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self { lookup }
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }

    pub fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    /// Read an absolute http(s) URL. Malformed URLs are fatal.
    pub fn url_or(&self, name: &str, default: &str) -> Result<String, ConfigError> {
        let raw = self.or_default(name, default);
        let parsed = url::Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: name.to_string(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }
        Ok(raw)
    }

    /// Parse a value, falling back to `default` (with a warning) when invalid.
    pub fn parsed_or<T>(&self, name: &str, default: T) -> T
    where
        T: std::str::FromStr + std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    variable = name,
                    value = %raw,
                    fallback = %default,
                    "Invalid config value, using default"
                );
                default
            }),
            None => default,
        }
    }
}
