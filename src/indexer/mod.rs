// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Approval Indexer Client
//!
//! Read-only client for the Covalent-style indexing API that tracks
//! outstanding token approvals per wallet.
//!
//! ## Endpoints
//!
//! - `GET {base}/{chain}/approvals/{wallet}/` - ERC-20 allowances
//! - `GET {base}/{chain}/nft/approvals/{wallet}/` - NFT operator approvals
//!
//! Both are authenticated with a bearer key and nest results under
//! `data.items`. A response without that path means "no approvals". That
//! includes non-2xx responses carrying a JSON error envelope. Only bodies
//! that are not JSON at all fail the query.
//!
//! Chain slugs and wallets are sent as percent-encoded path segments.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;
use url::Url;

/// Default indexer API root.
pub const DEFAULT_BASE_URL: &str = "https://api.covalenthq.com/v1";

/// Maximum number of body bytes echoed back in error messages.
const ERROR_BODY_LIMIT: usize = 512;

// =============================================================================
// Raw Response Types
// =============================================================================
//
// Fields are decoded leniently: a value of an unexpected JSON type reads as
// absent instead of failing the whole response.

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Envelope<T> {
    #[serde(default)]
    data: Option<ItemsPage<T>>,
    #[serde(default, deserialize_with = "lenient_string")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ItemsPage<T> {
    #[serde(default, deserialize_with = "lenient_list")]
    items: Option<Vec<T>>,
}

impl<T> Envelope<T> {
    fn into_items(self) -> Vec<T> {
        self.data.and_then(|d| d.items).unwrap_or_default()
    }
}

/// One ERC-20 token with its approved spenders.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenApprovalItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub token_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ticker_symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub spenders: Option<Vec<TokenSpender>>,
}

/// A spender entry under an ERC-20 approval item.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSpender {
    #[serde(default, deserialize_with = "lenient_string")]
    pub spender_address: Option<String>,
    /// Numeric allowances are kept as their decimal text.
    #[serde(default, deserialize_with = "lenient_string")]
    pub allowance: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub block_signed_at: Option<String>,
}

/// One NFT collection with its approved operators.
#[derive(Debug, Clone, Deserialize)]
pub struct NftApprovalItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub contract_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contract_ticker_symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub spenders: Option<Vec<NftSpender>>,
}

/// An operator entry under an NFT approval item.
#[derive(Debug, Clone, Deserialize)]
pub struct NftSpender {
    #[serde(default, deserialize_with = "lenient_string")]
    pub spender_address: Option<String>,
    /// `"ALL"` for blanket approvals. Partial scopes (id lists) read as
    /// `None` unless they arrive as a string.
    #[serde(default, deserialize_with = "lenient_string")]
    pub token_ids_approved: Option<String>,
}

/// Strings pass through and numbers keep their decimal text. Anything else
/// is `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Arrays decode element by element, skipping elements that do not fit `T`.
/// Non-array values are `None`.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(values)) => Some(
            values
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
        ),
        _ => None,
    })
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("Indexer request failed: {0}")]
    Request(String),

    #[error("Indexer returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Indexer response was invalid: {0}")]
    Decode(String),
}

/// Indexer API client.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl IndexerClient {
    /// Create a client with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IndexerError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexerError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_http_client(base_url, api_key, http))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_http_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http,
        }
    }

    /// List ERC-20 approvals granted by `wallet` on `chain`.
    pub async fn token_approvals(
        &self,
        chain: &str,
        wallet: &str,
    ) -> Result<Vec<TokenApprovalItem>, IndexerError> {
        self.get_items(&[chain, "approvals", wallet]).await
    }

    /// List NFT operator approvals granted by `wallet` on `chain`.
    pub async fn nft_approvals(
        &self,
        chain: &str,
        wallet: &str,
    ) -> Result<Vec<NftApprovalItem>, IndexerError> {
        self.get_items(&[chain, "nft", "approvals", wallet]).await
    }

    /// `{base}/{segments...}/` with every segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, IndexerError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            IndexerError::Request(format!("invalid indexer base URL {}: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                IndexerError::Request(format!("indexer base URL {} has no path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    async fn get_items<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Vec<T>, IndexerError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();

        let response = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| IndexerError::Request(format!("GET {path} failed: {e}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| IndexerError::Request(format!("GET {path} body read failed: {e}")))?;

        if !status.is_success() {
            // A JSON error envelope still answers the query: it carries no items.
            if let Ok(envelope) = serde_json::from_slice::<Envelope<T>>(&bytes) {
                warn!(
                    path = %path,
                    status = status.as_u16(),
                    error_message = envelope.error_message.as_deref().unwrap_or_default(),
                    "Indexer returned an error envelope, treating as no approvals"
                );
                return Ok(envelope.into_items());
            }
            return Err(IndexerError::Status {
                status: status.as_u16(),
                body: truncated_body(&bytes),
            });
        }

        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|e| IndexerError::Decode(format!("GET {path} invalid JSON: {e}")))?;

        Ok(envelope.into_items())
    }
}

fn truncated_body(bytes: &[u8]) -> String {
    let mut body = String::from_utf8_lossy(bytes).into_owned();
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";

    fn client(server: &MockServer) -> IndexerClient {
        IndexerClient::new(server.uri(), "test-key", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn token_approvals_sends_bearer_and_parses_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/approvals/{WALLET}/")))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "items": [{
                        "token_address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                        "ticker_symbol": "USDC",
                        "spenders": [{
                            "spender_address": "0x000000000022d473030f116ddee9f6b43ac78ba3",
                            "allowance": "UNLIMITED",
                            "block_signed_at": "2022-03-01T10:00:00Z"
                        }]
                    }]
                }
            })))
            .mount(&server)
            .await;

        let items = client(&server)
            .token_approvals("eth-mainnet", WALLET)
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].ticker_symbol.as_deref(), Some("USDC"));
        let spenders = items[0].spenders.as_ref().unwrap();
        assert_eq!(spenders[0].allowance.as_deref(), Some("UNLIMITED"));
    }

    #[tokio::test]
    async fn missing_envelope_means_no_approvals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/nft/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client
            .nft_approvals("eth-mainnet", WALLET)
            .await
            .unwrap()
            .is_empty());
        assert!(client
            .token_approvals("eth-mainnet", WALLET)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn non_json_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = client(&server)
            .token_approvals("eth-mainnet", WALLET)
            .await
            .unwrap_err();

        assert!(
            matches!(err, IndexerError::Status { status: 401, ref body } if body == "invalid key")
        );
    }

    #[tokio::test]
    async fn error_envelope_reads_as_no_approvals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/nft/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(501).set_body_json(json!({
                "data": null,
                "error": true,
                "error_message": "NFT approvals are not supported on this chain",
                "error_code": 501
            })))
            .mount(&server)
            .await;

        let items = client(&server)
            .nft_approvals("eth-mainnet", WALLET)
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn mistyped_fields_read_as_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "items": [{
                    "token_address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                    "ticker_symbol": null,
                    "spenders": [
                        {
                            "spender_address": "0x000000000022d473030f116ddee9f6b43ac78ba3",
                            "allowance": 1000000,
                            "block_signed_at": { "unexpected": true }
                        },
                        "not-an-object"
                    ]
                }] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/nft/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "items": [{
                    "contract_address": "0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d",
                    "spenders": [{
                        "spender_address": "0x1e0049783f008a0085193e00003d00cd54003c71",
                        "token_ids_approved": ["1", "2"]
                    }]
                }] }
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let tokens = client.token_approvals("eth-mainnet", WALLET).await.unwrap();
        let spenders = tokens[0].spenders.as_ref().unwrap();
        assert_eq!(spenders.len(), 1);
        assert_eq!(spenders[0].allowance.as_deref(), Some("1000000"));
        assert_eq!(spenders[0].block_signed_at, None);

        let nfts = client.nft_approvals("eth-mainnet", WALLET).await.unwrap();
        let operators = nfts[0].spenders.as_ref().unwrap();
        assert_eq!(operators[0].token_ids_approved, None);
    }

    #[tokio::test]
    async fn path_segments_are_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eth-mainnet/approvals/x%2F..%2F..%2Fother%3F/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "items": [] } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let items = client(&server)
            .token_approvals("eth-mainnet", "x/../../other?")
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn base_url_path_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/base-mainnet/nft/approvals/{WALLET}/")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "items": [] } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client =
            IndexerClient::new(format!("{}/v1/", server.uri()), "k", Duration::from_secs(5))
                .unwrap();
        assert!(client
            .nft_approvals("base-mainnet", WALLET)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn undecodable_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server)
            .nft_approvals("eth-mainnet", WALLET)
            .await
            .unwrap_err();

        assert!(matches!(err, IndexerError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_indexer_is_a_request_error() {
        let client = IndexerClient::new("http://127.0.0.1:1", "k", Duration::from_secs(2)).unwrap();
        let err = client
            .token_approvals("eth-mainnet", WALLET)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Request(_)));
    }
}
