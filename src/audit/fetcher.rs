// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-chain approval fetching and normalization.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::risk::{classify_fungible, classify_non_fungible};
use crate::blockchain::{revoke_for, RevokeError};
use crate::indexer::{IndexerClient, IndexerError, NftApprovalItem, TokenApprovalItem};
use crate::models::{display_name, ApprovalDetails, ApprovalRecord, RevocationPayload, RiskTag};

/// Scope value the indexer uses for approvals covering every token id.
pub const ALL_TOKEN_IDS: &str = "ALL";

/// Outcome of building one revocation payload.
pub type PayloadAttempt = Result<RevocationPayload, RevokeError>;

/// Approvals found on one chain.
///
/// The three vectors always have the same length and share indices.
#[derive(Debug, Default)]
pub struct ChainAudit {
    pub approvals: Vec<ApprovalRecord>,
    pub risk_flags: Vec<Vec<RiskTag>>,
    pub revoke_attempts: Vec<PayloadAttempt>,
}

impl ChainAudit {
    fn push(&mut self, record: ApprovalRecord, tags: Vec<RiskTag>, attempt: PayloadAttempt) {
        self.approvals.push(record);
        self.risk_flags.push(tags);
        self.revoke_attempts.push(attempt);
    }

    pub fn len(&self) -> usize {
        self.approvals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.approvals.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Indexer(#[from] IndexerError),

    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// A chain that contributed nothing to the audit.
#[derive(Debug, thiserror::Error)]
#[error("Chain {chain} failed: {source}")]
pub struct ChainError {
    pub chain: String,
    #[source]
    pub source: FetchError,
}

/// Fetch, classify, and build revocations for one chain.
///
/// Both indexer queries run concurrently and the whole chain is bounded by
/// `timeout`. Any failure fails the chain as a unit.
pub async fn process_chain(
    client: &IndexerClient,
    chain: &str,
    wallet: &str,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Result<ChainAudit, ChainError> {
    let fetch = async {
        tokio::try_join!(
            client.token_approvals(chain, wallet),
            client.nft_approvals(chain, wallet),
        )
    };

    let outcome = match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(items)) => Ok(items),
        Ok(Err(e)) => Err(FetchError::Indexer(e)),
        Err(_) => Err(FetchError::Timeout(timeout)),
    };

    let (tokens, nfts) = outcome.map_err(|source| ChainError {
        chain: chain.to_string(),
        source,
    })?;

    Ok(build_chain_audit(chain, tokens, nfts, now))
}

/// Normalize raw indexer items into aligned approvals, tags, and payloads.
///
/// ERC-20 approvals come first, then NFT approvals, each in indexer order.
pub fn build_chain_audit(
    chain: &str,
    tokens: Vec<TokenApprovalItem>,
    nfts: Vec<NftApprovalItem>,
    now: DateTime<Utc>,
) -> ChainAudit {
    let mut audit = ChainAudit::default();

    for token in tokens {
        let token_address = token.token_address.unwrap_or_default();
        let token_name = display_name(token.ticker_symbol.as_deref());

        for spender in token.spenders.unwrap_or_default() {
            let Some(spender_address) = spender.spender_address.filter(|a| !a.is_empty()) else {
                continue;
            };

            let tags = classify_fungible(
                spender.allowance.as_deref(),
                spender.block_signed_at.as_deref(),
                now,
            );
            let record = ApprovalRecord {
                chain: chain.to_string(),
                token_address: token_address.clone(),
                token_name: token_name.clone(),
                spender: spender_address,
                details: ApprovalDetails::Fungible {
                    allowance: spender.allowance,
                    last_updated: spender.block_signed_at,
                },
            };
            let attempt = revoke_payload(&record);
            audit.push(record, tags, attempt);
        }
    }

    for nft in nfts {
        let contract_address = nft.contract_address.unwrap_or_default();
        let token_name = display_name(nft.contract_ticker_symbol.as_deref());

        for spender in nft.spenders.unwrap_or_default() {
            let Some(operator) = spender.spender_address.filter(|a| !a.is_empty()) else {
                continue;
            };
            // Partial token-id scopes are not blanket approvals.
            if spender.token_ids_approved.as_deref() != Some(ALL_TOKEN_IDS) {
                continue;
            }

            let record = ApprovalRecord {
                chain: chain.to_string(),
                token_address: contract_address.clone(),
                token_name: token_name.clone(),
                spender: operator,
                details: ApprovalDetails::NonFungible { approved_all: true },
            };
            let attempt = revoke_payload(&record);
            audit.push(record, classify_non_fungible(), attempt);
        }
    }

    audit
}

fn revoke_payload(record: &ApprovalRecord) -> PayloadAttempt {
    revoke_for(record.kind(), &record.token_address, &record.spender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{NftSpender, TokenSpender};
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const PERMIT2: &str = "0x000000000022d473030f116ddee9f6b43ac78ba3";
    const BAYC: &str = "0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d";
    const CONDUIT: &str = "0x1e0049783f008a0085193e00003d00cd54003c71";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    fn token(
        address: &str,
        ticker: Option<&str>,
        spenders: Vec<TokenSpender>,
    ) -> TokenApprovalItem {
        TokenApprovalItem {
            token_address: Some(address.to_string()),
            ticker_symbol: ticker.map(str::to_string),
            spenders: Some(spenders),
        }
    }

    fn spender(address: Option<&str>, allowance: &str, signed: Option<&str>) -> TokenSpender {
        TokenSpender {
            spender_address: address.map(str::to_string),
            allowance: Some(allowance.to_string()),
            block_signed_at: signed.map(str::to_string),
        }
    }

    fn nft(address: &str, spenders: Vec<NftSpender>) -> NftApprovalItem {
        NftApprovalItem {
            contract_address: Some(address.to_string()),
            contract_ticker_symbol: None,
            spenders: Some(spenders),
        }
    }

    fn operator(address: Option<&str>, scope: Option<&str>) -> NftSpender {
        NftSpender {
            spender_address: address.map(str::to_string),
            token_ids_approved: scope.map(str::to_string),
        }
    }

    #[test]
    fn fungible_spenders_are_reported_even_without_risk() {
        let tokens = vec![token(
            USDC,
            Some("USDC"),
            vec![
                spender(Some(PERMIT2), "UNLIMITED", Some("2024-01-01T00:00:00Z")),
                spender(Some(CONDUIT), "1000", Some("2026-05-01T00:00:00Z")),
            ],
        )];

        let audit = build_chain_audit("eth-mainnet", tokens, vec![], now());

        assert_eq!(audit.len(), 2);
        assert_eq!(audit.risk_flags[0], vec![RiskTag::Unlimited, RiskTag::Stale]);
        assert!(audit.risk_flags[1].is_empty());
        assert!(audit.revoke_attempts.iter().all(Result::is_ok));
        assert_eq!(audit.approvals[1].spender, CONDUIT);
    }

    #[test]
    fn spenders_without_address_are_skipped() {
        let tokens = vec![token(
            USDC,
            None,
            vec![
                spender(None, "UNLIMITED", None),
                spender(Some(""), "UNLIMITED", None),
                spender(Some(PERMIT2), "10", None),
            ],
        )];

        let audit = build_chain_audit("eth-mainnet", tokens, vec![], now());

        assert_eq!(audit.len(), 1);
        assert_eq!(audit.approvals[0].token_name, "Unknown");
    }

    #[test]
    fn only_blanket_nft_scopes_are_retained() {
        let nfts = vec![nft(
            BAYC,
            vec![
                operator(Some(CONDUIT), Some("ALL")),
                operator(Some(PERMIT2), Some("1, 2, 3")),
                operator(Some(USDC), None),
                operator(None, Some("ALL")),
            ],
        )];

        let audit = build_chain_audit("eth-mainnet", vec![], nfts, now());

        assert_eq!(audit.len(), 1);
        assert_eq!(audit.approvals[0].spender, CONDUIT);
        assert_eq!(audit.risk_flags[0], vec![RiskTag::UnlimitedNft]);
        assert_eq!(
            audit.approvals[0].details,
            ApprovalDetails::NonFungible { approved_all: true }
        );
    }

    #[test]
    fn malformed_address_keeps_record_but_fails_payload() {
        let tokens = vec![token(
            "not-an-address",
            Some("BAD"),
            vec![spender(Some(PERMIT2), "UNLIMITED", None)],
        )];

        let audit = build_chain_audit("eth-mainnet", tokens, vec![], now());

        assert_eq!(audit.len(), 1);
        assert_eq!(audit.risk_flags[0], vec![RiskTag::Unlimited]);
        assert!(matches!(
            audit.revoke_attempts[0],
            Err(RevokeError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn fungible_records_precede_nft_records() {
        let tokens = vec![token(USDC, Some("USDC"), vec![spender(Some(PERMIT2), "1", None)])];
        let nfts = vec![nft(BAYC, vec![operator(Some(CONDUIT), Some("ALL"))])];

        let audit = build_chain_audit("base-mainnet", tokens, nfts, now());

        assert_eq!(audit.len(), 2);
        assert_eq!(audit.approvals[0].token_address, USDC);
        assert_eq!(audit.approvals[1].token_address, BAYC);
        assert!(audit.approvals.iter().all(|a| a.chain == "base-mainnet"));
    }

    #[tokio::test]
    async fn process_chain_fetches_both_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "items": [{
                    "token_address": USDC,
                    "ticker_symbol": "USDC",
                    "spenders": [{ "spender_address": PERMIT2, "allowance": "UNLIMITED" }]
                }]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/nft/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "items": [{
                    "contract_address": BAYC,
                    "contract_ticker_symbol": "BAYC",
                    "spenders": [{ "spender_address": CONDUIT, "token_ids_approved": "ALL" }]
                }]}
            })))
            .mount(&server)
            .await;

        let client = IndexerClient::new(server.uri(), "key", Duration::from_secs(5)).unwrap();
        let audit = process_chain(&client, "eth-mainnet", WALLET, Duration::from_secs(5), now())
            .await
            .unwrap();

        assert_eq!(audit.len(), 2);
        assert_eq!(audit.approvals[1].token_name, "BAYC");
    }

    #[tokio::test]
    async fn process_chain_fails_when_either_query_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/approvals/{WALLET}/")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "items": [] } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/nft/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal server error"))
            .mount(&server)
            .await;

        let client = IndexerClient::new(server.uri(), "key", Duration::from_secs(5)).unwrap();
        let err = process_chain(&client, "eth-mainnet", WALLET, Duration::from_secs(5), now())
            .await
            .unwrap_err();

        assert_eq!(err.chain, "eth-mainnet");
        assert!(matches!(
            err.source,
            FetchError::Indexer(IndexerError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn nft_error_envelope_keeps_fungible_approvals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "items": [{
                    "token_address": USDC,
                    "ticker_symbol": "USDC",
                    "spenders": [{ "spender_address": PERMIT2, "allowance": "UNLIMITED" }]
                }]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/nft/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(501).set_body_json(json!({
                "data": null,
                "error": true,
                "error_message": "Not implemented for this chain"
            })))
            .mount(&server)
            .await;

        let client = IndexerClient::new(server.uri(), "key", Duration::from_secs(5)).unwrap();
        let audit = process_chain(&client, "eth-mainnet", WALLET, Duration::from_secs(5), now())
            .await
            .unwrap();

        assert_eq!(audit.len(), 1);
        assert_eq!(audit.approvals[0].token_address, USDC);
        assert_eq!(audit.risk_flags[0], vec![RiskTag::Unlimited]);
    }

    #[tokio::test]
    async fn mistyped_upstream_fields_affect_only_their_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "items": [{
                    "token_address": USDC,
                    "ticker_symbol": "USDC",
                    "spenders": [
                        { "spender_address": PERMIT2, "allowance": "UNLIMITED" },
                        { "spender_address": CONDUIT, "allowance": 250 }
                    ]
                }]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/eth-mainnet/nft/approvals/{WALLET}/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "items": [{
                    "contract_address": BAYC,
                    "spenders": [{ "spender_address": CONDUIT, "token_ids_approved": ["1", "2"] }]
                }]}
            })))
            .mount(&server)
            .await;

        let client = IndexerClient::new(server.uri(), "key", Duration::from_secs(5)).unwrap();
        let audit = process_chain(&client, "eth-mainnet", WALLET, Duration::from_secs(5), now())
            .await
            .unwrap();

        assert_eq!(audit.len(), 2);
        assert_eq!(audit.risk_flags[0], vec![RiskTag::Unlimited]);
        assert_eq!(
            audit.approvals[1].details,
            ApprovalDetails::Fungible {
                allowance: Some("250".to_string()),
                last_updated: None,
            }
        );
        assert!(audit.risk_flags[1].is_empty());
    }

    #[tokio::test]
    async fn slow_chain_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "items": [] } }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = IndexerClient::new(server.uri(), "key", Duration::from_secs(10)).unwrap();
        let err = process_chain(
            &client,
            "eth-mainnet",
            WALLET,
            Duration::from_millis(100),
            now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err.source, FetchError::Timeout(_)));
    }
}
