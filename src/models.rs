// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the audit entrypoint. All types
//! derive `Serialize`, `Deserialize`, and `ToSchema` for JSON handling and
//! OpenAPI documentation.
//!
//! ## Alignment
//!
//! In an [`AuditResult`], `approvals[i]` and `risk_flags[i]` always describe
//! the same approval. `revoke_tx_data` only holds the payloads that could be
//! generated, in order, so after a payload is dropped it no longer lines up
//! index-for-index with `approvals`. Clients that need the correlation
//! should match on `to` and the encoded counterparty.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Allowance value the indexer reports for `type(uint256).max` approvals.
pub const UNLIMITED_ALLOWANCE: &str = "UNLIMITED";

/// Fallback display name when the indexer has no ticker symbol.
pub const UNKNOWN_TOKEN_NAME: &str = "Unknown";

// =============================================================================
// Request Models
// =============================================================================

/// Invocation envelope for the audit entrypoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditRequest {
    pub input: AuditInput,
}

/// Audit parameters.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditInput {
    /// Wallet address (e.g. `0x...` or an ENS name).
    #[schema(example = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045")]
    pub wallet: String,
    /// Indexer chain slugs, e.g. `["eth-mainnet", "matic-mainnet"]`.
    #[schema(example = json!(["eth-mainnet"]))]
    pub chains: Vec<String>,
}

// =============================================================================
// Approval Models
// =============================================================================

/// Approval kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalKind {
    Fungible,
    NonFungible,
}

/// Kind-specific approval data, tagged with `type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ApprovalDetails {
    /// ERC-20 allowance.
    #[serde(rename = "ERC20")]
    Fungible {
        /// Numeric allowance string or `"UNLIMITED"`.
        allowance: Option<String>,
        /// Timestamp of the block the approval was signed in.
        last_updated: Option<String>,
    },
    /// NFT operator approval covering every token id in the collection.
    #[serde(rename = "NFT")]
    NonFungible { approved_all: bool },
}

/// One outstanding approval grant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ApprovalRecord {
    /// Chain slug the approval was found on.
    pub chain: String,
    /// Token or collection contract address.
    pub token_address: String,
    /// Ticker symbol, or `"Unknown"`.
    pub token_name: String,
    /// Spender (ERC-20) or operator (NFT) address.
    pub spender: String,
    #[serde(flatten)]
    pub details: ApprovalDetails,
}

impl ApprovalRecord {
    pub fn kind(&self) -> ApprovalKind {
        match self.details {
            ApprovalDetails::Fungible { .. } => ApprovalKind::Fungible,
            ApprovalDetails::NonFungible { .. } => ApprovalKind::NonFungible,
        }
    }
}

/// Resolve the display name for a token, falling back to `"Unknown"`.
pub fn display_name(ticker: Option<&str>) -> String {
    ticker
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN_TOKEN_NAME)
        .to_string()
}

/// Risk classification tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiskTag {
    /// Allowance is the unlimited sentinel.
    Unlimited,
    /// Approval was signed more than one calendar year ago.
    Stale,
    /// Blanket operator approval over an NFT collection.
    UnlimitedNft,
}

// =============================================================================
// Revocation Models
// =============================================================================

/// Unsigned contract call that revokes one approval.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RevocationPayload {
    /// Token or collection contract to call.
    pub to: String,
    /// 0x-prefixed ABI-encoded calldata.
    pub data: String,
    /// Always `"0"`, revocations never transfer value.
    pub value: String,
}

impl RevocationPayload {
    pub fn new(to: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            data: data.into(),
            value: "0".to_string(),
        }
    }
}

// =============================================================================
// Audit Result
// =============================================================================

/// Audit response.
///
/// `risk_flags` has the same length as `approvals`. `revoke_tx_data` is at
/// most that long and is not index-aligned once a payload has been dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AuditResult {
    pub approvals: Vec<ApprovalRecord>,
    pub risk_flags: Vec<Vec<RiskTag>>,
    pub revoke_tx_data: Vec<RevocationPayload>,
}
