// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Revocation calldata for ERC-20 allowances and NFT operator approvals.
//!
//! Payloads are unsigned: the caller signs and broadcasts them from the
//! approving wallet. Encoding is a pure function of its inputs, so the
//! same (contract, counterparty) pair always yields byte-identical calldata.

use std::str::FromStr;

use alloy::{
    primitives::{Address, U256},
    sol,
    sol_types::SolCall,
};

use crate::models::{ApprovalKind, RevocationPayload};

sol! {
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface IERC721 {
        function setApprovalForAll(address operator, bool approved) external;
    }
}

/// Which address argument failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    Contract,
    Counterparty,
}

impl std::fmt::Display for AddressField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressField::Contract => write!(f, "contract"),
            AddressField::Counterparty => write!(f, "counterparty"),
        }
    }
}

/// Reasons a revocation payload could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevokeError {
    #[error("Invalid {field} address {value:?}: {reason}")]
    InvalidAddress {
        field: AddressField,
        value: String,
        reason: String,
    },
}

/// Build `approve(spender, 0)` against the token contract.
pub fn erc20_revoke(token: &str, spender: &str) -> Result<RevocationPayload, RevokeError> {
    parse_address(token, AddressField::Contract)?;
    let spender = parse_address(spender, AddressField::Counterparty)?;

    let call = IERC20::approveCall {
        spender,
        amount: U256::ZERO,
    };

    Ok(RevocationPayload::new(
        token,
        alloy::hex::encode_prefixed(call.abi_encode()),
    ))
}

/// Build `setApprovalForAll(operator, false)` against the collection contract.
pub fn nft_revoke(collection: &str, operator: &str) -> Result<RevocationPayload, RevokeError> {
    parse_address(collection, AddressField::Contract)?;
    let operator = parse_address(operator, AddressField::Counterparty)?;

    let call = IERC721::setApprovalForAllCall {
        operator,
        approved: false,
    };

    Ok(RevocationPayload::new(
        collection,
        alloy::hex::encode_prefixed(call.abi_encode()),
    ))
}

/// Build the revocation for an approval of the given kind.
pub fn revoke_for(
    kind: ApprovalKind,
    contract: &str,
    counterparty: &str,
) -> Result<RevocationPayload, RevokeError> {
    match kind {
        ApprovalKind::Fungible => erc20_revoke(contract, counterparty),
        ApprovalKind::NonFungible => nft_revoke(contract, counterparty),
    }
}

/// Parse a 20-byte hex address.
///
/// Mixed-case input must carry a valid EIP-55 checksum. All-lowercase and
/// all-uppercase input is accepted as-is.
fn parse_address(raw: &str, field: AddressField) -> Result<Address, RevokeError> {
    let invalid = |reason: String| RevokeError::InvalidAddress {
        field,
        value: raw.to_string(),
        reason,
    };

    let hex_part = raw.strip_prefix("0x").unwrap_or(raw);
    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());

    if has_lower && has_upper {
        Address::parse_checksummed(raw, None).map_err(|e| invalid(e.to_string()))
    } else {
        Address::from_str(raw).map_err(|e| invalid(e.to_string()))
    }
}
