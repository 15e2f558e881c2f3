// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM contract-call encoding.
//!
//! This module provides functionality for:
//! - Building unsigned ERC-20 `approve(spender, 0)` revocations
//! - Building unsigned NFT `setApprovalForAll(operator, false)` revocations

pub mod revoke;

pub use revoke::{erc20_revoke, nft_revoke, revoke_for, AddressField, RevokeError};
