// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Approval Risk Auditor - Pay-per-call token approval audit service
//!
//! Lists the ERC-20 allowances and NFT operator approvals a wallet has
//! granted, flags the risky ones, and returns unsigned calldata that
//! revokes each of them.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `audit` - Per-chain fetching, risk classification, aggregation
//! - `blockchain` - Revocation calldata encoding
//! - `indexer` - Approval indexer client
//! - `payment` - x402 pay-per-call gate

pub mod api;
pub mod audit;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod indexer;
pub mod models;
pub mod payment;
pub mod state;
pub mod telemetry;
