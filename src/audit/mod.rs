// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Approval Audit Pipeline
//!
//! Fans out one fetch per requested chain, waits for all of them, and
//! merges the successful ones in request order.
//!
//! ## Partial coverage
//!
//! A chain that fails (network error, bad response, timeout) is logged and
//! contributes nothing. The caller still gets a 200 with whatever the other
//! chains returned, so a degraded upstream shows up as fewer approvals, not
//! as an error.
//!
//! ## Payload alignment
//!
//! Payloads that could not be encoded are removed from `revoke_tx_data`
//! without re-keying, so that list stops being index-aligned with
//! `approvals` once anything is dropped.

pub mod fetcher;
pub mod risk;

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

pub use fetcher::{process_chain, ChainAudit, ChainError, FetchError, PayloadAttempt};

use crate::indexer::IndexerClient;
use crate::models::AuditResult;

/// Audit `wallet` on every chain in `chains`.
///
/// Never fails: chain failures are logged and skipped.
pub async fn run_audit(
    client: &IndexerClient,
    wallet: &str,
    chains: &[String],
    chain_timeout: Duration,
) -> AuditResult {
    let now = Utc::now();

    let results = join_all(
        chains
            .iter()
            .map(|chain| process_chain(client, chain, wallet, chain_timeout, now)),
    )
    .await;

    merge_chain_results(results)
}

/// Concatenate per-chain results in the order given.
pub fn merge_chain_results(results: Vec<Result<ChainAudit, ChainError>>) -> AuditResult {
    let requested = results.len();
    let mut failed = 0usize;
    let mut dropped = 0usize;
    let mut result = AuditResult::default();

    for outcome in results {
        let chain_audit = match outcome {
            Ok(chain_audit) => chain_audit,
            Err(e) => {
                failed += 1;
                warn!(chain = %e.chain, error = %e.source, "Chain processing failed");
                continue;
            }
        };

        for (record, attempt) in chain_audit
            .approvals
            .iter()
            .zip(chain_audit.revoke_attempts)
        {
            match attempt {
                Ok(payload) => result.revoke_tx_data.push(payload),
                Err(e) => {
                    dropped += 1;
                    warn!(
                        chain = %record.chain,
                        contract = %record.token_address,
                        counterparty = %record.spender,
                        error = %e,
                        "Skipping revocation payload"
                    );
                }
            }
        }

        result.approvals.extend(chain_audit.approvals);
        result.risk_flags.extend(chain_audit.risk_flags);
    }

    let flagged = result.risk_flags.iter().filter(|t| !t.is_empty()).count();
    info!(
        chains_requested = requested,
        chains_failed = failed,
        approvals = result.approvals.len(),
        flagged,
        payloads = result.revoke_tx_data.len(),
        payloads_dropped = dropped,
        "Approval audit complete"
    );

    result
}
