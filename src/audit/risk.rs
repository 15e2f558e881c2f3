// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Approval risk classification.
//!
//! Classification is pure: `now` is passed in so a whole audit is judged
//! against a single instant and tests can pin the clock.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

use crate::models::{RiskTag, UNLIMITED_ALLOWANCE};

/// Tags for an ERC-20 allowance. `unlimited` precedes `stale`.
pub fn classify_fungible(
    allowance: Option<&str>,
    last_signed: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<RiskTag> {
    let mut tags = Vec::new();

    if allowance == Some(UNLIMITED_ALLOWANCE) {
        tags.push(RiskTag::Unlimited);
    }

    if let Some(raw) = last_signed.filter(|s| !s.is_empty()) {
        match parse_timestamp(raw) {
            Some(signed_at) if signed_at < one_year_before(now) => tags.push(RiskTag::Stale),
            Some(_) => {}
            None => tracing::debug!(
                timestamp = %raw,
                "Unparseable approval timestamp, skipping staleness check"
            ),
        }
    }

    tags
}

/// Tags for a retained NFT operator approval.
pub fn classify_non_fungible() -> Vec<RiskTag> {
    vec![RiskTag::UnlimitedNft]
}

/// The same instant one calendar year earlier.
///
/// Feb 29 has no counterpart in the previous year and rolls over to Mar 1
/// at the same time of day.
pub fn one_year_before(now: DateTime<Utc>) -> DateTime<Utc> {
    let year = now.year() - 1;
    now.with_year(year).unwrap_or_else(|| {
        NaiveDate::from_ymd_opt(year, 3, 1)
            .map(|date| date.and_time(now.time()).and_utc())
            .unwrap_or(now)
    })
}

/// Parse an indexer timestamp. Offset-less forms are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
