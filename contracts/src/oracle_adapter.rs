//! Oracle Adapter
//!
//! Turns raw oracle quotes into prices the health engine can use.
//! Implements:
//! - Freshness check against a fixed maximum age
//! - Positive price and bounded confidence checks
//! - Exponent normalization to the 1e18 price scale
//! - Optional backup feed cross-check with averaging
//!
//! Quotes are read fresh for every operation; nothing here caches.

use alloc::collections::BTreeMap;
use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::health::BPS_SCALE;
use crate::types::{Price, PriceQuote};

/// Maximum quote age in seconds
pub const MAX_PRICE_AGE_SECONDS: u64 = 100;

/// Maximum confidence interval as a share of price (5% = 500 bps)
pub const MAX_CONFIDENCE_BPS: u32 = 500;

/// Maximum disagreement between primary and backup feed (5% = 500 bps)
pub const MAX_ORACLE_DEVIATION_BPS: u32 = 500;

/// Supported exponent range for raw quotes
pub const MIN_EXPONENT: i32 = -18;
pub const MAX_EXPONENT: i32 = 18;

/// Decimal places of the engine price scale
const PRICE_DECIMALS: i32 = 18;

/// Anything that can return the latest quote for a feed
pub trait PriceSource {
    fn latest_quote(&self, feed_id: &str) -> Option<PriceQuote>;
}

/// Fetch and validate the price for `feed_id` at time `now` (seconds).
pub fn fetch_price<S: PriceSource + ?Sized>(
    source: &S,
    feed_id: &str,
    now: u64,
) -> Result<Price, CdpError> {
    let quote = source
        .latest_quote(feed_id)
        .ok_or(CdpError::PriceUnavailable)?;
    validate_quote(&quote, now)
}

/// Fetch the primary price and, when a backup feed is configured and
/// answers with a valid quote, require both to agree.
///
/// A backup that is missing or invalid is ignored; the primary alone is used.
pub fn fetch_price_with_backup<S: PriceSource + ?Sized>(
    source: &S,
    primary_feed_id: &str,
    backup_feed_id: Option<&str>,
    now: u64,
) -> Result<Price, CdpError> {
    let primary = fetch_price(source, primary_feed_id, now)?;

    let backup = match backup_feed_id {
        Some(feed_id) => fetch_price(source, feed_id, now).ok(),
        None => None,
    };

    match backup {
        Some(backup) => combine_prices(&primary, &backup),
        None => Ok(primary),
    }
}

/// Validate a raw quote and normalize it to the engine price scale
pub fn validate_quote(quote: &PriceQuote, now: u64) -> Result<Price, CdpError> {
    // Future timestamps count as fresh
    let age = now.saturating_sub(quote.publish_time);
    if age > MAX_PRICE_AGE_SECONDS {
        return Err(CdpError::StalePrice);
    }

    if quote.price <= 0 {
        return Err(CdpError::InvalidPrice);
    }
    let raw_price = quote.price as u128;

    // Reject wide-spread quotes: confidence / price > MAX_CONFIDENCE_BPS
    let conf_scaled = (quote.confidence as u128) * (BPS_SCALE as u128);
    let conf_limit = raw_price * (MAX_CONFIDENCE_BPS as u128);
    if conf_scaled > conf_limit {
        return Err(CdpError::InvalidPrice);
    }

    let value = scale_to_price(raw_price, quote.exponent)?;
    if value.is_zero() {
        return Err(CdpError::InvalidPrice);
    }
    let confidence = scale_to_price(quote.confidence as u128, quote.exponent)?;

    Ok(Price {
        value,
        confidence,
        publish_time: quote.publish_time,
        backup_confirmed: false,
    })
}

/// `raw * 10^(18 + exponent)`
fn scale_to_price(raw: u128, exponent: i32) -> Result<U256, CdpError> {
    if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
        return Err(CdpError::InvalidPrice);
    }
    let shift = (PRICE_DECIMALS + exponent) as u64;
    U256::from(raw)
        .checked_mul(U256::from(10u64).pow(U256::from(shift)))
        .ok_or(CdpError::ArithmeticOverflow)
}

/// Average two validated prices after checking their deviation
fn combine_prices(primary: &Price, backup: &Price) -> Result<Price, CdpError> {
    let deviation = deviation_bps(primary.value, backup.value)?;
    if deviation > U256::from(MAX_ORACLE_DEVIATION_BPS) {
        return Err(CdpError::OraclePriceDeviation);
    }

    let sum = primary
        .value
        .checked_add(backup.value)
        .ok_or(CdpError::ArithmeticOverflow)?;

    Ok(Price {
        value: sum / U256::from(2u8),
        confidence: primary.confidence.max(backup.confidence),
        publish_time: primary.publish_time.min(backup.publish_time),
        backup_confirmed: true,
    })
}

/// Deviation between two prices relative to the lower one, in bps
fn deviation_bps(a: U256, b: U256) -> Result<U256, CdpError> {
    let (high, low) = if a > b { (a, b) } else { (b, a) };
    if low.is_zero() {
        return Err(CdpError::InvalidPrice);
    }
    (high - low)
        .checked_mul(U256::from(BPS_SCALE))
        .map(|v| v / low)
        .ok_or(CdpError::ArithmeticOverflow)
}

/// In-memory price source keyed by feed id
#[derive(Debug, Clone, Default)]
pub struct MemoryPriceSource {
    quotes: BTreeMap<String, PriceQuote>,
}

impl MemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) the quote for a feed
    pub fn set_quote(&mut self, feed_id: &str, quote: PriceQuote) {
        self.quotes.insert(String::from(feed_id), quote);
    }

    /// Drop the quote for a feed, as if the feed stopped publishing
    pub fn remove_quote(&mut self, feed_id: &str) {
        self.quotes.remove(feed_id);
    }
}

impl PriceSource for MemoryPriceSource {
    fn latest_quote(&self, feed_id: &str) -> Option<PriceQuote> {
        self.quotes.get(feed_id).copied()
    }
}
