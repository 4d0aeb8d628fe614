//! Common types used across the CDP engine.

use odra::prelude::*;
use odra::casper_types::U256;

/// Protocol configuration (one per deployment)
#[odra::odra_type]
pub struct ProtocolConfig {
    /// Identity allowed to update the config
    pub admin: Address,
    /// Health factor floor in bps below which a position is liquidatable
    pub liquidation_threshold_bps: u32,
    /// Extra collateral awarded to liquidators in bps
    pub liquidation_bonus_bps: u32,
    /// Minimum health factor a mint or withdrawal may leave behind, in bps
    pub min_health_factor_bps: u32,
    /// Trusted primary price feed
    pub price_feed_id: String,
    /// Optional secondary feed cross-checked against the primary
    pub backup_price_feed_id: Option<String>,
    /// Fee withheld from minted tokens in bps
    pub mint_fee_bps: u32,
    /// Fee charged on burned debt in bps, paid in debt token on top of the burn
    pub burn_fee_bps: u32,
    /// Share of seized collateral kept by the protocol in bps
    pub liquidation_fee_bps: u32,
    /// Receiver of protocol fees
    pub fee_recipient: Address,
    /// Largest amount one deposit call may mint, uncapped when `None`
    pub max_mint_amount: Option<U256>,
}

/// Parameters for creating the config singleton
#[odra::odra_type]
pub struct ConfigParams {
    pub liquidation_threshold_bps: u32,
    pub liquidation_bonus_bps: u32,
    pub min_health_factor_bps: u32,
    pub price_feed_id: String,
    pub backup_price_feed_id: Option<String>,
    pub mint_fee_bps: u32,
    pub burn_fee_bps: u32,
    pub liquidation_fee_bps: u32,
    /// Defaults to the admin when unset
    pub fee_recipient: Option<Address>,
    pub max_mint_amount: Option<U256>,
}

impl ConfigParams {
    /// Fee-free, uncapped parameters with a single price feed.
    pub fn new(
        liquidation_threshold_bps: u32,
        liquidation_bonus_bps: u32,
        min_health_factor_bps: u32,
        price_feed_id: &str,
    ) -> Self {
        Self {
            liquidation_threshold_bps,
            liquidation_bonus_bps,
            min_health_factor_bps,
            price_feed_id: String::from(price_feed_id),
            backup_price_feed_id: None,
            mint_fee_bps: 0,
            burn_fee_bps: 0,
            liquidation_fee_bps: 0,
            fee_recipient: None,
            max_mint_amount: None,
        }
    }
}

/// Partial config update. `None` leaves the field untouched.
#[odra::odra_type]
#[derive(Default)]
pub struct ConfigUpdate {
    pub admin: Option<Address>,
    pub liquidation_threshold_bps: Option<u32>,
    pub liquidation_bonus_bps: Option<u32>,
    pub min_health_factor_bps: Option<u32>,
    pub price_feed_id: Option<String>,
    /// `Some(None)` removes the backup feed
    pub backup_price_feed_id: Option<Option<String>>,
    pub mint_fee_bps: Option<u32>,
    pub burn_fee_bps: Option<u32>,
    pub liquidation_fee_bps: Option<u32>,
    pub fee_recipient: Option<Address>,
    /// `Some(None)` lifts the mint cap
    pub max_mint_amount: Option<Option<U256>>,
}

/// Per-user collateral and debt account
#[odra::odra_type]
pub struct CollateralPosition {
    /// Owner address
    pub owner: Address,
    /// Deposited collateral (smallest unit)
    pub collateral_amount: U256,
    /// Outstanding debt token (smallest unit)
    pub debt_amount: U256,
}

impl CollateralPosition {
    /// Zero-balance position for a new owner
    pub fn empty(owner: Address) -> Self {
        Self {
            owner,
            collateral_amount: U256::zero(),
            debt_amount: U256::zero(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collateral_amount.is_zero() && self.debt_amount.is_zero()
    }
}

/// Raw quote as published by the oracle network.
///
/// The value is `price * 10^exponent` debt-token units per collateral unit.
#[odra::odra_type]
#[derive(Copy)]
pub struct PriceQuote {
    pub price: i64,
    pub confidence: u64,
    pub exponent: i32,
    /// Publish time in seconds
    pub publish_time: u64,
}

/// Validated price, scaled by `PRICE_SCALE` (1e18)
#[odra::odra_type]
#[derive(Copy)]
pub struct Price {
    pub value: U256,
    pub confidence: U256,
    pub publish_time: u64,
    /// Whether a backup feed agreed with the primary
    pub backup_confirmed: bool,
}
