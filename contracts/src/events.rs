//! Events emitted by the vault, price feed and debt token.

use odra::prelude::*;
use odra::casper_types::U256;

// ========== Vault ==========

#[odra::event]
pub struct ConfigInitialized {
    pub admin: Address,
    pub liquidation_threshold_bps: u32,
    pub liquidation_bonus_bps: u32,
    pub min_health_factor_bps: u32,
    pub price_feed_id: String,
}

#[odra::event]
pub struct ConfigUpdated {
    pub updated_by: Address,
    pub admin: Address,
    pub liquidation_threshold_bps: u32,
    pub liquidation_bonus_bps: u32,
    pub min_health_factor_bps: u32,
    pub price_feed_id: String,
    pub mint_fee_bps: u32,
    pub burn_fee_bps: u32,
    pub liquidation_fee_bps: u32,
    pub max_mint_amount: Option<U256>,
}

#[odra::event]
pub struct CollateralDeposited {
    pub user: Address,
    pub collateral_amount: U256,
    pub minted_amount: U256,
    pub fee_amount: U256,
    pub health_factor_bps: U256,
}

#[odra::event]
pub struct CollateralRedeemed {
    pub user: Address,
    pub collateral_amount: U256,
    pub burned_amount: U256,
    pub fee_amount: U256,
    pub health_factor_bps: U256,
}

#[odra::event]
pub struct PositionLiquidated {
    pub liquidator: Address,
    pub user: Address,
    pub debt_repaid: U256,
    pub collateral_seized: U256,
    pub fee_amount: U256,
    pub remaining_debt: U256,
}

/// Position left within the warning margin of the minimum health factor
#[odra::event]
pub struct HealthFactorWarning {
    pub user: Address,
    pub health_factor_bps: U256,
    pub min_health_factor_bps: u32,
}

// ========== Price feed ==========

#[odra::event]
pub struct QuotePushed {
    pub feed_id: String,
    pub price: i64,
    pub confidence: u64,
    pub exponent: i32,
    pub publish_time: u64,
}

// ========== Debt token ==========

#[odra::event]
pub struct Minted {
    pub recipient: Address,
    pub amount: U256,
}

#[odra::event]
pub struct Burned {
    pub owner: Address,
    pub amount: U256,
}

#[odra::event]
pub struct Transfer {
    pub sender: Address,
    pub recipient: Address,
    pub amount: U256,
}
