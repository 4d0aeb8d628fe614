//! Health engine: collateral valuation and liquidation eligibility.
//!
//! Every function here is pure. Arithmetic is overflow-checked and fails with
//! `CdpError::ArithmeticOverflow` instead of wrapping or saturating. Divisions
//! round down, which favors solvency over user convenience.

use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::types::{CollateralPosition, Price, ProtocolConfig};

/// Price scale (1e18)
pub const PRICE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Basis points scale (100% = 10000 bps)
pub const BPS_SCALE: u32 = 10_000;

/// Margin above the minimum health factor that triggers a warning event
pub const HEALTH_WARNING_MARGIN_BPS: u32 = 1_000;

/// Value of the position's collateral in debt-token units
pub fn collateral_value(position: &CollateralPosition, price: &Price) -> Result<U256, CdpError> {
    position
        .collateral_amount
        .checked_mul(price.value)
        .map(|v| v / U256::from(PRICE_SCALE))
        .ok_or(CdpError::ArithmeticOverflow)
}

/// Health factor in bps: `collateral_value * 10000 / debt`.
///
/// A debt-free position reports `U256::MAX` and can never be liquidated.
pub fn health_factor_bps(position: &CollateralPosition, price: &Price) -> Result<U256, CdpError> {
    if position.debt_amount.is_zero() {
        return Ok(U256::MAX);
    }

    let value = collateral_value(position, price)?;
    value
        .checked_mul(U256::from(BPS_SCALE))
        .map(|v| v / position.debt_amount)
        .ok_or(CdpError::ArithmeticOverflow)
}

/// Whether the position may be liquidated at this price
pub fn is_liquidatable(
    position: &CollateralPosition,
    price: &Price,
    config: &ProtocolConfig,
) -> Result<bool, CdpError> {
    if position.debt_amount.is_zero() {
        return Ok(false);
    }
    let health = health_factor_bps(position, price)?;
    Ok(health < U256::from(config.liquidation_threshold_bps))
}

/// Additional debt the position can mint without going below
/// `min_health_factor_bps`.
///
/// Solves `value * 10000 / debt >= min_hf` for the largest total debt, then
/// subtracts what is already owed.
pub fn max_mintable(
    position: &CollateralPosition,
    price: &Price,
    config: &ProtocolConfig,
) -> Result<U256, CdpError> {
    if config.min_health_factor_bps == 0 {
        return Err(CdpError::InvalidParameters);
    }

    let value = collateral_value(position, price)?;
    let max_debt = value
        .checked_mul(U256::from(BPS_SCALE))
        .map(|v| v / U256::from(config.min_health_factor_bps))
        .ok_or(CdpError::ArithmeticOverflow)?;

    Ok(max_debt.saturating_sub(position.debt_amount))
}

/// Collateral owed for repaying `debt` at `price`, scaled up by `bonus_bps`.
///
/// `debt * PRICE_SCALE * (10000 + bonus) / (price * 10000)`, rounded once.
pub fn collateral_for_debt(debt: U256, price: &Price, bonus_bps: u32) -> Result<U256, CdpError> {
    if price.value.is_zero() {
        return Err(CdpError::InvalidPrice);
    }

    let multiplier = BPS_SCALE
        .checked_add(bonus_bps)
        .ok_or(CdpError::ArithmeticOverflow)?;

    let numerator = debt
        .checked_mul(U256::from(PRICE_SCALE))
        .and_then(|v| v.checked_mul(U256::from(multiplier)))
        .ok_or(CdpError::ArithmeticOverflow)?;
    let denominator = price
        .value
        .checked_mul(U256::from(BPS_SCALE))
        .ok_or(CdpError::ArithmeticOverflow)?;

    Ok(numerator / denominator)
}

/// `amount * bps / 10000`, rounded down
pub fn bps_share(amount: U256, bps: u32) -> Result<U256, CdpError> {
    amount
        .checked_mul(U256::from(bps))
        .map(|v| v / U256::from(BPS_SCALE))
        .ok_or(CdpError::ArithmeticOverflow)
}

/// Health factor is at or above the minimum but within the warning margin
pub fn is_near_minimum(health_bps: U256, config: &ProtocolConfig) -> bool {
    let min = config.min_health_factor_bps;
    let warn_below = min.saturating_add(HEALTH_WARNING_MARGIN_BPS);
    health_bps >= U256::from(min) && health_bps < U256::from(warn_below)
}
