//! Collateral Manager
//!
//! Orchestrates the state transitions of the engine:
//! - Config initialization and admin updates
//! - Deposit collateral and mint debt token
//! - Burn debt token and redeem collateral
//! - Liquidation of unhealthy positions
//!
//! Every transition runs inside one `UnitOfWork`. The full post-update state is
//! computed and validated first; ledger effects are settled only when validation
//! passes, and state is written only when settlement succeeds. A failed call
//! leaves the store and ledger untouched.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::health;
use crate::ledger::{LedgerEffect, PositionStore, UnitOfWork, ValueLedger};
use crate::oracle_adapter::{fetch_price_with_backup, PriceSource};
use crate::types::{
    CollateralPosition, ConfigParams, ConfigUpdate, Price, ProtocolConfig,
};

/// Maximum liquidation bonus (50%)
pub const MAX_LIQUIDATION_BONUS_BPS: u32 = 5_000;

/// Maximum mint, burn or liquidation fee (10%)
pub const MAX_FEE_BPS: u32 = 1_000;

/// Result of a successful deposit-and-mint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositReceipt {
    pub position: CollateralPosition,
    pub deposited: U256,
    /// Debt token received by the user (mint minus fee)
    pub minted: U256,
    /// Debt token minted to the fee recipient
    pub fee: U256,
    pub health_factor_bps: U256,
    pub price: Price,
}

/// Result of a successful burn-and-redeem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemReceipt {
    pub position: CollateralPosition,
    pub withdrawn: U256,
    /// Debt repaid (the fee is burned on top of this)
    pub burned: U256,
    /// Debt token moved from the user to the fee recipient
    pub fee: U256,
    pub health_factor_bps: U256,
}

/// Result of a successful liquidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationReceipt {
    pub liquidator: Address,
    /// Target position after liquidation
    pub position: CollateralPosition,
    pub debt_repaid: U256,
    /// Total collateral removed from the position
    pub collateral_seized: U256,
    /// Part of the seized collateral routed to the fee recipient
    pub fee: U256,
    pub health_factor_bps: U256,
    pub price: Price,
}

/// Check every config invariant
pub fn validate_config(config: &ProtocolConfig) -> Result<(), CdpError> {
    if config.liquidation_threshold_bps == 0
        || config.liquidation_threshold_bps > config.min_health_factor_bps
    {
        return Err(CdpError::InvalidParameters);
    }
    if config.liquidation_bonus_bps > MAX_LIQUIDATION_BONUS_BPS {
        return Err(CdpError::InvalidParameters);
    }
    if config.mint_fee_bps > MAX_FEE_BPS
        || config.burn_fee_bps > MAX_FEE_BPS
        || config.liquidation_fee_bps > MAX_FEE_BPS
    {
        return Err(CdpError::InvalidParameters);
    }
    if config.max_mint_amount == Some(U256::zero()) {
        return Err(CdpError::InvalidParameters);
    }
    if config.price_feed_id.is_empty() {
        return Err(CdpError::InvalidParameters);
    }
    if let Some(backup) = &config.backup_price_feed_id {
        if backup.is_empty() || *backup == config.price_feed_id {
            return Err(CdpError::InvalidParameters);
        }
    }
    Ok(())
}

/// Apply the fields present in `update` on top of `config`
pub fn merge_config(config: &ProtocolConfig, update: &ConfigUpdate) -> ProtocolConfig {
    let mut merged = config.clone();
    if let Some(admin) = update.admin {
        merged.admin = admin;
    }
    if let Some(v) = update.liquidation_threshold_bps {
        merged.liquidation_threshold_bps = v;
    }
    if let Some(v) = update.liquidation_bonus_bps {
        merged.liquidation_bonus_bps = v;
    }
    if let Some(v) = update.min_health_factor_bps {
        merged.min_health_factor_bps = v;
    }
    if let Some(feed) = &update.price_feed_id {
        merged.price_feed_id = feed.clone();
    }
    if let Some(backup) = &update.backup_price_feed_id {
        merged.backup_price_feed_id = backup.clone();
    }
    if let Some(v) = update.mint_fee_bps {
        merged.mint_fee_bps = v;
    }
    if let Some(v) = update.burn_fee_bps {
        merged.burn_fee_bps = v;
    }
    if let Some(v) = update.liquidation_fee_bps {
        merged.liquidation_fee_bps = v;
    }
    if let Some(recipient) = update.fee_recipient {
        merged.fee_recipient = recipient;
    }
    if let Some(cap) = update.max_mint_amount {
        merged.max_mint_amount = cap;
    }
    merged
}

/// The engine, bound to a store, a price source and a value ledger
pub struct CollateralManager<'a, S: ?Sized, P: ?Sized, L: ?Sized> {
    store: &'a mut S,
    prices: &'a P,
    ledger: &'a mut L,
}

impl<'a, S, P, L> CollateralManager<'a, S, P, L>
where
    S: PositionStore + ?Sized,
    P: PriceSource + ?Sized,
    L: ValueLedger + ?Sized,
{
    pub fn new(store: &'a mut S, prices: &'a P, ledger: &'a mut L) -> Self {
        Self { store, prices, ledger }
    }

    // ========== Config ==========

    /// Create the config singleton with `admin` as its administrator
    pub fn initialize_config(
        &mut self,
        admin: Address,
        params: ConfigParams,
    ) -> Result<ProtocolConfig, CdpError> {
        let mut uow = UnitOfWork::begin(&mut *self.store);
        if uow.config().is_some() {
            return Err(CdpError::AlreadyInitialized);
        }

        let config = ProtocolConfig {
            admin,
            liquidation_threshold_bps: params.liquidation_threshold_bps,
            liquidation_bonus_bps: params.liquidation_bonus_bps,
            min_health_factor_bps: params.min_health_factor_bps,
            price_feed_id: params.price_feed_id,
            backup_price_feed_id: params.backup_price_feed_id,
            mint_fee_bps: params.mint_fee_bps,
            burn_fee_bps: params.burn_fee_bps,
            liquidation_fee_bps: params.liquidation_fee_bps,
            fee_recipient: params.fee_recipient.unwrap_or(admin),
            max_mint_amount: params.max_mint_amount,
        };
        validate_config(&config)?;

        uow.stage_config(config.clone());
        uow.commit(&mut *self.ledger)?;
        Ok(config)
    }

    /// Overwrite the fields present in `update`. Admin only.
    pub fn update_config(
        &mut self,
        caller: Address,
        update: ConfigUpdate,
    ) -> Result<ProtocolConfig, CdpError> {
        let mut uow = UnitOfWork::begin(&mut *self.store);
        let current = uow.require_config()?;
        if caller != current.admin {
            return Err(CdpError::Unauthorized);
        }

        let merged = merge_config(&current, &update);
        validate_config(&merged)?;

        uow.stage_config(merged.clone());
        uow.commit(&mut *self.ledger)?;
        Ok(merged)
    }

    // ========== Position operations ==========

    /// Deposit `deposit_amount` collateral and mint `mint_amount` debt token
    pub fn deposit_collateral_and_mint_tokens(
        &mut self,
        user: Address,
        deposit_amount: U256,
        mint_amount: U256,
        now: u64,
    ) -> Result<DepositReceipt, CdpError> {
        let mut uow = UnitOfWork::begin(&mut *self.store);
        let config = uow.require_config()?;
        if deposit_amount.is_zero() || mint_amount.is_zero() {
            return Err(CdpError::InvalidAmount);
        }
        if let Some(cap) = config.max_mint_amount {
            if mint_amount > cap {
                return Err(CdpError::ExcessiveMintAmount);
            }
        }

        let mut position = uow
            .position(&user)
            .unwrap_or_else(|| CollateralPosition::empty(user));
        position.collateral_amount = position
            .collateral_amount
            .checked_add(deposit_amount)
            .ok_or(CdpError::ArithmeticOverflow)?;

        let price = current_price(self.prices, &config, now)?;

        position.debt_amount = position
            .debt_amount
            .checked_add(mint_amount)
            .ok_or(CdpError::ArithmeticOverflow)?;

        let health_factor_bps = health::health_factor_bps(&position, &price)?;
        if health_factor_bps < U256::from(config.min_health_factor_bps) {
            return Err(CdpError::BelowMinimumHealthFactor);
        }

        // Debt is recorded at the full amount; the fee is carved out of what
        // the user receives.
        let fee = health::bps_share(mint_amount, config.mint_fee_bps)?;
        let minted = mint_amount - fee;

        uow.push_effect(LedgerEffect::CollateralIn {
            from: user,
            amount: deposit_amount,
        });
        uow.push_effect(LedgerEffect::MintDebt {
            to: user,
            amount: minted,
        });
        uow.push_effect(LedgerEffect::MintDebt {
            to: config.fee_recipient,
            amount: fee,
        });
        uow.stage_position(position.clone());
        uow.commit(&mut *self.ledger)?;

        Ok(DepositReceipt {
            position,
            deposited: deposit_amount,
            minted,
            fee,
            health_factor_bps,
            price,
        })
    }

    /// Burn `burn_amount` debt token and withdraw `withdraw_amount` collateral.
    ///
    /// Either leg may be zero, but not both.
    pub fn redeem_collateral_and_burn_tokens(
        &mut self,
        user: Address,
        withdraw_amount: U256,
        burn_amount: U256,
        now: u64,
    ) -> Result<RedeemReceipt, CdpError> {
        let mut uow = UnitOfWork::begin(&mut *self.store);
        let config = uow.require_config()?;
        if withdraw_amount.is_zero() && burn_amount.is_zero() {
            return Err(CdpError::InvalidAmount);
        }

        let mut position = uow.position(&user).ok_or(CdpError::PositionNotFound)?;
        if withdraw_amount > position.collateral_amount {
            return Err(CdpError::InsufficientCollateral);
        }
        if burn_amount > position.debt_amount {
            return Err(CdpError::InsufficientDebt);
        }

        position.debt_amount = position
            .debt_amount
            .checked_sub(burn_amount)
            .ok_or(CdpError::InsufficientDebt)?;
        position.collateral_amount = position
            .collateral_amount
            .checked_sub(withdraw_amount)
            .ok_or(CdpError::InsufficientCollateral)?;

        let price = current_price(self.prices, &config, now)?;
        let health_factor_bps = health::health_factor_bps(&position, &price)?;
        if !position.debt_amount.is_zero()
            && health_factor_bps < U256::from(config.min_health_factor_bps)
        {
            return Err(CdpError::BelowMinimumHealthFactor);
        }

        // The fee is burned from the user together with the repayment and
        // reissued to the fee recipient.
        let fee = health::bps_share(burn_amount, config.burn_fee_bps)?;
        let burned_total = burn_amount
            .checked_add(fee)
            .ok_or(CdpError::ArithmeticOverflow)?;

        uow.push_effect(LedgerEffect::BurnDebt {
            from: user,
            amount: burned_total,
        });
        uow.push_effect(LedgerEffect::MintDebt {
            to: config.fee_recipient,
            amount: fee,
        });
        uow.push_effect(LedgerEffect::CollateralOut {
            to: user,
            amount: withdraw_amount,
        });
        uow.stage_position(position.clone());
        uow.commit(&mut *self.ledger)?;

        Ok(RedeemReceipt {
            position,
            withdrawn: withdraw_amount,
            burned: burn_amount,
            fee,
            health_factor_bps,
        })
    }

    /// Repay `burn_amount` of `target`'s debt in exchange for its collateral
    /// plus the liquidation bonus.
    pub fn liquidate(
        &mut self,
        liquidator: Address,
        target: Address,
        burn_amount: U256,
        now: u64,
    ) -> Result<LiquidationReceipt, CdpError> {
        let mut uow = UnitOfWork::begin(&mut *self.store);
        let config = uow.require_config()?;

        let mut position = uow.position(&target).ok_or(CdpError::PositionNotFound)?;
        if burn_amount.is_zero() || burn_amount > position.debt_amount {
            return Err(CdpError::InvalidAmount);
        }

        let price = current_price(self.prices, &config, now)?;
        if !health::is_liquidatable(&position, &price, &config)? {
            return Err(CdpError::PositionHealthy);
        }

        let collateral_seized =
            health::collateral_for_debt(burn_amount, &price, config.liquidation_bonus_bps)?;
        // Never capped: a seizure larger than the position fails outright.
        if collateral_seized > position.collateral_amount {
            return Err(CdpError::InsufficientCollateral);
        }

        position.debt_amount = position
            .debt_amount
            .checked_sub(burn_amount)
            .ok_or(CdpError::InvalidAmount)?;
        position.collateral_amount = position
            .collateral_amount
            .checked_sub(collateral_seized)
            .ok_or(CdpError::InsufficientCollateral)?;

        let fee = health::bps_share(collateral_seized, config.liquidation_fee_bps)?;
        let health_factor_bps = health::health_factor_bps(&position, &price)?;

        uow.push_effect(LedgerEffect::BurnDebt {
            from: liquidator,
            amount: burn_amount,
        });
        uow.push_effect(LedgerEffect::CollateralOut {
            to: liquidator,
            amount: collateral_seized - fee,
        });
        uow.push_effect(LedgerEffect::CollateralOut {
            to: config.fee_recipient,
            amount: fee,
        });
        uow.stage_position(position.clone());
        uow.commit(&mut *self.ledger)?;

        Ok(LiquidationReceipt {
            liquidator,
            position,
            debt_repaid: burn_amount,
            collateral_seized,
            fee,
            health_factor_bps,
            price,
        })
    }

    // ========== Queries ==========

    pub fn config(&self) -> Option<ProtocolConfig> {
        self.store.load_config()
    }

    pub fn position(&self, owner: &Address) -> Option<CollateralPosition> {
        self.store.load_position(owner)
    }

    /// Current health factor; an unknown owner reads as an empty position
    pub fn health_factor(&self, owner: &Address, now: u64) -> Result<U256, CdpError> {
        let (config, position) = self.snapshot(owner)?;
        let price = current_price(self.prices, &config, now)?;
        health::health_factor_bps(&position, &price)
    }

    pub fn max_mintable(&self, owner: &Address, now: u64) -> Result<U256, CdpError> {
        let (config, position) = self.snapshot(owner)?;
        let price = current_price(self.prices, &config, now)?;
        health::max_mintable(&position, &price, &config)
    }

    pub fn is_liquidatable(&self, owner: &Address, now: u64) -> Result<bool, CdpError> {
        let (config, position) = self.snapshot(owner)?;
        let price = current_price(self.prices, &config, now)?;
        health::is_liquidatable(&position, &price, &config)
    }

    fn snapshot(&self, owner: &Address) -> Result<(ProtocolConfig, CollateralPosition), CdpError> {
        let config = self.store.load_config().ok_or(CdpError::NotInitialized)?;
        let position = self
            .store
            .load_position(owner)
            .unwrap_or_else(|| CollateralPosition::empty(*owner));
        Ok((config, position))
    }
}

fn current_price<P: PriceSource + ?Sized>(
    prices: &P,
    config: &ProtocolConfig,
    now: u64,
) -> Result<Price, CdpError> {
    fetch_price_with_backup(
        prices,
        &config.price_feed_id,
        config.backup_price_feed_id.as_deref(),
        now,
    )
}
