//! CDP vault contract.
//!
//! Hosts the collateral manager on chain: positions and the config singleton
//! live in contract storage, prices come from the `PriceFeed` contract and
//! value moves through the collateral token and the `DebtToken`.
//!
//! Any engine error reverts the whole deploy, so token calls already made
//! during settlement are undone together with the state writes.

use alloc::rc::Rc;
use odra::prelude::*;
use odra::casper_types::U256;
use odra::{ContractEnv, ContractRef};
use crate::collateral_manager::CollateralManager;
use crate::debt_token::DebtTokenContractRef;
use crate::errors::CdpError;
use crate::events::{
    CollateralDeposited, CollateralRedeemed, ConfigInitialized, ConfigUpdated,
    HealthFactorWarning, PositionLiquidated,
};
use crate::health;
use crate::ledger::{LedgerEffect, PositionStore, ValueLedger};
use crate::oracle_adapter::fetch_price_with_backup;
use crate::price_feed::FeedClient;
use crate::types::{CollateralPosition, ConfigParams, ConfigUpdate, Price, ProtocolConfig};

/// Casper block time is reported in milliseconds
const MILLIS_PER_SECOND: u64 = 1_000;

/// CEP-18 collateral token interface for cross-contract calls
#[odra::external_contract]
pub trait CollateralToken {
    fn transfer(&mut self, recipient: Address, amount: U256) -> bool;
    fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool;
    fn balance_of(&self, account: Address) -> U256;
}

/// CDP vault contract
#[odra::module(events = [
    ConfigInitialized,
    ConfigUpdated,
    CollateralDeposited,
    CollateralRedeemed,
    PositionLiquidated,
    HealthFactorWarning
])]
pub struct CdpVault {
    /// Config singleton, unset until `init`
    config: Var<ProtocolConfig>,
    /// Positions by owner
    positions: Mapping<Address, CollateralPosition>,
    /// `PriceFeed` contract
    price_feed: Var<Address>,
    /// CEP-18 collateral token
    collateral_token: Var<Address>,
    /// `DebtToken` contract (the vault must be one of its minters)
    debt_token: Var<Address>,
}

#[odra::module]
impl CdpVault {
    /// Initialize the vault. The deployer becomes the config admin.
    pub fn init(
        &mut self,
        price_feed: Address,
        collateral_token: Address,
        debt_token: Address,
        params: ConfigParams,
    ) {
        self.price_feed.set(price_feed);
        self.collateral_token.set(collateral_token);
        self.debt_token.set(debt_token);

        let admin = self.env().caller();
        let config = self.run(|manager| manager.initialize_config(admin, params));

        self.env().emit_event(ConfigInitialized {
            admin: config.admin,
            liquidation_threshold_bps: config.liquidation_threshold_bps,
            liquidation_bonus_bps: config.liquidation_bonus_bps,
            min_health_factor_bps: config.min_health_factor_bps,
            price_feed_id: config.price_feed_id,
        });
    }

    // ========== Admin Functions ==========

    /// Overwrite the fields present in `update` (admin only)
    pub fn update_config(&mut self, update: ConfigUpdate) {
        let caller = self.env().caller();
        let config = self.run(|manager| manager.update_config(caller, update));

        self.env().emit_event(ConfigUpdated {
            updated_by: caller,
            admin: config.admin,
            liquidation_threshold_bps: config.liquidation_threshold_bps,
            liquidation_bonus_bps: config.liquidation_bonus_bps,
            min_health_factor_bps: config.min_health_factor_bps,
            price_feed_id: config.price_feed_id,
            mint_fee_bps: config.mint_fee_bps,
            burn_fee_bps: config.burn_fee_bps,
            liquidation_fee_bps: config.liquidation_fee_bps,
            max_mint_amount: config.max_mint_amount,
        });
    }

    // ========== Position Functions ==========

    /// Deposit collateral and mint debt token to the caller.
    ///
    /// The caller must have approved the vault on the collateral token.
    pub fn deposit_collateral_and_mint_tokens(
        &mut self,
        deposit_amount: U256,
        mint_amount: U256,
    ) -> CollateralPosition {
        let user = self.env().caller();
        let now = self.now();
        let receipt = self.run(|manager| {
            manager.deposit_collateral_and_mint_tokens(user, deposit_amount, mint_amount, now)
        });

        self.env().emit_event(CollateralDeposited {
            user,
            collateral_amount: receipt.deposited,
            minted_amount: receipt.minted,
            fee_amount: receipt.fee,
            health_factor_bps: receipt.health_factor_bps,
        });
        self.warn_if_near_minimum(&receipt.position, receipt.health_factor_bps);

        receipt.position
    }

    /// Burn the caller's debt token and withdraw collateral back to the caller.
    ///
    /// The burn fee is taken from the caller's debt token balance on top of
    /// `burn_amount`.
    pub fn redeem_collateral_and_burn_tokens(
        &mut self,
        withdraw_amount: U256,
        burn_amount: U256,
    ) -> CollateralPosition {
        let user = self.env().caller();
        let now = self.now();
        let receipt = self.run(|manager| {
            manager.redeem_collateral_and_burn_tokens(user, withdraw_amount, burn_amount, now)
        });

        self.env().emit_event(CollateralRedeemed {
            user,
            collateral_amount: receipt.withdrawn,
            burned_amount: receipt.burned,
            fee_amount: receipt.fee,
            health_factor_bps: receipt.health_factor_bps,
        });
        self.warn_if_near_minimum(&receipt.position, receipt.health_factor_bps);

        receipt.position
    }

    /// Repay part of `user`'s debt with the caller's debt token and receive
    /// the matching collateral plus bonus. Returns the collateral seized.
    pub fn liquidate(&mut self, user: Address, burn_amount: U256) -> U256 {
        let liquidator = self.env().caller();
        let now = self.now();
        let receipt = self.run(|manager| manager.liquidate(liquidator, user, burn_amount, now));

        self.env().emit_event(PositionLiquidated {
            liquidator,
            user,
            debt_repaid: receipt.debt_repaid,
            collateral_seized: receipt.collateral_seized,
            fee_amount: receipt.fee,
            remaining_debt: receipt.position.debt_amount,
        });
        self.warn_if_near_minimum(&receipt.position, receipt.health_factor_bps);

        receipt.collateral_seized
    }

    // ========== Query Functions ==========

    pub fn get_config(&self) -> Option<ProtocolConfig> {
        self.config.get()
    }

    pub fn get_position(&self, owner: Address) -> Option<CollateralPosition> {
        self.positions.get(&owner)
    }

    /// Current health factor in bps (`U256::MAX` when debt-free)
    pub fn health_factor(&self, owner: Address) -> U256 {
        let (_, position, price) = self.snapshot(owner);
        self.unwrap_or_revert(health::health_factor_bps(&position, &price))
    }

    /// Additional debt `owner` can mint at the current price
    pub fn max_mintable(&self, owner: Address) -> U256 {
        let (config, position, price) = self.snapshot(owner);
        self.unwrap_or_revert(health::max_mintable(&position, &price, &config))
    }

    pub fn is_liquidatable(&self, owner: Address) -> bool {
        let (config, position, price) = self.snapshot(owner);
        self.unwrap_or_revert(health::is_liquidatable(&position, &price, &config))
    }

    pub fn get_price_feed(&self) -> Option<Address> {
        self.price_feed.get()
    }

    pub fn get_collateral_token(&self) -> Option<Address> {
        self.collateral_token.get()
    }

    pub fn get_debt_token(&self) -> Option<Address> {
        self.debt_token.get()
    }

    // ========== Internal Functions ==========

    /// Config, position (empty when unknown) and a fresh price
    fn snapshot(&self, owner: Address) -> (ProtocolConfig, CollateralPosition, Price) {
        let config = match self.config.get() {
            Some(config) => config,
            None => self.env().revert(CdpError::NotInitialized),
        };
        let position = self
            .positions
            .get(&owner)
            .unwrap_or_else(|| CollateralPosition::empty(owner));

        let env = self.env();
        let prices = FeedClient::new(&env, self.require_address(self.price_feed.get()));
        let price = self.unwrap_or_revert(fetch_price_with_backup(
            &prices,
            &config.price_feed_id,
            config.backup_price_feed_id.as_deref(),
            self.now(),
        ));

        (config, position, price)
    }

    fn warn_if_near_minimum(&self, position: &CollateralPosition, health_factor_bps: U256) {
        if position.debt_amount.is_zero() {
            return;
        }
        if let Some(config) = self.config.get() {
            if health::is_near_minimum(health_factor_bps, &config) {
                self.env().emit_event(HealthFactorWarning {
                    user: position.owner,
                    health_factor_bps,
                    min_health_factor_bps: config.min_health_factor_bps,
                });
            }
        }
    }

    fn now(&self) -> u64 {
        self.env().get_block_time() / MILLIS_PER_SECOND
    }

    fn require_address(&self, address: Option<Address>) -> Address {
        match address {
            Some(address) => address,
            None => self.env().revert(CdpError::NotInitialized),
        }
    }

    /// Run one engine operation against contract storage, reverting on error
    fn run<T, F>(&mut self, op: F) -> T
    where
        F: FnOnce(&mut CollateralManager<'_, CdpVault, FeedClient<'_>, TokenLedger>) -> Result<T, CdpError>,
    {
        let env = self.env();
        let price_feed = self.require_address(self.price_feed.get());
        let collateral_token = self.require_address(self.collateral_token.get());
        let debt_token = self.require_address(self.debt_token.get());

        let prices = FeedClient::new(&env, price_feed);
        let mut ledger = TokenLedger::new(env.clone(), collateral_token, debt_token);
        let mut manager = CollateralManager::new(self, &prices, &mut ledger);

        match op(&mut manager) {
            Ok(value) => value,
            Err(error) => env.revert(error),
        }
    }

    fn unwrap_or_revert<T>(&self, result: Result<T, CdpError>) -> T {
        match result {
            Ok(value) => value,
            Err(error) => self.env().revert(error),
        }
    }
}

impl PositionStore for CdpVault {
    fn load_config(&self) -> Option<ProtocolConfig> {
        self.config.get()
    }

    fn save_config(&mut self, config: ProtocolConfig) {
        self.config.set(config);
    }

    fn load_position(&self, owner: &Address) -> Option<CollateralPosition> {
        self.positions.get(owner)
    }

    fn save_position(&mut self, position: CollateralPosition) {
        let owner = position.owner;
        self.positions.set(&owner, position);
    }
}

/// Settles ledger effects with cross-contract token calls.
///
/// Collateral moves through CEP-18 `transfer_from`/`transfer` with the vault as
/// custodian; debt token is minted and burned through `DebtToken`.
pub struct TokenLedger {
    env: Rc<ContractEnv>,
    collateral_token: Address,
    debt_token: Address,
}

impl TokenLedger {
    pub fn new(env: Rc<ContractEnv>, collateral_token: Address, debt_token: Address) -> Self {
        Self {
            env,
            collateral_token,
            debt_token,
        }
    }

    fn collateral(&self) -> CollateralTokenContractRef {
        CollateralTokenContractRef::new(self.env.clone(), self.collateral_token)
    }

    fn debt(&self) -> DebtTokenContractRef {
        DebtTokenContractRef::new(self.env.clone(), self.debt_token)
    }
}

impl ValueLedger for TokenLedger {
    fn settle(&mut self, effects: &[LedgerEffect]) -> Result<(), CdpError> {
        let custody = self.env.self_address();
        for effect in effects {
            match *effect {
                LedgerEffect::CollateralIn { from, amount } => {
                    if !self.collateral().transfer_from(from, custody, amount) {
                        return Err(CdpError::TokenTransferFailed);
                    }
                }
                LedgerEffect::CollateralOut { to, amount } => {
                    if !self.collateral().transfer(to, amount) {
                        return Err(CdpError::TokenTransferFailed);
                    }
                }
                LedgerEffect::MintDebt { to, amount } => self.debt().mint(to, amount),
                LedgerEffect::BurnDebt { from, amount } => self.debt().burn_from(from, amount),
            }
        }
        Ok(())
    }
}
