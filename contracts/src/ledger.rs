//! Persistence and value-transfer seams of the engine.
//!
//! - `PositionStore`: where the config singleton and positions live
//! - `ValueLedger`: moves collateral and debt tokens, all or nothing per call
//! - `UnitOfWork`: stages writes and ledger effects for one operation; commit
//!   settles the effects first and only then writes state, dropping it discards
//!   everything
//!
//! `MemoryStore` and `MemoryLedger` are the in-process implementations used by
//! tests and off-chain simulation.

use alloc::vec::Vec;
use odra::prelude::*;
use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::types::{CollateralPosition, ProtocolConfig};

/// Storage for the config singleton and positions
pub trait PositionStore {
    fn load_config(&self) -> Option<ProtocolConfig>;
    fn save_config(&mut self, config: ProtocolConfig);
    fn load_position(&self, owner: &Address) -> Option<CollateralPosition>;
    fn save_position(&mut self, position: CollateralPosition);
}

/// A single balance movement requested by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    /// Collateral moves from the user into engine custody
    CollateralIn { from: Address, amount: U256 },
    /// Collateral leaves engine custody
    CollateralOut { to: Address, amount: U256 },
    /// New debt token issued
    MintDebt { to: Address, amount: U256 },
    /// Debt token destroyed
    BurnDebt { from: Address, amount: U256 },
}

impl LedgerEffect {
    pub fn amount(&self) -> U256 {
        match self {
            LedgerEffect::CollateralIn { amount, .. }
            | LedgerEffect::CollateralOut { amount, .. }
            | LedgerEffect::MintDebt { amount, .. }
            | LedgerEffect::BurnDebt { amount, .. } => *amount,
        }
    }
}

/// Value-transfer ledger. `settle` applies every effect or none of them.
pub trait ValueLedger {
    fn settle(&mut self, effects: &[LedgerEffect]) -> Result<(), CdpError>;
}

/// Staged changes for one operation
pub struct UnitOfWork<'a, S: PositionStore + ?Sized> {
    store: &'a mut S,
    config: Option<ProtocolConfig>,
    positions: Vec<CollateralPosition>,
    effects: Vec<LedgerEffect>,
}

impl<'a, S: PositionStore + ?Sized> UnitOfWork<'a, S> {
    pub fn begin(store: &'a mut S) -> Self {
        Self {
            store,
            config: None,
            positions: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Config as this unit of work sees it (staged value first)
    pub fn config(&self) -> Option<ProtocolConfig> {
        match &self.config {
            Some(config) => Some(config.clone()),
            None => self.store.load_config(),
        }
    }

    pub fn require_config(&self) -> Result<ProtocolConfig, CdpError> {
        self.config().ok_or(CdpError::NotInitialized)
    }

    /// Position as this unit of work sees it (staged value first)
    pub fn position(&self, owner: &Address) -> Option<CollateralPosition> {
        self.positions
            .iter()
            .find(|p| p.owner == *owner)
            .cloned()
            .or_else(|| self.store.load_position(owner))
    }

    pub fn stage_config(&mut self, config: ProtocolConfig) {
        self.config = Some(config);
    }

    pub fn stage_position(&mut self, position: CollateralPosition) {
        match self.positions.iter_mut().find(|p| p.owner == position.owner) {
            Some(existing) => *existing = position,
            None => self.positions.push(position),
        }
    }

    /// Queue a ledger effect. Zero amounts are dropped.
    pub fn push_effect(&mut self, effect: LedgerEffect) {
        if !effect.amount().is_zero() {
            self.effects.push(effect);
        }
    }

    pub fn effects(&self) -> &[LedgerEffect] {
        &self.effects
    }

    /// Settle the effects, then write the staged state.
    ///
    /// If settlement fails nothing is written.
    pub fn commit<L: ValueLedger + ?Sized>(self, ledger: &mut L) -> Result<(), CdpError> {
        let UnitOfWork {
            store,
            config,
            positions,
            effects,
        } = self;

        ledger.settle(&effects)?;

        if let Some(config) = config {
            store.save_config(config);
        }
        for position in positions {
            store.save_position(position);
        }
        Ok(())
    }

    /// Discard everything staged
    pub fn rollback(self) {}
}

/// In-memory position store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    config: Option<ProtocolConfig>,
    positions: Vec<CollateralPosition>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positions(&self) -> &[CollateralPosition] {
        &self.positions
    }
}

impl PositionStore for MemoryStore {
    fn load_config(&self) -> Option<ProtocolConfig> {
        self.config.clone()
    }

    fn save_config(&mut self, config: ProtocolConfig) {
        self.config = Some(config);
    }

    fn load_position(&self, owner: &Address) -> Option<CollateralPosition> {
        self.positions.iter().find(|p| p.owner == *owner).cloned()
    }

    fn save_position(&mut self, position: CollateralPosition) {
        match self.positions.iter_mut().find(|p| p.owner == position.owner) {
            Some(existing) => *existing = position,
            None => self.positions.push(position),
        }
    }
}

/// In-memory token balances for collateral and debt token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLedger {
    /// Account holding deposited collateral
    custody: Address,
    collateral: Vec<(Address, U256)>,
    debt: Vec<(Address, U256)>,
    debt_supply: U256,
}

impl MemoryLedger {
    pub fn new(custody: Address) -> Self {
        Self {
            custody,
            collateral: Vec::new(),
            debt: Vec::new(),
            debt_supply: U256::zero(),
        }
    }

    pub fn custody(&self) -> Address {
        self.custody
    }

    /// Give an account collateral tokens outside the engine
    pub fn fund_collateral(&mut self, account: Address, amount: U256) {
        let balance = balance_mut(&mut self.collateral, account);
        *balance = balance.saturating_add(amount);
    }

    /// Give an account debt tokens outside the engine (e.g. bought on market)
    pub fn fund_debt(&mut self, account: Address, amount: U256) {
        let balance = balance_mut(&mut self.debt, account);
        *balance = balance.saturating_add(amount);
        self.debt_supply = self.debt_supply.saturating_add(amount);
    }

    pub fn collateral_balance(&self, account: &Address) -> U256 {
        balance_of(&self.collateral, account)
    }

    pub fn debt_balance(&self, account: &Address) -> U256 {
        balance_of(&self.debt, account)
    }

    pub fn debt_supply(&self) -> U256 {
        self.debt_supply
    }

    fn apply(&mut self, effect: &LedgerEffect) -> Result<(), CdpError> {
        let custody = self.custody;
        match *effect {
            LedgerEffect::CollateralIn { from, amount } => {
                debit(&mut self.collateral, from, amount)?;
                credit(&mut self.collateral, custody, amount)
            }
            LedgerEffect::CollateralOut { to, amount } => {
                debit(&mut self.collateral, custody, amount)?;
                credit(&mut self.collateral, to, amount)
            }
            LedgerEffect::MintDebt { to, amount } => {
                credit(&mut self.debt, to, amount)?;
                self.debt_supply = self
                    .debt_supply
                    .checked_add(amount)
                    .ok_or(CdpError::ArithmeticOverflow)?;
                Ok(())
            }
            LedgerEffect::BurnDebt { from, amount } => {
                debit(&mut self.debt, from, amount)?;
                self.debt_supply = self
                    .debt_supply
                    .checked_sub(amount)
                    .ok_or(CdpError::ArithmeticOverflow)?;
                Ok(())
            }
        }
    }
}

impl ValueLedger for MemoryLedger {
    fn settle(&mut self, effects: &[LedgerEffect]) -> Result<(), CdpError> {
        let mut next = self.clone();
        for effect in effects {
            next.apply(effect)?;
        }
        *self = next;
        Ok(())
    }
}

fn balance_of(balances: &[(Address, U256)], account: &Address) -> U256 {
    balances
        .iter()
        .find(|(a, _)| a == account)
        .map(|(_, b)| *b)
        .unwrap_or_default()
}

fn balance_mut(balances: &mut Vec<(Address, U256)>, account: Address) -> &mut U256 {
    let index = match balances.iter().position(|(a, _)| *a == account) {
        Some(index) => index,
        None => {
            balances.push((account, U256::zero()));
            balances.len() - 1
        }
    };
    &mut balances[index].1
}

fn debit(balances: &mut Vec<(Address, U256)>, account: Address, amount: U256) -> Result<(), CdpError> {
    let balance = balance_mut(balances, account);
    *balance = balance
        .checked_sub(amount)
        .ok_or(CdpError::InsufficientTokenBalance)?;
    Ok(())
}

fn credit(balances: &mut Vec<(Address, U256)>, account: Address, amount: U256) -> Result<(), CdpError> {
    let balance = balance_mut(balances, account);
    *balance = balance
        .checked_add(amount)
        .ok_or(CdpError::ArithmeticOverflow)?;
    Ok(())
}
