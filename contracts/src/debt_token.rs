//! Debt Token Contract
//!
//! CEP-18 compatible stablecoin minted against collateral.
//! Only authorized minters (the vault) can mint or burn on behalf of holders.

use odra::prelude::*;
use odra::casper_types::{U256, Key};
use odra::casper_types::bytesrepr::ToBytes;
use crate::errors::CdpError;
use crate::events::{Burned, Minted, Transfer};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

const DEFAULT_DECIMALS: u8 = 18;
const CEP18_NAME_KEY: &str = "name";
const CEP18_SYMBOL_KEY: &str = "symbol";
const CEP18_DECIMALS_KEY: &str = "decimals";
const CEP18_TOTAL_SUPPLY_KEY: &str = "total_supply";
const CEP18_BALANCES_DICT: &str = "balances";
const CEP18_ALLOWANCES_DICT: &str = "allowances";

/// Debt token contract
#[odra::module(events = [Minted, Burned, Transfer])]
pub struct DebtToken {
    name: Var<String>,
    symbol: Var<String>,
    decimals: Var<u8>,
    total_supply: Var<U256>,
    balances: Mapping<Address, U256>,
    /// (owner, spender) -> amount
    allowances: Mapping<(Address, Address), U256>,
    /// Manages the minter set
    admin: Var<Address>,
    /// Protocol contracts allowed to mint and burn
    authorized_minters: Mapping<Address, bool>,
}

#[odra::module]
impl DebtToken {
    /// Initialize the token with the deployer as admin
    pub fn init(&mut self, name: String, symbol: String, decimals: Option<u8>) {
        let decimals = decimals.unwrap_or(DEFAULT_DECIMALS);
        self.name.set(name.clone());
        self.symbol.set(symbol.clone());
        self.decimals.set(decimals);
        self.total_supply.set(U256::zero());
        self.admin.set(self.env().caller());
        self.env().init_dictionary(CEP18_BALANCES_DICT);
        self.env().init_dictionary(CEP18_ALLOWANCES_DICT);
        self.env().set_named_value(CEP18_NAME_KEY, name);
        self.env().set_named_value(CEP18_SYMBOL_KEY, symbol);
        self.env().set_named_value(CEP18_DECIMALS_KEY, decimals);
        self.env().set_named_value(CEP18_TOTAL_SUPPLY_KEY, U256::zero());
    }

    // ========== CEP-18 Standard Functions ==========

    pub fn name(&self) -> String {
        self.name.get().unwrap_or_default()
    }

    pub fn symbol(&self) -> String {
        self.symbol.get().unwrap_or_default()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get().unwrap_or(DEFAULT_DECIMALS)
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply.get().unwrap_or(U256::zero())
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).unwrap_or(U256::zero())
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or(U256::zero())
    }

    /// Transfer tokens to recipient
    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        self.transfer_internal(sender, recipient, amount);
        true
    }

    /// Approve spender to spend tokens
    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.env().caller();
        self.approve_internal(owner, spender, amount);
        true
    }

    /// Transfer tokens from owner to recipient (requires allowance)
    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        let spender = self.env().caller();

        let current_allowance = self.allowance(owner, spender);
        if current_allowance < amount {
            self.env().revert(CdpError::InsufficientTokenBalance);
        }

        self.transfer_internal(owner, recipient, amount);
        self.approve_internal(owner, spender, current_allowance - amount);
        true
    }

    // ========== Minter Functions ==========

    /// Mint new tokens (authorized minters only)
    pub fn mint(&mut self, to: Address, amount: U256) {
        self.require_authorized_minter();

        let new_balance = match self.balance_of(to).checked_add(amount) {
            Some(balance) => balance,
            None => self.env().revert(CdpError::ArithmeticOverflow),
        };
        let new_supply = match self.total_supply().checked_add(amount) {
            Some(supply) => supply,
            None => self.env().revert(CdpError::ArithmeticOverflow),
        };

        self.balances.set(&to, new_balance);
        self.set_balance_cep18(to, new_balance);
        self.total_supply.set(new_supply);
        self.set_total_supply_cep18(new_supply);

        self.env().emit_event(Minted { recipient: to, amount });
    }

    /// Burn tokens from caller
    pub fn burn(&mut self, amount: U256) {
        let caller = self.env().caller();
        self.burn_from_internal(caller, amount);
    }

    /// Burn tokens from account (authorized minters only, used for repayment)
    pub fn burn_from(&mut self, from: Address, amount: U256) {
        self.require_authorized_minter();
        self.burn_from_internal(from, amount);
    }

    // ========== Admin Functions ==========

    pub fn add_minter(&mut self, minter: Address) {
        self.require_admin();
        self.authorized_minters.set(&minter, true);
    }

    pub fn remove_minter(&mut self, minter: Address) {
        self.require_admin();
        self.authorized_minters.set(&minter, false);
    }

    pub fn is_minter(&self, account: Address) -> bool {
        self.authorized_minters.get(&account).unwrap_or(false)
    }

    pub fn get_admin(&self) -> Option<Address> {
        self.admin.get()
    }

    // ========== Internal Functions ==========

    fn transfer_internal(&mut self, from: Address, to: Address, amount: U256) {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            self.env().revert(CdpError::InsufficientTokenBalance);
        }

        let new_from_balance = from_balance - amount;
        self.balances.set(&from, new_from_balance);
        self.set_balance_cep18(from, new_from_balance);

        let new_to_balance = match self.balance_of(to).checked_add(amount) {
            Some(balance) => balance,
            None => self.env().revert(CdpError::ArithmeticOverflow),
        };
        self.balances.set(&to, new_to_balance);
        self.set_balance_cep18(to, new_to_balance);

        self.env().emit_event(Transfer {
            sender: from,
            recipient: to,
            amount,
        });
    }

    fn approve_internal(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.set(&(owner, spender), amount);
        self.set_allowance_cep18(owner, spender, amount);
    }

    fn burn_from_internal(&mut self, from: Address, amount: U256) {
        let current_balance = self.balance_of(from);
        if current_balance < amount {
            self.env().revert(CdpError::InsufficientTokenBalance);
        }

        let new_balance = current_balance - amount;
        self.balances.set(&from, new_balance);
        self.set_balance_cep18(from, new_balance);

        let new_supply = self.total_supply().saturating_sub(amount);
        self.total_supply.set(new_supply);
        self.set_total_supply_cep18(new_supply);

        self.env().emit_event(Burned { owner: from, amount });
    }

    fn set_balance_cep18(&self, owner: Address, amount: U256) {
        let key = balance_key(owner);
        self.env().set_dictionary_value(CEP18_BALANCES_DICT, key.as_bytes(), amount);
    }

    fn set_allowance_cep18(&self, owner: Address, spender: Address, amount: U256) {
        let key = allowance_key(owner, spender);
        self.env().set_dictionary_value(CEP18_ALLOWANCES_DICT, key.as_bytes(), amount);
    }

    fn set_total_supply_cep18(&self, amount: U256) {
        self.env().set_named_value(CEP18_TOTAL_SUPPLY_KEY, amount);
    }

    fn require_authorized_minter(&self) {
        let caller = self.env().caller();
        if !self.is_minter(caller) {
            self.env().revert(CdpError::Unauthorized);
        }
    }

    fn require_admin(&self) {
        let caller = self.env().caller();
        if self.admin.get() != Some(caller) {
            self.env().revert(CdpError::Unauthorized);
        }
    }
}

/// CEP-18 dictionary key for a balance: base64 of the serialized `Key`
fn balance_key(owner: Address) -> String {
    let bytes = Key::from(owner).to_bytes().unwrap_or_default();
    BASE64_STANDARD.encode(bytes)
}

/// CEP-18 dictionary key for an allowance: base64 of owner then spender
fn allowance_key(owner: Address, spender: Address) -> String {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&Key::from(owner).to_bytes().unwrap_or_default());
    bytes.extend_from_slice(&Key::from(spender).to_bytes().unwrap_or_default());
    BASE64_STANDARD.encode(bytes)
}
