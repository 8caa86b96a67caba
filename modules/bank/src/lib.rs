// This file is part of Gavel.

// Copyright (C) 2025-2026 Gavel Developers.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Bank Ledger Module
//!
//! ## Overview
//!
//! The single in-memory authority for every account in the system. An
//! account's balance is split into an untouched part and a blocked part:
//!   - `block_funds`: move an amount from available into blocked, refused
//!     when the available part cannot cover it
//!   - `unblock_funds`: give blocked funds back, clamped to what is held
//!   - `transfer_funds`: pay a previously blocked amount out to another
//!     account; blocked funds are the only funds that can leave an account
//!
//! The ledger also keeps the public listing of registered auction houses,
//! indexed both by house id and by the house's own account id so that
//! deregistering the account removes the listing in the same step.
//!
//! Operations are synchronous and individually atomic; callers serialize
//! access with a single lock around the `Ledger`.

use std::collections::BTreeMap;

use gavel_primitives::{
	AccountId, AccountKind, Balance, BalanceSnapshot, HouseId, HouseInfo, FIRST_ACCOUNT_ID, FIRST_HOUSE_ID,
};

mod tests;

/// Failures reported back to clients as `(success = false, message)`. The
/// display strings are surfaced verbatim by user interfaces.
#[derive(Debug, derive_more::Display, Eq, PartialEq, Copy, Clone)]
pub enum Error {
	#[display(fmt = "Account not found")]
	AccountNotFound,
	#[display(fmt = "Invalid amount")]
	InvalidAmount,
	#[display(fmt = "Insufficient funds")]
	InsufficientFunds,
	#[display(fmt = "Account kind mismatch")]
	KindMismatch,
}

impl std::error::Error for Error {}

/// A single account: its display name, its kind and its split balance.
#[derive(Clone, Debug)]
pub struct Account {
	pub name: String,
	pub kind: AccountKind,
	total: Balance,
	blocked: Balance,
}

impl Account {
	fn new(name: String, kind: AccountKind, total: Balance) -> Self {
		Self {
			name,
			kind,
			total,
			blocked: 0,
		}
	}

	/// The part of the balance not held against any bid.
	pub fn available(&self) -> Balance {
		self.total - self.blocked
	}

	pub fn snapshot(&self) -> BalanceSnapshot {
		BalanceSnapshot {
			total: self.total,
			available: self.available(),
			blocked: self.blocked,
		}
	}

	fn block(&mut self, amount: Balance) -> Result<(), Error> {
		if self.available() < amount {
			return Err(Error::InsufficientFunds);
		}
		self.blocked += amount;
		Ok(())
	}

	fn unblock(&mut self, amount: Balance) -> Balance {
		let released = amount.min(self.blocked);
		self.blocked -= released;
		released
	}

	fn withdraw_blocked(&mut self, amount: Balance) -> Result<(), Error> {
		if self.blocked < amount {
			return Err(Error::InsufficientFunds);
		}
		self.blocked -= amount;
		self.total -= amount;
		Ok(())
	}

	fn deposit(&mut self, amount: Balance) {
		self.total += amount;
	}
}

/// The bank's entire state.
#[derive(Default)]
pub struct Ledger {
	accounts: BTreeMap<AccountId, Account>,
	houses: BTreeMap<HouseId, HouseInfo>,
	house_by_account: BTreeMap<AccountId, HouseId>,
	accounts_created: u64,
	houses_created: u32,
}

impl Ledger {
	pub fn new() -> Self {
		Self::default()
	}

	fn next_account_id(&mut self) -> AccountId {
		let id = FIRST_ACCOUNT_ID + self.accounts_created;
		self.accounts_created += 1;
		id
	}

	fn account_mut(&mut self, id: AccountId) -> Result<&mut Account, Error> {
		self.accounts.get_mut(&id).ok_or(Error::AccountNotFound)
	}

	/// Open an agent account with `initial_balance` fully available.
	/// Returns the new id together with the current house listing, so a
	/// fresh agent needs no second round-trip before it can bid.
	pub fn register_agent(&mut self, name: &str, initial_balance: Balance) -> (AccountId, Vec<HouseInfo>) {
		let id = self.next_account_id();
		self.accounts
			.insert(id, Account::new(name.to_string(), AccountKind::Agent, initial_balance));
		log::info!(target: "bank", "registered agent {:?} as account {}", name, id);
		(id, self.auction_houses())
	}

	/// Register an auction house: a public listing plus a settlement
	/// account starting at zero.
	pub fn register_house(&mut self, host: &str, port: u16) -> (HouseId, AccountId) {
		let account_id = self.next_account_id();
		let house_id = FIRST_HOUSE_ID + self.houses_created;
		self.houses_created += 1;

		self.accounts.insert(
			account_id,
			Account::new(format!("house-{}", house_id), AccountKind::AuctionHouse, 0),
		);
		self.houses.insert(
			house_id,
			HouseInfo {
				house_id,
				account_id,
				host: host.to_string(),
				port,
			},
		);
		self.house_by_account.insert(account_id, house_id);
		log::info!(
			target: "bank",
			"registered auction house {} at {}:{} with account {}",
			house_id, host, port, account_id
		);
		(house_id, account_id)
	}

	/// Hold `amount` of the account's available funds against a bid.
	pub fn block_funds(&mut self, id: AccountId, amount: Balance) -> Result<(), Error> {
		if amount == 0 {
			return Err(Error::InvalidAmount);
		}
		self.account_mut(id)?.block(amount)
	}

	/// Release a hold. Clamped to what is actually held: the caller may be
	/// compensating for a failure it only half-observed, and over-releasing
	/// must not underflow. Only an unknown account fails.
	pub fn unblock_funds(&mut self, id: AccountId, amount: Balance) -> Result<(), Error> {
		if amount == 0 {
			return Err(Error::InvalidAmount);
		}
		let account = self.account_mut(id)?;
		let released = account.unblock(amount);
		if released < amount {
			log::warn!(
				target: "bank",
				"account {} asked to release {} but held only {}",
				id, amount, released
			);
		}
		Ok(())
	}

	/// Pay a previously blocked amount from one account into another's
	/// total. Free available funds cannot be transferred without being
	/// blocked first.
	pub fn transfer_funds(&mut self, from: AccountId, to: AccountId, amount: Balance) -> Result<(), Error> {
		if amount == 0 {
			return Err(Error::InvalidAmount);
		}
		// Check both sides before mutating either.
		if !self.accounts.contains_key(&to) {
			return Err(Error::AccountNotFound);
		}
		self.account_mut(from)?.withdraw_blocked(amount)?;
		self.account_mut(to).expect("destination checked above; qed").deposit(amount);
		Ok(())
	}

	pub fn account_info(&self, id: AccountId) -> Result<BalanceSnapshot, Error> {
		self.accounts.get(&id).map(Account::snapshot).ok_or(Error::AccountNotFound)
	}

	/// The houses whose registration has completed and whose
	/// deregistration has not.
	pub fn auction_houses(&self) -> Vec<HouseInfo> {
		self.houses.values().cloned().collect()
	}

	/// Close an account. For an auction house the public listing goes in
	/// the same step, via the reverse index.
	pub fn deregister(&mut self, id: AccountId, kind: AccountKind) -> Result<(), Error> {
		let account = self.accounts.get(&id).ok_or(Error::AccountNotFound)?;
		if account.kind != kind {
			return Err(Error::KindMismatch);
		}
		if kind == AccountKind::AuctionHouse {
			if let Some(house_id) = self.house_by_account.remove(&id) {
				self.houses.remove(&house_id);
				log::info!(target: "bank", "unlisted auction house {}", house_id);
			}
		}
		self.accounts.remove(&id);
		log::info!(target: "bank", "deregistered account {}", id);
		Ok(())
	}

	/// Sum of `total` across all accounts. Test hook for the conservation
	/// property.
	pub fn circulating(&self) -> Balance {
		self.accounts.values().map(|a| a.total).sum()
	}
}
