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

//! Mocks for the auction item engine module.

#![cfg(test)]

use crate::{EngineConfig, FundsError, FundsProvider, ItemEngine};
use gavel_primitives::{AccountId, Balance, BalanceSnapshot};
use module_bank::Ledger;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A real ledger behind the `FundsProvider` seam, with switches to inject
/// the failures the engine must compensate for.
#[derive(Default)]
pub struct StubBank {
	pub ledger: Mutex<Ledger>,
	fail_next_block: AtomicBool,
	fail_next_unblock: AtomicBool,
	unreachable: AtomicBool,
}

impl StubBank {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fund(&self, name: &str, balance: Balance) -> AccountId {
		self.ledger.lock().register_agent(name, balance).0
	}

	pub fn snapshot(&self, id: AccountId) -> BalanceSnapshot {
		self.ledger.lock().account_info(id).unwrap()
	}

	pub fn fail_next_block(&self) {
		self.fail_next_block.store(true, Ordering::SeqCst);
	}

	pub fn fail_next_unblock(&self) {
		self.fail_next_unblock.store(true, Ordering::SeqCst);
	}

	pub fn set_unreachable(&self, down: bool) {
		self.unreachable.store(down, Ordering::SeqCst);
	}
}

#[async_trait::async_trait]
impl FundsProvider for StubBank {
	async fn block(&self, account: AccountId, amount: Balance) -> Result<(), FundsError> {
		if self.unreachable.load(Ordering::SeqCst) {
			return Err(FundsError::Unreachable("stub bank is down".into()));
		}
		if self.fail_next_block.swap(false, Ordering::SeqCst) {
			return Err(FundsError::Refused("Insufficient funds".into()));
		}
		self.ledger
			.lock()
			.block_funds(account, amount)
			.map_err(|e| FundsError::Refused(e.to_string()))
	}

	async fn unblock(&self, account: AccountId, amount: Balance) -> Result<(), FundsError> {
		if self.unreachable.load(Ordering::SeqCst) {
			return Err(FundsError::Unreachable("stub bank is down".into()));
		}
		if self.fail_next_unblock.swap(false, Ordering::SeqCst) {
			return Err(FundsError::Refused("injected unblock failure".into()));
		}
		self.ledger
			.lock()
			.unblock_funds(account, amount)
			.map_err(|e| FundsError::Refused(e.to_string()))
	}
}

pub const HOUSE: gavel_primitives::HouseId = 1;
pub const ITEM: gavel_primitives::ItemId = 1;

/// An engine with test-sized windows.
pub fn engine(minimum_bid: Balance) -> ItemEngine {
	ItemEngine::new(
		HOUSE,
		ITEM,
		"Watch".to_string(),
		minimum_bid,
		EngineConfig {
			bid_window: Duration::from_millis(200),
			settle_window: Duration::from_millis(400),
		},
	)
}
