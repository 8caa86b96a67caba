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

//! Unit tests for the bank ledger module.

#![cfg(test)]

use super::*;

#[test]
fn account_ids_are_monotonic_and_start_at_1000() {
	let mut ledger = Ledger::new();
	let (alice, _) = ledger.register_agent("Alice", 1000);
	let (bob, _) = ledger.register_agent("Bob", 500);
	assert_eq!(alice, 1000);
	assert_eq!(bob, 1001);

	// Deregistering never frees an id for reuse.
	assert_eq!(ledger.deregister(bob, AccountKind::Agent), Ok(()));
	let (carol, _) = ledger.register_agent("Carol", 0);
	assert_eq!(carol, 1002);
}

#[test]
fn register_agent_bundles_house_listing() {
	let mut ledger = Ledger::new();
	let (_, houses) = ledger.register_agent("Alice", 1000);
	assert!(houses.is_empty());

	let (h1, h1_account) = ledger.register_house("10.0.0.7", 4100);
	assert_eq!(h1, 1);
	let (_, houses) = ledger.register_agent("Bob", 1000);
	assert_eq!(houses.len(), 1);
	assert_eq!(houses[0].house_id, h1);
	assert_eq!(houses[0].account_id, h1_account);
	assert_eq!(houses[0].port, 4100);
}

#[test]
fn block_funds_work() {
	let mut ledger = Ledger::new();
	let (alice, _) = ledger.register_agent("Alice", 1000);

	assert_eq!(ledger.block_funds(alice, 150), Ok(()));
	assert_eq!(
		ledger.account_info(alice).unwrap(),
		BalanceSnapshot {
			total: 1000,
			available: 850,
			blocked: 150
		}
	);

	assert_eq!(ledger.block_funds(alice, 851), Err(Error::InsufficientFunds));
	assert_eq!(ledger.block_funds(alice, 0), Err(Error::InvalidAmount));
	assert_eq!(ledger.block_funds(9999, 1), Err(Error::AccountNotFound));
	// Failed requests mutate nothing.
	assert_eq!(ledger.account_info(alice).unwrap().blocked, 150);
}

#[test]
fn unblock_funds_clamps_and_never_goes_negative() {
	let mut ledger = Ledger::new();
	let (alice, _) = ledger.register_agent("Alice", 1000);
	assert_eq!(ledger.block_funds(alice, 200), Ok(()));

	// Releasing more than is held clamps to the held amount.
	assert_eq!(ledger.unblock_funds(alice, 500), Ok(()));
	assert_eq!(
		ledger.account_info(alice).unwrap(),
		BalanceSnapshot {
			total: 1000,
			available: 1000,
			blocked: 0
		}
	);

	assert_eq!(ledger.unblock_funds(9999, 1), Err(Error::AccountNotFound));
}

#[test]
fn transfer_funds_only_moves_blocked_funds() {
	let mut ledger = Ledger::new();
	let (alice, _) = ledger.register_agent("Alice", 1000);
	let (_, house) = ledger.register_house("10.0.0.7", 4100);

	// Available funds are not eligible.
	assert_eq!(ledger.transfer_funds(alice, house, 150), Err(Error::InsufficientFunds));

	assert_eq!(ledger.block_funds(alice, 150), Ok(()));
	assert_eq!(ledger.transfer_funds(alice, house, 151), Err(Error::InsufficientFunds));
	assert_eq!(ledger.transfer_funds(alice, house, 150), Ok(()));

	assert_eq!(
		ledger.account_info(alice).unwrap(),
		BalanceSnapshot {
			total: 850,
			available: 850,
			blocked: 0
		}
	);
	assert_eq!(ledger.account_info(house).unwrap().total, 150);

	assert_eq!(ledger.transfer_funds(alice, 9999, 1), Err(Error::AccountNotFound));
	assert_eq!(ledger.transfer_funds(9999, house, 1), Err(Error::AccountNotFound));
}

#[test]
fn deregister_house_removes_listing_atomically() {
	let mut ledger = Ledger::new();
	let (house_id, account_id) = ledger.register_house("10.0.0.7", 4100);
	assert_eq!(ledger.auction_houses().len(), 1);

	// Kind must match the stored account.
	assert_eq!(ledger.deregister(account_id, AccountKind::Agent), Err(Error::KindMismatch));
	assert_eq!(ledger.auction_houses().len(), 1);

	assert_eq!(ledger.deregister(account_id, AccountKind::AuctionHouse), Ok(()));
	assert!(ledger.auction_houses().is_empty());
	assert!(!ledger.auction_houses().iter().any(|h| h.house_id == house_id));
	assert_eq!(ledger.account_info(account_id), Err(Error::AccountNotFound));
}

#[test]
fn conservation_holds_at_quiescence() {
	let mut ledger = Ledger::new();
	let (alice, _) = ledger.register_agent("Alice", 1000);
	let (bob, _) = ledger.register_agent("Bob", 500);
	let (_, house) = ledger.register_house("10.0.0.7", 4100);
	assert_eq!(ledger.circulating(), 1500);

	assert_eq!(ledger.block_funds(alice, 300), Ok(()));
	assert_eq!(ledger.transfer_funds(alice, house, 300), Ok(()));
	assert_eq!(ledger.block_funds(bob, 100), Ok(()));
	assert_eq!(ledger.unblock_funds(bob, 100), Ok(()));
	assert_eq!(ledger.circulating(), 1500);

	// Deregistering an account retires its balance from circulation.
	assert_eq!(ledger.deregister(bob, AccountKind::Agent), Ok(()));
	assert_eq!(ledger.circulating(), 1000);
}

#[test]
fn concurrent_blocks_cannot_double_spend() {
	use parking_lot::Mutex;
	use std::sync::Arc;

	// Alice has 100 available; two houses race to block 80 each.
	let ledger = Arc::new(Mutex::new(Ledger::new()));
	let alice = ledger.lock().register_agent("Alice", 100).0;

	let mut handles = Vec::new();
	for _ in 0..2 {
		let ledger = Arc::clone(&ledger);
		handles.push(std::thread::spawn(move || ledger.lock().block_funds(alice, 80).is_ok()));
	}
	let successes = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

	assert_eq!(successes, 1);
	let snapshot = ledger.lock().account_info(alice).unwrap();
	assert_eq!(snapshot.blocked, 80);
	assert_eq!(snapshot.available, 20);
}
