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

//! Unit tests for the auction item engine module.

#![cfg(test)]

use super::*;
use mock::*;

#[tokio::test]
async fn first_bid_must_meet_minimum() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 1000);
	let mut engine = engine(100);

	assert_eq!(engine.place_bid(alice, 0, &bank).await, Err(Error::InvalidAmount));
	assert_eq!(engine.place_bid(alice, 99, &bank).await, Err(Error::BidTooLow));
	assert!(!engine.has_bidder());
	assert_eq!(bank.snapshot(alice).blocked, 0);

	let accepted = engine.place_bid(alice, 150, &bank).await.unwrap();
	assert_eq!(accepted.amount, 150);
	assert!(accepted.outbid.is_none());
	assert_eq!(bank.snapshot(alice).blocked, 150);
	assert_eq!(engine.info().current_bidder, Some(alice));
	assert!(engine.info().end_time_ms.is_some());
}

#[tokio::test]
async fn equal_bid_always_loses() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 1000);
	let bob = bank.fund("Bob", 1000);
	let mut engine = engine(100);

	engine.place_bid(alice, 200, &bank).await.unwrap();
	assert_eq!(engine.place_bid(bob, 200, &bank).await, Err(Error::BidTooLow));
	assert_eq!(engine.info().current_bidder, Some(alice));
	assert_eq!(bank.snapshot(bob).blocked, 0);
}

#[tokio::test]
async fn accepted_bid_resets_the_window() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 1000);
	let mut engine = engine(100);

	let before = Instant::now();
	let accepted = engine.place_bid(alice, 150, &bank).await.unwrap();
	let dt = accepted.timer.deadline - before;
	assert!(dt <= std::time::Duration::from_millis(200));
	assert!(dt >= std::time::Duration::from_millis(150));

	// A second bid arms a fresh timer and invalidates the first.
	let bob = bank.fund("Bob", 1000);
	let second = engine.place_bid(bob, 160, &bank).await.unwrap();
	assert!(second.timer.epoch > accepted.timer.epoch);
	assert_eq!(engine.close_bidding(accepted.timer.epoch), None);
}

#[tokio::test]
async fn outbid_releases_previous_hold() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 500);
	let bob = bank.fund("Bob", 500);
	let mut engine = engine(100);

	engine.place_bid(alice, 120, &bank).await.unwrap();
	assert_eq!(bank.snapshot(alice).blocked, 120);

	let accepted = engine.place_bid(bob, 150, &bank).await.unwrap();
	assert_eq!(
		accepted.outbid,
		Some(OutbidEvent {
			bidder: alice,
			new_bid: 150
		})
	);
	assert_eq!(bank.snapshot(alice).blocked, 0);
	assert_eq!(bank.snapshot(bob).blocked, 150);
	assert_eq!(engine.info().current_bid, 150);
}

#[tokio::test]
async fn self_rebid_replaces_hold_instead_of_stacking() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 500);
	let mut engine = engine(50);

	engine.place_bid(alice, 100, &bank).await.unwrap();
	assert_eq!(bank.snapshot(alice).blocked, 100);

	// 100 + 150 would exceed the 500 balance check if the old hold were
	// still counted; after the rebid exactly 150 is held.
	let accepted = engine.place_bid(alice, 150, &bank).await.unwrap();
	assert!(accepted.outbid.is_none());
	assert_eq!(bank.snapshot(alice).blocked, 150);
	assert_eq!(bank.snapshot(alice).available, 350);
}

#[tokio::test]
async fn failed_rebid_restores_the_old_hold() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 500);
	let mut engine = engine(50);

	engine.place_bid(alice, 100, &bank).await.unwrap();
	bank.fail_next_block();
	assert_eq!(engine.place_bid(alice, 200, &bank).await, Err(Error::InsufficientFunds));

	// Still top at the old amount, old hold re-established.
	assert_eq!(engine.info().current_bidder, Some(alice));
	assert_eq!(engine.info().current_bid, 100);
	assert_eq!(bank.snapshot(alice).blocked, 100);
}

#[tokio::test]
async fn insufficient_funds_mutates_nothing() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 100);
	let mut engine = engine(50);

	assert_eq!(engine.place_bid(alice, 150, &bank).await, Err(Error::InsufficientFunds));
	assert!(!engine.has_bidder());
	assert_eq!(engine.info().current_bid, 0);
	assert_eq!(engine.info().end_time_ms, None);
	assert_eq!(bank.snapshot(alice).blocked, 0);
}

#[tokio::test]
async fn bank_outage_is_not_a_rejection() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 1000);
	let mut engine = engine(50);

	bank.set_unreachable(true);
	assert_eq!(engine.place_bid(alice, 100, &bank).await, Err(Error::FundsUnavailable));
	assert!(!engine.has_bidder());
}

#[tokio::test]
async fn close_bidding_decides_the_winner_once() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 1000);
	let mut engine = engine(100);

	// Without a bidder there is nothing to close.
	assert_eq!(engine.close_bidding(0), None);

	let accepted = engine.place_bid(alice, 150, &bank).await.unwrap();
	let decided = engine.close_bidding(accepted.timer.epoch).unwrap();
	assert_eq!(decided.bidder, alice);
	assert_eq!(decided.final_price, 150);

	// The same fire cannot decide twice, and late bids bounce.
	assert_eq!(engine.close_bidding(accepted.timer.epoch), None);
	let bob = bank.fund("Bob", 1000);
	assert_eq!(engine.place_bid(bob, 200, &bank).await, Err(Error::AuctionClosed));
}

#[tokio::test]
async fn confirm_winner_checks_phase_and_identity() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 1000);
	let bob = bank.fund("Bob", 1000);
	let mut engine = engine(100);

	let accepted = engine.place_bid(alice, 150, &bank).await.unwrap();
	assert_eq!(engine.confirm_winner(alice, &bank).await, Err(Error::AuctionStillOpen));

	engine.close_bidding(accepted.timer.epoch).unwrap();
	assert_eq!(engine.confirm_winner(bob, &bank).await, Err(Error::NotWinner));

	let settled = engine.confirm_winner(alice, &bank).await.unwrap();
	assert_eq!(
		settled,
		Settled {
			buyer: alice,
			price: 150
		}
	);

	// Confirming twice cannot settle twice.
	assert_eq!(engine.confirm_winner(alice, &bank).await, Err(Error::AuctionClosed));
}

#[tokio::test]
async fn settlement_sweeps_straggler_holds() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 500);
	let bob = bank.fund("Bob", 500);
	let mut engine = engine(100);

	engine.place_bid(alice, 120, &bank).await.unwrap();

	// Alice's outbid release fails, leaving her hold dangling.
	bank.fail_next_unblock();
	let accepted = engine.place_bid(bob, 150, &bank).await.unwrap();
	assert_eq!(bank.snapshot(alice).blocked, 120);

	let decided = engine.close_bidding(accepted.timer.epoch).unwrap();
	assert_eq!(decided.bidder, bob);
	engine.confirm_winner(bob, &bank).await.unwrap();

	// The compensating sweep released Alice's dangling hold.
	assert_eq!(bank.snapshot(alice).blocked, 0);
}

#[test]
fn settle_window_outlasts_bid_window() {
	// A winner must never be timed out faster than a last-second rebid
	// would have been.
	assert!(gavel_primitives::SETTLE_WINDOW > gavel_primitives::BID_WINDOW);
}

#[tokio::test]
async fn retired_engine_bounces_everything() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 1000);
	let mut engine = engine(100);

	let accepted = engine.place_bid(alice, 150, &bank).await.unwrap();
	engine.retire();

	assert_eq!(engine.place_bid(alice, 200, &bank).await, Err(Error::AuctionClosed));
	assert_eq!(engine.close_bidding(accepted.timer.epoch), None);
	assert_eq!(engine.confirm_winner(alice, &bank).await, Err(Error::AuctionClosed));
}

#[tokio::test]
async fn unsettled_winner_is_refunded_and_item_withdrawn() {
	let bank = StubBank::new();
	let alice = bank.fund("Alice", 1000);
	let mut engine = engine(100);

	let accepted = engine.place_bid(alice, 150, &bank).await.unwrap();
	let decided = engine.close_bidding(accepted.timer.epoch).unwrap();

	// A stale settlement fire is ignored.
	assert_eq!(engine.withdraw_unsettled(decided.timer.epoch + 1, &bank).await, None);

	let withdrawn = engine.withdraw_unsettled(decided.timer.epoch, &bank).await.unwrap();
	assert_eq!(
		withdrawn,
		Withdrawn {
			bidder: alice,
			refunded: 150
		}
	);
	assert_eq!(bank.snapshot(alice).blocked, 0);
	assert_eq!(bank.snapshot(alice).total, 1000);
}
