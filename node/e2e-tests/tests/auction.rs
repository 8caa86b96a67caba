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

//! End-to-end scenarios: a real bank, real houses and real agents talking
//! over loopback TCP, with auction windows shrunk to milliseconds.

use gavel_agent::Agent;
use gavel_e2e_tests::*;
use gavel_protocol::{BankClient, BidVerdict};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn single_bid_wins_and_settles() {
	let bank = start_bank().await;
	let house = start_house(&bank, FAST_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let item = house.add_item("Watch", 100).unwrap();

	let alice = Agent::register("Alice", 1000, &bank).await.unwrap();
	alice.connect_to_house(house.house_id()).await.unwrap();

	let outcome = alice.place_bid(house.house_id(), item, 150).await.unwrap();
	assert_eq!(outcome.verdict, BidVerdict::Accepted);
	assert_eq!(alice.balance().blocked, 150);

	// The window expires, the winner notification arrives, the agent pays
	// and confirms, all without further prodding.
	wait_until("Alice's purchase to settle", Duration::from_secs(5), || {
		alice.purchases().len() == 1
	})
	.await;

	let purchase = &alice.purchases()[0];
	assert_eq!(purchase.description, "Watch");
	assert_eq!(purchase.price, 150);

	let balance = alice.update_balance().await.unwrap();
	assert_eq!(balance.total, 850);
	assert_eq!(balance.available, 850);
	assert_eq!(balance.blocked, 0);

	// The winning payment landed in the house's settlement account.
	let probe = BankClient::connect(&*bank).await.unwrap();
	assert_eq!(probe.account_info(house.account_id()).await.unwrap().total, 150);

	// The item is gone from the catalog.
	assert!(alice.get_items(house.house_id()).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn outbid_chain_refunds_the_loser() {
	let bank = start_bank().await;
	let house = start_house(&bank, FAST_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let item = house.add_item("Painting", 100).unwrap();

	let alice = Agent::register("Alice", 500, &bank).await.unwrap();
	let bob = Agent::register("Bob", 500, &bank).await.unwrap();
	alice.connect_to_house(house.house_id()).await.unwrap();
	bob.connect_to_house(house.house_id()).await.unwrap();

	let first = alice.place_bid(house.house_id(), item, 120).await.unwrap();
	assert_eq!(first.verdict, BidVerdict::Accepted);
	let second = bob.place_bid(house.house_id(), item, 150).await.unwrap();
	assert_eq!(second.verdict, BidVerdict::Accepted);

	// Alice's hold is released the moment she is displaced.
	wait_until_async("Alice's refund", Duration::from_secs(5), || async {
		alice.update_balance().await.unwrap().blocked == 0
	})
	.await;
	assert_eq!(bob.balance().blocked, 150);

	wait_until("Bob's purchase to settle", Duration::from_secs(5), || {
		bob.purchases().len() == 1
	})
	.await;
	assert_eq!(bob.purchases()[0].price, 150);
	assert!(alice.purchases().is_empty());

	let alice_balance = alice.update_balance().await.unwrap();
	assert_eq!(alice_balance.total, 500);
	let bob_balance = bob.update_balance().await.unwrap();
	assert_eq!(bob_balance.total, 350);
	assert_eq!(bob_balance.blocked, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn holds_count_against_available_funds_across_houses() {
	let bank = start_bank().await;
	// The first item must not expire while the test looks at it.
	let slow_house = start_house(&bank, SLOW_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let fast_house = start_house(&bank, FAST_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let first = slow_house.add_item("Clock", 50).unwrap();
	let second = fast_house.add_item("Vase", 20).unwrap();

	let alice = Agent::register("Alice", 100, &bank).await.unwrap();
	alice.connect_to_house(slow_house.house_id()).await.unwrap();
	alice.connect_to_house(fast_house.house_id()).await.unwrap();

	let outcome = alice.place_bid(slow_house.house_id(), first, 80).await.unwrap();
	assert_eq!(outcome.verdict, BidVerdict::Accepted);

	// 80 of 100 are held; another 80 cannot be blocked anywhere.
	let outcome = alice.place_bid(fast_house.house_id(), second, 80).await.unwrap();
	assert_eq!(outcome.verdict, BidVerdict::Rejected);
	assert_eq!(outcome.message, "Insufficient funds");

	// The remaining 20 can.
	let outcome = alice.place_bid(fast_house.house_id(), second, 20).await.unwrap();
	assert_eq!(outcome.verdict, BidVerdict::Accepted);

	wait_until("the vase to settle", Duration::from_secs(5), || {
		alice.purchases().len() == 1
	})
	.await;

	let balance = alice.update_balance().await.unwrap();
	assert_eq!(balance.total, 80);
	assert_eq!(balance.blocked, 80);
	assert_eq!(balance.available, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn self_rebid_replaces_the_hold() {
	let bank = start_bank().await;
	let house = start_house(&bank, SLOW_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let item = house.add_item("Guitar", 50).unwrap();

	let alice = Agent::register("Alice", 500, &bank).await.unwrap();
	alice.connect_to_house(house.house_id()).await.unwrap();

	assert_eq!(
		alice.place_bid(house.house_id(), item, 100).await.unwrap().verdict,
		BidVerdict::Accepted
	);
	assert_eq!(
		alice.place_bid(house.house_id(), item, 150).await.unwrap().verdict,
		BidVerdict::Accepted
	);

	// 150, not 250: the first hold was released before the second.
	let balance = alice.update_balance().await.unwrap();
	assert_eq!(balance.blocked, 150);
}

#[tokio::test(flavor = "multi_thread")]
async fn equal_bid_is_rejected() {
	let bank = start_bank().await;
	let house = start_house(&bank, SLOW_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let item = house.add_item("Lamp", 100).unwrap();

	let alice = Agent::register("Alice", 1000, &bank).await.unwrap();
	let bob = Agent::register("Bob", 1000, &bank).await.unwrap();
	alice.connect_to_house(house.house_id()).await.unwrap();
	bob.connect_to_house(house.house_id()).await.unwrap();

	assert_eq!(
		alice.place_bid(house.house_id(), item, 200).await.unwrap().verdict,
		BidVerdict::Accepted
	);
	let outcome = bob.place_bid(house.house_id(), item, 200).await.unwrap();
	assert_eq!(outcome.verdict, BidVerdict::Rejected);
	assert_eq!(outcome.message, "Bid too low");
	assert_eq!(bob.update_balance().await.unwrap().blocked, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn items_with_bidders_pin_the_house_open() {
	let bank = start_bank().await;
	let house = start_house(&bank, SLOW_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let empty = house.add_item("Chair", 10).unwrap();
	let contested = house.add_item("Table", 10).unwrap();

	let alice = Agent::register("Alice", 100, &bank).await.unwrap();
	alice.connect_to_house(house.house_id()).await.unwrap();
	assert_eq!(
		alice.place_bid(house.house_id(), contested, 25).await.unwrap().verdict,
		BidVerdict::Accepted
	);

	// Neither the contested item nor the house may go away.
	assert_eq!(
		house.remove_item(contested).await.unwrap_err().to_string(),
		"Item has an active bidder"
	);
	assert_eq!(house.shutdown().await.unwrap_err().to_string(), "House has active bids");

	// The untouched item can be withdrawn freely.
	house.remove_item(empty).await.unwrap();
	let items = alice.get_items(house.house_id()).await.unwrap();
	assert_eq!(items.len(), 1);
	assert_eq!(items[0].item_id, contested);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_bids_cannot_double_spend() {
	let bank = start_bank().await;
	let first_house = start_house(&bank, SLOW_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let second_house = start_house(&bank, SLOW_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let first = first_house.add_item("Ring", 10).unwrap();
	let second = second_house.add_item("Coin", 10).unwrap();

	let alice = Agent::register("Alice", 100, &bank).await.unwrap();
	alice.connect_to_house(first_house.house_id()).await.unwrap();
	alice.connect_to_house(second_house.house_id()).await.unwrap();

	// 80 + 80 > 100: at most one of the racing holds may be granted.
	let (a, b) = tokio::join!(
		alice.place_bid(first_house.house_id(), first, 80),
		alice.place_bid(second_house.house_id(), second, 80),
	);
	let verdicts = [a.unwrap().verdict, b.unwrap().verdict];
	let accepted = verdicts.iter().filter(|v| **v == BidVerdict::Accepted).count();
	assert_eq!(accepted, 1);

	let balance = alice.update_balance().await.unwrap();
	assert_eq!(balance.blocked, 80);
	assert_eq!(balance.available, 20);
}

#[tokio::test(flavor = "multi_thread")]
async fn every_accepted_bid_resets_the_deadline() {
	let bank = start_bank().await;
	let house = start_house(&bank, Duration::from_millis(800), FAST_SETTLE_WINDOW).await;
	let item = house.add_item("Hourglass", 10).unwrap();

	let alice = Agent::register("Alice", 1000, &bank).await.unwrap();
	let bob = Agent::register("Bob", 1000, &bank).await.unwrap();
	alice.connect_to_house(house.house_id()).await.unwrap();
	bob.connect_to_house(house.house_id()).await.unwrap();

	alice.place_bid(house.house_id(), item, 100).await.unwrap();
	let first_deadline = alice.get_items(house.house_id()).await.unwrap()[0]
		.end_time_ms
		.expect("a bid arms the deadline");

	tokio::time::sleep(Duration::from_millis(250)).await;
	bob.place_bid(house.house_id(), item, 120).await.unwrap();
	let second_deadline = bob.get_items(house.house_id()).await.unwrap()[0]
		.end_time_ms
		.expect("still armed");

	// The second bid pushed the deadline out by roughly the slept time.
	assert!(second_deadline > first_deadline);
	assert!(second_deadline - first_deadline >= 150);
}

#[tokio::test(flavor = "multi_thread")]
async fn discovery_tracks_registration_and_deregistration() {
	let bank = start_bank().await;
	let first = start_house(&bank, SLOW_BID_WINDOW, FAST_SETTLE_WINDOW).await;
	let second = start_house(&bank, SLOW_BID_WINDOW, FAST_SETTLE_WINDOW).await;

	let alice = Agent::register("Alice", 100, &bank).await.unwrap();
	let mut listed: Vec<_> = alice.houses().iter().map(|h| h.house_id).collect();
	listed.sort_unstable();
	assert_eq!(listed, vec![first.house_id(), second.house_id()]);

	// A clean shutdown removes the listing and the account together.
	second.shutdown().await.unwrap();
	let listed: Vec<_> = alice
		.refresh_houses()
		.await
		.unwrap()
		.iter()
		.map(|h| h.house_id)
		.collect();
	assert_eq!(listed, vec![first.house_id()]);
}
