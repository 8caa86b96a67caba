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

//! Helpers for the end-to-end suite: a real bank, real houses and real
//! agents, all on loopback sockets inside one runtime, with auction
//! windows shrunk from seconds to milliseconds.

use gavel_bank::BankService;
use gavel_house::{AuctionHouse, HouseConfig};
use module_auction::EngineConfig;
use std::sync::Arc;
use std::time::Duration;

/// A short bid window that still leaves room to out- and re-bid within it.
pub const FAST_BID_WINDOW: Duration = Duration::from_millis(400);
/// Settlement window for tests; generous because settlement crosses three
/// sockets.
pub const FAST_SETTLE_WINDOW: Duration = Duration::from_millis(2_000);
/// A window long enough that nothing expires while a test is looking.
pub const SLOW_BID_WINDOW: Duration = Duration::from_secs(60);

/// Start a bank on a fresh loopback port; returns its `host:port`.
pub async fn start_bank() -> String {
	let _ = env_logger::builder().is_test(true).try_init();
	let (addr, _task) = BankService::new()
		.start("127.0.0.1:0".parse().expect("static addr parses"))
		.await
		.expect("bank binds a loopback port");
	addr.to_string()
}

/// Start a house against `bank` with the given windows.
pub async fn start_house(bank: &str, bid_window: Duration, settle_window: Duration) -> Arc<AuctionHouse> {
	AuctionHouse::start(HouseConfig {
		listen: "127.0.0.1:0".parse().expect("static addr parses"),
		bank: bank.to_string(),
		advertise: None,
		engine: EngineConfig {
			bid_window,
			settle_window,
		},
	})
	.await
	.expect("house starts")
}

/// Poll `condition` until it holds or `deadline` passes.
pub async fn wait_until<F: FnMut() -> bool>(what: &str, deadline: Duration, mut condition: F) {
	let started = tokio::time::Instant::now();
	loop {
		if condition() {
			return;
		}
		assert!(started.elapsed() < deadline, "timed out waiting for {}", what);
		tokio::time::sleep(Duration::from_millis(25)).await;
	}
}

/// Async-predicate variant of [`wait_until`].
pub async fn wait_until_async<F, Fut>(what: &str, deadline: Duration, mut condition: F)
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = bool>,
{
	let started = tokio::time::Instant::now();
	loop {
		if condition().await {
			return;
		}
		assert!(started.elapsed() < deadline, "timed out waiting for {}", what);
		tokio::time::sleep(Duration::from_millis(25)).await;
	}
}
