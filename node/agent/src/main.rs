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

//! A thin scripted bidder around the agent library: list what is for
//! sale, optionally place one bid, linger for the outcome.

use clap::Parser;
use gavel_agent::{bid_precheck, Agent};
use gavel_primitives::Balance;

#[derive(Debug, Parser)]
#[command(name = "gavel-agent", about = "Bidder node of the gavel auction system")]
struct Cli {
	/// Display name for the bank account.
	#[arg(long, default_value = "agent")]
	name: String,

	/// Initial account balance.
	#[arg(long, default_value_t = 1000)]
	balance: Balance,

	/// Bank endpoint.
	#[arg(long, default_value = "127.0.0.1:4000")]
	bank: String,

	/// Optional bid, as `HOUSE:ITEM:AMOUNT`.
	#[arg(long)]
	bid: Option<String>,

	/// Seconds to keep listening for notifications before disconnecting.
	#[arg(long, default_value_t = 45)]
	linger: u64,
}

fn parse_bid(raw: &str) -> Result<(u32, u32, Balance), String> {
	let parts: Vec<&str> = raw.split(':').collect();
	match parts.as_slice() {
		[house, item, amount] => Ok((
			house.parse().map_err(|_| "bad house id".to_string())?,
			item.parse().map_err(|_| "bad item id".to_string())?,
			amount.parse().map_err(|_| "bad amount".to_string())?,
		)),
		_ => Err("expected HOUSE:ITEM:AMOUNT".to_string()),
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();
	let cli = Cli::parse();

	let agent = Agent::register(&cli.name, cli.balance, &cli.bank).await?;
	println!("registered as account {}", agent.account_id());

	for house in agent.houses() {
		agent.connect_to_house(house.house_id).await?;
		for item in agent.get_items(house.house_id).await? {
			println!(
				"house {} item {}: {} (min {}, current {})",
				house.house_id, item.item_id, item.description, item.minimum_bid, item.current_bid
			);
		}
	}

	if let Some(raw) = &cli.bid {
		let (house_id, item_id, amount) = parse_bid(raw)?;
		let available = agent.balance().available;
		let item = agent
			.get_items(house_id)
			.await?
			.into_iter()
			.find(|i| i.item_id == item_id)
			.ok_or("no such item")?;
		if let Err(reason) = bid_precheck(&item, amount, available) {
			println!("not sending bid: {}", reason);
		} else {
			let outcome = agent.place_bid(house_id, item_id, amount).await?;
			println!("bid {:?}: {}", outcome.verdict, outcome.message);
		}
	}

	// Outcomes (outbid, winner settlement) arrive asynchronously.
	tokio::time::sleep(std::time::Duration::from_secs(cli.linger)).await;

	for purchase in agent.purchases() {
		println!(
			"bought item {} ({}) for {}",
			purchase.item_id, purchase.description, purchase.price
		);
	}
	let balance = agent.balance();
	println!(
		"balance: total {}, available {}, blocked {}",
		balance.total, balance.available, balance.blocked
	);

	agent.disconnect().await?;
	Ok(())
}
