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

//! The auction house node binary.

use clap::Parser;
use gavel_house::{catalog, AuctionHouse, HouseConfig};
use module_auction::EngineConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "gavel-house", about = "Auction house node of the gavel auction system")]
struct Cli {
	/// Address to listen on for agents; port 0 picks a free port, which is
	/// then advertised through the bank.
	#[arg(long, default_value = "0.0.0.0:0")]
	listen: SocketAddr,

	/// Bank endpoint.
	#[arg(long, default_value = "127.0.0.1:4000")]
	bank: String,

	/// Host to advertise instead of the auto-selected one.
	#[arg(long)]
	advertise: Option<String>,

	/// JSON file with the initial catalog.
	#[arg(long)]
	catalog: Option<PathBuf>,

	/// Bid window in milliseconds (operator testing only).
	#[arg(long)]
	bid_window_ms: Option<u64>,

	/// Settlement window in milliseconds (operator testing only).
	#[arg(long)]
	settle_window_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();
	let cli = Cli::parse();

	let mut engine = EngineConfig::default();
	if let Some(ms) = cli.bid_window_ms {
		engine.bid_window = Duration::from_millis(ms);
	}
	if let Some(ms) = cli.settle_window_ms {
		engine.settle_window = Duration::from_millis(ms);
	}

	let house = AuctionHouse::start(HouseConfig {
		listen: cli.listen,
		bank: cli.bank,
		advertise: cli.advertise,
		engine,
	})
	.await?;

	if let Some(path) = &cli.catalog {
		for entry in catalog::load_catalog(path)? {
			house.add_item(&entry.description, entry.minimum_bid)?;
		}
	}
	log::info!(
		target: "house",
		"house {} serving on {}; ctrl-c to shut down",
		house.house_id(),
		house.local_addr()
	);

	loop {
		tokio::signal::ctrl_c().await?;
		match house.shutdown().await {
			Ok(()) => break,
			Err(e) => log::warn!(target: "house", "shutdown refused: {}", e),
		}
	}
	Ok(())
}
