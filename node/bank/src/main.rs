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

//! The bank node binary.

use clap::Parser;
use gavel_bank::BankService;
use std::net::SocketAddr;

#[derive(Debug, Parser)]
#[command(name = "gavel-bank", about = "Central bank node of the gavel auction system")]
struct Cli {
	/// Address to listen on for agent and auction house connections.
	#[arg(long, default_value = "0.0.0.0:4000")]
	listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();
	let cli = Cli::parse();

	let (addr, acceptor) = BankService::new().start(cli.listen).await?;
	log::info!(target: "bank", "bank is up on {}", addr);
	acceptor.await?;
	Ok(())
}
