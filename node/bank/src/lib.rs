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

//! Network front of the bank: one acceptor task, one handler task per
//! client connection, all of them funnelling into the ledger behind a
//! single lock. A client error is answered and forgotten; only transport
//! failures end a connection, and never the bank itself.

use std::net::SocketAddr;
use std::sync::Arc;

use gavel_protocol::{read_frame, write_frame, BankReply, BankRequest, WireError};
use module_bank::Ledger;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// The bank node: the ledger plus its acceptor.
pub struct BankService {
	ledger: Arc<Mutex<Ledger>>,
}

impl Default for BankService {
	fn default() -> Self {
		Self::new()
	}
}

impl BankService {
	pub fn new() -> Self {
		Self {
			ledger: Arc::new(Mutex::new(Ledger::new())),
		}
	}

	/// Bind `addr` and serve until the returned task is aborted. The bound
	/// address is reported back for callers that asked for port 0.
	pub async fn start(self, addr: SocketAddr) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
		let listener = TcpListener::bind(addr).await?;
		let local = listener.local_addr()?;
		log::info!(target: "bank", "listening on {}", local);

		let ledger = self.ledger;
		let acceptor = tokio::spawn(async move {
			loop {
				match listener.accept().await {
					Ok((stream, peer)) => {
						log::debug!(target: "bank", "connection from {}", peer);
						let ledger = Arc::clone(&ledger);
						tokio::spawn(async move {
							if let Err(e) = serve_client(ledger, stream).await {
								log::debug!(target: "bank", "client {} gone: {}", peer, e);
							}
						});
					}
					Err(e) => {
						log::warn!(target: "bank", "accept failed: {}", e);
					}
				}
			}
		});
		Ok((local, acceptor))
	}
}

async fn serve_client(ledger: Arc<Mutex<Ledger>>, mut stream: TcpStream) -> Result<(), WireError> {
	stream.set_nodelay(true)?;
	loop {
		let reply = match read_frame::<BankRequest, _>(&mut stream).await {
			Ok(request) => apply(&ledger, request),
			// The frame was delimited but meaningless; answer and keep the
			// connection alive.
			Err(WireError::Codec(e)) => BankReply::Failure {
				message: format!("Unknown request: {}", e),
			},
			Err(e) => return Err(e),
		};
		write_frame(&mut stream, &reply).await?;
	}
}

/// One atomic ledger operation per request. Registration mutates the
/// account table and the house list together, which is why the whole
/// ledger sits behind one lock rather than a lock per account.
fn apply(ledger: &Mutex<Ledger>, request: BankRequest) -> BankReply {
	let mut ledger = ledger.lock();
	match request {
		BankRequest::RegisterAgent { name, initial_balance } => {
			let (account_id, houses) = ledger.register_agent(&name, initial_balance);
			BankReply::RegisterAgent {
				success: true,
				account_id,
				message: "OK".into(),
				houses,
			}
		}
		BankRequest::RegisterAuctionHouse { host, port } => {
			let (house_id, account_id) = ledger.register_house(&host, port);
			BankReply::RegisterAuctionHouse {
				success: true,
				house_id,
				account_id,
				message: "OK".into(),
			}
		}
		BankRequest::BlockFunds { account_id, amount } => match ledger.block_funds(account_id, amount) {
			Ok(()) => BankReply::BlockFunds {
				success: true,
				message: "OK".into(),
			},
			Err(e) => BankReply::BlockFunds {
				success: false,
				message: e.to_string(),
			},
		},
		BankRequest::UnblockFunds { account_id, amount } => match ledger.unblock_funds(account_id, amount) {
			Ok(()) => BankReply::UnblockFunds {
				success: true,
				message: "OK".into(),
			},
			Err(e) => BankReply::UnblockFunds {
				success: false,
				message: e.to_string(),
			},
		},
		BankRequest::TransferFunds { from, to, amount } => match ledger.transfer_funds(from, to, amount) {
			Ok(()) => BankReply::TransferFunds {
				success: true,
				message: "OK".into(),
			},
			Err(e) => BankReply::TransferFunds {
				success: false,
				message: e.to_string(),
			},
		},
		BankRequest::GetAccountInfo { account_id } => match ledger.account_info(account_id) {
			Ok(balance) => BankReply::GetAccountInfo {
				success: true,
				balance,
				message: "OK".into(),
			},
			Err(e) => BankReply::GetAccountInfo {
				success: false,
				balance: Default::default(),
				message: e.to_string(),
			},
		},
		BankRequest::GetAuctionHouses => BankReply::GetAuctionHouses {
			success: true,
			houses: ledger.auction_houses(),
			message: "OK".into(),
		},
		BankRequest::Deregister { account_id, kind } => match ledger.deregister(account_id, kind) {
			Ok(()) => BankReply::Deregister {
				success: true,
				message: "OK".into(),
			},
			Err(e) => BankReply::Deregister {
				success: false,
				message: e.to_string(),
			},
		},
	}
}
