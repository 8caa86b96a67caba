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

//! Client side of the bank connection.
//!
//! One stream, one outstanding request at a time: the whole send-then-receive
//! round-trip runs under a single mutex so replies can never be claimed by
//! the wrong caller. The bank pushes nothing unsolicited, which keeps this
//! end much simpler than the agent/house link.

use crate::{read_frame, write_frame, BankReply, BankRequest, WireError, REQUEST_TIMEOUT};
use gavel_primitives::{AccountId, AccountKind, Balance, BalanceSnapshot, HouseId, HouseInfo};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// A bank call that went through the wire but was refused, or never made it.
#[derive(Debug, derive_more::Display)]
pub enum BankCallError {
	/// The bank processed the request and said no; the message names the
	/// condition and is fit to surface to users.
	#[display(fmt = "bank refused: {}", _0)]
	Refused(String),
	#[display(fmt = "bank unreachable: {}", _0)]
	Transport(WireError),
}

impl std::error::Error for BankCallError {}

impl From<WireError> for BankCallError {
	fn from(e: WireError) -> Self {
		BankCallError::Transport(e)
	}
}

fn refused(success: bool, message: String) -> Result<(), BankCallError> {
	if success {
		Ok(())
	} else {
		Err(BankCallError::Refused(message))
	}
}

/// Shared handle to one bank connection.
pub struct BankClient {
	stream: Mutex<TcpStream>,
}

impl BankClient {
	pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, WireError> {
		let stream = TcpStream::connect(addr).await?;
		stream.set_nodelay(true)?;
		Ok(Self {
			stream: Mutex::new(stream),
		})
	}

	/// Send one request and await its reply.
	pub async fn request(&self, req: &BankRequest) -> Result<BankReply, WireError> {
		let mut stream = self.stream.lock().await;
		write_frame(&mut *stream, req).await?;
		timeout(REQUEST_TIMEOUT, read_frame(&mut *stream))
			.await
			.map_err(|_| WireError::Timeout)?
	}

	/// Open an agent account. Returns the assigned id and the current house
	/// listing.
	pub async fn register_agent(
		&self,
		name: &str,
		initial_balance: Balance,
	) -> Result<(AccountId, Vec<HouseInfo>), BankCallError> {
		match self
			.request(&BankRequest::RegisterAgent {
				name: name.to_string(),
				initial_balance,
			})
			.await?
		{
			BankReply::RegisterAgent {
				success,
				account_id,
				message,
				houses,
			} => refused(success, message).map(|()| (account_id, houses)),
			BankReply::Failure { message } => Err(BankCallError::Refused(message)),
			_ => Err(WireError::UnexpectedReply.into()),
		}
	}

	/// Register an auction house listing plus its settlement account.
	pub async fn register_house(&self, host: &str, port: u16) -> Result<(HouseId, AccountId), BankCallError> {
		match self
			.request(&BankRequest::RegisterAuctionHouse {
				host: host.to_string(),
				port,
			})
			.await?
		{
			BankReply::RegisterAuctionHouse {
				success,
				house_id,
				account_id,
				message,
			} => refused(success, message).map(|()| (house_id, account_id)),
			BankReply::Failure { message } => Err(BankCallError::Refused(message)),
			_ => Err(WireError::UnexpectedReply.into()),
		}
	}

	pub async fn block_funds(&self, account_id: AccountId, amount: Balance) -> Result<(), BankCallError> {
		match self.request(&BankRequest::BlockFunds { account_id, amount }).await? {
			BankReply::BlockFunds { success, message } => refused(success, message),
			BankReply::Failure { message } => Err(BankCallError::Refused(message)),
			_ => Err(WireError::UnexpectedReply.into()),
		}
	}

	pub async fn unblock_funds(&self, account_id: AccountId, amount: Balance) -> Result<(), BankCallError> {
		match self.request(&BankRequest::UnblockFunds { account_id, amount }).await? {
			BankReply::UnblockFunds { success, message } => refused(success, message),
			BankReply::Failure { message } => Err(BankCallError::Refused(message)),
			_ => Err(WireError::UnexpectedReply.into()),
		}
	}

	pub async fn transfer_funds(&self, from: AccountId, to: AccountId, amount: Balance) -> Result<(), BankCallError> {
		match self.request(&BankRequest::TransferFunds { from, to, amount }).await? {
			BankReply::TransferFunds { success, message } => refused(success, message),
			BankReply::Failure { message } => Err(BankCallError::Refused(message)),
			_ => Err(WireError::UnexpectedReply.into()),
		}
	}

	pub async fn account_info(&self, account_id: AccountId) -> Result<BalanceSnapshot, BankCallError> {
		match self.request(&BankRequest::GetAccountInfo { account_id }).await? {
			BankReply::GetAccountInfo {
				success,
				balance,
				message,
			} => refused(success, message).map(|()| balance),
			BankReply::Failure { message } => Err(BankCallError::Refused(message)),
			_ => Err(WireError::UnexpectedReply.into()),
		}
	}

	pub async fn auction_houses(&self) -> Result<Vec<HouseInfo>, BankCallError> {
		match self.request(&BankRequest::GetAuctionHouses).await? {
			BankReply::GetAuctionHouses {
				success,
				houses,
				message,
			} => refused(success, message).map(|()| houses),
			BankReply::Failure { message } => Err(BankCallError::Refused(message)),
			_ => Err(WireError::UnexpectedReply.into()),
		}
	}

	pub async fn deregister(&self, account_id: AccountId, kind: AccountKind) -> Result<(), BankCallError> {
		match self.request(&BankRequest::Deregister { account_id, kind }).await? {
			BankReply::Deregister { success, message } => refused(success, message),
			BankReply::Failure { message } => Err(BankCallError::Refused(message)),
			_ => Err(WireError::UnexpectedReply.into()),
		}
	}
}
