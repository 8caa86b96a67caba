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

//! # Gavel Wire Protocol
//!
//! ## Overview
//!
//! Tagged messages exchanged between the three node roles, one sum type per
//! protocol direction, plus the frame codec and the bank-side RPC client.
//! Frames are a `u32` little-endian length prefix followed by the
//! SCALE-encoded message. Requests and replies are strictly paired per
//! connection; on the agent/house stream, `HouseReply::Notification` frames
//! arrive unsolicited between replies and are told apart by tag alone.

use codec::{Decode, Encode};
use gavel_primitives::{AccountId, AccountKind, Balance, BalanceSnapshot, HouseId, HouseInfo, ItemId, ItemInfo};

mod client;
mod wire;

pub use client::{BankCallError, BankClient};
pub use wire::{read_frame, write_frame, WireError, MAX_FRAME_LEN, REQUEST_TIMEOUT};

/// A request to the bank, from an agent or an auction house.
#[derive(Encode, Decode, Eq, PartialEq, Clone, Debug)]
pub enum BankRequest {
	RegisterAgent { name: String, initial_balance: Balance },
	RegisterAuctionHouse { host: String, port: u16 },
	BlockFunds { account_id: AccountId, amount: Balance },
	UnblockFunds { account_id: AccountId, amount: Balance },
	TransferFunds { from: AccountId, to: AccountId, amount: Balance },
	GetAccountInfo { account_id: AccountId },
	GetAuctionHouses,
	Deregister { account_id: AccountId, kind: AccountKind },
}

/// The bank's reply. Variants pair positionally with [`BankRequest`];
/// `Failure` answers anything the bank could not make sense of.
#[derive(Encode, Decode, Eq, PartialEq, Clone, Debug)]
pub enum BankReply {
	RegisterAgent {
		success: bool,
		account_id: AccountId,
		message: String,
		/// Snapshot of the currently registered houses, bundled so a fresh
		/// agent can start bidding without a second round-trip.
		houses: Vec<HouseInfo>,
	},
	RegisterAuctionHouse {
		success: bool,
		house_id: HouseId,
		account_id: AccountId,
		message: String,
	},
	BlockFunds { success: bool, message: String },
	UnblockFunds { success: bool, message: String },
	TransferFunds { success: bool, message: String },
	GetAccountInfo {
		success: bool,
		balance: BalanceSnapshot,
		message: String,
	},
	GetAuctionHouses {
		success: bool,
		houses: Vec<HouseInfo>,
		message: String,
	},
	Deregister { success: bool, message: String },
	Failure { message: String },
}

/// A request to an auction house, from an agent.
#[derive(Encode, Decode, Eq, PartialEq, Clone, Debug)]
pub enum HouseRequest {
	GetItems,
	PlaceBid {
		item_id: ItemId,
		agent_id: AccountId,
		amount: Balance,
	},
	ConfirmWinner { item_id: ItemId, agent_id: AccountId },
}

/// Verdict of a bid in the `PlaceBid` reply.
#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, Debug)]
pub enum BidVerdict {
	Accepted,
	Rejected,
}

/// Status carried by an unsolicited [`BidNotification`].
#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, Debug)]
pub enum BidStatus {
	/// Someone placed a higher bid; the recipient's hold was released.
	Outbid,
	/// The recipient won; transfer `final_price` to `house_account_id` and
	/// confirm.
	Winner,
	/// An item was sold; broadcast to every connected agent.
	ItemSold,
	/// A previously accepted bid was voided (settlement timed out).
	Rejected,
}

/// Asynchronous event pushed from a house to an agent on the same stream
/// that carries its replies.
#[derive(Encode, Decode, Eq, PartialEq, Clone, Debug)]
pub struct BidNotification {
	pub item_id: ItemId,
	pub status: BidStatus,
	pub message: String,
	/// Meaningful for `Winner`: the amount to transfer.
	pub final_price: Balance,
	/// Meaningful for `Winner`: the payment destination.
	pub house_account_id: AccountId,
	/// Meaningful for `Winner` and `ItemSold`.
	pub item_description: String,
}

/// An auction house's reply, or a pushed notification.
#[derive(Encode, Decode, Eq, PartialEq, Clone, Debug)]
pub enum HouseReply {
	GetItems {
		success: bool,
		items: Vec<ItemInfo>,
		message: String,
	},
	PlaceBid {
		success: bool,
		status: BidVerdict,
		message: String,
		amount: Balance,
	},
	ConfirmWinner { success: bool, message: String },
	Notification(BidNotification),
	Failure { message: String },
}

impl HouseReply {
	/// Whether this frame is an unsolicited event rather than the reply to
	/// an outstanding request.
	pub fn is_notification(&self) -> bool {
		matches!(self, HouseReply::Notification(_))
	}
}
