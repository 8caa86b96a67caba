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

//! Primitive types shared by the bank, the auction houses and the agents.

use codec::{Decode, Encode};
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// Balance of an account, and the unit every bid is denominated in.
pub type Balance = u128;

/// Identifier of a bank account. Never reused within a bank's lifetime.
pub type AccountId = u64;

/// Identifier of a registered auction house.
pub type HouseId = u32;

/// Identifier of an item, unique within its auction house.
pub type ItemId = u32;

/// An instant in time, in milliseconds since `UNIX_EPOCH`.
pub type Moment = u64;

/// The first account id the bank hands out.
pub const FIRST_ACCOUNT_ID: AccountId = 1000;

/// The first house id the bank hands out.
pub const FIRST_HOUSE_ID: HouseId = 1;

/// The first item id an auction house allocates.
pub const FIRST_ITEM_ID: ItemId = 1;

/// How long the top bid must stand before the auction closes. Every
/// accepted bid resets the window.
pub const BID_WINDOW: Duration = Duration::from_secs(30);

/// Grace period for a notified winner to pay and confirm before the item
/// is withdrawn and its hold released. Must exceed `BID_WINDOW`.
pub const SETTLE_WINDOW: Duration = Duration::from_secs(60);

/// Kind of a bank account.
#[derive(Encode, Decode, Serialize, Deserialize, Eq, PartialEq, Copy, Clone, Debug)]
pub enum AccountKind {
	Agent,
	AuctionHouse,
}

/// Public listing of a registered auction house, as served by the bank.
#[derive(Encode, Decode, Serialize, Deserialize, Eq, PartialEq, Clone, Debug)]
pub struct HouseInfo {
	pub house_id: HouseId,
	/// The house's own bank account, the destination of winning payments.
	pub account_id: AccountId,
	pub host: String,
	pub port: u16,
}

/// Public fields of an item under auction.
#[derive(Encode, Decode, Serialize, Deserialize, Eq, PartialEq, Clone, Debug)]
pub struct ItemInfo {
	pub house_id: HouseId,
	pub item_id: ItemId,
	pub description: String,
	/// Lowest acceptable first bid. Always positive.
	pub minimum_bid: Balance,
	/// Highest accepted bid so far, zero when there is none.
	pub current_bid: Balance,
	pub current_bidder: Option<AccountId>,
	/// Absolute deadline of the bidding window. `None` until the first bid.
	pub end_time_ms: Option<Moment>,
}

/// A `(total, available, blocked)` balance snapshot.
#[derive(Encode, Decode, Serialize, Deserialize, Eq, PartialEq, Copy, Clone, Debug, Default)]
pub struct BalanceSnapshot {
	pub total: Balance,
	pub available: Balance,
	pub blocked: Balance,
}
