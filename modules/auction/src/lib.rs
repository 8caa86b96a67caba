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

//! # Auction Item Engine Module
//!
//! ## Overview
//!
//! The per-item state machine at the center of an auction house. One engine
//! owns one item: its public fields, the per-bidder ledger of bank holds,
//! and the phase of its lifecycle:
//!   - `Open`: bids are validated and, when accepted, reset the bidding
//!     window; the previous bidder's hold is released and an outbid event
//!     raised
//!   - `PendingSettlement`: the window elapsed with a standing bid; the
//!     winner has been told to pay and the engine waits for confirmation,
//!     up to a settlement deadline after which the item is withdrawn
//!
//! The engine talks to the bank only through the narrow [`FundsProvider`]
//! seam, so it can be driven in tests by a stub bank. It owns no tasks and
//! no sockets: callers hold its lock for the full duration of an operation
//! (including the bank round-trips) and schedule timers from the
//! `(epoch, deadline)` pairs it hands back. A timer firing with a stale
//! epoch is a no-op, which is what makes a late fire racing an accepted
//! bid harmless.

use std::collections::HashMap;

use gavel_primitives::{AccountId, Balance, HouseId, ItemId, ItemInfo, Moment};
use tokio::time::Instant;

mod mock;
mod tests;

/// Failures reported to bidders; display strings are surfaced verbatim.
#[derive(Debug, derive_more::Display, Eq, PartialEq, Clone)]
pub enum Error {
	#[display(fmt = "Invalid amount")]
	InvalidAmount,
	#[display(fmt = "Bid too low")]
	BidTooLow,
	#[display(fmt = "Insufficient funds")]
	InsufficientFunds,
	#[display(fmt = "Auction closed")]
	AuctionClosed,
	#[display(fmt = "Auction still open")]
	AuctionStillOpen,
	#[display(fmt = "You are not the winning bidder")]
	NotWinner,
	#[display(fmt = "Funds service unavailable")]
	FundsUnavailable,
}

impl std::error::Error for Error {}

/// A fund operation the bank would not perform, or could not be asked.
#[derive(Debug, derive_more::Display, Eq, PartialEq, Clone)]
pub enum FundsError {
	/// The bank processed the request and refused it.
	#[display(fmt = "{}", _0)]
	Refused(String),
	/// The bank could not be reached at all.
	#[display(fmt = "bank unreachable: {}", _0)]
	Unreachable(String),
}

impl std::error::Error for FundsError {}

/// The engine's only view of the bank: hold and release funds on behalf of
/// bidders. Implemented over the real bank connection by the house node and
/// by an in-memory ledger in tests.
#[async_trait::async_trait]
pub trait FundsProvider: Send + Sync {
	async fn block(&self, account: AccountId, amount: Balance) -> Result<(), FundsError>;
	async fn unblock(&self, account: AccountId, amount: Balance) -> Result<(), FundsError>;
}

/// Which timer the caller must (re)arm after an engine transition.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct TimerRequest {
	/// Epoch the timer must present back when it fires; anything else is
	/// stale and ignored.
	pub epoch: u64,
	pub deadline: Instant,
}

/// Outcome of an accepted bid.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Accepted {
	pub amount: Balance,
	pub timer: TimerRequest,
	/// The displaced previous bidder, to be sent an outbid notification.
	pub outbid: Option<OutbidEvent>,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct OutbidEvent {
	pub bidder: AccountId,
	pub new_bid: Balance,
}

/// The bid window elapsed with a standing bid; the named bidder must now
/// pay `final_price` and confirm before the settlement timer fires.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct WinnerDecided {
	pub bidder: AccountId,
	pub final_price: Balance,
	pub timer: TimerRequest,
}

/// A completed sale.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Settled {
	pub buyer: AccountId,
	pub price: Balance,
}

/// An unsettled item that was withdrawn, with the winner's hold released.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Withdrawn {
	pub bidder: AccountId,
	pub refunded: Balance,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
enum Phase {
	Open,
	PendingSettlement,
	/// Taken out of service by the operator or after settlement; every
	/// operation bounces. A bidder that was still waiting on the engine
	/// lock when the item went away must not be able to park funds on it.
	Retired,
}

/// Tunable windows; production uses the constants from `gavel-primitives`,
/// tests shrink them.
#[derive(Debug, Copy, Clone)]
pub struct EngineConfig {
	/// How long the top bid must stand before the auction closes.
	pub bid_window: std::time::Duration,
	/// How long a decided winner has to pay and confirm.
	pub settle_window: std::time::Duration,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			bid_window: gavel_primitives::BID_WINDOW,
			settle_window: gavel_primitives::SETTLE_WINDOW,
		}
	}
}

/// The per-item engine. See the module docs for the lifecycle.
pub struct ItemEngine {
	info: ItemInfo,
	/// What the bank currently holds per bidder for this item. At most one
	/// entry per bidder; the top bidder's entry equals `current_bid`.
	/// Entries of displaced bidders whose release failed stay here until
	/// settlement sweeps them.
	holds: HashMap<AccountId, Balance>,
	phase: Phase,
	/// Bumped on every transition that invalidates an armed timer.
	epoch: u64,
	config: EngineConfig,
}

impl ItemEngine {
	pub fn new(house_id: HouseId, item_id: ItemId, description: String, minimum_bid: Balance, config: EngineConfig) -> Self {
		Self {
			info: ItemInfo {
				house_id,
				item_id,
				description,
				minimum_bid,
				current_bid: 0,
				current_bidder: None,
				end_time_ms: None,
			},
			holds: HashMap::new(),
			phase: Phase::Open,
			epoch: 0,
			config,
		}
	}

	pub fn item_id(&self) -> ItemId {
		self.info.item_id
	}

	pub fn description(&self) -> &str {
		&self.info.description
	}

	/// Copy of the public fields, for `GetItems` snapshots.
	pub fn info(&self) -> ItemInfo {
		self.info.clone()
	}

	/// Whether any bid has been accepted and not yet settled away. Items
	/// with a bidder cannot be removed and block house shutdown.
	pub fn has_bidder(&self) -> bool {
		self.info.current_bidder.is_some()
	}

	fn wall_clock_deadline(&self) -> Moment {
		let end = std::time::SystemTime::now() + self.config.bid_window;
		end.duration_since(std::time::UNIX_EPOCH)
			.map(|d| d.as_millis() as Moment)
			.unwrap_or_default()
	}

	/// Accept or reject a bid, holding funds at the bank on acceptance.
	///
	/// The caller must keep the engine locked across the whole call: the
	/// bank round-trip and the state update must not be separable, or a
	/// timer fire in between would settle a half-applied bid.
	pub async fn place_bid(
		&mut self,
		bidder: AccountId,
		amount: Balance,
		funds: &dyn FundsProvider,
	) -> Result<Accepted, Error> {
		if self.phase != Phase::Open {
			return Err(Error::AuctionClosed);
		}
		if amount == 0 {
			return Err(Error::InvalidAmount);
		}
		if amount < self.info.minimum_bid || amount <= self.info.current_bid {
			// Equal bids always lose.
			return Err(Error::BidTooLow);
		}

		// A prior hold of this bidder (their own top bid, or a stale entry
		// whose release failed) must be given back first, or the new block
		// would be judged against an available balance that still carries
		// the old hold.
		let prior_hold = self.holds.get(&bidder).copied();
		if let Some(held) = prior_hold {
			match funds.unblock(bidder, held).await {
				Ok(()) => {
					self.holds.remove(&bidder);
				}
				Err(FundsError::Refused(msg)) => {
					log::error!(
						target: "auction",
						"item {}: releasing prior hold of {} for bidder {} refused: {}",
						self.info.item_id, held, bidder, msg
					);
					return Err(Error::InsufficientFunds);
				}
				Err(FundsError::Unreachable(_)) => return Err(Error::FundsUnavailable),
			}
		}

		match funds.block(bidder, amount).await {
			Ok(()) => {}
			Err(e) => {
				if let Some(held) = prior_hold {
					self.restore_prior_hold(bidder, held, funds).await;
				}
				return Err(match e {
					FundsError::Refused(_) => Error::InsufficientFunds,
					FundsError::Unreachable(_) => Error::FundsUnavailable,
				});
			}
		}

		let previous = self.info.current_bidder.map(|who| (who, self.info.current_bid));
		self.info.current_bid = amount;
		self.info.current_bidder = Some(bidder);
		self.holds.insert(bidder, amount);

		let mut outbid = None;
		if let Some((previous_bidder, _)) = previous {
			if previous_bidder != bidder {
				if let Some(held) = self.holds.get(&previous_bidder).copied() {
					match funds.unblock(previous_bidder, held).await {
						Ok(()) => {
							self.holds.remove(&previous_bidder);
						}
						Err(e) => {
							// The bid stands; the stale entry is swept by
							// the straggler release at settlement.
							log::warn!(
								target: "auction",
								"item {}: could not release outbid hold of {} for {}: {}",
								self.info.item_id, held, previous_bidder, e
							);
						}
					}
				}
				outbid = Some(OutbidEvent {
					bidder: previous_bidder,
					new_bid: amount,
				});
			}
		}

		self.epoch += 1;
		self.info.end_time_ms = Some(self.wall_clock_deadline());
		let timer = TimerRequest {
			epoch: self.epoch,
			deadline: Instant::now() + self.config.bid_window,
		};
		log::info!(
			target: "auction",
			"item {}: bid of {} by {} accepted, window resets",
			self.info.item_id, amount, bidder
		);
		Ok(Accepted {
			amount,
			timer,
			outbid,
		})
	}

	/// A failed re-bid took the bidder's old hold away before the larger
	/// block was refused. Put the old hold back so they stay top at the old
	/// amount; if even that fails the bid is withdrawn and the item reverts
	/// to no-bidder.
	async fn restore_prior_hold(&mut self, bidder: AccountId, held: Balance, funds: &dyn FundsProvider) {
		match funds.block(bidder, held).await {
			Ok(()) => {
				self.holds.insert(bidder, held);
			}
			Err(e) => {
				log::error!(
					target: "auction",
					"item {}: could not restore hold of {} for bidder {} ({}); bid withdrawn",
					self.info.item_id, held, bidder, e
				);
				if self.info.current_bidder == Some(bidder) {
					self.info.current_bid = 0;
					self.info.current_bidder = None;
					self.info.end_time_ms = None;
					// Invalidate the bid timer that was running for them.
					self.epoch += 1;
				}
			}
		}
	}

	/// Bid timer fired. Decides the winner when the fire is current and a
	/// bid stands; a stale epoch (a bid got in after the timer was armed)
	/// or a bidderless item is a no-op.
	pub fn close_bidding(&mut self, epoch: u64) -> Option<WinnerDecided> {
		if epoch != self.epoch || self.phase != Phase::Open {
			return None;
		}
		let bidder = self.info.current_bidder?;
		self.phase = Phase::PendingSettlement;
		self.epoch += 1;
		log::info!(
			target: "auction",
			"item {}: bidding closed at {} for bidder {}",
			self.info.item_id, self.info.current_bid, bidder
		);
		Some(WinnerDecided {
			bidder,
			final_price: self.info.current_bid,
			timer: TimerRequest {
				epoch: self.epoch,
				deadline: Instant::now() + self.config.settle_window,
			},
		})
	}

	/// The winner paid and confirms. Sweeps every hold that is not the
	/// winner's (normally none; stragglers only when an earlier release
	/// failed), drops the winner's entry (their blocked funds were consumed
	/// by the transfer) and reports the sale. The caller removes the item
	/// and broadcasts.
	pub async fn confirm_winner(&mut self, bidder: AccountId, funds: &dyn FundsProvider) -> Result<Settled, Error> {
		match self.phase {
			Phase::PendingSettlement => {}
			Phase::Open => return Err(Error::AuctionStillOpen),
			Phase::Retired => return Err(Error::AuctionClosed),
		}
		if self.info.current_bidder != Some(bidder) {
			return Err(Error::NotWinner);
		}
		self.release_loser_funds(bidder, funds).await;
		self.holds.remove(&bidder);
		// A second confirmation must not settle twice.
		self.retire();
		Ok(Settled {
			buyer: bidder,
			price: self.info.current_bid,
		})
	}

	/// Settlement timer fired. When current, the winner never paid: give
	/// their hold back, sweep stragglers, and report the withdrawal. The
	/// caller removes the item.
	pub async fn withdraw_unsettled(&mut self, epoch: u64, funds: &dyn FundsProvider) -> Option<Withdrawn> {
		if epoch != self.epoch || self.phase != Phase::PendingSettlement {
			return None;
		}
		let bidder = self.info.current_bidder?;
		let refunded = self.holds.get(&bidder).copied().unwrap_or(0);
		if refunded > 0 {
			if let Err(e) = funds.unblock(bidder, refunded).await {
				log::error!(
					target: "auction",
					"item {}: could not refund unsettled winner {}: {}",
					self.info.item_id, bidder, e
				);
			}
		}
		self.holds.remove(&bidder);
		self.release_loser_funds(bidder, funds).await;
		self.retire();
		log::warn!(
			target: "auction",
			"item {}: winner {} never settled, item withdrawn",
			self.info.item_id, bidder
		);
		Some(Withdrawn { bidder, refunded })
	}

	/// Permanently take the engine out of service and invalidate any armed
	/// timer. Idempotent.
	pub fn retire(&mut self) {
		self.phase = Phase::Retired;
		self.epoch += 1;
	}

	/// Release every hold except the winner's. The compensating sweep for
	/// outbid releases that failed at bid time.
	async fn release_loser_funds(&mut self, winner: AccountId, funds: &dyn FundsProvider) {
		let stragglers: Vec<(AccountId, Balance)> = self
			.holds
			.iter()
			.filter(|(who, _)| **who != winner)
			.map(|(who, held)| (*who, *held))
			.collect();
		for (who, held) in stragglers {
			match funds.unblock(who, held).await {
				Ok(()) => {
					self.holds.remove(&who);
				}
				Err(e) => {
					log::error!(
						target: "auction",
						"item {}: straggler hold of {} for {} could not be released: {}",
						self.info.item_id, held, who, e
					);
				}
			}
		}
	}
}
