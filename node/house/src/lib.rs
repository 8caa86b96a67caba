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

//! # Auction House Node
//!
//! ## Overview
//!
//! An auction house is both a server for agents and a client of the bank.
//! It owns a catalog of items, each driven by its own
//! [`module_auction::ItemEngine`] behind an async mutex, and one timer task
//! per armed deadline. The agent-facing side multiplexes request/reply
//! traffic and pushed notifications over a single framed stream per agent
//! (see [`session`]). The operator's control plane (add, remove, snapshot,
//! shutdown) runs in-process against the same engine locks as the bids.
//!
//! Start-up order matters for discovery: the listener is bound first so
//! the resolved port can be advertised, then the house registers itself
//! with the bank and only then starts accepting agents.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use gavel_primitives::{AccountId, AccountKind, Balance, HouseId, ItemId, ItemInfo, FIRST_ITEM_ID};
use gavel_protocol::{
	read_frame, BankCallError, BankClient, BidNotification, BidStatus, BidVerdict, HouseReply, HouseRequest, WireError,
};
use module_auction::{EngineConfig, ItemEngine, TimerRequest};
use parking_lot::{Mutex, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub mod catalog;
mod funds;
pub mod net;
pub mod session;

use funds::BankFunds;
use session::{Outbound, SessionRegistry};

/// Host-process configuration of a house node.
pub struct HouseConfig {
	/// Agent-facing listen address; port 0 is resolved at bind time.
	pub listen: SocketAddr,
	/// Bank endpoint, `host:port`.
	pub bank: String,
	/// Advertised host override; see [`net::advertised_host`] for the
	/// fallback chain.
	pub advertise: Option<String>,
	/// Bid and settlement windows, shrunk by tests.
	pub engine: EngineConfig,
}

/// Failures bringing the node up.
#[derive(Debug, derive_more::Display)]
pub enum StartError {
	#[display(fmt = "cannot bind listener: {}", _0)]
	Io(std::io::Error),
	#[display(fmt = "cannot register with the bank: {}", _0)]
	Bank(BankCallError),
}

impl std::error::Error for StartError {}

impl From<std::io::Error> for StartError {
	fn from(e: std::io::Error) -> Self {
		StartError::Io(e)
	}
}

impl From<BankCallError> for StartError {
	fn from(e: BankCallError) -> Self {
		StartError::Bank(e)
	}
}

/// Failures of the operator control plane; display strings are surfaced.
#[derive(Debug, derive_more::Display)]
pub enum OperatorError {
	#[display(fmt = "Empty description")]
	EmptyDescription,
	#[display(fmt = "Invalid minimum bid")]
	InvalidMinimumBid,
	#[display(fmt = "Item not found")]
	ItemNotFound,
	#[display(fmt = "Item has an active bidder")]
	ItemHasBidder,
	#[display(fmt = "House has active bids")]
	ActiveBids,
	#[display(fmt = "bank error: {}", _0)]
	Bank(BankCallError),
}

impl std::error::Error for OperatorError {}

/// An item, its engine and whichever timer is currently armed for it.
struct ItemSlot {
	engine: tokio::sync::Mutex<ItemEngine>,
	timer: Mutex<Option<JoinHandle<()>>>,
}

impl ItemSlot {
	fn abort_timer(&self) {
		if let Some(handle) = self.timer.lock().take() {
			handle.abort();
		}
	}
}

/// One auction house node.
pub struct AuctionHouse {
	house_id: HouseId,
	account_id: AccountId,
	local_addr: SocketAddr,
	bank: Arc<BankClient>,
	funds: BankFunds,
	items: RwLock<BTreeMap<ItemId, Arc<ItemSlot>>>,
	next_item_id: AtomicU32,
	sessions: SessionRegistry,
	engine_config: EngineConfig,
	acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl AuctionHouse {
	/// Bind, register with the bank, start accepting agents.
	pub async fn start(config: HouseConfig) -> Result<Arc<Self>, StartError> {
		let listener = TcpListener::bind(config.listen).await?;
		let local_addr = listener.local_addr()?;
		let host = net::advertised_host(&local_addr, config.advertise.as_deref());

		let bank = Arc::new(BankClient::connect(&*config.bank).await.map_err(BankCallError::Transport)?);
		let (house_id, account_id) = bank.register_house(&host, local_addr.port()).await?;
		log::info!(
			target: "house",
			"registered as house {} (account {}), advertising {}:{}",
			house_id, account_id, host, local_addr.port()
		);

		let house = Arc::new(Self {
			house_id,
			account_id,
			local_addr,
			funds: BankFunds(Arc::clone(&bank)),
			bank,
			items: RwLock::new(BTreeMap::new()),
			next_item_id: AtomicU32::new(FIRST_ITEM_ID),
			sessions: SessionRegistry::default(),
			engine_config: config.engine,
			acceptor: Mutex::new(None),
		});

		let acceptor = tokio::spawn(accept_loop(Arc::clone(&house), listener));
		*house.acceptor.lock() = Some(acceptor);
		Ok(house)
	}

	pub fn house_id(&self) -> HouseId {
		self.house_id
	}

	/// The house's own bank account, where winning bids are paid.
	pub fn account_id(&self) -> AccountId {
		self.account_id
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	/// Operator: put a new item under the hammer.
	pub fn add_item(&self, description: &str, minimum_bid: Balance) -> Result<ItemId, OperatorError> {
		if description.trim().is_empty() {
			return Err(OperatorError::EmptyDescription);
		}
		if minimum_bid == 0 {
			return Err(OperatorError::InvalidMinimumBid);
		}
		let item_id = self.next_item_id.fetch_add(1, Ordering::Relaxed);
		let engine = ItemEngine::new(
			self.house_id,
			item_id,
			description.to_string(),
			minimum_bid,
			self.engine_config,
		);
		self.items.write().insert(
			item_id,
			Arc::new(ItemSlot {
				engine: tokio::sync::Mutex::new(engine),
				timer: Mutex::new(None),
			}),
		);
		log::info!(target: "house", "item {} listed: {:?} (min {})", item_id, description, minimum_bid);
		Ok(item_id)
	}

	/// Operator: withdraw an item. Only items nobody has bid on can go.
	pub async fn remove_item(&self, item_id: ItemId) -> Result<(), OperatorError> {
		let slot = self.slot(item_id).ok_or(OperatorError::ItemNotFound)?;
		let mut engine = slot.engine.lock().await;
		if engine.has_bidder() {
			return Err(OperatorError::ItemHasBidder);
		}
		// Retire under the engine lock so a bidder queued on it cannot
		// place funds on the removed item.
		engine.retire();
		drop(engine);
		self.items.write().remove(&item_id);
		slot.abort_timer();
		Ok(())
	}

	/// Copy of every item's public fields, for display.
	pub async fn snapshot(&self) -> Vec<ItemInfo> {
		let slots: Vec<Arc<ItemSlot>> = self.items.read().values().cloned().collect();
		let mut items = Vec::with_capacity(slots.len());
		for slot in slots {
			items.push(slot.engine.lock().await.info());
		}
		items.sort_by_key(|i| i.item_id);
		items
	}

	/// Operator: clean exit. Refused while any item has an active bidder;
	/// otherwise the house stops accepting, retires every engine and
	/// deregisters from the bank.
	pub async fn shutdown(&self) -> Result<(), OperatorError> {
		let slots: Vec<Arc<ItemSlot>> = self.items.read().values().cloned().collect();
		let mut engines = Vec::with_capacity(slots.len());
		for slot in &slots {
			engines.push(slot.engine.lock().await);
		}
		if engines.iter().any(|e| e.has_bidder()) {
			return Err(OperatorError::ActiveBids);
		}
		for engine in &mut engines {
			engine.retire();
		}
		drop(engines);

		if let Some(acceptor) = self.acceptor.lock().take() {
			acceptor.abort();
		}
		for slot in &slots {
			slot.abort_timer();
		}
		self.items.write().clear();
		self.bank
			.deregister(self.account_id, AccountKind::AuctionHouse)
			.await
			.map_err(OperatorError::Bank)?;
		log::info!(target: "house", "house {} shut down", self.house_id);
		Ok(())
	}

	fn slot(&self, item_id: ItemId) -> Option<Arc<ItemSlot>> {
		self.items.read().get(&item_id).cloned()
	}
}

async fn handle_place_bid(house: &Arc<AuctionHouse>, item_id: ItemId, bidder: AccountId, amount: Balance) -> HouseReply {
	let rejected = |message: String| HouseReply::PlaceBid {
		success: false,
		status: BidVerdict::Rejected,
		message,
		amount,
	};
	let Some(slot) = house.slot(item_id) else {
		return rejected("Item not found".to_string());
	};

	// The lock spans validation, the bank round-trips and the state
	// update; a timer firing meanwhile queues behind it.
	let mut engine = slot.engine.lock().await;
	match engine.place_bid(bidder, amount, &house.funds).await {
		Ok(accepted) => {
			let description = engine.description().to_string();
			drop(engine);
			arm_bid_timer(house, &slot, item_id, accepted.timer);

			// The displaced bidder learns first; only then is the new
			// bidder answered. The two travel on different connections,
			// so this orders dispatch, not arrival.
			if let Some(outbid) = &accepted.outbid {
				house
					.sessions
					.notify(
						outbid.bidder,
						BidNotification {
							item_id,
							status: BidStatus::Outbid,
							message: format!("You have been outbid on {}", description),
							final_price: outbid.new_bid,
							house_account_id: house.account_id,
							item_description: description,
						},
					)
					.await;
			}
			HouseReply::PlaceBid {
				success: true,
				status: BidVerdict::Accepted,
				message: "Bid accepted".to_string(),
				amount,
			}
		}
		Err(e) => rejected(e.to_string()),
	}
}

async fn handle_confirm_winner(house: &Arc<AuctionHouse>, item_id: ItemId, bidder: AccountId) -> HouseReply {
	let failure = |message: String| HouseReply::ConfirmWinner {
		success: false,
		message,
	};
	let Some(slot) = house.slot(item_id) else {
		return failure("Item not found".to_string());
	};

	let mut engine = slot.engine.lock().await;
	match engine.confirm_winner(bidder, &house.funds).await {
		Ok(settled) => {
			let description = engine.description().to_string();
			drop(engine);

			// Sold goes out to everyone before the item vanishes from
			// snapshots.
			house
				.sessions
				.broadcast(BidNotification {
					item_id,
					status: BidStatus::ItemSold,
					message: format!("{} sold for {}", description, settled.price),
					final_price: settled.price,
					house_account_id: house.account_id,
					item_description: description,
				})
				.await;
			house.items.write().remove(&item_id);
			slot.abort_timer();
			log::info!(
				target: "house",
				"item {} settled: buyer {}, price {}",
				item_id, settled.buyer, settled.price
			);
			HouseReply::ConfirmWinner {
				success: true,
				message: "OK".to_string(),
			}
		}
		Err(e) => failure(e.to_string()),
	}
}

/// Replace the armed timer with a fresh bid-window expiry. The old task is
/// aborted; even a fire that slips through carries a stale epoch the
/// engine ignores.
fn arm_bid_timer(house: &Arc<AuctionHouse>, slot: &Arc<ItemSlot>, item_id: ItemId, timer: TimerRequest) {
	let task_house = Arc::clone(house);
	let task_slot = Arc::clone(slot);
	let handle = tokio::spawn(async move {
		tokio::time::sleep_until(timer.deadline).await;
		on_bid_deadline(task_house, task_slot, item_id, timer.epoch).await;
	});
	if let Some(old) = slot.timer.lock().replace(handle) {
		old.abort();
	}
}

async fn on_bid_deadline(house: Arc<AuctionHouse>, slot: Arc<ItemSlot>, item_id: ItemId, epoch: u64) {
	let mut engine = slot.engine.lock().await;
	let Some(decided) = engine.close_bidding(epoch) else {
		return;
	};
	let description = engine.description().to_string();
	drop(engine);

	house
		.sessions
		.notify(
			decided.bidder,
			BidNotification {
				item_id,
				status: BidStatus::Winner,
				message: format!("You won {} at {}", description, decided.final_price),
				final_price: decided.final_price,
				house_account_id: house.account_id,
				item_description: description,
			},
		)
		.await;

	// This task is the handle currently stored in the slot; storing the
	// settlement timer must not abort it mid-tail.
	let task_house = Arc::clone(&house);
	let task_slot = Arc::clone(&slot);
	let handle = tokio::spawn(async move {
		tokio::time::sleep_until(decided.timer.deadline).await;
		on_settle_deadline(task_house, task_slot, item_id, decided.timer.epoch).await;
	});
	*slot.timer.lock() = Some(handle);
}

async fn on_settle_deadline(house: Arc<AuctionHouse>, slot: Arc<ItemSlot>, item_id: ItemId, epoch: u64) {
	let mut engine = slot.engine.lock().await;
	let Some(withdrawn) = engine.withdraw_unsettled(epoch, &house.funds).await else {
		return;
	};
	let description = engine.description().to_string();
	drop(engine);

	house
		.sessions
		.notify(
			withdrawn.bidder,
			BidNotification {
				item_id,
				status: BidStatus::Rejected,
				message: "Settlement timed out".to_string(),
				final_price: withdrawn.refunded,
				house_account_id: house.account_id,
				item_description: description,
			},
		)
		.await;
	house.items.write().remove(&item_id);
}

async fn accept_loop(house: Arc<AuctionHouse>, listener: TcpListener) {
	loop {
		match listener.accept().await {
			Ok((stream, peer)) => {
				log::debug!(target: "house", "agent connection from {}", peer);
				let house = Arc::clone(&house);
				tokio::spawn(serve_agent(house, stream, peer));
			}
			Err(e) => {
				log::warn!(target: "house", "accept failed: {}", e);
			}
		}
	}
}

async fn serve_agent(house: Arc<AuctionHouse>, stream: TcpStream, peer: SocketAddr) {
	if let Err(e) = stream.set_nodelay(true) {
		log::debug!(target: "house", "set_nodelay for {}: {}", peer, e);
	}
	let (mut reader, writer) = stream.into_split();
	let outbound = Outbound::new(peer, writer);
	// Known after the first PlaceBid names the agent.
	let mut agent_id: Option<AccountId> = None;

	loop {
		let request = match read_frame::<HouseRequest, _>(&mut reader).await {
			Ok(request) => request,
			Err(WireError::Codec(e)) => {
				let reply = HouseReply::Failure {
					message: format!("Unknown request: {}", e),
				};
				if outbound.send(&reply).await.is_err() {
					break;
				}
				continue;
			}
			Err(e) => {
				log::debug!(target: "house", "agent connection {} closed: {}", peer, e);
				break;
			}
		};

		let reply = match request {
			HouseRequest::GetItems => HouseReply::GetItems {
				success: true,
				items: house.snapshot().await,
				message: "OK".to_string(),
			},
			HouseRequest::PlaceBid {
				item_id,
				agent_id: bidder,
				amount,
			} => {
				if agent_id != Some(bidder) {
					house.sessions.attach(bidder, Arc::clone(&outbound));
					agent_id = Some(bidder);
				}
				handle_place_bid(&house, item_id, bidder, amount).await
			}
			HouseRequest::ConfirmWinner { item_id, agent_id: bidder } => handle_confirm_winner(&house, item_id, bidder).await,
		};

		if let Err(e) = outbound.send(&reply).await {
			log::debug!(target: "house", "reply to {} failed: {}", peer, e);
			break;
		}
	}

	if let Some(id) = agent_id {
		house.sessions.detach(id, &outbound);
	}
}
