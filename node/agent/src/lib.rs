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

//! # Agent Node
//!
//! ## Overview
//!
//! A bidder. The agent owns one bank connection and, per connected auction
//! house, one framed stream carrying both its request/reply traffic and
//! the house's pushed notifications. A single listener task per house is
//! the only reader of that stream: notifications it dispatches itself
//! (balance refreshes, and the winner-settlement flow on a task of its
//! own so the listener never waits on a queue it feeds), everything else
//! goes onto the house's response queue, where the one caller currently
//! holding the link's request lock is waiting for it. Exactly one request
//! per house is outstanding at any time; its reply is the next
//! non-notification frame.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gavel_primitives::{AccountId, AccountKind, Balance, BalanceSnapshot, HouseId, HouseInfo, ItemId, ItemInfo};
use gavel_protocol::{
	read_frame, write_frame, BankCallError, BankClient, BidNotification, BidStatus, BidVerdict, HouseReply,
	HouseRequest, WireError,
};
use parking_lot::{Mutex, RwLock};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Wait bound for replies to known-fast requests. `PlaceBid` is exempt:
/// it may legitimately block for as long as the house needs the bank.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// How often a listener retries its receive loop after an I/O failure
/// before abandoning the session.
const LISTENER_RETRIES: u32 = 3;
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Agent-side failures.
#[derive(Debug, derive_more::Display)]
pub enum AgentError {
	#[display(fmt = "{}", _0)]
	Bank(BankCallError),
	#[display(fmt = "{}", _0)]
	Transport(WireError),
	#[display(fmt = "house refused: {}", _0)]
	House(String),
	#[display(fmt = "not connected to house {}", _0)]
	NotConnected(HouseId),
	#[display(fmt = "unknown auction house {}", _0)]
	UnknownHouse(HouseId),
}

impl std::error::Error for AgentError {}

impl From<BankCallError> for AgentError {
	fn from(e: BankCallError) -> Self {
		AgentError::Bank(e)
	}
}

impl From<WireError> for AgentError {
	fn from(e: WireError) -> Self {
		AgentError::Transport(e)
	}
}

/// A won-and-settled item.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Purchase {
	pub house_id: HouseId,
	pub item_id: ItemId,
	pub description: String,
	pub price: Balance,
}

/// What came back for a bid.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BidOutcome {
	pub verdict: BidVerdict,
	pub message: String,
	pub amount: Balance,
}

/// The client-side courtesy checks before a bid goes out. The house is
/// authoritative; this only spares the round-trip for bids that cannot
/// win.
pub fn bid_precheck(item: &ItemInfo, amount: Balance, available: Balance) -> Result<(), String> {
	if amount < item.minimum_bid {
		return Err("Bid too low".to_string());
	}
	if amount <= item.current_bid {
		return Err("Bid too low".to_string());
	}
	if amount > available {
		return Err("Insufficient funds".to_string());
	}
	Ok(())
}

/// Write half and response queue of one house connection. Held together
/// under one lock: whoever sends the request is the one who takes its
/// reply off the queue.
struct LinkIo {
	writer: OwnedWriteHalf,
	replies: mpsc::Receiver<HouseReply>,
}

struct HouseLink {
	io: tokio::sync::Mutex<LinkIo>,
	listener: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
	name: String,
	account_id: AccountId,
	bank: BankClient,
	balance: Mutex<BalanceSnapshot>,
	houses: RwLock<HashMap<HouseId, HouseInfo>>,
	links: Mutex<HashMap<HouseId, Arc<HouseLink>>>,
	purchases: Mutex<Vec<Purchase>>,
}

/// A registered bidder and its local view of the world.
pub struct Agent {
	inner: Arc<Inner>,
}

impl Agent {
	/// Open an account at the bank. The reply's bundled house listing
	/// seeds the local discovery cache.
	pub async fn register(name: &str, initial_balance: Balance, bank_addr: &str) -> Result<Self, AgentError> {
		let bank = BankClient::connect(bank_addr).await?;
		let (account_id, houses) = bank.register_agent(name, initial_balance).await?;
		log::info!(target: "agent", "{} registered as account {}", name, account_id);
		Ok(Self {
			inner: Arc::new(Inner {
				name: name.to_string(),
				account_id,
				bank,
				balance: Mutex::new(BalanceSnapshot {
					total: initial_balance,
					available: initial_balance,
					blocked: 0,
				}),
				houses: RwLock::new(houses.into_iter().map(|h| (h.house_id, h)).collect()),
				links: Mutex::new(HashMap::new()),
				purchases: Mutex::new(Vec::new()),
			}),
		})
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn account_id(&self) -> AccountId {
		self.inner.account_id
	}

	/// Last known balance snapshot.
	pub fn balance(&self) -> BalanceSnapshot {
		*self.inner.balance.lock()
	}

	pub fn houses(&self) -> Vec<HouseInfo> {
		self.inner.houses.read().values().cloned().collect()
	}

	pub fn purchases(&self) -> Vec<Purchase> {
		self.inner.purchases.lock().clone()
	}

	/// Re-fetch the house listing from the bank.
	pub async fn refresh_houses(&self) -> Result<Vec<HouseInfo>, AgentError> {
		let houses = self.inner.bank.auction_houses().await?;
		*self.inner.houses.write() = houses.iter().map(|h| (h.house_id, h.clone())).collect();
		Ok(houses)
	}

	/// Re-fetch this account's balance from the bank.
	pub async fn update_balance(&self) -> Result<BalanceSnapshot, AgentError> {
		self.inner.update_balance().await
	}

	/// Dial a house from the discovery cache and start its listener.
	pub async fn connect_to_house(&self, house_id: HouseId) -> Result<(), AgentError> {
		let info = self
			.inner
			.houses
			.read()
			.get(&house_id)
			.cloned()
			.ok_or(AgentError::UnknownHouse(house_id))?;
		let stream = TcpStream::connect((info.host.as_str(), info.port))
			.await
			.map_err(|e| AgentError::Transport(WireError::Io(e)))?;
		stream.set_nodelay(true).map_err(|e| AgentError::Transport(WireError::Io(e)))?;
		let (reader, writer) = stream.into_split();

		let (tx, rx) = mpsc::channel(64);
		let link = Arc::new(HouseLink {
			io: tokio::sync::Mutex::new(LinkIo { writer, replies: rx }),
			listener: Mutex::new(None),
		});
		let listener = tokio::spawn(listen_house(Arc::clone(&self.inner), house_id, reader, tx));
		*link.listener.lock() = Some(listener);

		if let Some(old) = self.inner.links.lock().insert(house_id, link) {
			if let Some(handle) = old.listener.lock().take() {
				handle.abort();
			}
		}
		log::info!(target: "agent", "connected to house {} at {}:{}", house_id, info.host, info.port);
		Ok(())
	}

	pub async fn get_items(&self, house_id: HouseId) -> Result<Vec<ItemInfo>, AgentError> {
		match self
			.inner
			.request(house_id, &HouseRequest::GetItems, Some(REPLY_TIMEOUT))
			.await?
		{
			HouseReply::GetItems {
				success: true, items, ..
			} => Ok(items),
			HouseReply::GetItems { message, .. } | HouseReply::Failure { message } => Err(AgentError::House(message)),
			_ => Err(AgentError::Transport(WireError::UnexpectedReply)),
		}
	}

	/// Bid on an item. Blocks until the house has spoken to the bank and
	/// answered; an accepted bid refreshes the local balance.
	pub async fn place_bid(&self, house_id: HouseId, item_id: ItemId, amount: Balance) -> Result<BidOutcome, AgentError> {
		let request = HouseRequest::PlaceBid {
			item_id,
			agent_id: self.inner.account_id,
			amount,
		};
		match self.inner.request(house_id, &request, None).await? {
			HouseReply::PlaceBid {
				status, message, amount, ..
			} => {
				if status == BidVerdict::Accepted {
					if let Err(e) = self.inner.update_balance().await {
						log::warn!(target: "agent", "balance refresh after bid failed: {}", e);
					}
				}
				Ok(BidOutcome {
					verdict: status,
					message,
					amount,
				})
			}
			HouseReply::Failure { message } => Err(AgentError::House(message)),
			_ => Err(AgentError::Transport(WireError::UnexpectedReply)),
		}
	}

	/// Tear everything down: listeners, house connections, then the bank
	/// account.
	pub async fn disconnect(self) -> Result<(), AgentError> {
		let links: Vec<Arc<HouseLink>> = {
			let mut map = self.inner.links.lock();
			map.drain().map(|(_, link)| link).collect()
		};
		for link in links {
			if let Some(handle) = link.listener.lock().take() {
				handle.abort();
			}
			// Dropping the link closes the write half.
		}
		self.inner
			.bank
			.deregister(self.inner.account_id, AccountKind::Agent)
			.await?;
		log::info!(target: "agent", "{} deregistered", self.inner.name);
		Ok(())
	}
}

impl Inner {
	async fn update_balance(&self) -> Result<BalanceSnapshot, AgentError> {
		let snapshot = self.bank.account_info(self.account_id).await?;
		*self.balance.lock() = snapshot;
		Ok(snapshot)
	}

	/// One request, one reply. The link's io lock serializes callers; the
	/// reply is whatever non-notification frame the listener queues next.
	///
	/// Pairing is positional, so a reply that arrives after its caller
	/// timed out would be handed to the next caller and skew every reply
	/// after it. A timeout therefore abandons the whole link; the house
	/// can be re-dialled with a fresh queue.
	async fn request(
		&self,
		house_id: HouseId,
		request: &HouseRequest,
		reply_timeout: Option<Duration>,
	) -> Result<HouseReply, AgentError> {
		let link = self
			.links
			.lock()
			.get(&house_id)
			.cloned()
			.ok_or(AgentError::NotConnected(house_id))?;
		let mut io = link.io.lock().await;
		write_frame(&mut io.writer, request).await?;
		let reply = match reply_timeout {
			Some(t) => match tokio::time::timeout(t, io.replies.recv()).await {
				Ok(reply) => reply,
				Err(_) => {
					drop(io);
					self.abandon_link(house_id, &link);
					return Err(AgentError::Transport(WireError::Timeout));
				}
			},
			None => io.replies.recv().await,
		};
		// A closed queue means the listener gave the connection up.
		reply.ok_or(AgentError::NotConnected(house_id))
	}

	/// Close a house connection whose request/reply pairing can no longer
	/// be trusted. Only removes the link if a reconnect has not already
	/// replaced it.
	fn abandon_link(&self, house_id: HouseId, link: &Arc<HouseLink>) {
		{
			let mut links = self.links.lock();
			if links.get(&house_id).is_some_and(|l| Arc::ptr_eq(l, link)) {
				links.remove(&house_id);
			}
		}
		if let Some(handle) = link.listener.lock().take() {
			handle.abort();
		}
		log::warn!(target: "agent", "house {} link abandoned after reply timeout", house_id);
	}
}

/// The sole reader of one house connection. Notifications are dispatched
/// here; every other frame is a reply for the caller waiting on the queue.
async fn listen_house(inner: Arc<Inner>, house_id: HouseId, mut reader: OwnedReadHalf, replies: mpsc::Sender<HouseReply>) {
	let mut failures = 0u32;
	loop {
		match read_frame::<HouseReply, _>(&mut reader).await {
			Ok(HouseReply::Notification(notice)) => {
				failures = 0;
				dispatch_notification(&inner, house_id, notice).await;
			}
			Ok(reply) => {
				failures = 0;
				if replies.send(reply).await.is_err() {
					// Link dropped; nobody will ask again.
					return;
				}
			}
			Err(e) => {
				failures += 1;
				if failures > LISTENER_RETRIES {
					log::warn!(
						target: "agent",
						"house {} connection abandoned after {} failures: {}",
						house_id, LISTENER_RETRIES, e
					);
					return;
				}
				log::debug!(target: "agent", "house {} receive failed ({}), retrying", house_id, e);
				tokio::time::sleep(LISTENER_RETRY_DELAY).await;
			}
		}
	}
}

async fn dispatch_notification(inner: &Arc<Inner>, house_id: HouseId, notice: BidNotification) {
	match notice.status {
		BidStatus::Outbid | BidStatus::Rejected | BidStatus::ItemSold => {
			log::info!(
				target: "agent",
				"house {} item {}: {:?} - {}",
				house_id, notice.item_id, notice.status, notice.message
			);
			if let Err(e) = inner.update_balance().await {
				log::warn!(target: "agent", "balance refresh failed: {}", e);
			}
		}
		BidStatus::Winner => {
			// On its own task: settlement sends a request and waits on the
			// response queue this listener feeds.
			let inner = Arc::clone(inner);
			tokio::spawn(settle_win(inner, house_id, notice));
		}
	}
}

/// The winner's half of settlement: pay the house through the bank, then
/// confirm so the house can close the item out. A failed payment is fatal
/// for the purchase: the hold is released and the house's settlement
/// timeout reclaims the item.
async fn settle_win(inner: Arc<Inner>, house_id: HouseId, notice: BidNotification) {
	let me = inner.account_id;
	log::info!(
		target: "agent",
		"won {:?} (item {}) at {}, settling",
		notice.item_description, notice.item_id, notice.final_price
	);

	if let Err(e) = inner.bank.transfer_funds(me, notice.house_account_id, notice.final_price).await {
		log::error!(target: "agent", "payment for item {} failed: {}", notice.item_id, e);
		if let Err(e) = inner.bank.unblock_funds(me, notice.final_price).await {
			log::error!(target: "agent", "could not release own hold either: {}", e);
		}
		return;
	}

	let confirm = HouseRequest::ConfirmWinner {
		item_id: notice.item_id,
		agent_id: me,
	};
	match inner.request(house_id, &confirm, Some(REPLY_TIMEOUT)).await {
		Ok(HouseReply::ConfirmWinner { success: true, .. }) => {
			inner.purchases.lock().push(Purchase {
				house_id,
				item_id: notice.item_id,
				description: notice.item_description.clone(),
				price: notice.final_price,
			});
			if let Err(e) = inner.update_balance().await {
				log::warn!(target: "agent", "balance refresh after purchase failed: {}", e);
			}
			log::info!(target: "agent", "purchase of item {} complete", notice.item_id);
		}
		Ok(HouseReply::ConfirmWinner { message, .. }) => {
			log::error!(target: "agent", "house refused confirmation for item {}: {}", notice.item_id, message);
		}
		Ok(_) => {
			log::error!(target: "agent", "unexpected reply confirming item {}", notice.item_id);
		}
		Err(e) => {
			log::error!(target: "agent", "could not confirm item {}: {}", notice.item_id, e);
		}
	}
}
