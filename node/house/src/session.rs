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

//! Agent sessions and the notification broadcast layer.
//!
//! Replies and pushed notifications share one byte stream per agent, so
//! every outbound frame goes through the session's write mutex; nothing
//! else may touch the write half. A session becomes addressable by account
//! id on the agent's first `PlaceBid`, when the id first appears on the
//! wire. Sessions whose sends fail are pruned, dead broadcast targets
//! after the loop.

use std::collections::HashMap;
use std::sync::Arc;

use gavel_primitives::AccountId;
use gavel_protocol::{write_frame, BidNotification, HouseReply, WireError};
use parking_lot::Mutex;
use tokio::net::tcp::OwnedWriteHalf;

/// The write half of one agent connection, serialized.
pub struct Outbound {
	peer: std::net::SocketAddr,
	writer: tokio::sync::Mutex<OwnedWriteHalf>,
}

impl Outbound {
	pub fn new(peer: std::net::SocketAddr, writer: OwnedWriteHalf) -> Arc<Self> {
		Arc::new(Self {
			peer,
			writer: tokio::sync::Mutex::new(writer),
		})
	}

	pub fn peer(&self) -> std::net::SocketAddr {
		self.peer
	}

	pub async fn send(&self, reply: &HouseReply) -> Result<(), WireError> {
		let mut writer = self.writer.lock().await;
		write_frame(&mut *writer, reply).await
	}
}

/// All sessions currently addressable by account id.
#[derive(Default)]
pub struct SessionRegistry {
	inner: Mutex<HashMap<AccountId, Arc<Outbound>>>,
}

impl SessionRegistry {
	pub fn attach(&self, account_id: AccountId, outbound: Arc<Outbound>) {
		if let Some(old) = self.inner.lock().insert(account_id, outbound) {
			log::debug!(
				target: "house",
				"agent {} reconnected, dropping session from {}",
				account_id, old.peer()
			);
		}
	}

	/// Remove the session, but only if it still is the given connection; a
	/// reconnect may already have replaced it.
	pub fn detach(&self, account_id: AccountId, outbound: &Arc<Outbound>) {
		let mut inner = self.inner.lock();
		if inner.get(&account_id).is_some_and(|s| Arc::ptr_eq(s, outbound)) {
			inner.remove(&account_id);
		}
	}

	/// Push a notification to one agent, pruning the session on failure.
	pub async fn notify(&self, account_id: AccountId, notice: BidNotification) {
		let session = self.inner.lock().get(&account_id).cloned();
		let Some(session) = session else {
			log::debug!(target: "house", "no session for agent {}, dropping notification", account_id);
			return;
		};
		if let Err(e) = session.send(&HouseReply::Notification(notice)).await {
			log::warn!(target: "house", "agent {} unreachable ({}), pruning session", account_id, e);
			self.detach(account_id, &session);
		}
	}

	/// Push the same notification to every connected agent; dead sessions
	/// are collected during the walk and removed afterwards.
	pub async fn broadcast(&self, notice: BidNotification) {
		let sessions: Vec<(AccountId, Arc<Outbound>)> =
			self.inner.lock().iter().map(|(id, s)| (*id, Arc::clone(s))).collect();

		let mut dead = Vec::new();
		for (account_id, session) in sessions {
			if let Err(e) = session.send(&HouseReply::Notification(notice.clone())).await {
				log::warn!(target: "house", "broadcast to agent {} failed: {}", account_id, e);
				dead.push((account_id, session));
			}
		}
		for (account_id, session) in dead {
			self.detach(account_id, &session);
		}
	}
}
