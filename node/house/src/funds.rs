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

//! The real-bank implementation of the engine's funds seam.

use gavel_primitives::{AccountId, Balance};
use gavel_protocol::{BankCallError, BankClient};
use module_auction::{FundsError, FundsProvider};
use std::sync::Arc;

fn into_funds_error(e: BankCallError) -> FundsError {
	match e {
		BankCallError::Refused(msg) => FundsError::Refused(msg),
		BankCallError::Transport(e) => FundsError::Unreachable(e.to_string()),
	}
}

/// Routes the engine's hold/release calls over the house's bank connection.
pub struct BankFunds(pub Arc<BankClient>);

#[async_trait::async_trait]
impl FundsProvider for BankFunds {
	async fn block(&self, account: AccountId, amount: Balance) -> Result<(), FundsError> {
		self.0.block_funds(account, amount).await.map_err(into_funds_error)
	}

	async fn unblock(&self, account: AccountId, amount: Balance) -> Result<(), FundsError> {
		self.0.unblock_funds(account, amount).await.map_err(into_funds_error)
	}
}
