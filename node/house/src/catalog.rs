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

//! The operator's initial catalog, loaded from a JSON file at start-up.
//!
//! ```json
//! [
//! 	{ "description": "Watch", "minimum_bid": 100 },
//! 	{ "description": "Painting", "minimum_bid": 250 }
//! ]
//! ```

use gavel_primitives::Balance;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
	pub description: String,
	pub minimum_bid: Balance,
}

#[derive(Debug, derive_more::Display)]
pub enum CatalogError {
	#[display(fmt = "cannot read catalog: {}", _0)]
	Io(std::io::Error),
	#[display(fmt = "malformed catalog: {}", _0)]
	Json(serde_json::Error),
}

impl std::error::Error for CatalogError {}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogItem>, CatalogError> {
	let raw = std::fs::read_to_string(path).map_err(CatalogError::Io)?;
	serde_json::from_str(&raw).map_err(CatalogError::Json)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn catalog_round_trips() {
		let raw = r#"[{ "description": "Watch", "minimum_bid": 100 }]"#;
		let items: Vec<CatalogItem> = serde_json::from_str(raw).unwrap();
		assert_eq!(items.len(), 1);
		assert_eq!(items[0].description, "Watch");
		assert_eq!(items[0].minimum_bid, 100);
	}
}
