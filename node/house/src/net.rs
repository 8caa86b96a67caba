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

//! Choosing the host address a house publishes in its bank listing.

use std::net::{IpAddr, SocketAddr, UdpSocket};

/// The address agents will be told to connect to. An explicit override
/// wins; a concrete bind address speaks for itself; a wildcard bind falls
/// back to the route probe, and failing that to loopback (single-machine
/// setups still work).
pub fn advertised_host(local: &SocketAddr, overridden: Option<&str>) -> String {
	if let Some(host) = overridden {
		return host.to_string();
	}
	if !local.ip().is_unspecified() {
		return local.ip().to_string();
	}
	match routable_source_addr() {
		Some(ip) => ip.to_string(),
		None => "127.0.0.1".to_string(),
	}
}

/// The source address the OS would route external traffic from. Connecting
/// a UDP socket sends no packets; it only resolves the route.
fn routable_source_addr() -> Option<IpAddr> {
	let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
	socket.connect(("8.8.8.8", 53)).ok()?;
	match socket.local_addr().ok()?.ip() {
		IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_link_local() && !v4.is_unspecified() => Some(IpAddr::V4(v4)),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn override_wins_over_everything() {
		let local: SocketAddr = "0.0.0.0:4100".parse().unwrap();
		assert_eq!(advertised_host(&local, Some("auctions.example.org")), "auctions.example.org");
	}

	#[test]
	fn concrete_bind_address_is_advertised_as_is() {
		let local: SocketAddr = "192.168.1.20:4100".parse().unwrap();
		assert_eq!(advertised_host(&local, None), "192.168.1.20");
	}

	#[test]
	fn wildcard_bind_never_advertises_the_wildcard() {
		let local: SocketAddr = "0.0.0.0:4100".parse().unwrap();
		let host = advertised_host(&local, None);
		assert_ne!(host, "0.0.0.0");
		assert!(!host.is_empty());
	}
}
