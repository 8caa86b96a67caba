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

//! Length-prefixed SCALE framing over async byte streams.

use codec::{Decode, Encode};
use core::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame's payload. A peer announcing more is
/// treated as framing corruption and disconnected.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Read timeout applied by clients around each request/reply round-trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport and codec failures on a framed connection.
///
/// `Codec` means the frame arrived intact but did not decode; the stream is
/// still correctly delimited, so servers answer it with a generic failure
/// reply instead of disconnecting. Every other variant poisons the
/// connection.
#[derive(Debug, derive_more::Display)]
pub enum WireError {
	#[display(fmt = "i/o error: {}", _0)]
	Io(std::io::Error),
	#[display(fmt = "frame of {} bytes exceeds the {} byte limit", _0, MAX_FRAME_LEN)]
	FrameTooLarge(usize),
	#[display(fmt = "undecodable frame: {}", _0)]
	Codec(codec::Error),
	#[display(fmt = "timed out waiting for a reply")]
	Timeout,
	#[display(fmt = "peer sent a reply of the wrong kind")]
	UnexpectedReply,
}

impl std::error::Error for WireError {}

impl From<std::io::Error> for WireError {
	fn from(e: std::io::Error) -> Self {
		WireError::Io(e)
	}
}

/// Encode `msg` and write it as a single frame.
pub async fn write_frame<T: Encode, W: AsyncWrite + Unpin>(io: &mut W, msg: &T) -> Result<(), WireError> {
	let payload = msg.encode();
	if payload.len() > MAX_FRAME_LEN {
		return Err(WireError::FrameTooLarge(payload.len()));
	}
	io.write_all(&(payload.len() as u32).to_le_bytes()).await?;
	io.write_all(&payload).await?;
	io.flush().await?;
	Ok(())
}

/// Read one frame and decode it as `T`.
pub async fn read_frame<T: Decode, R: AsyncRead + Unpin>(io: &mut R) -> Result<T, WireError> {
	let mut len_bytes = [0u8; 4];
	io.read_exact(&mut len_bytes).await?;
	let len = u32::from_le_bytes(len_bytes) as usize;
	if len > MAX_FRAME_LEN {
		return Err(WireError::FrameTooLarge(len));
	}
	let mut payload = vec![0u8; len];
	io.read_exact(&mut payload).await?;
	T::decode(&mut payload.as_slice()).map_err(WireError::Codec)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{BankReply, BankRequest};

	#[tokio::test]
	async fn frames_survive_the_stream() {
		let (mut a, mut b) = tokio::io::duplex(1024);
		let req = BankRequest::BlockFunds {
			account_id: 1000,
			amount: 150,
		};
		write_frame(&mut a, &req).await.unwrap();
		write_frame(&mut a, &BankRequest::GetAuctionHouses).await.unwrap();

		assert_eq!(read_frame::<BankRequest, _>(&mut b).await.unwrap(), req);
		assert_eq!(
			read_frame::<BankRequest, _>(&mut b).await.unwrap(),
			BankRequest::GetAuctionHouses
		);
	}

	#[tokio::test]
	async fn garbage_payload_is_a_codec_error() {
		let (mut a, mut b) = tokio::io::duplex(1024);
		// A well-delimited frame whose payload is not a valid message.
		a.write_all(&4u32.to_le_bytes()).await.unwrap();
		a.write_all(&[0xff, 0xff, 0xff, 0xff]).await.unwrap();

		match read_frame::<BankReply, _>(&mut b).await {
			Err(WireError::Codec(_)) => {}
			other => panic!("expected codec error, got {:?}", other.map(|_| ())),
		}
	}

	#[tokio::test]
	async fn oversized_frame_is_rejected_before_allocation() {
		let (mut a, mut b) = tokio::io::duplex(64);
		a.write_all(&(u32::MAX).to_le_bytes()).await.unwrap();

		match read_frame::<BankReply, _>(&mut b).await {
			Err(WireError::FrameTooLarge(_)) => {}
			other => panic!("expected frame-too-large, got {:?}", other.map(|_| ())),
		}
	}
}
