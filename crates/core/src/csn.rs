// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

use std::{
	fmt,
	fmt::{Display, Formatter},
	str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Visitor};

use crate::common::{ParseError, ReplicaId};

/// Change-sequence number: the globally comparable identity of one
/// replicated update.
///
/// Total order: timestamp first, then the per-timestamp sequence counter,
/// then the originating replica id as a final tiebreak. The order is stable
/// for the lifetime of the process.
///
/// The canonical string form is fixed-width lowercase hex
/// (`timestamp(16) sequence(8) replica(8)`), chosen so that lexicographic
/// order of rendered CSNs matches their value order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Csn {
	timestamp: u64,
	sequence: u32,
	replica: ReplicaId,
}

impl Csn {
	pub const fn new(timestamp: u64, sequence: u32, replica: ReplicaId) -> Self {
		Self {
			timestamp,
			sequence,
			replica,
		}
	}

	pub const fn timestamp(&self) -> u64 {
		self.timestamp
	}

	pub const fn sequence(&self) -> u32 {
		self.sequence
	}

	pub const fn replica(&self) -> ReplicaId {
		self.replica
	}

	/// The greatest CSN strictly older than this one for the same replica.
	///
	/// Decrements the sequence counter, wrapping into the previous
	/// timestamp at sequence zero. `None` at the origin.
	pub fn preceding(&self) -> Option<Csn> {
		if self.sequence > 0 {
			Some(Csn::new(self.timestamp, self.sequence - 1, self.replica))
		} else if self.timestamp > 0 {
			Some(Csn::new(self.timestamp - 1, u32::MAX, self.replica))
		} else {
			None
		}
	}
}

impl Display for Csn {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{:016x}{:08x}{:08x}", self.timestamp, self.sequence, self.replica.0)
	}
}

impl FromStr for Csn {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.len() != 32 || !s.is_ascii() {
			return Err(ParseError::new("csn", s));
		}
		let invalid = || ParseError::new("csn", s);
		let timestamp = u64::from_str_radix(&s[0..16], 16).map_err(|_| invalid())?;
		let sequence = u32::from_str_radix(&s[16..24], 16).map_err(|_| invalid())?;
		let replica = u32::from_str_radix(&s[24..32], 16).map_err(|_| invalid())?;
		Ok(Csn::new(timestamp, sequence, ReplicaId(replica)))
	}
}

impl Serialize for Csn {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for Csn {
	fn deserialize<D>(deserializer: D) -> Result<Csn, D::Error>
	where
		D: Deserializer<'de>,
	{
		struct CsnVisitor;

		impl Visitor<'_> for CsnVisitor {
			type Value = Csn;

			fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
				formatter.write_str("a 32 character hex encoded csn")
			}

			fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
			where
				E: serde::de::Error,
			{
				value.parse().map_err(E::custom)
			}
		}

		deserializer.deserialize_str(CsnVisitor)
	}
}
