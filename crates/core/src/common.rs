// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

use std::{
	fmt,
	fmt::{Display, Formatter},
	num::ParseIntError,
	str::FromStr,
	sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A token could not be parsed into its canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {what}: {input:?}")]
pub struct ParseError {
	what: &'static str,
	input: String,
}

impl ParseError {
	pub(crate) fn new(what: &'static str, input: impl Into<String>) -> Self {
		Self {
			what,
			input: input.into(),
		}
	}
}

/// Identifier of one independent data-change source within a domain.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaId(pub u32);

impl FromStr for ReplicaId {
	type Err = ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(ReplicaId(u32::from_str(s)?))
	}
}

impl Display for ReplicaId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		Display::fmt(&self.0, f)
	}
}

impl From<u32> for ReplicaId {
	fn from(value: u32) -> Self {
		Self(value)
	}
}

/// Identifier of one replicated data partition with its own replica set and
/// consistency computation.
///
/// The label is opaque to the indexer but appears inside the canonical cookie
/// string, so it must not contain `:`, `;` or whitespace.
#[derive(Debug, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId(Arc<str>);

impl DomainId {
	pub fn new(label: impl Into<Arc<str>>) -> Self {
		Self(label.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Display for DomainId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for DomainId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for DomainId {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

/// Position of one record in the external changelog. Assigned by the index
/// store at append time, monotonically increasing and gap-free.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeNumber(pub u64);

impl Display for ChangeNumber {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		Display::fmt(&self.0, f)
	}
}

impl PartialEq<u64> for ChangeNumber {
	fn eq(&self, other: &u64) -> bool {
		self.0.eq(other)
	}
}

impl From<u64> for ChangeNumber {
	fn from(value: u64) -> Self {
		Self(value)
	}
}

impl From<ChangeNumber> for u64 {
	fn from(value: ChangeNumber) -> Self {
		value.0
	}
}
