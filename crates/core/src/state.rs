// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

use std::{
	collections::BTreeMap,
	fmt,
	fmt::{Display, Formatter},
	str::FromStr,
};

use crate::{
	common::{DomainId, ParseError, ReplicaId},
	csn::Csn,
};

/// Newest known position of every replica inside one domain.
///
/// Updates are monotonic: a CSN replaces the stored one for its replica only
/// when strictly newer; duplicates and out-of-order arrivals are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerState {
	newest: BTreeMap<ReplicaId, Csn>,
}

impl ServerState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record `csn` against its originating replica. Returns whether the
	/// stored position advanced.
	pub fn update(&mut self, csn: Csn) -> bool {
		match self.newest.get(&csn.replica()) {
			Some(current) if *current >= csn => false,
			_ => {
				self.newest.insert(csn.replica(), csn);
				true
			}
		}
	}

	pub fn newest(&self, replica: ReplicaId) -> Option<Csn> {
		self.newest.get(&replica).copied()
	}

	pub fn is_empty(&self) -> bool {
		self.newest.is_empty()
	}

	pub fn len(&self) -> usize {
		self.newest.len()
	}

	/// Positions in ascending replica id order.
	pub fn csns(&self) -> impl Iterator<Item = Csn> + '_ {
		self.newest.values().copied()
	}

	pub fn replicas(&self) -> impl Iterator<Item = ReplicaId> + '_ {
		self.newest.keys().copied()
	}
}

impl Display for ServerState {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut first = true;
		for csn in self.newest.values() {
			if !first {
				f.write_str(" ")?;
			}
			Display::fmt(csn, f)?;
			first = false;
		}
		Ok(())
	}
}

impl FromStr for ServerState {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut state = ServerState::new();
		for token in s.split_ascii_whitespace() {
			state.update(token.parse()?);
		}
		Ok(state)
	}
}

/// Snapshot of every known replica's newest position across all domains:
/// the "cookie" carried by every external changelog record.
///
/// The canonical rendering (`domain:csn csn;` entries, domains and replicas
/// in ascending order) is deterministic: two snapshots with equal content
/// always produce byte-equal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiDomainState {
	domains: BTreeMap<DomainId, ServerState>,
}

impl MultiDomainState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record `csn` against its replica within `domain`, monotonically.
	pub fn update(&mut self, domain: &DomainId, csn: Csn) -> bool {
		self.domains.entry(domain.clone()).or_default().update(csn)
	}

	pub fn newest(&self, domain: &DomainId, replica: ReplicaId) -> Option<Csn> {
		self.domains.get(domain).and_then(|state| state.newest(replica))
	}

	pub fn domain(&self, domain: &DomainId) -> Option<&ServerState> {
		self.domains.get(domain)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&DomainId, &ServerState)> {
		self.domains.iter()
	}

	pub fn is_empty(&self) -> bool {
		self.domains.values().all(ServerState::is_empty)
	}
}

impl Display for MultiDomainState {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		for (domain, state) in &self.domains {
			if state.is_empty() {
				continue;
			}
			write!(f, "{}:{};", domain, state)?;
		}
		Ok(())
	}
}

impl FromStr for MultiDomainState {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut snapshot = MultiDomainState::new();
		for entry in s.split(';') {
			if entry.is_empty() {
				continue;
			}
			let (domain, state) = entry.split_once(':').ok_or_else(|| ParseError::new("cookie entry", entry))?;
			let domain = DomainId::new(domain);
			let state: ServerState = state.parse()?;
			for csn in state.csns() {
				snapshot.update(&domain, csn);
			}
		}
		Ok(snapshot)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn csn(timestamp: u64, replica: u32) -> Csn {
		Csn::new(timestamp, 0, ReplicaId(replica))
	}

	#[test]
	fn test_update_keeps_newest_per_replica() {
		let mut state = ServerState::new();
		assert!(state.update(csn(5, 1)));
		assert!(!state.update(csn(3, 1)));
		assert!(!state.update(csn(5, 1)));
		assert!(state.update(csn(7, 1)));
		assert_eq!(state.newest(ReplicaId(1)), Some(csn(7, 1)));
	}

	#[test]
	fn test_replicas_tracked_independently() {
		let mut state = ServerState::new();
		state.update(csn(5, 1));
		state.update(csn(2, 2));
		assert_eq!(state.newest(ReplicaId(1)), Some(csn(5, 1)));
		assert_eq!(state.newest(ReplicaId(2)), Some(csn(2, 2)));
		assert_eq!(state.newest(ReplicaId(3)), None);
		assert_eq!(state.len(), 2);
	}

	#[test]
	fn test_cookie_rendering_is_deterministic() {
		let d1 = DomainId::new("dc=example");
		let d2 = DomainId::new("dc=world");

		let mut a = MultiDomainState::new();
		a.update(&d2, csn(2, 2));
		a.update(&d1, csn(1, 1));
		a.update(&d1, csn(3, 2));

		let mut b = MultiDomainState::new();
		b.update(&d1, csn(3, 2));
		b.update(&d1, csn(1, 1));
		b.update(&d2, csn(2, 2));

		assert_eq!(a.to_string(), b.to_string());
	}

	#[test]
	fn test_cookie_round_trip() {
		let d1 = DomainId::new("dc=example");
		let d2 = DomainId::new("dc=world");

		let mut cookie = MultiDomainState::new();
		cookie.update(&d1, csn(1, 101));
		cookie.update(&d1, csn(2, 102));
		cookie.update(&d2, csn(3, 201));

		let parsed: MultiDomainState = cookie.to_string().parse().unwrap();
		assert_eq!(parsed, cookie);
	}

	#[test]
	fn test_empty_cookie_renders_empty() {
		assert_eq!(MultiDomainState::new().to_string(), "");
		let parsed: MultiDomainState = "".parse().unwrap();
		assert!(parsed.is_empty());
	}

	#[test]
	fn test_cookie_rejects_malformed_entry() {
		assert!("not-a-cookie".parse::<MultiDomainState>().is_err());
	}
}
