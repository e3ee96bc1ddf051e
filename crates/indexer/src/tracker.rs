// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

//! Medium consistency tracking.
//!
//! For every domain the tracker remembers which replicas exist, the newest
//! CSN each one has reported (through a real update, a heartbeat or an
//! offline notice) and which replicas are currently flagged offline. From
//! that it derives the domain's medium consistency point: the CSN boundary
//! below which publication is provably safe, because every replica that
//! could still contradict it has already reported past it.

use std::collections::{BTreeMap, BTreeSet};

use chronik_core::{Csn, DomainId, ReplicaId, ServerState};

use crate::cursor::CursorKey;

/// Startup-only snapshot of the persisted registry: which replicas each
/// domain has ever seen, and which were offline (and as of which CSN) when
/// the process last ran.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
	pub domains: BTreeMap<DomainId, DomainSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct DomainSnapshot {
	pub replicas: BTreeSet<ReplicaId>,
	pub offline: BTreeMap<ReplicaId, Csn>,
}

impl RegistrySnapshot {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_replica(&mut self, domain: &DomainId, replica: ReplicaId) {
		self.domains.entry(domain.clone()).or_default().replicas.insert(replica);
	}

	/// Record that `csn`'s replica was offline as of `csn`.
	pub fn add_offline_replica(&mut self, domain: &DomainId, csn: Csn) {
		let entry = self.domains.entry(domain.clone()).or_default();
		entry.replicas.insert(csn.replica());
		entry.offline.insert(csn.replica(), csn);
	}
}

/// Per-domain registry entry.
#[derive(Debug, Default)]
struct DomainEntry {
	/// Replicas ever seen in this domain.
	replicas: BTreeSet<ReplicaId>,
	/// Newest CSN reported per replica, from updates, heartbeats and
	/// offline notices alike.
	newest: ServerState,
	/// Live offline markers. A replica with a live marker is excluded from
	/// the consistency computation until a strictly newer update or
	/// heartbeat supersedes the marker.
	offline: BTreeMap<ReplicaId, Csn>,
	/// Whether the domain participates in the external changelog.
	enabled: bool,
}

impl DomainEntry {
	fn record_alive(&mut self, csn: Csn) {
		let replica = csn.replica();
		self.replicas.insert(replica);
		self.newest.update(csn);
		if self.offline.get(&replica).is_some_and(|marker| *marker < csn) {
			self.offline.remove(&replica);
		}
	}

	fn record_offline(&mut self, csn: Csn) {
		let replica = csn.replica();
		self.replicas.insert(replica);
		self.newest.update(csn);
		match self.offline.get(&replica) {
			Some(marker) if *marker >= csn => {}
			_ => {
				self.offline.insert(replica, csn);
			}
		}
	}

	/// Minimum newest-known CSN over the non-excluded replicas, or `None`
	/// when the domain cannot advance: no replicas, every replica offline,
	/// or some replica that has never reported. Absence of evidence is not
	/// evidence of absence.
	fn medium_consistency_point(&self) -> Option<Csn> {
		let mut oldest: Option<Csn> = None;
		for replica in &self.replicas {
			if self.offline.contains_key(replica) {
				continue;
			}
			let newest = self.newest.newest(*replica)?;
			oldest = Some(match oldest {
				Some(current) if current <= newest => current,
				_ => newest,
			});
		}
		oldest
	}
}

/// Tracks every domain's replica positions and derives the per-domain
/// medium consistency point.
#[derive(Debug, Default)]
pub struct ConsistencyTracker {
	domains: BTreeMap<DomainId, DomainEntry>,
}

impl ConsistencyTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Absorb the persisted registry snapshot.
	pub fn seed_registry(&mut self, registry: RegistrySnapshot) {
		for (domain, snapshot) in registry.domains {
			let entry = self.domains.entry(domain).or_default();
			entry.replicas.extend(snapshot.replicas);
			for (_, csn) in snapshot.offline {
				entry.record_offline(csn);
			}
		}
	}

	/// A real update was observed for `csn`'s replica.
	pub fn record_update(&mut self, domain: &DomainId, csn: Csn) {
		self.entry(domain).record_alive(csn);
	}

	/// The replica is alive as of `csn` with no accompanying data change.
	pub fn record_heartbeat(&mut self, domain: &DomainId, csn: Csn) {
		self.entry(domain).record_alive(csn);
	}

	/// No further updates are expected from `csn`'s replica past `csn`
	/// until it reconnects.
	pub fn record_offline(&mut self, domain: &DomainId, csn: Csn) {
		self.entry(domain).record_offline(csn);
	}

	pub fn add_replica(&mut self, domain: &DomainId, replica: ReplicaId) {
		self.entry(domain).replicas.insert(replica);
	}

	pub fn set_enabled(&mut self, domain: &DomainId, enabled: bool) {
		self.entry(domain).enabled = enabled;
	}

	pub fn is_enabled(&self, domain: &DomainId) -> bool {
		self.domains.get(domain).is_some_and(|entry| entry.enabled)
	}

	pub fn medium_consistency_point(&self, domain: &DomainId) -> Option<Csn> {
		self.domains.get(domain).and_then(DomainEntry::medium_consistency_point)
	}

	pub fn domain_ids(&self) -> Vec<DomainId> {
		self.domains.keys().cloned().collect()
	}

	/// Cursor membership for the changelog-enabled domains: one key per
	/// known replica per enabled domain.
	pub fn enabled_members(&self) -> BTreeSet<CursorKey> {
		let mut members = BTreeSet::new();
		for (domain, entry) in &self.domains {
			if !entry.enabled {
				continue;
			}
			for replica in &entry.replicas {
				members.insert(CursorKey::new(domain.clone(), *replica));
			}
		}
		members
	}

	/// Defined consistency points of the changelog-enabled domains.
	pub fn enabled_consistency_points(&self) -> BTreeMap<DomainId, Csn> {
		self.domains
			.iter()
			.filter(|(_, entry)| entry.enabled)
			.filter_map(|(domain, entry)| entry.medium_consistency_point().map(|csn| (domain.clone(), csn)))
			.collect()
	}

	fn entry(&mut self, domain: &DomainId) -> &mut DomainEntry {
		self.domains.entry(domain.clone()).or_default()
	}
}
