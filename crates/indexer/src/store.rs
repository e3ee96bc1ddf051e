// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

//! Change number index store abstraction.

use std::sync::Arc;

use chronik_core::{ChangeNumber, ChangeNumberIndexRecord, Csn, DomainId};
use parking_lot::Mutex;

use crate::error::{IndexerError, Result};

/// Durable, append-only, sequence-numbered log of external changelog
/// records.
pub trait ChangeNumberIndexStore: Send {
	/// The most recently appended record, used to resume the running
	/// cookie across restarts.
	fn newest_record(&self) -> Result<Option<ChangeNumberIndexRecord>>;

	/// Append one record, assigning the next change number. The record is
	/// durable before this returns.
	fn append(&self, domain: DomainId, csn: Csn, previous_cookie: String) -> Result<ChangeNumber>;
}

#[derive(Default)]
struct MemoryIndexInner {
	records: Vec<ChangeNumberIndexRecord>,
	fail_next: Option<String>,
}

/// In-memory change number index. Change numbers start at 1.
#[derive(Clone, Default)]
pub struct MemoryChangeNumberIndex {
	inner: Arc<Mutex<MemoryIndexInner>>,
}

impl MemoryChangeNumberIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Everything appended so far, oldest first.
	pub fn records(&self) -> Vec<ChangeNumberIndexRecord> {
		self.inner.lock().records.clone()
	}

	pub fn len(&self) -> usize {
		self.inner.lock().records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.lock().records.is_empty()
	}

	/// Make the next `append` fail with `message`.
	pub fn inject_append_failure(&self, message: impl Into<String>) {
		self.inner.lock().fail_next = Some(message.into());
	}
}

impl ChangeNumberIndexStore for MemoryChangeNumberIndex {
	fn newest_record(&self) -> Result<Option<ChangeNumberIndexRecord>> {
		Ok(self.inner.lock().records.last().cloned())
	}

	fn append(&self, domain: DomainId, csn: Csn, previous_cookie: String) -> Result<ChangeNumber> {
		let mut inner = self.inner.lock();
		if let Some(message) = inner.fail_next.take() {
			return Err(IndexerError::Store(message));
		}
		let number = ChangeNumber(inner.records.len() as u64 + 1);
		inner.records.push(ChangeNumberIndexRecord::new(number, domain, csn, previous_cookie));
		Ok(number)
	}
}

#[cfg(test)]
mod tests {
	use chronik_core::ReplicaId;

	use super::*;

	fn csn(timestamp: u64, replica: u32) -> Csn {
		Csn::new(timestamp, 0, ReplicaId(replica))
	}

	#[test]
	fn test_append_assigns_increasing_change_numbers() {
		let domain = DomainId::new("dc=example");
		let store = MemoryChangeNumberIndex::new();
		assert_eq!(store.append(domain.clone(), csn(1, 101), String::new()).unwrap(), 1);
		assert_eq!(store.append(domain.clone(), csn(2, 101), String::new()).unwrap(), 2);
		assert_eq!(store.len(), 2);
	}

	#[test]
	fn test_newest_record() {
		let domain = DomainId::new("dc=example");
		let store = MemoryChangeNumberIndex::new();
		assert_eq!(store.newest_record().unwrap(), None);

		store.append(domain.clone(), csn(1, 101), String::new()).unwrap();
		store.append(domain.clone(), csn(2, 101), "cookie".to_string()).unwrap();

		let newest = store.newest_record().unwrap().unwrap();
		assert_eq!(newest.csn, csn(2, 101));
		assert_eq!(newest.change_number, 2);
		assert_eq!(newest.previous_cookie, "cookie");
	}

	#[test]
	fn test_injected_failure_fails_exactly_once() {
		let domain = DomainId::new("dc=example");
		let store = MemoryChangeNumberIndex::new();
		store.inject_append_failure("out of disk");

		assert!(store.append(domain.clone(), csn(1, 101), String::new()).is_err());
		assert!(store.append(domain, csn(1, 101), String::new()).is_ok());
	}
}
