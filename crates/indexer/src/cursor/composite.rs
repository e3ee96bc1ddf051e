// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

use std::collections::{BTreeMap, BTreeSet};

use chronik_core::{ChangeRecord, Csn};
use tracing::debug;

use crate::{
	cursor::{CursorKey, SequentialCursor},
	error::Result,
};

/// Oldest-CSN-first merge over a dynamic set of [`SequentialCursor`]s, one
/// per active replica per domain.
///
/// Membership changes reconcile in place: a member that already exists is
/// never reopened or replaced, so its cached lookahead survives replicas
/// joining and domains being enabled. There is no rebuild path that could
/// alias a fresh cursor over a key that still buffers a record.
#[derive(Default)]
pub struct CompositeCursor {
	members: BTreeMap<CursorKey, SequentialCursor>,
}

impl CompositeCursor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Reconcile the member set against `desired`. Missing members are
	/// opened through `open`; stale members are closed and removed;
	/// everything else is left untouched. An open failure is transient:
	/// logged, and retried on the next reconcile.
	pub fn sync_members<F>(&mut self, desired: &BTreeSet<CursorKey>, mut open: F)
	where
		F: FnMut(&CursorKey) -> Result<SequentialCursor>,
	{
		let stale: Vec<CursorKey> = self.members.keys().filter(|key| !desired.contains(*key)).cloned().collect();
		for key in stale {
			if let Some(mut cursor) = self.members.remove(&key) {
				cursor.close();
				debug!(key = %key, "removed replica stream cursor");
			}
		}

		for key in desired {
			if self.members.contains_key(key) {
				continue;
			}
			match open(key) {
				Ok(cursor) => {
					debug!(key = %key, "opened replica stream cursor");
					self.members.insert(key.clone(), cursor);
				}
				Err(err) => {
					debug!(key = %key, error = %err, "replica stream cursor open failed, will retry");
				}
			}
		}
	}

	/// Poll every member and list the buffered candidates, oldest CSN
	/// first. Transient source errors are logged and the member skipped
	/// for this round.
	pub fn candidates(&mut self) -> Vec<(CursorKey, Csn)> {
		let mut found = Vec::new();
		for (key, cursor) in self.members.iter_mut() {
			match cursor.poll() {
				Ok(Some(record)) => found.push((key.clone(), record.csn)),
				Ok(None) => {}
				Err(err) => {
					debug!(key = %key, error = %err, "replica stream unreadable, retrying on next poll");
				}
			}
		}
		found.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
		found
	}

	/// Consume the buffered record of `key`.
	pub fn take(&mut self, key: &CursorKey) -> Option<ChangeRecord> {
		self.members.get_mut(key).and_then(SequentialCursor::take)
	}

	#[cfg(test)]
	fn member_keys(&self) -> Vec<CursorKey> {
		self.members.keys().cloned().collect()
	}
}
