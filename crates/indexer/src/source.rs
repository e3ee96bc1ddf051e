// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

//! Replica stream source abstraction.
//!
//! The storage engine holding the per-replica update logs is an external
//! collaborator; the indexer only ever pulls from it through these traits.

use std::{
	collections::HashMap,
	sync::Arc,
};

use chronik_core::{ChangeRecord, Csn, DomainId, ReplicaId, ServerState};
use parking_lot::Mutex;

use crate::error::{IndexerError, Result};

/// Pull-based view over one replica's update stream.
pub trait SourceCursor: Send {
	/// The next record, or `None` when nothing is ready right now. A later
	/// call may produce again; returning `None` is not a terminal state.
	fn next(&mut self) -> Result<Option<ChangeRecord>>;
}

/// Storage-side access to the per-replica update logs of every domain.
pub trait ReplicaStreamSource: Send {
	/// Open a cursor over `(domain, replica)` positioned strictly after
	/// `after`; `None` starts from the beginning of the stream.
	fn cursor_from(&self, domain: &DomainId, replica: ReplicaId, after: Option<Csn>) -> Result<Box<dyn SourceCursor>>;

	/// Snapshot of the newest known position of every replica in `domain`
	/// at query time.
	fn newest_csns(&self, domain: &DomainId) -> ServerState;
}

#[derive(Debug, Clone)]
enum StreamEntry {
	Record(ChangeRecord),
	/// The stream yields nothing on this poll even though more entries may
	/// be queued behind; models a replica silent for a while.
	NotReady,
	/// The stream fails this poll with a transient read error.
	Unreadable(String),
}

#[derive(Default)]
struct MemorySourceInner {
	streams: HashMap<(DomainId, ReplicaId), Vec<StreamEntry>>,
	newest: HashMap<DomainId, ServerState>,
}

/// In-memory replica stream source.
///
/// Cursors are positional views: opening a new cursor never consumes
/// entries, so re-opening after a membership change replays anything not
/// yet filtered out by the `after` bound.
#[derive(Clone, Default)]
pub struct MemoryReplicaSource {
	inner: Arc<Mutex<MemorySourceInner>>,
}

impl MemoryReplicaSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queue a record on its replica's stream and advance the domain's
	/// newest-known snapshot, as a durable replica log would.
	pub fn push(&self, record: ChangeRecord) {
		let mut inner = self.inner.lock();
		inner.newest.entry(record.domain.clone()).or_default().update(record.csn);
		let key = (record.domain.clone(), record.csn.replica());
		inner.streams.entry(key).or_default().push(StreamEntry::Record(record));
	}

	/// Queue a not-ready blip: the next poll of this stream yields nothing.
	pub fn push_not_ready(&self, domain: &DomainId, replica: ReplicaId) {
		let mut inner = self.inner.lock();
		inner.streams.entry((domain.clone(), replica)).or_default().push(StreamEntry::NotReady);
	}

	/// Queue a transient read failure: the next poll of this stream errors.
	pub fn push_read_error(&self, domain: &DomainId, replica: ReplicaId, message: impl Into<String>) {
		let mut inner = self.inner.lock();
		inner.streams
			.entry((domain.clone(), replica))
			.or_default()
			.push(StreamEntry::Unreadable(message.into()));
	}
}

impl ReplicaStreamSource for MemoryReplicaSource {
	fn cursor_from(&self, domain: &DomainId, replica: ReplicaId, after: Option<Csn>) -> Result<Box<dyn SourceCursor>> {
		Ok(Box::new(MemoryCursor {
			inner: Arc::clone(&self.inner),
			domain: domain.clone(),
			replica,
			after,
			pos: 0,
		}))
	}

	fn newest_csns(&self, domain: &DomainId) -> ServerState {
		self.inner.lock().newest.get(domain).cloned().unwrap_or_default()
	}
}

struct MemoryCursor {
	inner: Arc<Mutex<MemorySourceInner>>,
	domain: DomainId,
	replica: ReplicaId,
	after: Option<Csn>,
	pos: usize,
}

impl SourceCursor for MemoryCursor {
	fn next(&mut self) -> Result<Option<ChangeRecord>> {
		let inner = self.inner.lock();
		let Some(entries) = inner.streams.get(&(self.domain.clone(), self.replica)) else {
			return Ok(None);
		};
		while self.pos < entries.len() {
			let entry = entries[self.pos].clone();
			self.pos += 1;
			match entry {
				StreamEntry::Record(record) => {
					if self.after.is_some_and(|after| record.csn <= after) {
						continue;
					}
					return Ok(Some(record));
				}
				StreamEntry::NotReady => return Ok(None),
				StreamEntry::Unreadable(message) => {
					return Err(IndexerError::Source {
						domain: self.domain.clone(),
						replica: self.replica,
						message,
					});
				}
			}
		}
		Ok(None)
	}
}
