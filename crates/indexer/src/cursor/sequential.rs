// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

use chronik_core::ChangeRecord;

use crate::{error::Result, source::SourceCursor};

/// Observable lifecycle of a [`SequentialCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
	/// Never polled.
	Uninitialized,
	/// Holds a fetched, not yet consumed record.
	HasRecord,
	/// The last poll found nothing; a later poll may produce again.
	Exhausted,
	/// The underlying source handle has been released.
	Closed,
}

/// Stateful one-record lookahead over a single replica stream.
///
/// `poll` is idempotent with respect to buffering: a record fetched but not
/// yet consumed is returned again on every poll until [`take`] removes it.
/// The cursor never skips.
///
/// [`take`]: SequentialCursor::take
pub struct SequentialCursor {
	source: Option<Box<dyn SourceCursor>>,
	current: Option<ChangeRecord>,
	state: CursorState,
}

impl SequentialCursor {
	pub fn new(source: Box<dyn SourceCursor>) -> Self {
		Self {
			source: Some(source),
			current: None,
			state: CursorState::Uninitialized,
		}
	}

	/// Ensure a record is buffered if the source can produce one, and
	/// return it without consuming.
	///
	/// A source error leaves the cursor exhausted for this round; the next
	/// poll retries the source.
	pub fn poll(&mut self) -> Result<Option<&ChangeRecord>> {
		if self.current.is_none() {
			let Some(source) = self.source.as_mut() else {
				return Ok(None);
			};
			match source.next() {
				Ok(record) => self.current = record,
				Err(err) => {
					self.state = CursorState::Exhausted;
					return Err(err);
				}
			}
		}
		self.state = if self.current.is_some() {
			CursorState::HasRecord
		} else {
			CursorState::Exhausted
		};
		Ok(self.current.as_ref())
	}

	/// Consume the buffered record, if any.
	pub fn take(&mut self) -> Option<ChangeRecord> {
		let record = self.current.take();
		if record.is_some() {
			self.state = CursorState::Exhausted;
		}
		record
	}

	pub fn state(&self) -> CursorState {
		self.state
	}

	/// Release the underlying source handle and drop any buffered record.
	pub fn close(&mut self) {
		self.source = None;
		self.current = None;
		self.state = CursorState::Closed;
	}
}
