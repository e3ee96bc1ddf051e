// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

//! Indexer error types.
//!
//! Only two conditions are fatal for the worker: an index store failure
//! (continuing would duplicate or silently skip change numbers) and an
//! unparseable persisted cookie (the resume point is corrupt). Replica
//! stream failures are transient and retried on the next poll cycle.

use chronik_core::{DomainId, ReplicaId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexerError {
	/// The change number index store rejected or failed an operation.
	#[error("change number index store failure: {0}")]
	Store(String),

	/// A replica stream could not be read. Retried by re-polling.
	#[error("replica stream {domain}/{replica} unreadable: {message}")]
	Source {
		domain: DomainId,
		replica: ReplicaId,
		message: String,
	},

	/// The persisted resume cookie could not be parsed.
	#[error("persisted cookie is corrupt: {0}")]
	Cookie(String),

	/// The worker thread terminated abnormally.
	#[error("indexer worker terminated abnormally")]
	Worker,
}

pub type Result<T> = std::result::Result<T, IndexerError>;
