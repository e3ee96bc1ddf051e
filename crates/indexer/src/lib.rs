// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

//! Change-number indexing engine for the Chronik external changelog.
//!
//! A background worker merges the per-replica update streams of every
//! changelog-enabled domain into one total order and assigns each update a
//! gap-free change number, without ever emitting a record that a slow or
//! silent replica could later contradict. Publication is gated by the
//! per-domain medium consistency point: the boundary below which every
//! participating replica is known to have reported.
//!
//! ```no_run
//! use chronik_core::{Csn, DomainId, ReplicaId};
//! use chronik_indexer::{
//! 	ChangeNumberIndexer, IndexerConfig, MemoryChangeNumberIndex, MemoryReplicaSource,
//! 	RegistrySnapshot,
//! };
//!
//! let domain = DomainId::new("dc=example");
//! let mut indexer = ChangeNumberIndexer::new(
//! 	IndexerConfig::new([domain.clone()]),
//! 	MemoryReplicaSource::new(),
//! 	MemoryChangeNumberIndex::new(),
//! 	RegistrySnapshot::new(),
//! );
//! indexer.start();
//!
//! let handle = indexer.handle();
//! handle.publish_update(&domain, Csn::new(1, 0, ReplicaId(101)));
//!
//! indexer.initiate_shutdown();
//! indexer.join().unwrap();
//! ```

mod config;
mod cursor;
mod error;
mod indexer;
mod source;
mod store;
mod tracker;

pub use config::IndexerConfig;
pub use cursor::{CompositeCursor, CursorKey, CursorState, SequentialCursor};
pub use error::{IndexerError, Result};
pub use indexer::{ChangeNumberIndexer, IndexerHandle};
pub use source::{MemoryReplicaSource, ReplicaStreamSource, SourceCursor};
pub use store::{ChangeNumberIndexStore, MemoryChangeNumberIndex};
pub use tracker::{ConsistencyTracker, DomainSnapshot, RegistrySnapshot};
