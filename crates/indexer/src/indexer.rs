// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

//! The change number indexer worker.
//!
//! One dedicated background thread drains eligible records from the
//! composite cursor in global CSN order, appends them to the change number
//! index and maintains the running cookie. Producer threads (one per live
//! replica connection, typically) report updates, heartbeats, offline
//! notices and membership changes through a cloneable [`IndexerHandle`];
//! they briefly take the single coordination lock, mutate shared state,
//! signal the worker and return. They never block on indexing progress.
//!
//! The worker suspends only when nothing is eligible, with a bounded
//! timeout as a safety net against missed-signal races. The dirty flag is
//! written by producers and checked by the worker under the same lock, so
//! there is no lost-wakeup window between deciding to suspend and
//! registering to be woken.

use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
	thread::{self, JoinHandle},
	time::{Duration, Instant},
};

use chronik_core::{Csn, DomainId, MultiDomainState, ParseError, ReplicaId};
use parking_lot::{Condvar, Mutex};
use tracing::{error, info, trace};

use crate::{
	config::IndexerConfig,
	cursor::{CompositeCursor, CursorKey, SequentialCursor},
	error::{IndexerError, Result},
	source::ReplicaStreamSource,
	store::ChangeNumberIndexStore,
	tracker::{ConsistencyTracker, RegistrySnapshot},
};

struct IndexerState {
	tracker: ConsistencyTracker,
	/// Positions already published to the changelog; serialized as the
	/// `previous_cookie` of every appended record. Advanced only by
	/// emission, never by arrival, so it can never claim a position whose
	/// record is still buffered.
	cookie: MultiDomainState,
	/// A producer signalled since the worker last snapshotted.
	dirty: bool,
	/// The worker has drained everything eligible and is suspended.
	idle: bool,
	shutdown: bool,
	stopped: bool,
}

struct Shared {
	state: Mutex<IndexerState>,
	/// Signalled by producers: something changed, re-evaluate.
	wakeup: Condvar,
	/// Signalled by the worker after each full drain cycle.
	quiesce: Condvar,
}

/// Everything the worker needs for one iteration, snapshotted under the
/// lock. Consistency points only ever advance, so acting on a slightly
/// stale snapshot is conservative, never unsafe.
struct Plan {
	members: BTreeSet<CursorKey>,
	consistency: BTreeMap<DomainId, Csn>,
	positions: MultiDomainState,
}

/// Background worker assigning change numbers to replicated updates.
///
/// Construct with the collaborator handles and the persisted registry
/// snapshot, then [`start`]. Producers interact through [`handle`]; the
/// owner shuts down with [`initiate_shutdown`] followed by [`join`].
///
/// [`start`]: ChangeNumberIndexer::start
/// [`handle`]: ChangeNumberIndexer::handle
/// [`initiate_shutdown`]: ChangeNumberIndexer::initiate_shutdown
/// [`join`]: ChangeNumberIndexer::join
pub struct ChangeNumberIndexer {
	config: IndexerConfig,
	shared: Arc<Shared>,
	source: Option<Box<dyn ReplicaStreamSource>>,
	store: Option<Box<dyn ChangeNumberIndexStore>>,
	worker: Option<JoinHandle<Result<()>>>,
}

impl ChangeNumberIndexer {
	pub fn new(
		config: IndexerConfig,
		source: impl ReplicaStreamSource + 'static,
		store: impl ChangeNumberIndexStore + 'static,
		registry: RegistrySnapshot,
	) -> Self {
		let mut tracker = ConsistencyTracker::new();
		tracker.seed_registry(registry);
		for domain in &config.enabled_domains {
			tracker.set_enabled(domain, true);
		}

		Self {
			config,
			shared: Arc::new(Shared {
				state: Mutex::new(IndexerState {
					tracker,
					cookie: MultiDomainState::new(),
					dirty: false,
					idle: false,
					shutdown: false,
					stopped: false,
				}),
				wakeup: Condvar::new(),
				quiesce: Condvar::new(),
			}),
			source: Some(Box::new(source)),
			store: Some(Box::new(store)),
			worker: None,
		}
	}

	/// Producer-facing handle; cheap to clone, safe to use from any
	/// thread.
	pub fn handle(&self) -> IndexerHandle {
		IndexerHandle {
			shared: Arc::clone(&self.shared),
		}
	}

	/// Spawn the worker thread.
	pub fn start(&mut self) {
		assert!(self.worker.is_none(), "start() can only be called once");

		let source = self.source.take().expect("source already consumed");
		let store = self.store.take().expect("store already consumed");
		let shared = Arc::clone(&self.shared);
		let suspend_timeout = self.config.suspend_timeout;

		let worker = thread::Builder::new()
			.name("change-number-indexer".to_string())
			.spawn(move || {
				let result = run(&shared, source.as_ref(), store.as_ref(), suspend_timeout);
				if let Err(err) = &result {
					error!(error = %err, "change number indexer halted");
				}
				let mut state = shared.state.lock();
				state.stopped = true;
				state.idle = false;
				drop(state);
				shared.wakeup.notify_all();
				shared.quiesce.notify_all();
				result
			})
			.expect("failed to spawn change number indexer");

		self.worker = Some(worker);
	}

	/// Request shutdown. One-way and idempotent; returns immediately. The
	/// worker observes the request promptly even while suspended.
	pub fn initiate_shutdown(&self) {
		let mut state = self.shared.state.lock();
		state.shutdown = true;
		drop(state);
		self.shared.wakeup.notify_all();
		self.shared.quiesce.notify_all();
	}

	/// Wait for the worker to stop and surface its terminal result. No
	/// record is appended after this returns.
	pub fn join(&mut self) -> Result<()> {
		match self.worker.take() {
			Some(worker) => worker.join().map_err(|_| IndexerError::Worker)?,
			None => Ok(()),
		}
	}

	pub fn is_running(&self) -> bool {
		self.worker.is_some() && !self.shared.state.lock().stopped
	}
}

impl Drop for ChangeNumberIndexer {
	fn drop(&mut self) {
		self.initiate_shutdown();
		if let Some(worker) = self.worker.take() {
			let _ = worker.join();
		}
	}
}

/// Producer-side access to the running indexer.
///
/// Callers persist an update to the replica log *before* publishing its
/// position here; the worker pulls the payload through its own cursor.
#[derive(Clone)]
pub struct IndexerHandle {
	shared: Arc<Shared>,
}

impl IndexerHandle {
	/// A real update with `csn` arrived for its replica in `domain`.
	pub fn publish_update(&self, domain: &DomainId, csn: Csn) {
		let mut state = self.shared.state.lock();
		state.tracker.record_update(domain, csn);
		self.signal(&mut state);
	}

	/// The replica is alive as of `csn`; no data change accompanies it.
	pub fn publish_heartbeat(&self, domain: &DomainId, csn: Csn) {
		let mut state = self.shared.state.lock();
		state.tracker.record_heartbeat(domain, csn);
		self.signal(&mut state);
	}

	/// The replica will produce nothing past `csn` until it reconnects.
	pub fn publish_offline(&self, domain: &DomainId, csn: Csn) {
		let mut state = self.shared.state.lock();
		state.tracker.record_offline(domain, csn);
		self.signal(&mut state);
	}

	/// A replica joined `domain`; its cursor opens on the next iteration.
	pub fn add_replica(&self, domain: &DomainId, replica: ReplicaId) {
		let mut state = self.shared.state.lock();
		state.tracker.add_replica(domain, replica);
		self.signal(&mut state);
	}

	/// Let `domain` participate in the external changelog.
	pub fn enable_domain(&self, domain: &DomainId) {
		let mut state = self.shared.state.lock();
		state.tracker.set_enabled(domain, true);
		self.signal(&mut state);
	}

	/// Stop `domain` from yielding changelog records. Its replicas remain
	/// tracked for consistency bookkeeping.
	pub fn disable_domain(&self, domain: &DomainId) {
		let mut state = self.shared.state.lock();
		state.tracker.set_enabled(domain, false);
		self.signal(&mut state);
	}

	/// Request shutdown; same contract as
	/// [`ChangeNumberIndexer::initiate_shutdown`].
	pub fn initiate_shutdown(&self) {
		let mut state = self.shared.state.lock();
		state.shutdown = true;
		drop(state);
		self.shared.wakeup.notify_all();
		self.shared.quiesce.notify_all();
	}

	/// Block until the worker has drained everything currently eligible
	/// and suspended, or until `timeout`. Returns `false` on timeout or if
	/// the worker has stopped.
	pub fn wait_until_quiesced(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut state = self.shared.state.lock();
		loop {
			if state.stopped {
				return false;
			}
			if state.idle && !state.dirty {
				return true;
			}
			let now = Instant::now();
			if now >= deadline {
				return false;
			}
			let _ = self.shared.quiesce.wait_for(&mut state, deadline - now);
		}
	}

	fn signal(&self, state: &mut IndexerState) {
		state.dirty = true;
		self.shared.wakeup.notify_one();
	}
}

fn run(
	shared: &Shared,
	source: &dyn ReplicaStreamSource,
	store: &dyn ChangeNumberIndexStore,
	suspend_timeout: Duration,
) -> Result<()> {
	seed(shared, source, store)?;
	info!("change number indexer started");

	let mut cursors = CompositeCursor::new();
	loop {
		let plan = {
			let mut state = shared.state.lock();
			if state.shutdown {
				break;
			}
			state.dirty = false;
			Plan {
				members: state.tracker.enabled_members(),
				consistency: state.tracker.enabled_consistency_points(),
				positions: state.cookie.clone(),
			}
		};

		cursors.sync_members(&plan.members, |key| {
			let after = plan.positions.newest(&key.domain, key.replica);
			Ok(SequentialCursor::new(source.cursor_from(&key.domain, key.replica, after)?))
		});

		if advance_once(&plan, &mut cursors, shared, store)? {
			continue;
		}

		let mut state = shared.state.lock();
		if state.shutdown {
			break;
		}
		if !state.dirty {
			state.idle = true;
			shared.quiesce.notify_all();
			let _ = shared.wakeup.wait_for(&mut state, suspend_timeout);
			state.idle = false;
		}
	}

	info!("change number indexer stopped");
	Ok(())
}

/// Seed the tracker and running cookie from what survived the last run:
/// the replica logs' newest positions and the newest index record.
fn seed(shared: &Shared, source: &dyn ReplicaStreamSource, store: &dyn ChangeNumberIndexStore) -> Result<()> {
	let mut state = shared.state.lock();

	for domain in state.tracker.domain_ids() {
		for csn in source.newest_csns(&domain).csns() {
			state.tracker.record_update(&domain, csn);
		}
	}

	if let Some(record) = store.newest_record()? {
		let mut cookie: MultiDomainState = record
			.previous_cookie
			.parse()
			.map_err(|err: ParseError| IndexerError::Cookie(err.to_string()))?;
		cookie.update(&record.domain, record.csn);
		// cookie positions are positive evidence of replica progress
		for (domain, positions) in cookie.iter() {
			for csn in positions.csns() {
				state.tracker.record_update(domain, csn);
			}
		}
		state.cookie = cookie;
	}

	Ok(())
}

/// Publish at most one record: the oldest buffered candidate that is at or
/// below its domain's medium consistency point. Returns whether any
/// candidate was consumed.
fn advance_once(
	plan: &Plan,
	cursors: &mut CompositeCursor,
	shared: &Shared,
	store: &dyn ChangeNumberIndexStore,
) -> Result<bool> {
	for (key, csn) in cursors.candidates() {
		// at or before the resume position: indexed before a restart and
		// replayed by the source
		if plan.positions.newest(&key.domain, key.replica).is_some_and(|position| csn <= position) {
			cursors.take(&key);
			trace!(key = %key, csn = %csn, "dropping already indexed record");
			return Ok(true);
		}

		let Some(limit) = plan.consistency.get(&key.domain) else {
			// nothing is provably safe in this domain yet
			continue;
		};
		if csn > *limit {
			continue;
		}

		let Some(record) = cursors.take(&key) else {
			continue;
		};
		let previous_cookie = shared.state.lock().cookie.to_string();
		let number = store.append(record.domain.clone(), record.csn, previous_cookie)?;
		shared.state.lock().cookie.update(&record.domain, record.csn);
		trace!(key = %key, csn = %record.csn, change_number = %number, "appended changelog record");
		return Ok(true);
	}
	Ok(false)
}
