// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

use std::{collections::BTreeSet, time::Duration};

use chronik_core::DomainId;

/// Bound on one suspension of the indexer loop. A safety net against missed
/// signals; correctness never depends on it firing.
const DEFAULT_SUSPEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for the change number indexer worker.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
	/// Domains that participate in the external changelog. Other domains
	/// are tracked for consistency bookkeeping but never yield records.
	pub enabled_domains: BTreeSet<DomainId>,
	/// Upper bound on one wait of the suspended loop.
	pub suspend_timeout: Duration,
}

impl IndexerConfig {
	pub fn new(enabled_domains: impl IntoIterator<Item = DomainId>) -> Self {
		Self {
			enabled_domains: enabled_domains.into_iter().collect(),
			suspend_timeout: DEFAULT_SUSPEND_TIMEOUT,
		}
	}

	pub fn with_suspend_timeout(mut self, timeout: Duration) -> Self {
		self.suspend_timeout = timeout;
		self
	}
}

impl Default for IndexerConfig {
	fn default() -> Self {
		Self::new([])
	}
}
