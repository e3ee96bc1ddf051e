// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

use serde::{Deserialize, Serialize};

use crate::{
	common::{ChangeNumber, DomainId},
	csn::Csn,
};

/// One replicated update pulled from a replica's stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
	pub domain: DomainId,
	pub csn: Csn,
	/// Opaque operation payload; carried through, never interpreted.
	pub payload: Vec<u8>,
}

impl ChangeRecord {
	pub fn new(domain: DomainId, csn: Csn) -> Self {
		Self {
			domain,
			csn,
			payload: Vec::new(),
		}
	}

	pub fn with_payload(domain: DomainId, csn: Csn, payload: Vec<u8>) -> Self {
		Self {
			domain,
			csn,
			payload,
		}
	}
}

/// One row of the external changelog index. Append-only and immutable once
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNumberIndexRecord {
	/// Assigned by the index store at insertion time.
	pub change_number: ChangeNumber,
	pub domain: DomainId,
	pub csn: Csn,
	/// Canonical multi-domain snapshot as of just before this record was
	/// applied; lets a client resume iteration at this exact point.
	pub previous_cookie: String,
}

impl ChangeNumberIndexRecord {
	pub fn new(change_number: ChangeNumber, domain: DomainId, csn: Csn, previous_cookie: String) -> Self {
		Self {
			change_number,
			domain,
			csn,
			previous_cookie,
		}
	}
}
