// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Chronik

//! Ordering data model for the Chronik external changelog.
//!
//! This crate defines the change-sequence number ([`Csn`]), the per-domain
//! replica position map ([`ServerState`]), the serializable multi-domain
//! snapshot ([`MultiDomainState`], the "cookie" embedded in every changelog
//! record for resumable iteration) and the record types exchanged with the
//! replica stream and index stores. No threads, no I/O.

mod common;
mod csn;
mod record;
mod state;

pub use common::{ChangeNumber, DomainId, ParseError, ReplicaId};
pub use csn::Csn;
pub use record::{ChangeNumberIndexRecord, ChangeRecord};
pub use state::{MultiDomainState, ServerState};
