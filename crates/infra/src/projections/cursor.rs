//! Per-stream cursors shared by all projections.
//!
//! A cursor records the last applied sequence number per (tenant, aggregate)
//! stream. Replays at or below the cursor are duplicates and must be
//! ignored; gaps indicate a broken delivery path and are surfaced as errors.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use stockline_core::{AggregateId, TenantId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("stored event has sequence_number=0")]
    ZeroSequence,

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    Gap { last: u64, found: u64 },
}

/// Outcome of a cursor check for an incoming envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorCheck {
    /// The envelope is the next one for its stream; apply it.
    Apply,
    /// Replay at or below the cursor; skip silently.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct CursorMap {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl CursorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check an incoming sequence number against the stream cursor.
    ///
    /// The first event of a stream may arrive at any positive sequence
    /// (stores start at 1, but a projection may attach mid-stream after a
    /// rebuild); after that, strict +1 increments are required.
    pub fn check(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<CursorCheck, CursorError> {
        if seq == 0 {
            return Err(CursorError::ZeroSequence);
        }

        let last = self
            .inner
            .read()
            .ok()
            .and_then(|m| m.get(&(tenant_id, aggregate_id)).copied())
            .unwrap_or(0);

        if seq <= last {
            return Ok(CursorCheck::Duplicate);
        }
        if last != 0 && seq != last + 1 {
            return Err(CursorError::Gap { last, found: seq });
        }

        Ok(CursorCheck::Apply)
    }

    /// Advance the stream cursor after a successful apply.
    pub fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut m) = self.inner.write() {
            m.insert((tenant_id, aggregate_id), seq);
        }
    }

    /// Reset all cursors (rebuild support).
    pub fn clear(&self) {
        if let Ok(mut m) = self.inner.write() {
            m.clear();
        }
    }
}
