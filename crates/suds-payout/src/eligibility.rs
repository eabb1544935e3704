//! Per-entry payout eligibility.
//!
//! A ledger entry can flow toward payment through exactly one channel at a
//! time. Batch creation and request completion both validate members with
//! the functions here, and the read-only eligibility view echoes the same
//! checks, so the write path and the warning shown to front-ends cannot
//! drift apart.

use suds_db::queries::ledger::LedgerRow;

/// Why a ledger entry cannot be paid out right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ineligibility {
    /// The entry is not in the `locked` state.
    NotLocked {
        /// The entry's actual status.
        status: String,
    },
    /// The entry already belongs to a payout batch.
    Batched {
        /// The holding batch.
        batch_id: i64,
    },
    /// The entry is claimed by a different payout request.
    OtherRequest {
        /// The holding request.
        request_id: i64,
    },
}

impl Ineligibility {
    /// Short human-readable description for read views.
    pub fn describe(&self) -> String {
        match self {
            Ineligibility::NotLocked { status } => format!("entry is {status}, not locked"),
            Ineligibility::Batched { batch_id } => {
                format!("entry already paid via batch {batch_id}")
            }
            Ineligibility::OtherRequest { request_id } => {
                format!("entry claimed by request {request_id}")
            }
        }
    }
}

/// Eligibility for inclusion in a payout batch: the entry must be `locked`
/// and carry no batch reference. Request references do not block batching;
/// claiming an entry into a batch supersedes them.
pub fn for_batch(entry: &LedgerRow) -> Option<Ineligibility> {
    if entry.status != "locked" {
        return Some(Ineligibility::NotLocked {
            status: entry.status.clone(),
        });
    }
    if let Some(batch_id) = entry.batch_id {
        return Some(Ineligibility::Batched { batch_id });
    }
    None
}

/// Eligibility for a payout request: everything [`for_batch`] requires,
/// plus the entry must not be claimed by a different request. At
/// submission time `request_id` is `None` (no claim may exist yet); at
/// completion time it is the completing request's own id.
pub fn for_request(entry: &LedgerRow, request_id: Option<i64>) -> Option<Ineligibility> {
    if let Some(reason) = for_batch(entry) {
        return Some(reason);
    }
    if let Some(held_by) = entry.request_id {
        if request_id != Some(held_by) {
            return Some(Ineligibility::OtherRequest { request_id: held_by });
        }
    }
    None
}
