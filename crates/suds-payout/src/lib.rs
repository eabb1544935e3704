//! # suds-payout
//!
//! Payout lifecycle for locked commission statements: administrator-created
//! payout batches and referrer-initiated payout requests. Every mutation
//! validates member eligibility inside its own transaction and writes
//! nothing on failure.
//!
//! ## Modules
//!
//! - [`eligibility`] — shared per-entry eligibility checks
//! - [`batch`] — create and void payout batches
//! - [`request`] — submit, decide, and complete payout requests

pub mod batch;
pub mod eligibility;
pub mod request;

/// Error types for payout operations.
#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    /// The addressed entry, batch, or request does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The caller may not perform this operation on this resource.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The resource's current status does not permit the operation.
    #[error("{what} is {status}: {action} not permitted")]
    InvalidState {
        /// Human-readable resource name, e.g. `ledger entry 7`.
        what: String,
        /// The resource's actual current status.
        status: String,
        /// The attempted operation.
        action: &'static str,
    },

    /// The ledger entry is already committed to a payout batch.
    #[error("ledger entry {ledger_id} already belongs to payout batch {batch_id}")]
    AlreadyBatched {
        /// Entry id.
        ledger_id: i64,
        /// The batch already holding the entry.
        batch_id: i64,
    },

    /// The ledger entry is claimed by another in-flight payout request.
    #[error("ledger entry {ledger_id} is claimed by payout request {request_id}")]
    AlreadyRequested {
        /// Entry id.
        ledger_id: i64,
        /// The request already holding the entry.
        request_id: i64,
    },

    /// No ledger entries were supplied.
    #[error("no ledger entries selected")]
    EmptySelection,

    /// Deny was attempted without a reason.
    #[error("a denial reason is required")]
    MissingReason,

    /// The batch's external transfer is mid-flight.
    #[error("payout batch {0} has an external transfer in progress")]
    TransferInProgress(i64),

    /// Underlying database failure.
    #[error(transparent)]
    Db(#[from] suds_db::DbError),
}

/// Convenience result type for payout operations.
pub type Result<T> = std::result::Result<T, PayoutError>;
