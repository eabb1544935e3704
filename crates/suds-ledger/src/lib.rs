//! # suds-ledger
//!
//! Commission ledger core: period boundaries, commission math, the
//! per-period aggregator, and the ledger entry state machine
//! (`open -> locked -> paid`, with the admin-only `paid -> locked`
//! correction).
//!
//! ## Modules
//!
//! - [`period`] — accounting period boundary calculator
//! - [`commission`] — fixed-rate commission arithmetic
//! - [`aggregate`] — idempotent per-period ledger upsert
//! - [`state`] — entry lifecycle transitions

pub mod aggregate;
pub mod commission;
pub mod period;
pub mod state;

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The addressed ledger entry does not exist.
    #[error("ledger entry {0} not found")]
    NotFound(i64),

    /// The caller is neither the owning referrer nor an administrator.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The entry's current status does not permit the operation.
    #[error("ledger entry {id} is {status}: {action} not permitted")]
    InvalidState {
        /// Entry id.
        id: i64,
        /// The entry's actual current status.
        status: String,
        /// The attempted operation.
        action: &'static str,
    },

    /// Arithmetic overflow computing commission.
    #[error("arithmetic overflow")]
    Overflow,

    /// Underlying database failure.
    #[error(transparent)]
    Db(#[from] suds_db::DbError),
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
