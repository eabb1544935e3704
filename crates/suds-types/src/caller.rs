//! Authenticated caller model.
//!
//! Callers are resolved once at the RPC boundary from the platform's
//! identity service and threaded explicitly through every ledger and
//! payout operation. Domain code never re-resolves an ambient identity.

use serde::{Deserialize, Serialize};

/// An authenticated caller acting on the commission ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Opaque identity id issued by the platform's auth service.
    pub id: String,
    /// Administrator predicate, resolved together with the identity.
    pub admin: bool,
}

impl Caller {
    /// A regular (non-admin) caller.
    pub fn referrer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin: false,
        }
    }

    /// An administrator caller.
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin: true,
        }
    }

    /// Whether this caller may act on resources owned by `referrer_id`.
    ///
    /// Administrators may act on any referrer's resources; everyone else
    /// only on their own.
    pub fn can_act_for(&self, referrer_id: &str) -> bool {
        self.admin || self.id == referrer_id
    }
}
