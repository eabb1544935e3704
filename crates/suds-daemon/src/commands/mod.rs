//! IPC command handlers.
//!
//! Each submodule implements the commands for one RPC category. Shared
//! helpers here resolve the caller once per call and normalize common
//! parameters.

pub mod diagnostics;
pub mod feeds;
pub mod ledger;
pub mod payout;

use std::sync::Arc;

use serde_json::Value;
use suds_types::caller::Caller;
use suds_types::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

use crate::rpc::RpcError;
use crate::DaemonState;

pub(crate) type Result = std::result::Result<Value, RpcError>;

/// Current Unix time in seconds.
pub(crate) fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Resolve the authenticated caller from the `caller_id` parameter.
pub(crate) async fn resolve_caller(
    state: &Arc<DaemonState>,
    params: &Value,
) -> std::result::Result<Caller, RpcError> {
    let caller_id = str_param(params, "caller_id")?;
    let db = state.db.lock().await;
    let row = suds_db::queries::referrers::get(&db, caller_id)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    match row {
        Some(referrer) => Ok(Caller {
            id: referrer.id,
            admin: referrer.is_admin,
        }),
        None => Err(RpcError::unauthenticated()),
    }
}

/// Require the caller to be an administrator.
pub(crate) fn require_admin(caller: &Caller) -> std::result::Result<(), RpcError> {
    if caller.admin {
        Ok(())
    } else {
        Err(RpcError::access_denied("administrator required"))
    }
}

/// Required string parameter.
pub(crate) fn str_param<'a>(
    params: &'a Value,
    name: &str,
) -> std::result::Result<&'a str, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}

/// Optional string parameter.
pub(crate) fn opt_str_param<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

/// Required integer parameter.
pub(crate) fn i64_param(params: &Value, name: &str) -> std::result::Result<i64, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}

/// Required array-of-integers parameter.
pub(crate) fn ids_param(params: &Value, name: &str) -> std::result::Result<Vec<i64>, RpcError> {
    let array = params
        .get(name)
        .and_then(|v| v.as_array())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))?;
    array
        .iter()
        .map(|v| {
            v.as_i64()
                .ok_or_else(|| RpcError::invalid_params(&format!("{name} must contain integers")))
        })
        .collect()
}

/// Cursor and clamped page-size for the paginated read views.
pub(crate) fn page_params(params: &Value) -> (Option<i64>, u32) {
    let cursor = params.get("cursor").and_then(|v| v.as_i64());
    let limit = params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map_or(DEFAULT_PAGE_SIZE, |raw| {
            raw.min(u64::from(MAX_PAGE_SIZE)) as u32
        })
        .clamp(1, MAX_PAGE_SIZE);
    (cursor, limit)
}

/// Next-page cursor: the last row's sort-key value when the page is full.
pub(crate) fn next_cursor(page_len: usize, limit: u32, last_sort_key: Option<i64>) -> Option<i64> {
    if page_len as u32 == limit {
        last_sort_key
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::events::EventBus;
    use tokio::sync::{broadcast, Mutex};

    /// Daemon state backed by an in-memory database.
    pub(crate) fn test_state() -> Arc<DaemonState> {
        let conn = suds_db::open_memory().expect("open test db");
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(DaemonState {
            db: Arc::new(Mutex::new(conn)),
            config: DaemonConfig::default(),
            event_bus: EventBus::new(16),
            shutdown_tx,
        })
    }

    /// Seed an identity row.
    pub(crate) async fn seed_identity(state: &Arc<DaemonState>, id: &str, admin: bool) {
        let db = state.db.lock().await;
        suds_db::queries::referrers::insert(&db, id, id, admin, 100).expect("seed identity");
    }
}
