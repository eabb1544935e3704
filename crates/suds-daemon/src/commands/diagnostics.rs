//! Diagnostics and event subscription handlers.

use std::sync::Arc;

use serde_json::Value;

use crate::commands::{str_param, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Liveness and version probe.
pub async fn healthcheck(state: &Arc<DaemonState>) -> Result {
    // Touch the database so the probe actually exercises the stack.
    let db = state.db.lock().await;
    let schema_version: u32 = db
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;

    Ok(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "schema_version": schema_version,
        "events_emitted": state.event_bus.sequence(),
    }))
}

/// Subscribe to daemon events.
pub async fn subscribe_events(state: &Arc<DaemonState>, params: &Value) -> Result {
    let _filter = params.get("filter");
    let subscription_id = state.event_bus.new_subscription_id();

    Ok(serde_json::json!({
        "subscription_id": subscription_id,
    }))
}

/// Unsubscribe from daemon events.
pub async fn unsubscribe_events(_state: &Arc<DaemonState>, params: &Value) -> Result {
    let _subscription_id = str_param(params, "subscription_id")?;
    Ok(serde_json::json!({"unsubscribed": true}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::test_state;
    use serde_json::json;

    #[tokio::test]
    async fn test_healthcheck() {
        let state = test_state();
        let result = healthcheck(&state).await.expect("healthcheck");
        assert_eq!(result["status"], "ok");
        assert_eq!(result["schema_version"], suds_db::SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe() {
        let state = test_state();
        let sub = subscribe_events(&state, &json!({})).await.expect("subscribe");
        let id = sub["subscription_id"].as_str().expect("id").to_string();

        let result = unsubscribe_events(&state, &json!({"subscription_id": id}))
            .await
            .expect("unsubscribe");
        assert_eq!(result["unsubscribed"], true);

        let err = unsubscribe_events(&state, &json!({})).await.expect_err("missing id");
        assert_eq!(err.message, "INVALID_PARAMS");
    }
}
