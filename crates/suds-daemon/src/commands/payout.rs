//! Payout command handlers: batches, requests, and their read views.

use std::sync::Arc;

use serde_json::Value;
use suds_db::queries::batches::BatchRow;
use suds_db::queries::requests::RequestRow;
use suds_db::queries::{batches as batches_q, requests as requests_q};
use suds_payout::request::MemberEligibility;
use suds_payout::{batch, request};

use crate::commands::{
    i64_param, next_cursor, now_secs, opt_str_param, page_params, require_admin, resolve_caller,
    str_param, Result,
};
use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

/// JSON view of a payout batch row.
pub(crate) fn batch_view(row: &BatchRow) -> Value {
    serde_json::json!({
        "id": row.id,
        "created_by": row.created_by,
        "method": row.method,
        "note": row.note,
        "total_commission_cents": row.total_commission_cents,
        "status": row.status,
        "transfer_status": row.transfer_status,
        "transfer_ref": row.transfer_ref,
        "void_note": row.void_note,
        "voided_at": row.voided_at,
        "created_at": row.created_at,
    })
}

/// JSON view of a payout request row.
pub(crate) fn request_view(row: &RequestRow) -> Value {
    serde_json::json!({
        "id": row.id,
        "referrer_id": row.referrer_id,
        "status": row.status,
        "total_commission_cents": row.total_commission_cents,
        "total_revenue_cents": row.total_revenue_cents,
        "referrer_note": row.referrer_note,
        "admin_note": row.admin_note,
        "batch_id": row.batch_id,
        "submitted_at": row.submitted_at,
        "decided_at": row.decided_at,
        "cancelled_at": row.cancelled_at,
        "completed_at": row.completed_at,
    })
}

fn member_view(member: &MemberEligibility) -> Value {
    serde_json::json!({
        "ledger_id": member.ledger_id,
        "status": member.status,
        "commission_cents": member.commission_cents,
        "eligible": member.eligible,
        "reason": member.reason,
    })
}

/// Non-empty trimmed payment-method parameter.
fn method_param(params: &Value) -> std::result::Result<String, RpcError> {
    let method = str_param(params, "method")?.trim().to_string();
    if method.is_empty() {
        return Err(RpcError::invalid_params("method must not be blank"));
    }
    Ok(method)
}

/// Create a payout batch over locked entries and mark them paid.
pub async fn create_payout_batch(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let ledger_ids = super::ids_param(params, "ledger_ids")?;
    let method = method_param(params)?;
    let note = opt_str_param(params, "note");

    let row = {
        let mut db = state.db.lock().await;
        batch::create_batch(&mut db, &caller, &ledger_ids, &method, note, now_secs())?
    };

    state.event_bus.emit(Event {
        event_type: "PayoutBatchCreated".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({
            "batch_id": row.id,
            "total_commission_cents": row.total_commission_cents,
        }),
    });
    Ok(serde_json::json!({"batch_id": row.id, "batch": batch_view(&row)}))
}

/// Void a batch and revert its still-paid members.
pub async fn void_payout_batch(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let batch_id = i64_param(params, "batch_id")?;
    let note = opt_str_param(params, "note");

    let row = {
        let mut db = state.db.lock().await;
        batch::void_batch(&mut db, &caller, batch_id, note, now_secs())?
    };

    state.event_bus.emit(Event {
        event_type: "PayoutBatchVoided".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({"batch_id": row.id}),
    });
    Ok(batch_view(&row))
}

/// A single batch with its member snapshot (administrator view).
pub async fn get_payout_batch(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    require_admin(&caller)?;
    let batch_id = i64_param(params, "batch_id")?;

    let db = state.db.lock().await;
    let row = batches_q::get(&db, batch_id)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
        .ok_or_else(|| RpcError::not_found(&format!("payout batch {batch_id}")))?;
    let members = batches_q::member_ids(&db, batch_id)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;

    let mut view = batch_view(&row);
    view["ledger_ids"] = serde_json::json!(members);
    Ok(view)
}

fn batch_page(rows: &[BatchRow], limit: u32) -> Value {
    let items: Vec<Value> = rows.iter().map(batch_view).collect();
    let cursor = next_cursor(rows.len(), limit, rows.last().map(|row| row.created_at));
    serde_json::json!({"items": items, "next_cursor": cursor})
}

/// All batches, newest first (administrator view).
pub async fn list_payout_batches(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    require_admin(&caller)?;
    let (cursor, limit) = page_params(params);

    let db = state.db.lock().await;
    let rows = batches_q::list(&db, cursor, limit)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    Ok(batch_page(&rows, limit))
}

/// Batches containing a referrer's entries. Referrers see their own;
/// administrators may ask for anyone's.
pub async fn list_referrer_payout_batches(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let referrer_id = opt_str_param(params, "referrer_id")
        .unwrap_or(&caller.id)
        .to_string();
    if !caller.can_act_for(&referrer_id) {
        return Err(RpcError::access_denied("may only list own payout batches"));
    }
    let (cursor, limit) = page_params(params);

    let db = state.db.lock().await;
    let rows = batches_q::list_for_referrer(&db, &referrer_id, cursor, limit)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    Ok(batch_page(&rows, limit))
}

/// Submit a payout request over the caller's own locked entries.
pub async fn create_payout_request(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let ledger_ids = super::ids_param(params, "ledger_ids")?;
    let note = opt_str_param(params, "note");

    let row = {
        let mut db = state.db.lock().await;
        request::create_request(&mut db, &caller, &ledger_ids, note, now_secs())?
    };

    state.event_bus.emit(Event {
        event_type: "PayoutRequestSubmitted".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({"request_id": row.id, "referrer_id": row.referrer_id}),
    });
    Ok(serde_json::json!({"request_id": row.id, "request": request_view(&row)}))
}

/// Cancel the caller's own submitted request.
pub async fn cancel_payout_request(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let request_id = i64_param(params, "request_id")?;
    let note = opt_str_param(params, "note");

    let row = {
        let mut db = state.db.lock().await;
        request::cancel_request(&mut db, &caller, request_id, note, now_secs())?
    };
    Ok(request_view(&row))
}

/// Approve a submitted request.
pub async fn approve_payout_request(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let request_id = i64_param(params, "request_id")?;
    let note = opt_str_param(params, "note");

    let row = {
        let mut db = state.db.lock().await;
        request::approve_request(&mut db, &caller, request_id, note, now_secs())?
    };

    state.event_bus.emit(Event {
        event_type: "PayoutRequestDecided".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({
            "request_id": row.id,
            "referrer_id": row.referrer_id,
            "status": row.status,
        }),
    });
    Ok(request_view(&row))
}

/// Deny a submitted or approved request; the reason is mandatory.
pub async fn deny_payout_request(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let request_id = i64_param(params, "request_id")?;
    let reason = opt_str_param(params, "reason").unwrap_or_default();

    let row = {
        let mut db = state.db.lock().await;
        request::deny_request(&mut db, &caller, request_id, reason, now_secs())?
    };

    state.event_bus.emit(Event {
        event_type: "PayoutRequestDecided".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({
            "request_id": row.id,
            "referrer_id": row.referrer_id,
            "status": row.status,
        }),
    });
    Ok(request_view(&row))
}

/// Complete a request as a payout batch.
pub async fn complete_payout_request(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let request_id = i64_param(params, "request_id")?;
    let method = method_param(params)?;
    let note = opt_str_param(params, "note");

    let (request_row, batch_row) = {
        let mut db = state.db.lock().await;
        request::complete_request(&mut db, &caller, request_id, &method, note, now_secs())?
    };

    state.event_bus.emit(Event {
        event_type: "PayoutRequestCompleted".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({
            "request_id": request_row.id,
            "referrer_id": request_row.referrer_id,
            "batch_id": batch_row.id,
        }),
    });
    Ok(serde_json::json!({
        "request_id": request_row.id,
        "batch_id": batch_row.id,
        "request": request_view(&request_row),
        "batch": batch_view(&batch_row),
    }))
}

fn request_page(rows: &[RequestRow], limit: u32) -> Value {
    let items: Vec<Value> = rows.iter().map(request_view).collect();
    let cursor = next_cursor(rows.len(), limit, rows.last().map(|row| row.submitted_at));
    serde_json::json!({"items": items, "next_cursor": cursor})
}

/// The caller's own requests, newest first.
pub async fn get_my_payout_requests(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let (cursor, limit) = page_params(params);

    let db = state.db.lock().await;
    let rows = requests_q::list_for_referrer(&db, &caller.id, cursor, limit)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    Ok(request_page(&rows, limit))
}

/// All requests, newest first (administrator view).
pub async fn list_payout_requests(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    require_admin(&caller)?;
    let (cursor, limit) = page_params(params);

    let db = state.db.lock().await;
    let rows = requests_q::list_all(&db, cursor, limit)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    Ok(request_page(&rows, limit))
}

/// A single request with live member eligibility (administrator view).
pub async fn get_payout_request(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    require_admin(&caller)?;
    let request_id = i64_param(params, "request_id")?;

    let db = state.db.lock().await;
    let (row, members) = request::request_with_eligibility(&db, request_id)?;

    let mut view = request_view(&row);
    view["members"] = Value::Array(members.iter().map(member_view).collect());
    view["completable"] = Value::Bool(members.iter().all(|member| member.eligible));
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{seed_identity, test_state};
    use serde_json::json;
    use suds_db::queries::ledger as ledger_q;

    async fn locked_entry(state: &Arc<DaemonState>, referrer: &str, period_start: i64, commission: i64) -> i64 {
        let db = state.db.lock().await;
        let id = ledger_q::insert_open(
            &db,
            referrer,
            "monthly",
            period_start,
            period_start + 1_000,
            commission * 10,
            1_000,
            commission,
            100,
        )
        .expect("entry");
        ledger_q::set_locked(&db, id, 200, None).expect("lock");
        id
    }

    #[tokio::test]
    async fn test_batch_create_and_void_flow() {
        let state = test_state();
        seed_identity(&state, "adm-1", true).await;
        seed_identity(&state, "ref-1", false).await;
        let e1 = locked_entry(&state, "ref-1", 1_000, 1_250).await;

        let created = create_payout_batch(
            &state,
            &json!({"caller_id": "adm-1", "ledger_ids": [e1], "method": "Zelle"}),
        )
        .await
        .expect("create");
        let batch_id = created["batch_id"].as_i64().expect("batch id");
        assert_eq!(created["batch"]["total_commission_cents"], 1_250);

        let fetched = get_payout_batch(
            &state,
            &json!({"caller_id": "adm-1", "batch_id": batch_id}),
        )
        .await
        .expect("get");
        assert_eq!(fetched["ledger_ids"], json!([e1]));

        let voided = void_payout_batch(
            &state,
            &json!({"caller_id": "adm-1", "batch_id": batch_id, "note": "wrong month"}),
        )
        .await
        .expect("void");
        assert_eq!(voided["status"], "voided");

        let entry = {
            let db = state.db.lock().await;
            ledger_q::get(&db, e1).expect("get").expect("present")
        };
        assert_eq!(entry.status, "locked");
    }

    #[tokio::test]
    async fn test_batch_requires_method() {
        let state = test_state();
        seed_identity(&state, "adm-1", true).await;

        let err = create_payout_batch(
            &state,
            &json!({"caller_id": "adm-1", "ledger_ids": [1], "method": "   "}),
        )
        .await
        .expect_err("blank method");
        assert_eq!(err.message, "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn test_request_lifecycle_deny() {
        let state = test_state();
        seed_identity(&state, "adm-1", true).await;
        seed_identity(&state, "ref-1", false).await;
        let e1 = locked_entry(&state, "ref-1", 1_000, 1_250).await;

        let created = create_payout_request(
            &state,
            &json!({"caller_id": "ref-1", "ledger_ids": [e1], "note": "cash out"}),
        )
        .await
        .expect("create");
        let request_id = created["request_id"].as_i64().expect("request id");

        let err = deny_payout_request(
            &state,
            &json!({"caller_id": "adm-1", "request_id": request_id}),
        )
        .await
        .expect_err("no reason");
        assert_eq!(err.message, "MISSING_REASON");

        let denied = deny_payout_request(
            &state,
            &json!({"caller_id": "adm-1", "request_id": request_id, "reason": "duplicate"}),
        )
        .await
        .expect("deny");
        assert_eq!(denied["status"], "denied");
        assert_eq!(denied["admin_note"], "duplicate");

        let entry = {
            let db = state.db.lock().await;
            ledger_q::get(&db, e1).expect("get").expect("present")
        };
        assert_eq!(entry.status, "locked");
        assert!(entry.request_id.is_none());
    }

    #[tokio::test]
    async fn test_request_complete_flow() {
        let state = test_state();
        seed_identity(&state, "adm-1", true).await;
        seed_identity(&state, "ref-1", false).await;
        let e1 = locked_entry(&state, "ref-1", 1_000, 1_250).await;

        let created = create_payout_request(
            &state,
            &json!({"caller_id": "ref-1", "ledger_ids": [e1]}),
        )
        .await
        .expect("create");
        let request_id = created["request_id"].as_i64().expect("request id");

        approve_payout_request(
            &state,
            &json!({"caller_id": "adm-1", "request_id": request_id}),
        )
        .await
        .expect("approve");

        let view = get_payout_request(
            &state,
            &json!({"caller_id": "adm-1", "request_id": request_id}),
        )
        .await
        .expect("eligibility view");
        assert_eq!(view["completable"], true);

        let completed = complete_payout_request(
            &state,
            &json!({"caller_id": "adm-1", "request_id": request_id, "method": "Zelle"}),
        )
        .await
        .expect("complete");
        assert_eq!(completed["request"]["status"], "completed");
        assert_eq!(completed["batch"]["total_commission_cents"], 1_250);

        let entry = {
            let db = state.db.lock().await;
            ledger_q::get(&db, e1).expect("get").expect("present")
        };
        assert_eq!(entry.status, "paid");
        assert_eq!(entry.batch_id, completed["batch_id"].as_i64());
        assert!(entry.request_id.is_none());
    }

    #[tokio::test]
    async fn test_admin_views_gated() {
        let state = test_state();
        seed_identity(&state, "ref-1", false).await;

        for result in [
            list_payout_batches(&state, &json!({"caller_id": "ref-1"})).await,
            list_payout_requests(&state, &json!({"caller_id": "ref-1"})).await,
            get_payout_request(&state, &json!({"caller_id": "ref-1", "request_id": 1})).await,
        ] {
            let err = result.expect_err("admin only");
            assert_eq!(err.message, "ACCESS_DENIED");
        }
    }

    #[tokio::test]
    async fn test_list_referrer_batches_scope() {
        let state = test_state();
        seed_identity(&state, "ref-1", false).await;
        seed_identity(&state, "ref-2", false).await;

        let err = list_referrer_payout_batches(
            &state,
            &json!({"caller_id": "ref-2", "referrer_id": "ref-1"}),
        )
        .await
        .expect_err("foreign listing");
        assert_eq!(err.message, "ACCESS_DENIED");

        let own = list_referrer_payout_batches(&state, &json!({"caller_id": "ref-2"}))
            .await
            .expect("own listing");
        assert_eq!(own["items"].as_array().expect("items").len(), 0);
    }
}
