//! Ledger command handlers: period aggregation, the entry state machine,
//! and the ledger read views.

use std::sync::Arc;

use serde_json::Value;
use suds_db::queries::attributions as attributions_q;
use suds_db::queries::attributions::AttributionRow;
use suds_db::queries::ledger as ledger_q;
use suds_db::queries::ledger::LedgerRow;
use suds_ledger::{aggregate, period, state as ledger_state};
use suds_types::status::PeriodType;

use crate::commands::{
    i64_param, next_cursor, now_secs, opt_str_param, page_params, require_admin, resolve_caller,
    str_param, Result,
};
use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

/// JSON view of a ledger entry row.
pub(crate) fn ledger_view(row: &LedgerRow) -> Value {
    serde_json::json!({
        "id": row.id,
        "referrer_id": row.referrer_id,
        "period_type": row.period_type,
        "period_start": row.period_start,
        "period_end": row.period_end,
        "revenue_cents": row.revenue_cents,
        "rate_bps": row.rate_bps,
        "commission_cents": row.commission_cents,
        "status": row.status,
        "locked_at": row.locked_at,
        "paid_at": row.paid_at,
        "paid_method": row.paid_method,
        "transfer_ref": row.transfer_ref,
        "note": row.note,
        "batch_id": row.batch_id,
        "request_id": row.request_id,
        "created_at": row.created_at,
    })
}

fn period_type_param(params: &Value) -> std::result::Result<PeriodType, RpcError> {
    match opt_str_param(params, "period_type") {
        None => Ok(PeriodType::Monthly),
        Some(raw) => PeriodType::parse(raw)
            .ok_or_else(|| RpcError::invalid_params("period_type must be monthly or weekly")),
    }
}

/// Target referrer: explicit `referrer_id` or the caller themselves.
fn target_referrer(params: &Value, caller_id: &str) -> String {
    opt_str_param(params, "referrer_id")
        .unwrap_or(caller_id)
        .to_string()
}

/// Create or refresh the ledger entry for the period containing an
/// explicit `YYYY-MM-DD` anchor date.
pub async fn upsert_ledger_period(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let referrer_id = target_referrer(params, &caller.id);
    let period_type = period_type_param(params)?;
    let anchor = period::anchor_from_date_str(str_param(params, "date")?)
        .ok_or_else(|| RpcError::invalid_params("date must be YYYY-MM-DD"))?;

    let mut db = state.db.lock().await;
    let row = aggregate::upsert_ledger(&mut db, &caller, &referrer_id, period_type, anchor, now_secs())?;
    Ok(ledger_view(&row))
}

/// Create or refresh the ledger entry for the current period.
pub async fn upsert_current_ledger_period(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let referrer_id = target_referrer(params, &caller.id);
    let period_type = period_type_param(params)?;

    let mut db = state.db.lock().await;
    let row = aggregate::upsert_ledger(
        &mut db,
        &caller,
        &referrer_id,
        period_type,
        chrono::Utc::now(),
        now_secs(),
    )?;
    Ok(ledger_view(&row))
}

/// Freeze a ledger entry's totals.
pub async fn lock_ledger_period(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let ledger_id = i64_param(params, "ledger_id")?;
    let note = opt_str_param(params, "note");

    let row = {
        let mut db = state.db.lock().await;
        ledger_state::lock_entry(&mut db, &caller, ledger_id, note, now_secs())?
    };

    state.event_bus.emit(Event {
        event_type: "LedgerLocked".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({"ledger_id": row.id, "referrer_id": row.referrer_id}),
    });
    Ok(ledger_view(&row))
}

/// Record an out-of-band payment against a locked entry.
pub async fn mark_ledger_paid(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let ledger_id = i64_param(params, "ledger_id")?;
    let method = opt_str_param(params, "method");
    let note = opt_str_param(params, "note");

    let row = {
        let mut db = state.db.lock().await;
        ledger_state::mark_paid_manual(&mut db, &caller, ledger_id, method, note, now_secs())?
    };

    state.event_bus.emit(Event {
        event_type: "LedgerPaid".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({"ledger_id": row.id, "referrer_id": row.referrer_id}),
    });
    Ok(ledger_view(&row))
}

/// Administrator correction: reverse a payment back to `locked`.
pub async fn unmark_ledger_paid(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let ledger_id = i64_param(params, "ledger_id")?;
    let note = opt_str_param(params, "note");

    let row = {
        let mut db = state.db.lock().await;
        ledger_state::unmark_paid(&mut db, &caller, ledger_id, note)?
    };

    state.event_bus.emit(Event {
        event_type: "LedgerUnpaid".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({"ledger_id": row.id, "referrer_id": row.referrer_id}),
    });
    Ok(ledger_view(&row))
}

fn ledger_page(rows: &[LedgerRow], limit: u32) -> Value {
    let items: Vec<Value> = rows.iter().map(ledger_view).collect();
    let cursor = next_cursor(rows.len(), limit, rows.last().map(|row| row.period_start));
    serde_json::json!({"items": items, "next_cursor": cursor})
}

/// The caller's own ledger entries, newest period first.
pub async fn get_my_ledger(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let (cursor, limit) = page_params(params);

    let db = state.db.lock().await;
    let rows = ledger_q::list_for_referrer(&db, &caller.id, cursor, limit)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    Ok(ledger_page(&rows, limit))
}

fn attribution_view(row: &AttributionRow) -> Value {
    serde_json::json!({
        "id": row.id,
        "referrer_id": row.referrer_id,
        "purchaser_id": row.purchaser_id,
        "kind": row.kind,
        "amount_cents": row.amount_cents,
        "currency": row.currency,
        "external_ref": row.external_ref,
        "created_at": row.created_at,
    })
}

/// The caller's raw attribution feed, newest first.
pub async fn get_my_attributions(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    let (cursor, limit) = page_params(params);

    let db = state.db.lock().await;
    let rows = attributions_q::list_for_referrer(&db, &caller.id, cursor, limit)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    let items: Vec<Value> = rows.iter().map(attribution_view).collect();
    let cursor = next_cursor(rows.len(), limit, rows.last().map(|row| row.created_at));
    Ok(serde_json::json!({"items": items, "next_cursor": cursor}))
}

/// Any referrer's ledger entries (administrator view).
pub async fn get_referrer_ledger(state: &Arc<DaemonState>, params: &Value) -> Result {
    let caller = resolve_caller(state, params).await?;
    require_admin(&caller)?;
    let referrer_id = str_param(params, "referrer_id")?;
    let (cursor, limit) = page_params(params);

    let db = state.db.lock().await;
    let rows = ledger_q::list_for_referrer(&db, referrer_id, cursor, limit)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;
    Ok(ledger_page(&rows, limit))
}
