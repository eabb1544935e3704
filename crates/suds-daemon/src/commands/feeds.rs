//! Trusted collaborator feed handlers.
//!
//! These methods are called by platform-internal collaborators over the
//! daemon socket, never by end users: the revenue-event pipeline appends
//! attributions, and the payment-processor webhook reports transfer
//! settlement. They are idempotency-tolerant where the collaborator may
//! replay deliveries.

use std::sync::Arc;

use serde_json::Value;
use suds_db::queries::{attributions, batches as batches_q, referrers};
use suds_ledger::state as ledger_state;
use suds_types::status::{AttributionKind, TransferStatus};

use crate::commands::{i64_param, now_secs, opt_str_param, str_param, Result};
use crate::events::Event;
use crate::rpc::RpcError;
use crate::DaemonState;

/// Append a revenue attribution from the revenue-event pipeline.
pub async fn record_attribution(state: &Arc<DaemonState>, params: &Value) -> Result {
    let referrer_id = str_param(params, "referrer_id")?;
    let purchaser_id = str_param(params, "purchaser_id")?;
    let kind = AttributionKind::parse(str_param(params, "kind")?)
        .ok_or_else(|| RpcError::invalid_params("kind must be invoice_paid or lead_signup"))?;
    let amount_cents = i64_param(params, "amount_cents")?;
    if amount_cents < 0 {
        return Err(RpcError::invalid_params("amount_cents must be non-negative"));
    }
    let currency = opt_str_param(params, "currency").unwrap_or("USD");
    let external_ref = opt_str_param(params, "external_ref");

    let db = state.db.lock().await;
    if referrers::get(&db, referrer_id)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
        .is_none()
    {
        return Err(RpcError::not_found(&format!("referrer {referrer_id}")));
    }

    let id = attributions::insert(
        &db,
        referrer_id,
        purchaser_id,
        kind.as_str(),
        amount_cents,
        currency,
        external_ref,
        now_secs(),
    )
    .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?;

    tracing::info!(
        attribution_id = id,
        referrer = referrer_id,
        kind = kind.as_str(),
        amount_cents,
        "attribution recorded"
    );
    Ok(serde_json::json!({"attribution_id": id}))
}

/// Payment-processor webhook: a ledger entry was paid by external
/// transfer. Replays against an already-paid entry are logged no-ops.
pub async fn ledger_transfer_paid(state: &Arc<DaemonState>, params: &Value) -> Result {
    let ledger_id = i64_param(params, "ledger_id")?;
    let transfer_ref = str_param(params, "transfer_ref")?;
    if let Some(payer) = opt_str_param(params, "payer") {
        tracing::debug!(ledger_id, payer, "transfer webhook payer identity");
    }

    let row = {
        let mut db = state.db.lock().await;
        ledger_state::mark_paid_via_transfer(&mut db, ledger_id, transfer_ref, now_secs())?
    };

    state.event_bus.emit(Event {
        event_type: "LedgerPaid".to_string(),
        timestamp: now_secs(),
        payload: serde_json::json!({"ledger_id": row.id, "referrer_id": row.referrer_id}),
    });
    Ok(crate::commands::ledger::ledger_view(&row))
}

/// Payment-processor webhook: external-transfer status change for a
/// payout batch.
pub async fn update_batch_transfer(state: &Arc<DaemonState>, params: &Value) -> Result {
    let batch_id = i64_param(params, "batch_id")?;
    let transfer_status = TransferStatus::parse(str_param(params, "transfer_status")?)
        .ok_or_else(|| {
            RpcError::invalid_params("transfer_status must be recorded, processing, paid, or failed")
        })?;
    let transfer_ref = opt_str_param(params, "transfer_ref");

    let db = state.db.lock().await;
    if !batches_q::set_transfer(&db, batch_id, transfer_status.as_str(), transfer_ref)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
    {
        return Err(RpcError::not_found(&format!("payout batch {batch_id}")));
    }
    let row = batches_q::get(&db, batch_id)
        .map_err(|e| RpcError::internal_error(&format!("db error: {e}")))?
        .ok_or_else(|| RpcError::not_found(&format!("payout batch {batch_id}")))?;

    tracing::info!(
        batch_id,
        transfer_status = transfer_status.as_str(),
        "batch transfer status updated"
    );
    Ok(crate::commands::payout::batch_view(&row))
}
