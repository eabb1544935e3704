//! Payout request manager.
//!
//! Referrer-initiated counterpart to the batch manager:
//! `submitted -> {approved, denied, cancelled}`, `approved -> {denied,
//! completed}`, `submitted -> completed`. Member eligibility can change
//! between submission and resolution (an entry can be paid through another
//! channel out-of-band), so every administrator transition re-validates
//! members against freshly read rows.

use rusqlite::Connection;
use suds_db::queries::batches::BatchRow;
use suds_db::queries::ledger::LedgerRow;
use suds_db::queries::requests::RequestRow;
use suds_db::queries::{batches, ledger, requests};
use suds_types::caller::Caller;
use suds_types::notes::{clean_note, clean_opt_note};
use suds_types::status::RequestStatus;
use suds_types::Cents;

use crate::batch::{create_in_tx, dedupe, ineligibility_error};
use crate::eligibility;
use crate::{PayoutError, Result};

fn fetch_request(conn: &Connection, request_id: i64) -> Result<RequestRow> {
    requests::get(conn, request_id)?
        .ok_or_else(|| PayoutError::NotFound(format!("payout request {request_id}")))
}

fn fetch_entry(conn: &Connection, ledger_id: i64) -> Result<LedgerRow> {
    ledger::get(conn, ledger_id)?
        .ok_or_else(|| PayoutError::NotFound(format!("ledger entry {ledger_id}")))
}

fn status_of(row: &RequestRow, action: &'static str) -> Result<RequestStatus> {
    RequestStatus::parse(&row.status).ok_or_else(|| PayoutError::InvalidState {
        what: format!("payout request {}", row.id),
        status: row.status.clone(),
        action,
    })
}

fn invalid_request_state(row: &RequestRow, action: &'static str) -> PayoutError {
    PayoutError::InvalidState {
        what: format!("payout request {}", row.id),
        status: row.status.clone(),
        action,
    }
}

/// Clear the request's claim on members that were not already paid
/// through another channel.
fn release_members(conn: &Connection, request_id: i64) -> Result<()> {
    for ledger_id in requests::member_ids(conn, request_id)? {
        ledger::clear_request_ref(conn, ledger_id, request_id)?;
    }
    Ok(())
}

/// Submit a payout request over a referrer's own locked entries.
///
/// Snapshots total commission and revenue at submission time and stamps
/// each member with a back-reference to the new request.
///
/// # Errors
///
/// - [`PayoutError::EmptySelection`] for an empty id list
/// - [`PayoutError::AccessDenied`] if any entry belongs to someone else
/// - [`PayoutError::InvalidState`] / [`PayoutError::AlreadyBatched`] /
///   [`PayoutError::AlreadyRequested`] per member eligibility
pub fn create_request(
    conn: &mut Connection,
    caller: &Caller,
    ledger_ids: &[i64],
    note: Option<&str>,
    now: i64,
) -> Result<RequestRow> {
    let ids = dedupe(ledger_ids);
    if ids.is_empty() {
        return Err(PayoutError::EmptySelection);
    }
    let note = clean_opt_note(note);

    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let mut total_commission: Cents = 0;
    let mut total_revenue: Cents = 0;
    for &ledger_id in &ids {
        let entry = fetch_entry(&tx, ledger_id)?;
        if entry.referrer_id != caller.id {
            return Err(PayoutError::AccessDenied(format!(
                "ledger entry {ledger_id} does not belong to {}",
                caller.id
            )));
        }
        if let Some(reason) = eligibility::for_request(&entry, None) {
            return Err(ineligibility_error(ledger_id, reason, "request payout"));
        }
        total_commission += entry.commission_cents;
        total_revenue += entry.revenue_cents;
    }

    let request_id = requests::insert(
        &tx,
        &caller.id,
        total_commission,
        total_revenue,
        note.as_deref(),
        now,
    )?;
    for &ledger_id in &ids {
        requests::add_member(&tx, request_id, ledger_id)?;
        if !ledger::set_request_ref(&tx, ledger_id, request_id)? {
            // Claimed between validation and write.
            let entry = fetch_entry(&tx, ledger_id)?;
            return Err(match entry.request_id {
                Some(held_by) => PayoutError::AlreadyRequested {
                    ledger_id,
                    request_id: held_by,
                },
                None => PayoutError::InvalidState {
                    what: format!("ledger entry {ledger_id}"),
                    status: entry.status,
                    action: "request payout",
                },
            });
        }
    }

    let row = fetch_request(&tx, request_id)?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;

    tracing::info!(
        request_id,
        referrer = %caller.id,
        members = ids.len(),
        total_commission_cents = row.total_commission_cents,
        "payout request submitted"
    );
    Ok(row)
}

/// Cancel a submitted request (owner only). Releases member claims that
/// were not already paid. Cancelling an already-cancelled request is an
/// idempotent success.
pub fn cancel_request(
    conn: &mut Connection,
    caller: &Caller,
    request_id: i64,
    note: Option<&str>,
    now: i64,
) -> Result<RequestRow> {
    let note = clean_opt_note(note);
    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let row = fetch_request(&tx, request_id)?;
    // Strictly the owning referrer: administrators resolve requests via
    // deny, not cancel.
    if row.referrer_id != caller.id {
        return Err(PayoutError::AccessDenied(format!(
            "{} may not cancel payout request {request_id}",
            caller.id
        )));
    }

    match status_of(&row, "cancel")? {
        RequestStatus::Cancelled => {
            tracing::debug!(request_id, "cancel is a no-op");
            tx.commit().map_err(suds_db::DbError::Sqlite)?;
            return Ok(row);
        }
        RequestStatus::Submitted => {}
        _ => return Err(invalid_request_state(&row, "cancel")),
    }

    requests::set_cancelled(&tx, request_id, now, note.as_deref())?;
    release_members(&tx, request_id)?;

    let row = fetch_request(&tx, request_id)?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;

    tracing::info!(request_id, referrer = %caller.id, "payout request cancelled");
    Ok(row)
}

/// Approve a submitted request (administrator action).
pub fn approve_request(
    conn: &mut Connection,
    admin: &Caller,
    request_id: i64,
    note: Option<&str>,
    now: i64,
) -> Result<RequestRow> {
    if !admin.admin {
        return Err(PayoutError::AccessDenied(format!(
            "{} may not approve payout requests",
            admin.id
        )));
    }
    let note = clean_opt_note(note);
    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let row = fetch_request(&tx, request_id)?;
    if status_of(&row, "approve")? != RequestStatus::Submitted {
        return Err(invalid_request_state(&row, "approve"));
    }

    requests::set_approved(&tx, request_id, now, note.as_deref())?;
    let row = fetch_request(&tx, request_id)?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;

    tracing::info!(request_id, admin = %admin.id, "payout request approved");
    Ok(row)
}

/// Deny a submitted or approved request with a mandatory reason.
/// Releases member claims that were not already paid; `denied` is
/// terminal.
///
/// # Errors
///
/// - [`PayoutError::MissingReason`] if the reason is empty or whitespace
pub fn deny_request(
    conn: &mut Connection,
    admin: &Caller,
    request_id: i64,
    reason: &str,
    now: i64,
) -> Result<RequestRow> {
    if !admin.admin {
        return Err(PayoutError::AccessDenied(format!(
            "{} may not deny payout requests",
            admin.id
        )));
    }
    let reason = clean_note(reason).ok_or(PayoutError::MissingReason)?;

    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let row = fetch_request(&tx, request_id)?;
    if !status_of(&row, "deny")?.completable() {
        return Err(invalid_request_state(&row, "deny"));
    }

    requests::set_denied(&tx, request_id, now, &reason)?;
    release_members(&tx, request_id)?;

    let row = fetch_request(&tx, request_id)?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;

    tracing::info!(request_id, admin = %admin.id, reason = %reason, "payout request denied");
    Ok(row)
}

/// Complete a submitted or approved request as a payout batch.
///
/// Re-validates every member exactly as batch creation does (locked, no
/// batch, request claim equal to this request), then atomically creates
/// the batch, marks members paid with their request claims cleared, and
/// marks the request completed.
pub fn complete_request(
    conn: &mut Connection,
    admin: &Caller,
    request_id: i64,
    method: &str,
    note: Option<&str>,
    now: i64,
) -> Result<(RequestRow, BatchRow)> {
    if !admin.admin {
        return Err(PayoutError::AccessDenied(format!(
            "{} may not complete payout requests",
            admin.id
        )));
    }
    let note = clean_opt_note(note);
    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let row = fetch_request(&tx, request_id)?;
    if !status_of(&row, "complete")?.completable() {
        return Err(invalid_request_state(&row, "complete"));
    }

    let members = requests::member_ids(&tx, request_id)?;
    let batch_id = create_in_tx(
        &tx,
        &admin.id,
        &members,
        method,
        note.as_deref(),
        Some(request_id),
        now,
    )?;
    requests::set_completed(&tx, request_id, batch_id, now, note.as_deref())?;

    let request = fetch_request(&tx, request_id)?;
    let batch = batches::get(&tx, batch_id)?
        .ok_or_else(|| PayoutError::NotFound(format!("payout batch {batch_id}")))?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;

    tracing::info!(
        request_id,
        batch_id,
        admin = %admin.id,
        total_commission_cents = batch.total_commission_cents,
        "payout request completed as batch"
    );
    Ok((request, batch))
}

/// A request member annotated with its current payout eligibility.
#[derive(Clone, Debug)]
pub struct MemberEligibility {
    pub ledger_id: i64,
    pub status: String,
    pub commission_cents: Cents,
    pub eligible: bool,
    pub reason: Option<String>,
}

/// Read-only echo of the completion validation, used by front-ends to
/// warn before attempting completion. Mutates nothing.
pub fn request_with_eligibility(
    conn: &Connection,
    request_id: i64,
) -> Result<(RequestRow, Vec<MemberEligibility>)> {
    let row = fetch_request(conn, request_id)?;
    let mut members = Vec::new();
    for ledger_id in requests::member_ids(conn, request_id)? {
        let entry = fetch_entry(conn, ledger_id)?;
        let reason = eligibility::for_request(&entry, Some(request_id));
        members.push(MemberEligibility {
            ledger_id,
            status: entry.status,
            commission_cents: entry.commission_cents,
            eligible: reason.is_none(),
            reason: reason.map(|cause| cause.describe()),
        });
    }
    Ok((row, members))
}
