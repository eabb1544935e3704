//! Ledger entry state machine.
//!
//! Transitions: `open -> locked -> paid`, plus the admin-only reverse edge
//! `paid -> locked`. Locking an already locked or paid entry is an
//! idempotent success, and a webhook replay against an already-paid entry
//! is a logged no-op; every other out-of-order transition is rejected with
//! a message naming the entry's actual status.
//!
//! Each transition re-reads the entry inside its own transaction and
//! writes through a status-guarded update, so a stale caller observes the
//! current state instead of clobbering it.

use rusqlite::Connection;
use suds_db::queries::ledger;
use suds_db::queries::ledger::LedgerRow;
use suds_types::caller::Caller;
use suds_types::notes::clean_opt_note;
use suds_types::status::LedgerStatus;

use crate::{LedgerError, Result};

fn fetch(conn: &Connection, ledger_id: i64) -> Result<LedgerRow> {
    ledger::get(conn, ledger_id)?.ok_or(LedgerError::NotFound(ledger_id))
}

fn status_of(row: &LedgerRow, action: &'static str) -> Result<LedgerStatus> {
    LedgerStatus::parse(&row.status).ok_or(LedgerError::InvalidState {
        id: row.id,
        status: row.status.clone(),
        action,
    })
}

/// Freeze an `open` entry's totals (`open -> locked`).
///
/// Idempotent: an already locked or paid entry is returned unchanged.
/// Callable by the owning referrer or an administrator.
pub fn lock_entry(
    conn: &mut Connection,
    caller: &Caller,
    ledger_id: i64,
    note: Option<&str>,
    now: i64,
) -> Result<LedgerRow> {
    let note = clean_opt_note(note);
    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let row = fetch(&tx, ledger_id)?;
    if !caller.can_act_for(&row.referrer_id) {
        return Err(LedgerError::AccessDenied(format!(
            "{} may not lock ledger entry {ledger_id}",
            caller.id
        )));
    }

    match status_of(&row, "lock")? {
        LedgerStatus::Open => {
            ledger::set_locked(&tx, ledger_id, now, note.as_deref())?;
            tracing::info!(ledger_id, referrer = %row.referrer_id, "ledger entry locked");
        }
        LedgerStatus::Locked | LedgerStatus::Paid => {
            tracing::debug!(ledger_id, status = %row.status, "lock is a no-op");
        }
    }

    let row = fetch(&tx, ledger_id)?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;
    Ok(row)
}

/// Record an out-of-band payment against a `locked` entry
/// (`locked -> paid`). Self-service bookkeeping for the owning referrer,
/// also reachable by administrators.
///
/// # Errors
///
/// - [`LedgerError::InvalidState`] if the entry is `open` or already `paid`
pub fn mark_paid_manual(
    conn: &mut Connection,
    caller: &Caller,
    ledger_id: i64,
    method: Option<&str>,
    note: Option<&str>,
    now: i64,
) -> Result<LedgerRow> {
    let note = clean_opt_note(note);
    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let row = fetch(&tx, ledger_id)?;
    if !caller.can_act_for(&row.referrer_id) {
        return Err(LedgerError::AccessDenied(format!(
            "{} may not mark ledger entry {ledger_id} paid",
            caller.id
        )));
    }

    match status_of(&row, "mark paid")? {
        LedgerStatus::Locked => {}
        other => {
            return Err(LedgerError::InvalidState {
                id: ledger_id,
                status: other.as_str().to_string(),
                action: "mark paid",
            });
        }
    }

    ledger::set_paid_manual(&tx, ledger_id, now, method, note.as_deref())?;
    tracing::info!(ledger_id, method = method.unwrap_or("unspecified"), "ledger entry marked paid");

    let row = fetch(&tx, ledger_id)?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;
    Ok(row)
}

/// Record a payment delivered by the payment-processor webhook
/// (`locked -> paid`). Idempotent on replay: an already-paid entry is
/// logged and returned unchanged. Never called by a user-facing caller,
/// so there is no permission check here.
///
/// # Errors
///
/// - [`LedgerError::InvalidState`] if the entry is still `open`
pub fn mark_paid_via_transfer(
    conn: &mut Connection,
    ledger_id: i64,
    transfer_ref: &str,
    now: i64,
) -> Result<LedgerRow> {
    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let row = fetch(&tx, ledger_id)?;
    match status_of(&row, "mark paid via transfer")? {
        LedgerStatus::Paid => {
            tracing::info!(ledger_id, transfer_ref, "webhook replay on paid entry; ignoring");
            tx.commit().map_err(suds_db::DbError::Sqlite)?;
            return Ok(row);
        }
        LedgerStatus::Open => {
            return Err(LedgerError::InvalidState {
                id: ledger_id,
                status: row.status,
                action: "mark paid via transfer",
            });
        }
        LedgerStatus::Locked => {}
    }

    ledger::set_paid_transfer(&tx, ledger_id, now, transfer_ref)?;
    tracing::info!(ledger_id, transfer_ref, "ledger entry paid via external transfer");

    let row = fetch(&tx, ledger_id)?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;
    Ok(row)
}

/// Administrator correction reversing a payment (`paid -> locked`).
/// Clears the payment fields and any batch back-reference.
///
/// # Errors
///
/// - [`LedgerError::AccessDenied`] if the caller is not an administrator
/// - [`LedgerError::InvalidState`] if the entry is not `paid`
pub fn unmark_paid(
    conn: &mut Connection,
    caller: &Caller,
    ledger_id: i64,
    note: Option<&str>,
) -> Result<LedgerRow> {
    if !caller.admin {
        return Err(LedgerError::AccessDenied(format!(
            "{} may not unmark payments",
            caller.id
        )));
    }
    let note = clean_opt_note(note);
    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let row = fetch(&tx, ledger_id)?;
    match status_of(&row, "unmark paid")? {
        LedgerStatus::Paid => {}
        other => {
            return Err(LedgerError::InvalidState {
                id: ledger_id,
                status: other.as_str().to_string(),
                action: "unmark paid",
            });
        }
    }

    ledger::set_unpaid(&tx, ledger_id, note.as_deref())?;
    tracing::info!(ledger_id, admin = %caller.id, "ledger entry payment reversed");

    let row = fetch(&tx, ledger_id)?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;
    Ok(row)
}
