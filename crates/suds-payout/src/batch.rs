//! Payout batch manager.
//!
//! A batch groups locked ledger entries and marks them paid in one
//! transaction. Validation happens against rows re-read inside that
//! transaction, and any failure aborts before a single entry is mutated.

use rusqlite::Connection;
use suds_db::queries::batches::BatchRow;
use suds_db::queries::{batches, ledger};
use suds_types::caller::Caller;
use suds_types::notes::clean_opt_note;
use suds_types::status::{BatchStatus, TransferStatus};
use suds_types::Cents;

use crate::eligibility::{self, Ineligibility};
use crate::{PayoutError, Result};

/// De-duplicate ids preserving first-seen order.
pub(crate) fn dedupe(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Map an ineligibility to the matching payout error.
pub(crate) fn ineligibility_error(
    ledger_id: i64,
    reason: Ineligibility,
    action: &'static str,
) -> PayoutError {
    match reason {
        Ineligibility::NotLocked { status } => PayoutError::InvalidState {
            what: format!("ledger entry {ledger_id}"),
            status,
            action,
        },
        Ineligibility::Batched { batch_id } => PayoutError::AlreadyBatched { ledger_id, batch_id },
        Ineligibility::OtherRequest { request_id } => {
            PayoutError::AlreadyRequested { ledger_id, request_id }
        }
    }
}

/// Create a batch over already-validated ids inside an open transaction.
///
/// `for_request` is `Some` when completing a payout request, which allows
/// members claimed by that request and clears their claim on payment.
/// Returns the new batch id.
pub(crate) fn create_in_tx(
    tx: &Connection,
    admin_id: &str,
    ledger_ids: &[i64],
    method: &str,
    note: Option<&str>,
    for_request: Option<i64>,
    now: i64,
) -> Result<i64> {
    let mut total: Cents = 0;
    for &ledger_id in ledger_ids {
        let entry = ledger::get(tx, ledger_id)?
            .ok_or_else(|| PayoutError::NotFound(format!("ledger entry {ledger_id}")))?;
        let check = match for_request {
            Some(request_id) => eligibility::for_request(&entry, Some(request_id)),
            None => eligibility::for_batch(&entry),
        };
        if let Some(reason) = check {
            return Err(ineligibility_error(ledger_id, reason, "batch payout"));
        }
        total += entry.commission_cents;
    }

    let batch_id = batches::insert(tx, admin_id, method, note, total, now)?;
    for &ledger_id in ledger_ids {
        batches::add_member(tx, batch_id, ledger_id)?;
        // The claim re-checks status and batch reference at write time; a
        // row that slipped away since validation fails the whole call.
        if !ledger::claim_for_batch(tx, ledger_id, batch_id, now)? {
            let entry = ledger::get(tx, ledger_id)?
                .ok_or_else(|| PayoutError::NotFound(format!("ledger entry {ledger_id}")))?;
            return Err(match entry.batch_id {
                Some(other) if other != batch_id => PayoutError::AlreadyBatched {
                    ledger_id,
                    batch_id: other,
                },
                _ => PayoutError::InvalidState {
                    what: format!("ledger entry {ledger_id}"),
                    status: entry.status,
                    action: "batch payout",
                },
            });
        }
    }

    Ok(batch_id)
}

/// Create a payout batch and mark every member entry paid, atomically.
///
/// # Errors
///
/// - [`PayoutError::AccessDenied`] if the caller is not an administrator
/// - [`PayoutError::EmptySelection`] for an empty id list
/// - [`PayoutError::NotFound`] if any entry does not exist
/// - [`PayoutError::InvalidState`] if any entry is not `locked`
/// - [`PayoutError::AlreadyBatched`] if any entry already has a batch
pub fn create_batch(
    conn: &mut Connection,
    admin: &Caller,
    ledger_ids: &[i64],
    method: &str,
    note: Option<&str>,
    now: i64,
) -> Result<BatchRow> {
    if !admin.admin {
        return Err(PayoutError::AccessDenied(format!(
            "{} may not create payout batches",
            admin.id
        )));
    }
    let ids = dedupe(ledger_ids);
    if ids.is_empty() {
        return Err(PayoutError::EmptySelection);
    }
    let note = clean_opt_note(note);

    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;
    let batch_id = create_in_tx(&tx, &admin.id, &ids, method, note.as_deref(), None, now)?;
    let row = batches::get(&tx, batch_id)?
        .ok_or_else(|| PayoutError::NotFound(format!("payout batch {batch_id}")))?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;

    tracing::info!(
        batch_id,
        admin = %admin.id,
        members = ids.len(),
        total_commission_cents = row.total_commission_cents,
        "payout batch created"
    );
    Ok(row)
}

/// Void a batch and revert its still-paid members to `locked`.
///
/// A no-op success if the batch is already voided. Fails with
/// [`PayoutError::TransferInProgress`] while the external transfer is
/// mid-flight.
pub fn void_batch(
    conn: &mut Connection,
    admin: &Caller,
    batch_id: i64,
    note: Option<&str>,
    now: i64,
) -> Result<BatchRow> {
    if !admin.admin {
        return Err(PayoutError::AccessDenied(format!(
            "{} may not void payout batches",
            admin.id
        )));
    }
    let note = clean_opt_note(note);

    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;
    let row = batches::get(&tx, batch_id)?
        .ok_or_else(|| PayoutError::NotFound(format!("payout batch {batch_id}")))?;

    match BatchStatus::parse(&row.status) {
        Some(BatchStatus::Voided) => {
            tracing::debug!(batch_id, "void is a no-op");
            tx.commit().map_err(suds_db::DbError::Sqlite)?;
            return Ok(row);
        }
        Some(BatchStatus::Recorded) => {}
        None => {
            return Err(PayoutError::InvalidState {
                what: format!("payout batch {batch_id}"),
                status: row.status,
                action: "void",
            });
        }
    }
    let transfer = row.transfer_status.as_deref().and_then(TransferStatus::parse);
    if transfer == Some(TransferStatus::Processing) {
        return Err(PayoutError::TransferInProgress(batch_id));
    }

    let mut reverted = 0usize;
    for ledger_id in batches::member_ids(&tx, batch_id)? {
        // Only members still pointing at this batch and still paid are
        // reverted; entries unmarked or re-batched out-of-band stay put.
        if ledger::revert_batch_member(&tx, ledger_id, batch_id)? {
            reverted += 1;
        }
    }
    batches::set_voided(&tx, batch_id, now, note.as_deref())?;

    let row = batches::get(&tx, batch_id)?
        .ok_or_else(|| PayoutError::NotFound(format!("payout batch {batch_id}")))?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;

    tracing::info!(batch_id, admin = %admin.id, reverted, "payout batch voided");
    Ok(row)
}
