//! Idempotent per-period ledger aggregation.
//!
//! One ledger entry exists per (referrer, period type, period start).
//! While the entry is `open` its totals are recomputed from the
//! attribution store on every call; once locked or paid it is a frozen
//! statement and is returned unchanged.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use suds_db::queries::{attributions, ledger};
use suds_db::queries::ledger::LedgerRow;
use suds_types::caller::Caller;
use suds_types::status::{LedgerStatus, PeriodType};
use suds_types::COMMISSION_RATE_BPS;

use crate::commission::commission_for;
use crate::period::period_bounds;
use crate::{LedgerError, Result};

/// Create or refresh the ledger entry for the period containing `anchor`.
///
/// The whole read-compute-write cycle runs in one transaction, so the
/// frozen-statement check and the totals write cannot be split by a
/// concurrent mutation.
///
/// # Errors
///
/// - [`LedgerError::AccessDenied`] if the caller may not act for the referrer
/// - [`LedgerError::Overflow`] on commission overflow
pub fn upsert_ledger(
    conn: &mut Connection,
    caller: &Caller,
    referrer_id: &str,
    period_type: PeriodType,
    anchor: DateTime<Utc>,
    now: i64,
) -> Result<LedgerRow> {
    if !caller.can_act_for(referrer_id) {
        return Err(LedgerError::AccessDenied(format!(
            "{} may not aggregate ledger for {referrer_id}",
            caller.id
        )));
    }

    let (start, end) = period_bounds(period_type, anchor);
    let (start_ts, end_ts) = (start.timestamp(), end.timestamp());

    let tx = conn.transaction().map_err(suds_db::DbError::Sqlite)?;

    let existing = ledger::get_by_key(&tx, referrer_id, period_type.as_str(), start_ts)?;
    if let Some(row) = &existing {
        let frozen = LedgerStatus::parse(&row.status).is_some_and(LedgerStatus::is_frozen);
        if frozen {
            tracing::debug!(
                ledger_id = row.id,
                status = %row.status,
                "ledger entry is frozen; returning unchanged"
            );
            tx.commit().map_err(suds_db::DbError::Sqlite)?;
            return Ok(row.clone());
        }
    }

    let revenue = attributions::revenue_sum(&tx, referrer_id, start_ts, end_ts)?;
    let commission = commission_for(revenue, COMMISSION_RATE_BPS)?;

    let id = match existing {
        Some(row) => {
            // Re-checked inside the transaction: if the entry stopped being
            // open since the read above, leave it untouched.
            if !ledger::update_open_totals(&tx, row.id, revenue, COMMISSION_RATE_BPS, commission)? {
                tx.commit().map_err(suds_db::DbError::Sqlite)?;
                return Ok(row);
            }
            row.id
        }
        None => {
            let id = ledger::insert_open(
                &tx,
                referrer_id,
                period_type.as_str(),
                start_ts,
                end_ts,
                revenue,
                COMMISSION_RATE_BPS,
                commission,
                now,
            )?;
            tracing::info!(
                ledger_id = id,
                referrer = referrer_id,
                period = period_type.as_str(),
                period_start = start_ts,
                "ledger entry created"
            );
            id
        }
    };

    let row = ledger::get(&tx, id)?.ok_or(LedgerError::NotFound(id))?;
    tx.commit().map_err(suds_db::DbError::Sqlite)?;
    Ok(row)
}
