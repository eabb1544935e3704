//! Ledger entry query functions.
//!
//! Mutating functions are guarded `UPDATE`s: each carries the expected
//! current status (and reference state) in its `WHERE` clause and reports
//! whether a row actually changed. Callers run them inside a transaction
//! and treat a `false` return as "the world changed under you".

use rusqlite::{Connection, OptionalExtension, Row};

use crate::Result;

const COLUMNS: &str = "id, referrer_id, period_type, period_start, period_end,
    revenue_cents, rate_bps, commission_cents, status, locked_at, paid_at,
    paid_method, transfer_ref, note, batch_id, request_id, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<LedgerRow> {
    Ok(LedgerRow {
        id: row.get(0)?,
        referrer_id: row.get(1)?,
        period_type: row.get(2)?,
        period_start: row.get(3)?,
        period_end: row.get(4)?,
        revenue_cents: row.get(5)?,
        rate_bps: row.get(6)?,
        commission_cents: row.get(7)?,
        status: row.get(8)?,
        locked_at: row.get(9)?,
        paid_at: row.get(10)?,
        paid_method: row.get(11)?,
        transfer_ref: row.get(12)?,
        note: row.get(13)?,
        batch_id: row.get(14)?,
        request_id: row.get(15)?,
        created_at: row.get(16)?,
    })
}

/// Insert a fresh `open` entry for a period. Returns the new row id.
#[allow(clippy::too_many_arguments)]
pub fn insert_open(
    conn: &Connection,
    referrer_id: &str,
    period_type: &str,
    period_start: i64,
    period_end: i64,
    revenue_cents: i64,
    rate_bps: i64,
    commission_cents: i64,
    created_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO ledger_entries
            (referrer_id, period_type, period_start, period_end,
             revenue_cents, rate_bps, commission_cents, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'open', ?8)",
        rusqlite::params![
            referrer_id,
            period_type,
            period_start,
            period_end,
            revenue_cents,
            rate_bps,
            commission_cents,
            created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fetch an entry by id.
pub fn get(conn: &Connection, id: i64) -> Result<Option<LedgerRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM ledger_entries WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(row)
}

/// Fetch an entry by its natural key (referrer, period type, period start).
pub fn get_by_key(
    conn: &Connection,
    referrer_id: &str,
    period_type: &str,
    period_start: i64,
) -> Result<Option<LedgerRow>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM ledger_entries
                 WHERE referrer_id = ?1 AND period_type = ?2 AND period_start = ?3"
            ),
            rusqlite::params![referrer_id, period_type, period_start],
            from_row,
        )
        .optional()?;
    Ok(row)
}

/// Refresh the totals of an entry that is still `open`.
pub fn update_open_totals(
    conn: &Connection,
    id: i64,
    revenue_cents: i64,
    rate_bps: i64,
    commission_cents: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ledger_entries
         SET revenue_cents = ?1, rate_bps = ?2, commission_cents = ?3
         WHERE id = ?4 AND status = 'open'",
        rusqlite::params![revenue_cents, rate_bps, commission_cents, id],
    )?;
    Ok(changed == 1)
}

/// Transition `open -> locked`.
pub fn set_locked(conn: &Connection, id: i64, locked_at: i64, note: Option<&str>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ledger_entries
         SET status = 'locked', locked_at = ?1, note = COALESCE(?2, note)
         WHERE id = ?3 AND status = 'open'",
        rusqlite::params![locked_at, note, id],
    )?;
    Ok(changed == 1)
}

/// Transition `locked -> paid` via self-service manual bookkeeping.
pub fn set_paid_manual(
    conn: &Connection,
    id: i64,
    paid_at: i64,
    method: Option<&str>,
    note: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ledger_entries
         SET status = 'paid', paid_at = ?1, paid_method = ?2, note = COALESCE(?3, note)
         WHERE id = ?4 AND status = 'locked'",
        rusqlite::params![paid_at, method, note, id],
    )?;
    Ok(changed == 1)
}

/// Transition `locked -> paid` from the payment-processor webhook.
pub fn set_paid_transfer(conn: &Connection, id: i64, paid_at: i64, transfer_ref: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ledger_entries
         SET status = 'paid', paid_at = ?1, transfer_ref = ?2
         WHERE id = ?3 AND status = 'locked'",
        rusqlite::params![paid_at, transfer_ref, id],
    )?;
    Ok(changed == 1)
}

/// Reverse `paid -> locked` (administrator correction). Clears payment
/// fields and any batch back-reference so the entry is payable again.
pub fn set_unpaid(conn: &Connection, id: i64, note: Option<&str>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ledger_entries
         SET status = 'locked', paid_at = NULL, paid_method = NULL,
             transfer_ref = NULL, batch_id = NULL, note = COALESCE(?1, note)
         WHERE id = ?2 AND status = 'paid'",
        rusqlite::params![note, id],
    )?;
    Ok(changed == 1)
}

/// Claim a locked, unbatched entry for a payout batch and mark it paid.
/// Clears any request back-reference: moving into a batch supersedes an
/// in-flight request claim.
pub fn claim_for_batch(conn: &Connection, id: i64, batch_id: i64, paid_at: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ledger_entries
         SET status = 'paid', paid_at = ?1, batch_id = ?2, request_id = NULL
         WHERE id = ?3 AND status = 'locked' AND batch_id IS NULL",
        rusqlite::params![paid_at, batch_id, id],
    )?;
    Ok(changed == 1)
}

/// Revert a voided batch's member to `locked`. Only touches the entry if
/// it still points at this batch and is still `paid`.
pub fn revert_batch_member(conn: &Connection, id: i64, batch_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ledger_entries
         SET status = 'locked', paid_at = NULL, batch_id = NULL
         WHERE id = ?1 AND batch_id = ?2 AND status = 'paid'",
        rusqlite::params![id, batch_id],
    )?;
    Ok(changed == 1)
}

/// Attach a payout-request back-reference to a locked, unclaimed entry.
pub fn set_request_ref(conn: &Connection, id: i64, request_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ledger_entries
         SET request_id = ?1
         WHERE id = ?2 AND status = 'locked' AND batch_id IS NULL AND request_id IS NULL",
        rusqlite::params![request_id, id],
    )?;
    Ok(changed == 1)
}

/// Clear a payout-request back-reference, unless the entry was already
/// paid through another channel.
pub fn clear_request_ref(conn: &Connection, id: i64, request_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ledger_entries
         SET request_id = NULL
         WHERE id = ?1 AND request_id = ?2 AND status != 'paid'",
        rusqlite::params![id, request_id],
    )?;
    Ok(changed == 1)
}

/// List a referrer's entries, newest period first, cursor on `period_start`.
pub fn list_for_referrer(
    conn: &Connection,
    referrer_id: &str,
    cursor: Option<i64>,
    limit: u32,
) -> Result<Vec<LedgerRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM ledger_entries
         WHERE referrer_id = ?1 AND (?2 IS NULL OR period_start < ?2)
         ORDER BY period_start DESC LIMIT ?3"
    ))?;

    let rows = stmt
        .query_map(rusqlite::params![referrer_id, cursor, limit], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// A raw ledger entry row.
#[derive(Clone, Debug)]
pub struct LedgerRow {
    pub id: i64,
    pub referrer_id: String,
    pub period_type: String,
    pub period_start: i64,
    pub period_end: i64,
    pub revenue_cents: i64,
    pub rate_bps: i64,
    pub commission_cents: i64,
    pub status: String,
    pub locked_at: Option<i64>,
    pub paid_at: Option<i64>,
    pub paid_method: Option<String>,
    pub transfer_ref: Option<String>,
    pub note: Option<String>,
    pub batch_id: Option<i64>,
    pub request_id: Option<i64>,
    pub created_at: i64,
}
