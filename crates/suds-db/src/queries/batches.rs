//! Payout batch query functions.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::Result;

const COLUMNS: &str = "id, created_by, method, note, total_commission_cents,
    status, transfer_status, transfer_ref, void_note, voided_at, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<BatchRow> {
    Ok(BatchRow {
        id: row.get(0)?,
        created_by: row.get(1)?,
        method: row.get(2)?,
        note: row.get(3)?,
        total_commission_cents: row.get(4)?,
        status: row.get(5)?,
        transfer_status: row.get(6)?,
        transfer_ref: row.get(7)?,
        void_note: row.get(8)?,
        voided_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Insert a `recorded` batch. Returns the new row id.
pub fn insert(
    conn: &Connection,
    created_by: &str,
    method: &str,
    note: Option<&str>,
    total_commission_cents: i64,
    created_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO payout_batches
            (created_by, method, note, total_commission_cents, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'recorded', ?5)",
        rusqlite::params![created_by, method, note, total_commission_cents, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record a ledger entry in the batch's permanent member snapshot.
pub fn add_member(conn: &Connection, batch_id: i64, ledger_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO payout_batch_members (batch_id, ledger_id) VALUES (?1, ?2)",
        rusqlite::params![batch_id, ledger_id],
    )?;
    Ok(())
}

/// Fetch a batch by id.
pub fn get(conn: &Connection, id: i64) -> Result<Option<BatchRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM payout_batches WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(row)
}

/// Member ledger-entry ids of a batch, in insertion order.
pub fn member_ids(conn: &Connection, batch_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT ledger_id FROM payout_batch_members WHERE batch_id = ?1 ORDER BY ledger_id",
    )?;
    let ids = stmt
        .query_map([batch_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Transition `recorded -> voided`.
pub fn set_voided(conn: &Connection, id: i64, voided_at: i64, void_note: Option<&str>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE payout_batches
         SET status = 'voided', voided_at = ?1, void_note = ?2
         WHERE id = ?3 AND status = 'recorded'",
        rusqlite::params![voided_at, void_note, id],
    )?;
    Ok(changed == 1)
}

/// Update the external-transfer sub-state from the processor feed.
pub fn set_transfer(
    conn: &Connection,
    id: i64,
    transfer_status: &str,
    transfer_ref: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE payout_batches
         SET transfer_status = ?1, transfer_ref = COALESCE(?2, transfer_ref)
         WHERE id = ?3",
        rusqlite::params![transfer_status, transfer_ref, id],
    )?;
    Ok(changed == 1)
}

/// List batches, newest first, cursor on `created_at`.
pub fn list(conn: &Connection, cursor: Option<i64>, limit: u32) -> Result<Vec<BatchRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM payout_batches
         WHERE (?1 IS NULL OR created_at < ?1)
         ORDER BY created_at DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![cursor, limit], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// List the batches containing any of a referrer's ledger entries,
/// newest first, cursor on `created_at`.
pub fn list_for_referrer(
    conn: &Connection,
    referrer_id: &str,
    cursor: Option<i64>,
    limit: u32,
) -> Result<Vec<BatchRow>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT b.id, b.created_by, b.method, b.note, b.total_commission_cents,
                b.status, b.transfer_status, b.transfer_ref, b.void_note, b.voided_at,
                b.created_at
         FROM payout_batches b
         JOIN payout_batch_members m ON m.batch_id = b.id
         JOIN ledger_entries le ON le.id = m.ledger_id
         WHERE le.referrer_id = ?1 AND (?2 IS NULL OR b.created_at < ?2)
         ORDER BY b.created_at DESC LIMIT ?3",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![referrer_id, cursor, limit], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A raw payout batch row.
#[derive(Clone, Debug)]
pub struct BatchRow {
    pub id: i64,
    pub created_by: String,
    pub method: String,
    pub note: Option<String>,
    pub total_commission_cents: i64,
    pub status: String,
    pub transfer_status: Option<String>,
    pub transfer_ref: Option<String>,
    pub void_note: Option<String>,
    pub voided_at: Option<i64>,
    pub created_at: i64,
}
