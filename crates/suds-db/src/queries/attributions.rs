//! Attribution store query functions.
//!
//! Attributions are append-only: they are inserted by the revenue-event
//! feed and summed by the ledger aggregator. There are no update or delete
//! functions in this module on purpose.

use rusqlite::Connection;

use crate::Result;

/// Append an attribution record. Returns the new row id.
#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    referrer_id: &str,
    purchaser_id: &str,
    kind: &str,
    amount_cents: i64,
    currency: &str,
    external_ref: Option<&str>,
    created_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO attributions
            (referrer_id, purchaser_id, kind, amount_cents, currency, external_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            referrer_id,
            purchaser_id,
            kind,
            amount_cents,
            currency,
            external_ref,
            created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Sum revenue-bearing attribution amounts for a referrer in `[start, end)`.
pub fn revenue_sum(conn: &Connection, referrer_id: &str, start: i64, end: i64) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM attributions
         WHERE referrer_id = ?1 AND kind = 'invoice_paid'
           AND created_at >= ?2 AND created_at < ?3",
        rusqlite::params![referrer_id, start, end],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// List a referrer's attributions, newest first, cursor on `created_at`.
pub fn list_for_referrer(
    conn: &Connection,
    referrer_id: &str,
    cursor: Option<i64>,
    limit: u32,
) -> Result<Vec<AttributionRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, referrer_id, purchaser_id, kind, amount_cents, currency,
                external_ref, created_at
         FROM attributions
         WHERE referrer_id = ?1 AND (?2 IS NULL OR created_at < ?2)
         ORDER BY created_at DESC LIMIT ?3",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![referrer_id, cursor, limit], |row| {
            Ok(AttributionRow {
                id: row.get(0)?,
                referrer_id: row.get(1)?,
                purchaser_id: row.get(2)?,
                kind: row.get(3)?,
                amount_cents: row.get(4)?,
                currency: row.get(5)?,
                external_ref: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// A raw attribution row.
#[derive(Clone, Debug)]
pub struct AttributionRow {
    pub id: i64,
    pub referrer_id: String,
    pub purchaser_id: String,
    pub kind: String,
    pub amount_cents: i64,
    pub currency: String,
    pub external_ref: Option<String>,
    pub created_at: i64,
}
