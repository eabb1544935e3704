//! Payout request query functions.
//!
//! Status transitions are guarded on the current status so that a stale
//! administrator decision observes "the world changed" instead of
//! overwriting a concurrent transition.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::Result;

const COLUMNS: &str = "id, referrer_id, status, total_commission_cents,
    total_revenue_cents, referrer_note, admin_note, batch_id, submitted_at,
    decided_at, cancelled_at, completed_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        referrer_id: row.get(1)?,
        status: row.get(2)?,
        total_commission_cents: row.get(3)?,
        total_revenue_cents: row.get(4)?,
        referrer_note: row.get(5)?,
        admin_note: row.get(6)?,
        batch_id: row.get(7)?,
        submitted_at: row.get(8)?,
        decided_at: row.get(9)?,
        cancelled_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

/// Insert a `submitted` request. Returns the new row id.
pub fn insert(
    conn: &Connection,
    referrer_id: &str,
    total_commission_cents: i64,
    total_revenue_cents: i64,
    referrer_note: Option<&str>,
    submitted_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO payout_requests
            (referrer_id, status, total_commission_cents, total_revenue_cents,
             referrer_note, submitted_at)
         VALUES (?1, 'submitted', ?2, ?3, ?4, ?5)",
        rusqlite::params![
            referrer_id,
            total_commission_cents,
            total_revenue_cents,
            referrer_note,
            submitted_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record a ledger entry in the request's member snapshot.
pub fn add_member(conn: &Connection, request_id: i64, ledger_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO payout_request_members (request_id, ledger_id) VALUES (?1, ?2)",
        rusqlite::params![request_id, ledger_id],
    )?;
    Ok(())
}

/// Fetch a request by id.
pub fn get(conn: &Connection, id: i64) -> Result<Option<RequestRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM payout_requests WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(row)
}

/// Member ledger-entry ids of a request, in insertion order.
pub fn member_ids(conn: &Connection, request_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT ledger_id FROM payout_request_members WHERE request_id = ?1 ORDER BY ledger_id",
    )?;
    let ids = stmt
        .query_map([request_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Transition `submitted -> cancelled` (referrer action).
pub fn set_cancelled(
    conn: &Connection,
    id: i64,
    cancelled_at: i64,
    note: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE payout_requests
         SET status = 'cancelled', cancelled_at = ?1,
             referrer_note = COALESCE(?2, referrer_note)
         WHERE id = ?3 AND status = 'submitted'",
        rusqlite::params![cancelled_at, note, id],
    )?;
    Ok(changed == 1)
}

/// Transition `submitted -> approved` (administrator action).
pub fn set_approved(conn: &Connection, id: i64, decided_at: i64, note: Option<&str>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE payout_requests
         SET status = 'approved', decided_at = ?1, admin_note = COALESCE(?2, admin_note)
         WHERE id = ?3 AND status = 'submitted'",
        rusqlite::params![decided_at, note, id],
    )?;
    Ok(changed == 1)
}

/// Transition `submitted|approved -> denied` (administrator action).
/// The reason is mandatory and validated upstream.
pub fn set_denied(conn: &Connection, id: i64, decided_at: i64, reason: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE payout_requests
         SET status = 'denied', decided_at = ?1, admin_note = ?2
         WHERE id = ?3 AND status IN ('submitted', 'approved')",
        rusqlite::params![decided_at, reason, id],
    )?;
    Ok(changed == 1)
}

/// Transition `submitted|approved -> completed` with the resulting batch.
pub fn set_completed(
    conn: &Connection,
    id: i64,
    batch_id: i64,
    completed_at: i64,
    note: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE payout_requests
         SET status = 'completed', completed_at = ?1, batch_id = ?2,
             admin_note = COALESCE(?3, admin_note)
         WHERE id = ?4 AND status IN ('submitted', 'approved')",
        rusqlite::params![completed_at, batch_id, note, id],
    )?;
    Ok(changed == 1)
}

/// List a referrer's requests, newest first, cursor on `submitted_at`.
pub fn list_for_referrer(
    conn: &Connection,
    referrer_id: &str,
    cursor: Option<i64>,
    limit: u32,
) -> Result<Vec<RequestRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM payout_requests
         WHERE referrer_id = ?1 AND (?2 IS NULL OR submitted_at < ?2)
         ORDER BY submitted_at DESC LIMIT ?3"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![referrer_id, cursor, limit], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// List all requests, newest first, cursor on `submitted_at`.
pub fn list_all(conn: &Connection, cursor: Option<i64>, limit: u32) -> Result<Vec<RequestRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM payout_requests
         WHERE (?1 IS NULL OR submitted_at < ?1)
         ORDER BY submitted_at DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![cursor, limit], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A raw payout request row.
#[derive(Clone, Debug)]
pub struct RequestRow {
    pub id: i64,
    pub referrer_id: String,
    pub status: String,
    pub total_commission_cents: i64,
    pub total_revenue_cents: i64,
    pub referrer_note: Option<String>,
    pub admin_note: Option<String>,
    pub batch_id: Option<i64>,
    pub submitted_at: i64,
    pub decided_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub completed_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::referrers;

    fn test_db() -> Connection {
        let conn = crate::open_memory().expect("open test db");
        referrers::insert(&conn, "ref-1", "Ada", false, 100).expect("seed referrer");
        conn
    }

    fn seed_request(conn: &Connection) -> i64 {
        insert(conn, "ref-1", 1_250, 12_500, Some("cash out please"), 1_000).expect("insert")
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_db();
        let id = seed_request(&conn);

        let row = get(&conn, id).expect("get").expect("present");
        assert_eq!(row.status, "submitted");
        assert_eq!(row.total_commission_cents, 1_250);
        assert_eq!(row.total_revenue_cents, 12_500);
        assert_eq!(row.referrer_note.as_deref(), Some("cash out please"));
        assert!(row.batch_id.is_none());
    }

    #[test]
    fn test_cancel_only_from_submitted() {
        let conn = test_db();
        let id = seed_request(&conn);

        assert!(set_cancelled(&conn, id, 2_000, Some("changed my mind")).expect("cancel"));
        assert!(!set_cancelled(&conn, id, 3_000, None).expect("re-cancel"));

        let row = get(&conn, id).expect("get").expect("present");
        assert_eq!(row.status, "cancelled");
        assert_eq!(row.cancelled_at, Some(2_000));
    }

    #[test]
    fn test_approve_then_deny() {
        let conn = test_db();
        let id = seed_request(&conn);

        assert!(set_approved(&conn, id, 2_000, Some("looks fine")).expect("approve"));
        assert!(!set_approved(&conn, id, 2_500, None).expect("re-approve"));
        // Deny is reachable from approved.
        assert!(set_denied(&conn, id, 3_000, "duplicate").expect("deny"));

        let row = get(&conn, id).expect("get").expect("present");
        assert_eq!(row.status, "denied");
        assert_eq!(row.admin_note.as_deref(), Some("duplicate"));
    }

    #[test]
    fn test_denied_is_terminal() {
        let conn = test_db();
        let id = seed_request(&conn);
        set_denied(&conn, id, 2_000, "duplicate").expect("deny");

        assert!(!set_approved(&conn, id, 3_000, None).expect("approve after deny"));
        assert!(!set_completed(&conn, id, 1, 3_000, None).expect("complete after deny"));
        assert!(!set_cancelled(&conn, id, 3_000, None).expect("cancel after deny"));
    }

    #[test]
    fn test_complete_from_submitted_or_approved() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO payout_batches (created_by, method, total_commission_cents, created_at)
             VALUES ('ref-1', 'Zelle', 1250, 100)",
            [],
        )
        .expect("batch row");

        let direct = seed_request(&conn);
        assert!(set_completed(&conn, direct, 1, 2_000, None).expect("complete"));

        let via_approval = insert(&conn, "ref-1", 1_250, 12_500, None, 1_500).expect("insert");
        set_approved(&conn, via_approval, 2_000, None).expect("approve");
        assert!(set_completed(&conn, via_approval, 1, 3_000, Some("paid out")).expect("complete"));

        let row = get(&conn, via_approval).expect("get").expect("present");
        assert_eq!(row.status, "completed");
        assert_eq!(row.batch_id, Some(1));
        assert_eq!(row.completed_at, Some(3_000));
    }

    #[test]
    fn test_list_for_referrer_cursor() {
        let conn = test_db();
        referrers::insert(&conn, "ref-2", "Bo", false, 100).expect("seed");
        insert(&conn, "ref-1", 0, 0, None, 1_000).expect("insert");
        insert(&conn, "ref-1", 0, 0, None, 2_000).expect("insert");
        insert(&conn, "ref-2", 0, 0, None, 3_000).expect("insert");

        let page = list_for_referrer(&conn, "ref-1", None, 10).expect("list");
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].submitted_at, 2_000);

        let next = list_for_referrer(&conn, "ref-1", Some(2_000), 10).expect("list");
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].submitted_at, 1_000);

        let all = list_all(&conn, None, 10).expect("list all");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].submitted_at, 3_000);
    }
}
