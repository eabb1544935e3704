//! Referrer identity query functions.
//!
//! The referrers table backs caller resolution: the daemon looks up the
//! caller id here and fails with `Unauthenticated` when the row is absent.

use rusqlite::{Connection, OptionalExtension};

use crate::Result;

/// Insert a referrer (or administrator) identity.
pub fn insert(
    conn: &Connection,
    id: &str,
    display_name: &str,
    is_admin: bool,
    created_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO referrers (id, display_name, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, display_name, is_admin, created_at],
    )?;
    Ok(())
}

/// Look up a referrer by id.
pub fn get(conn: &Connection, id: &str) -> Result<Option<ReferrerRow>> {
    let row = conn
        .query_row(
            "SELECT id, display_name, is_admin, created_at FROM referrers WHERE id = ?1",
            [id],
            |row| {
                Ok(ReferrerRow {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    is_admin: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// A raw referrer row.
#[derive(Clone, Debug)]
pub struct ReferrerRow {
    pub id: String,
    pub display_name: String,
    pub is_admin: bool,
    pub created_at: i64,
}
