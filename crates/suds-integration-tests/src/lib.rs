//! Integration test crate for the Suds commission ledger.
//!
//! This crate carries no production logic — it only hosts integration
//! tests that exercise the ledger and payout lifecycle across the
//! workspace crates, plus a few shared scenario helpers.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p suds-integration-tests
//! ```

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use suds_db::queries::{attributions, referrers};
use suds_types::caller::Caller;

/// Open an in-memory database seeded with one admin and two referrers.
pub fn scenario_db() -> Connection {
    let conn = suds_db::open_memory().expect("open test db");
    referrers::insert(&conn, "adm-1", "Admin", true, 100).expect("seed admin");
    referrers::insert(&conn, "ref-1", "Ada", false, 100).expect("seed referrer");
    referrers::insert(&conn, "ref-2", "Bo", false, 100).expect("seed referrer");
    conn
}

/// The standing administrator.
pub fn admin() -> Caller {
    Caller::admin("adm-1")
}

/// A referrer caller.
pub fn referrer(id: &str) -> Caller {
    Caller::referrer(id)
}

/// Midnight UTC of a calendar date.
pub fn utc_date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid date")
}

/// Append a paid-invoice attribution at the given instant.
pub fn paid_invoice(conn: &Connection, referrer_id: &str, cents: i64, at: DateTime<Utc>) {
    attributions::insert(
        conn,
        referrer_id,
        "cust-1",
        "invoice_paid",
        cents,
        "USD",
        Some("inv_test"),
        at.timestamp(),
    )
    .expect("attribution");
}
