//! Integration test: the payout lifecycle over locked statements.
//!
//! Exercises the full flow end-to-end:
//! 1. Lock the March statement, batch it with method "Zelle", verify the
//!    entry is paid with a batch back-reference
//! 2. Void the batch and verify the entry reverts to locked
//! 3. All-or-nothing batch validation and contested-entry claims
//! 4. The transfer-in-progress void guard
//! 5. The request lifecycle: deny clears claims, complete pays as batch

use suds_db::queries::{batches, ledger};
use suds_integration_tests::{admin, paid_invoice, referrer, scenario_db, utc_date};
use suds_ledger::{aggregate, state};
use suds_payout::{batch, request, PayoutError};
use suds_types::status::PeriodType;

/// Aggregate and lock ref-1's March 2024 statement (12,500 cents revenue,
/// 1,250 commission at 10%).
fn locked_march_statement(conn: &mut rusqlite::Connection) -> i64 {
    paid_invoice(conn, "ref-1", 10_000, utc_date(2024, 3, 5));
    paid_invoice(conn, "ref-1", 2_500, utc_date(2024, 3, 20));
    let entry = aggregate::upsert_ledger(
        conn,
        &referrer("ref-1"),
        "ref-1",
        PeriodType::Monthly,
        utc_date(2024, 3, 15),
        1_000,
    )
    .expect("upsert");
    state::lock_entry(conn, &referrer("ref-1"), entry.id, None, 2_000).expect("lock");
    entry.id
}

#[test]
fn batch_then_void_round_trip() {
    let mut conn = scenario_db();
    let entry_id = locked_march_statement(&mut conn);

    // Batch with method "Zelle": entry becomes paid with a back-reference.
    let created = batch::create_batch(&mut conn, &admin(), &[entry_id], "Zelle", None, 3_000)
        .expect("create batch");
    assert_eq!(created.total_commission_cents, 1_250);

    let entry = ledger::get(&conn, entry_id).expect("get").expect("present");
    assert_eq!(entry.status, "paid");
    assert_eq!(entry.batch_id, Some(created.id));
    assert_eq!(entry.paid_at, Some(3_000));

    let fetched = batches::get(&conn, created.id).expect("get").expect("present");
    assert_eq!(fetched.total_commission_cents, 1_250);
    assert_eq!(fetched.status, "recorded");

    // Void: entry reverts to locked, payment fields cleared.
    let voided = batch::void_batch(&mut conn, &admin(), created.id, Some("bounced"), 4_000)
        .expect("void");
    assert_eq!(voided.status, "voided");
    assert_eq!(voided.voided_at, Some(4_000));

    let entry = ledger::get(&conn, entry_id).expect("get").expect("present");
    assert_eq!(entry.status, "locked");
    assert!(entry.paid_at.is_none());
    assert!(entry.batch_id.is_none());

    // The voided batch keeps its snapshot for the audit trail.
    let fetched = batches::get(&conn, created.id).expect("get").expect("present");
    assert_eq!(fetched.total_commission_cents, 1_250);
}

#[test]
fn batch_over_ineligible_set_mutates_nothing() {
    let mut conn = scenario_db();
    let good = locked_march_statement(&mut conn);

    // A second, already-paid statement poisons the selection.
    paid_invoice(&mut conn, "ref-1", 5_000, utc_date(2024, 4, 10));
    let poisoned = aggregate::upsert_ledger(
        &mut conn,
        &referrer("ref-1"),
        "ref-1",
        PeriodType::Monthly,
        utc_date(2024, 4, 10),
        1_000,
    )
    .expect("upsert");
    state::lock_entry(&mut conn, &referrer("ref-1"), poisoned.id, None, 2_000).expect("lock");
    state::mark_paid_manual(&mut conn, &referrer("ref-1"), poisoned.id, Some("Zelle"), None, 2_500)
        .expect("pay");

    let err = batch::create_batch(&mut conn, &admin(), &[good, poisoned.id], "Zelle", None, 3_000)
        .expect_err("one paid member fails the whole batch");
    match err {
        PayoutError::InvalidState { status, .. } => assert_eq!(status, "paid"),
        other => panic!("unexpected error: {other}"),
    }

    // Re-read every entry in the attempted set: zero mutation.
    let good_row = ledger::get(&conn, good).expect("get").expect("present");
    assert_eq!(good_row.status, "locked");
    assert!(good_row.batch_id.is_none());
    let poisoned_row = ledger::get(&conn, poisoned.id).expect("get").expect("present");
    assert_eq!(poisoned_row.paid_at, Some(2_500));
}

#[test]
fn contested_entry_claimed_by_exactly_one_batch() {
    let mut conn = scenario_db();
    let contested = locked_march_statement(&mut conn);

    paid_invoice(&mut conn, "ref-1", 5_000, utc_date(2024, 4, 10));
    let other = aggregate::upsert_ledger(
        &mut conn,
        &referrer("ref-1"),
        "ref-1",
        PeriodType::Monthly,
        utc_date(2024, 4, 10),
        1_000,
    )
    .expect("upsert");
    state::lock_entry(&mut conn, &referrer("ref-1"), other.id, None, 2_000).expect("lock");

    // Two batch attempts race on the contested entry; per-document write
    // isolation means whichever commits first wins.
    let winner = batch::create_batch(&mut conn, &admin(), &[contested], "Zelle", None, 3_000)
        .expect("winner");
    let err = batch::create_batch(&mut conn, &admin(), &[other.id, contested], "Zelle", None, 3_001)
        .expect_err("loser observes the claim");
    match err {
        PayoutError::AlreadyBatched { ledger_id, batch_id } => {
            assert_eq!(ledger_id, contested);
            assert_eq!(batch_id, winner.id);
        }
        other_err => panic!("unexpected error: {other_err}"),
    }

    // The loser's whole call aborted: its other entry is still locked.
    let other_row = ledger::get(&conn, other.id).expect("get").expect("present");
    assert_eq!(other_row.status, "locked");
    assert!(other_row.batch_id.is_none());
}

#[test]
fn processing_transfer_blocks_void() {
    let mut conn = scenario_db();
    let entry_id = locked_march_statement(&mut conn);
    let created = batch::create_batch(&mut conn, &admin(), &[entry_id], "stripe", None, 3_000)
        .expect("create batch");

    batches::set_transfer(&conn, created.id, "processing", Some("tr_42")).expect("processing");
    let err = batch::void_batch(&mut conn, &admin(), created.id, None, 4_000)
        .expect_err("void during transfer");
    assert!(matches!(err, PayoutError::TransferInProgress(_)));

    // Members stay paid while the transfer is mid-flight.
    let entry = ledger::get(&conn, entry_id).expect("get").expect("present");
    assert_eq!(entry.status, "paid");

    // Settlement unblocks the void.
    batches::set_transfer(&conn, created.id, "paid", None).expect("settled");
    batch::void_batch(&mut conn, &admin(), created.id, None, 5_000).expect("void after settle");
}

#[test]
fn denied_request_releases_claims_without_reopening() {
    let mut conn = scenario_db();
    let entry_id = locked_march_statement(&mut conn);

    let submitted = request::create_request(&mut conn, &referrer("ref-1"), &[entry_id], None, 3_000)
        .expect("submit");
    let entry = ledger::get(&conn, entry_id).expect("get").expect("present");
    assert_eq!(entry.request_id, Some(submitted.id));

    let denied = request::deny_request(&mut conn, &admin(), submitted.id, "duplicate", 4_000)
        .expect("deny");
    assert_eq!(denied.status, "denied");
    assert_eq!(denied.admin_note.as_deref(), Some("duplicate"));

    // Claim cleared, status stays locked — never reverted to open.
    let entry = ledger::get(&conn, entry_id).expect("get").expect("present");
    assert!(entry.request_id.is_none());
    assert_eq!(entry.status, "locked");
}

#[test]
fn completed_request_pays_members_via_batch() {
    let mut conn = scenario_db();
    let entry_id = locked_march_statement(&mut conn);

    let submitted = request::create_request(
        &mut conn,
        &referrer("ref-1"),
        &[entry_id],
        Some("please pay out"),
        3_000,
    )
    .expect("submit");
    assert_eq!(submitted.total_commission_cents, 1_250);
    assert_eq!(submitted.total_revenue_cents, 12_500);

    request::approve_request(&mut conn, &admin(), submitted.id, None, 4_000).expect("approve");
    let (completed, paid_batch) =
        request::complete_request(&mut conn, &admin(), submitted.id, "Zelle", None, 5_000)
            .expect("complete");

    assert_eq!(completed.status, "completed");
    assert_eq!(completed.batch_id, Some(paid_batch.id));
    assert_eq!(paid_batch.total_commission_cents, 1_250);

    let entry = ledger::get(&conn, entry_id).expect("get").expect("present");
    assert_eq!(entry.status, "paid");
    assert_eq!(entry.batch_id, Some(paid_batch.id));
    assert!(entry.request_id.is_none());

    // Batch-vs-request exclusivity held the whole way: a paid entry never
    // carries both references.
    assert!(entry.batch_id.is_some() && entry.request_id.is_none());
}

#[test]
fn stale_request_cannot_complete_after_out_of_band_payment() {
    let mut conn = scenario_db();
    let entry_id = locked_march_statement(&mut conn);

    let submitted = request::create_request(&mut conn, &referrer("ref-1"), &[entry_id], None, 3_000)
        .expect("submit");

    // The entry is batched directly while the request is pending; the
    // batch claim supersedes and clears the request claim.
    let direct = batch::create_batch(&mut conn, &admin(), &[entry_id], "check", None, 4_000)
        .expect("direct batch");
    let entry = ledger::get(&conn, entry_id).expect("get").expect("present");
    assert_eq!(entry.batch_id, Some(direct.id));
    assert!(entry.request_id.is_none());

    // Completion re-validates members and must observe the stale state.
    let err = request::complete_request(&mut conn, &admin(), submitted.id, "Zelle", None, 5_000)
        .expect_err("stale request");
    match err {
        PayoutError::InvalidState { status, .. } => assert_eq!(status, "paid"),
        other => panic!("unexpected error: {other}"),
    }

    // The eligibility read path reports the same verdict without mutating.
    let (row, members) = request::request_with_eligibility(&conn, submitted.id).expect("view");
    assert_eq!(row.status, "submitted");
    assert!(!members[0].eligible);
}
