//! SQL schema definitions.

/// Complete schema for the Suds v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Identity (caller resolution support)
-- ============================================================

CREATE TABLE IF NOT EXISTS referrers (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

-- ============================================================
-- Attribution store (append-only revenue feed)
-- ============================================================

CREATE TABLE IF NOT EXISTS attributions (
    id INTEGER PRIMARY KEY,
    referrer_id TEXT NOT NULL REFERENCES referrers(id),
    purchaser_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    external_ref TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attributions_referrer_time
    ON attributions(referrer_id, created_at);

-- ============================================================
-- Commission ledger
-- ============================================================

CREATE TABLE IF NOT EXISTS ledger_entries (
    id INTEGER PRIMARY KEY,
    referrer_id TEXT NOT NULL REFERENCES referrers(id),
    period_type TEXT NOT NULL,
    period_start INTEGER NOT NULL,
    period_end INTEGER NOT NULL,
    revenue_cents INTEGER NOT NULL DEFAULT 0,
    rate_bps INTEGER NOT NULL,
    commission_cents INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'open',
    locked_at INTEGER,
    paid_at INTEGER,
    paid_method TEXT,
    transfer_ref TEXT,
    note TEXT,
    batch_id INTEGER REFERENCES payout_batches(id),
    request_id INTEGER REFERENCES payout_requests(id),
    created_at INTEGER NOT NULL,
    UNIQUE (referrer_id, period_type, period_start)
);

CREATE INDEX IF NOT EXISTS idx_ledger_referrer_period
    ON ledger_entries(referrer_id, period_start);
CREATE INDEX IF NOT EXISTS idx_ledger_status ON ledger_entries(status);

-- ============================================================
-- Payout batches
-- ============================================================

CREATE TABLE IF NOT EXISTS payout_batches (
    id INTEGER PRIMARY KEY,
    created_by TEXT NOT NULL REFERENCES referrers(id),
    method TEXT NOT NULL,
    note TEXT,
    total_commission_cents INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'recorded',
    transfer_status TEXT,
    transfer_ref TEXT,
    void_note TEXT,
    voided_at INTEGER,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_batches_created ON payout_batches(created_at);

-- Permanent member snapshot; survives members being reverted to locked.
CREATE TABLE IF NOT EXISTS payout_batch_members (
    batch_id INTEGER NOT NULL REFERENCES payout_batches(id),
    ledger_id INTEGER NOT NULL REFERENCES ledger_entries(id),
    PRIMARY KEY (batch_id, ledger_id)
);

-- ============================================================
-- Payout requests
-- ============================================================

CREATE TABLE IF NOT EXISTS payout_requests (
    id INTEGER PRIMARY KEY,
    referrer_id TEXT NOT NULL REFERENCES referrers(id),
    status TEXT NOT NULL DEFAULT 'submitted',
    total_commission_cents INTEGER NOT NULL,
    total_revenue_cents INTEGER NOT NULL,
    referrer_note TEXT,
    admin_note TEXT,
    batch_id INTEGER REFERENCES payout_batches(id),
    submitted_at INTEGER NOT NULL,
    decided_at INTEGER,
    cancelled_at INTEGER,
    completed_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_requests_referrer
    ON payout_requests(referrer_id, submitted_at);
CREATE INDEX IF NOT EXISTS idx_requests_submitted
    ON payout_requests(submitted_at);

CREATE TABLE IF NOT EXISTS payout_request_members (
    request_id INTEGER NOT NULL REFERENCES payout_requests(id),
    ledger_id INTEGER NOT NULL REFERENCES ledger_entries(id),
    PRIMARY KEY (request_id, ledger_id)
);
"#;
