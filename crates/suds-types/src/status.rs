//! Status and period enumerations.
//!
//! Statuses are stored as lowercase text in SQLite and parsed back into
//! these enums wherever a transition decision is made, so illegal
//! transitions are rejected against the typed value rather than a raw
//! string.

use serde::{Deserialize, Serialize};

/// Accounting period granularity for a ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Monthly,
    Weekly,
}

impl PeriodType {
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodType::Monthly => "monthly",
            PeriodType::Weekly => "weekly",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "monthly" => Some(PeriodType::Monthly),
            "weekly" => Some(PeriodType::Weekly),
            _ => None,
        }
    }
}

/// Lifecycle state of a ledger entry.
///
/// `open` entries are freely recomputable; `locked` and `paid` entries are
/// frozen statements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Open,
    Locked,
    Paid,
}

impl LedgerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerStatus::Open => "open",
            LedgerStatus::Locked => "locked",
            LedgerStatus::Paid => "paid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "open" => Some(LedgerStatus::Open),
            "locked" => Some(LedgerStatus::Locked),
            "paid" => Some(LedgerStatus::Paid),
            _ => None,
        }
    }

    /// Whether the entry's totals are frozen against recomputation.
    pub fn is_frozen(self) -> bool {
        matches!(self, LedgerStatus::Locked | LedgerStatus::Paid)
    }
}

/// Lifecycle state of a payout batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Recorded,
    Voided,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Recorded => "recorded",
            BatchStatus::Voided => "voided",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "recorded" => Some(BatchStatus::Recorded),
            "voided" => Some(BatchStatus::Voided),
            _ => None,
        }
    }
}

/// External-transfer sub-state of a payout batch, driven by the payment
/// processor webhook feed. Runs independently of the batch status, except
/// that a batch in `processing` cannot be voided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Recorded,
    Processing,
    Paid,
    Failed,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Recorded => "recorded",
            TransferStatus::Processing => "processing",
            TransferStatus::Paid => "paid",
            TransferStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "recorded" => Some(TransferStatus::Recorded),
            "processing" => Some(TransferStatus::Processing),
            "paid" => Some(TransferStatus::Paid),
            "failed" => Some(TransferStatus::Failed),
            _ => None,
        }
    }
}

/// Lifecycle state of a referrer-initiated payout request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Submitted,
    Approved,
    Denied,
    Cancelled,
    Completed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Submitted => "submitted",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "submitted" => Some(RequestStatus::Submitted),
            "approved" => Some(RequestStatus::Approved),
            "denied" => Some(RequestStatus::Denied),
            "cancelled" => Some(RequestStatus::Cancelled),
            "completed" => Some(RequestStatus::Completed),
            _ => None,
        }
    }

    /// Whether an administrator may still complete this request as a batch.
    pub fn completable(self) -> bool {
        matches!(self, RequestStatus::Submitted | RequestStatus::Approved)
    }
}

/// Attribution kind. Only `invoice_paid` carries monetary value; other
/// kinds are stored for reporting but excluded from aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionKind {
    InvoicePaid,
    LeadSignup,
}

impl AttributionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttributionKind::InvoicePaid => "invoice_paid",
            AttributionKind::LeadSignup => "lead_signup",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "invoice_paid" => Some(AttributionKind::InvoicePaid),
            "lead_signup" => Some(AttributionKind::LeadSignup),
            _ => None,
        }
    }

    /// Whether this kind contributes to attributed revenue.
    pub fn revenue_bearing(self) -> bool {
        matches!(self, AttributionKind::InvoicePaid)
    }
}
