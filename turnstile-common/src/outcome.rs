//! Outcome classification and statistics snapshot types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Synthetic classification assigned to an admitted request.
///
/// Each outcome carries a wire status code and a polarity; the polarity
/// buckets feed the process-wide totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// 200 - success class
    Ok,
    /// 202 - accepted class
    Accepted,
    /// 400 - client error class
    BadRequest,
    /// 500 - server error class
    ServerError,
}

impl Outcome {
    /// Wire status code for this outcome
    pub const fn code(&self) -> u16 {
        match self {
            Outcome::Ok => 200,
            Outcome::Accepted => 202,
            Outcome::BadRequest => 400,
            Outcome::ServerError => 500,
        }
    }

    /// Canonical reason text, sent as the response body on the write path
    pub const fn reason(&self) -> &'static str {
        match self {
            Outcome::Ok => "OK",
            Outcome::Accepted => "Accepted",
            Outcome::BadRequest => "Bad Request",
            Outcome::ServerError => "Internal Server Error",
        }
    }

    /// Polarity bucket this outcome counts toward
    pub const fn polarity(&self) -> Polarity {
        match self {
            Outcome::Ok | Outcome::Accepted => Polarity::Positive,
            Outcome::BadRequest | Outcome::ServerError => Polarity::Negative,
        }
    }
}

impl TryFrom<u16> for Outcome {
    type Error = UnknownOutcome;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(Outcome::Ok),
            202 => Ok(Outcome::Accepted),
            400 => Ok(Outcome::BadRequest),
            500 => Ok(Outcome::ServerError),
            other => Err(UnknownOutcome(other)),
        }
    }
}

/// Status code outside the outcome set
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized outcome code {0}")]
pub struct UnknownOutcome(pub u16);

/// Positive/negative grouping used for the global totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

/// Outcome code -> occurrence count for one client.
///
/// Keyed by the wire code and ordered, so serialized snapshots come out
/// key-sorted.
pub type ClientCounters = BTreeMap<u16, u64>;

/// Full point-in-time copy of the per-client statistics
pub type StatsSnapshot = BTreeMap<String, ClientCounters>;

/// Process-wide polarity totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalCounters {
    pub total_positive: u64,
    pub total_negative: u64,
}
