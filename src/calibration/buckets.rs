//! Move-size and elapsed-time buckets
//!
//! Both bucket families are ordered, half-open ranges. Values outside every
//! range classify as `None`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Absolute move-from-open bucket, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MoveBucket {
    #[serde(rename = "0.03-0.05")]
    Small,
    #[serde(rename = "0.05-0.10")]
    Moderate,
    #[serde(rename = "0.10-0.20")]
    Large,
    #[serde(rename = "0.20+")]
    Extreme,
}

impl MoveBucket {
    pub const ALL: [MoveBucket; 4] = [
        MoveBucket::Small,
        MoveBucket::Moderate,
        MoveBucket::Large,
        MoveBucket::Extreme,
    ];

    /// `[lower, upper)`; the top bucket is unbounded
    pub fn bounds(self) -> (Decimal, Option<Decimal>) {
        match self {
            MoveBucket::Small => (dec!(0.03), Some(dec!(0.05))),
            MoveBucket::Moderate => (dec!(0.05), Some(dec!(0.10))),
            MoveBucket::Large => (dec!(0.10), Some(dec!(0.20))),
            MoveBucket::Extreme => (dec!(0.20), None),
        }
    }

    /// Label used in persisted tables
    pub fn label(self) -> &'static str {
        match self {
            MoveBucket::Small => "0.03-0.05",
            MoveBucket::Moderate => "0.05-0.10",
            MoveBucket::Large => "0.10-0.20",
            MoveBucket::Extreme => "0.20+",
        }
    }

    /// Classify an absolute move in percent
    pub fn classify(abs_move_pct: Decimal) -> Option<Self> {
        Self::ALL.into_iter().find(|b| {
            let (lo, hi) = b.bounds();
            abs_move_pct >= lo && hi.map_or(true, |hi| abs_move_pct < hi)
        })
    }
}

/// Seconds-since-open bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElapsedBucket {
    #[serde(rename = "60-180")]
    Early,
    #[serde(rename = "180-420")]
    Developing,
    #[serde(rename = "420-600")]
    Middle,
    #[serde(rename = "600-840")]
    Late,
}

impl ElapsedBucket {
    pub const ALL: [ElapsedBucket; 4] = [
        ElapsedBucket::Early,
        ElapsedBucket::Developing,
        ElapsedBucket::Middle,
        ElapsedBucket::Late,
    ];

    /// `[lower, upper)` in seconds. The last range includes the 840 s mark.
    pub fn bounds(self) -> (i64, i64) {
        match self {
            ElapsedBucket::Early => (60, 180),
            ElapsedBucket::Developing => (180, 420),
            ElapsedBucket::Middle => (420, 600),
            ElapsedBucket::Late => (600, 841),
        }
    }

    /// Label used in persisted tables
    pub fn label(self) -> &'static str {
        match self {
            ElapsedBucket::Early => "60-180",
            ElapsedBucket::Developing => "180-420",
            ElapsedBucket::Middle => "420-600",
            ElapsedBucket::Late => "600-840",
        }
    }

    /// Classify elapsed seconds since interval open
    pub fn classify(elapsed_secs: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|b| {
            let (lo, hi) = b.bounds();
            elapsed_secs >= lo && elapsed_secs < hi
        })
    }
}
