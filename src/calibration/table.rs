//! Fair-value table and runtime lookup

use super::{CalibrationError, ElapsedBucket, FairValueLookup, MoveBucket};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One table cell: empirical win rate and its sample count
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// `None` when no samples were seen
    pub win_rate: Option<f64>,
    pub count: u64,
}

impl Cell {
    /// Whether the cell has a rate backed by at least `min_samples`
    pub fn is_trusted(&self, min_samples: u64) -> bool {
        self.win_rate.is_some() && self.count >= min_samples
    }
}

/// Move label -> elapsed label -> cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketTable {
    cells: BTreeMap<MoveBucket, BTreeMap<ElapsedBucket, Cell>>,
}

impl BucketTable {
    /// Cell for a bucket pair
    pub fn get(&self, m: MoveBucket, e: ElapsedBucket) -> Option<&Cell> {
        self.cells.get(&m)?.get(&e)
    }

    /// Set a cell
    pub fn insert(&mut self, m: MoveBucket, e: ElapsedBucket, cell: Cell) {
        self.cells.entry(m).or_default().insert(e, cell);
    }

    /// All cells in bucket order
    pub fn iter(&self) -> impl Iterator<Item = (MoveBucket, ElapsedBucket, &Cell)> {
        self.cells
            .iter()
            .flat_map(|(m, row)| row.iter().map(move |(e, c)| (*m, *e, c)))
    }

    /// Copy with untrusted cells' rates blanked; counts are kept
    pub fn trusted_only(&self, min_samples: u64) -> Self {
        let mut out = Self::default();
        for (m, e, cell) in self.iter() {
            let win_rate = if cell.is_trusted(min_samples) {
                cell.win_rate
            } else {
                None
            };
            out.insert(
                m,
                e,
                Cell {
                    win_rate,
                    count: cell.count,
                },
            );
        }
        out
    }
}

/// Accumulates wins and totals per bucket pair
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    counts: BTreeMap<(MoveBucket, ElapsedBucket), (u64, u64)>,
}

impl TableBuilder {
    /// Record one observation
    pub fn record(&mut self, m: MoveBucket, e: ElapsedBucket, won: bool) {
        let (wins, total) = self.counts.entry((m, e)).or_default();
        *total += 1;
        if won {
            *wins += 1;
        }
    }

    /// Build a complete table; empty cells carry a `None` rate
    pub fn build(&self) -> BucketTable {
        let mut table = BucketTable::default();
        for m in MoveBucket::ALL {
            for e in ElapsedBucket::ALL {
                let (wins, total) = self.counts.get(&(m, e)).copied().unwrap_or_default();
                let win_rate = (total > 0).then(|| wins as f64 / total as f64);
                table.insert(
                    m,
                    e,
                    Cell {
                        win_rate,
                        count: total,
                    },
                );
            }
        }
        table
    }
}

/// A trusted fair-value hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairValue {
    pub probability: f64,
    pub count: u64,
    pub move_bucket: MoveBucket,
    pub elapsed_bucket: ElapsedBucket,
}

/// On-disk shapes accepted by [`FairValueTable::from_json`]
#[derive(Deserialize)]
#[serde(untagged)]
enum TableFile {
    Report { bot_table: BucketTable },
    Bare(BucketTable),
}

/// Read-only calibration table consumed by the live engine
#[derive(Debug, Clone, Default)]
pub struct FairValueTable {
    table: BucketTable,
    min_samples: u64,
}

impl FairValueTable {
    pub fn new(table: BucketTable, min_samples: u64) -> Self {
        Self { table, min_samples }
    }

    /// A table with no cells; every lookup misses
    pub fn empty(min_samples: u64) -> Self {
        Self::new(BucketTable::default(), min_samples)
    }

    /// Parse either a full calibration report (its `bot_table` is used) or a
    /// bare bucket table
    pub fn from_json(json: &str, min_samples: u64) -> Result<Self, CalibrationError> {
        let table = match serde_json::from_str::<TableFile>(json)? {
            TableFile::Report { bot_table } => bot_table,
            TableFile::Bare(table) => table,
        };
        Ok(Self::new(table, min_samples))
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>, min_samples: u64) -> Result<Self, CalibrationError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content, min_samples)
    }

    /// Underlying cells
    pub fn table(&self) -> &BucketTable {
        &self.table
    }

    /// Number of cells usable for lookups
    pub fn trusted_cells(&self) -> usize {
        self.table
            .iter()
            .filter(|(_, _, c)| c.is_trusted(self.min_samples))
            .count()
    }
}

impl FairValueLookup for FairValueTable {
    fn lookup(&self, abs_move_pct: Decimal, elapsed_secs: i64) -> Option<FairValue> {
        let move_bucket = MoveBucket::classify(abs_move_pct)?;
        let elapsed_bucket = ElapsedBucket::classify(elapsed_secs)?;
        let cell = self.table.get(move_bucket, elapsed_bucket)?;

        if !cell.is_trusted(self.min_samples) {
            return None;
        }

        Some(FairValue {
            probability: cell.win_rate?,
            count: cell.count,
            move_bucket,
            elapsed_bucket,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builder_empty_cell_is_null() {
        let mut builder = TableBuilder::default();
        builder.record(MoveBucket::Small, ElapsedBucket::Early, true);

        let table = builder.build();
        let empty = table.get(MoveBucket::Large, ElapsedBucket::Late).unwrap();
        assert_eq!(empty.count, 0);
        assert_eq!(empty.win_rate, None);

        let hit = table.get(MoveBucket::Small, ElapsedBucket::Early).unwrap();
        assert_eq!(hit.win_rate, Some(1.0));
        assert_eq!(table.iter().count(), 16);
    }

    #[test]
    fn test_builder_win_rate() {
        let mut builder = TableBuilder::default();
        for i in 0..8 {
            builder.record(MoveBucket::Moderate, ElapsedBucket::Middle, i < 6);
        }
        let table = builder.build();
        let cell = table.get(MoveBucket::Moderate, ElapsedBucket::Middle).unwrap();
        assert_eq!(cell.count, 8);
        assert_eq!(cell.win_rate, Some(0.75));
    }

    #[test]
    fn test_all_losses_is_zero_not_null() {
        let mut builder = TableBuilder::default();
        builder.record(MoveBucket::Small, ElapsedBucket::Early, false);
        let table = builder.build();
        assert_eq!(
            table.get(MoveBucket::Small, ElapsedBucket::Early).unwrap().win_rate,
            Some(0.0)
        );
    }

    #[test]
    fn test_lookup_requires_min_samples() {
        let mut table = BucketTable::default();
        table.insert(
            MoveBucket::Moderate,
            ElapsedBucket::Developing,
            Cell {
                win_rate: Some(0.62),
                count: 50,
            },
        );
        table.insert(
            MoveBucket::Large,
            ElapsedBucket::Developing,
            Cell {
                win_rate: Some(0.90),
                count: 29,
            },
        );
        let fv = FairValueTable::new(table, 30);

        let hit = fv.lookup(dec!(0.09), 300).unwrap();
        assert_eq!(hit.probability, 0.62);
        assert_eq!(hit.move_bucket, MoveBucket::Moderate);

        assert!(fv.lookup(dec!(0.15), 300).is_none());
        assert!(fv.lookup(dec!(0.09), 30).is_none());
        assert!(fv.lookup(dec!(0.01), 300).is_none());
        assert_eq!(fv.trusted_cells(), 1);
    }

    #[test]
    fn test_from_json_bare_table() {
        let json = r#"{
            "0.05-0.10": {"180-420": {"win_rate": 0.62, "count": 50}},
            "0.20+": {"600-840": {"win_rate": null, "count": 0}}
        }"#;
        let fv = FairValueTable::from_json(json, 30).unwrap();
        assert_eq!(fv.lookup(dec!(0.07), 200).unwrap().probability, 0.62);
        assert!(fv.lookup(dec!(0.5), 700).is_none());
    }

    #[test]
    fn test_from_json_report_uses_bot_table() {
        let json = r#"{
            "generated": "2026-01-01T00:00:00Z",
            "bot_table": {"0.10-0.20": {"420-600": {"win_rate": 0.81, "count": 120}}}
        }"#;
        let fv = FairValueTable::from_json(json, 30).unwrap();
        assert_eq!(fv.lookup(dec!(0.12), 500).unwrap().count, 120);
    }

    #[test]
    fn test_from_json_rejects_unknown_bucket() {
        let json = r#"{"0.01-0.02": {"60-180": {"win_rate": 0.5, "count": 40}}}"#;
        assert!(FairValueTable::from_json(json, 30).is_err());
    }

    #[test]
    fn test_trusted_only_blanks_thin_cells() {
        let mut table = BucketTable::default();
        table.insert(
            MoveBucket::Small,
            ElapsedBucket::Early,
            Cell {
                win_rate: Some(0.7),
                count: 10,
            },
        );
        let trusted = table.trusted_only(30);
        let cell = trusted.get(MoveBucket::Small, ElapsedBucket::Early).unwrap();
        assert_eq!(cell.win_rate, None);
        assert_eq!(cell.count, 10);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(FairValueTable::load("/nonexistent/fair_values.json", 30).is_err());
    }
}
