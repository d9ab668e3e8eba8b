//! Extraction of the handful of QCEW columns the pipeline reads.

use crate::errors::IngestError;
use crate::ingest::csv_stream::CsvRow;

pub const AREA_COLUMN: &str = "area_fips";
pub const INDUSTRY_COLUMN: &str = "industry_code";
pub const YEAR_COLUMN: &str = "year";
pub const LQ_COLUMN: &str = "lq_annual_avg_emplvl";

/// Positions of the required columns within a QCEW header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QcewColumns {
    area: usize,
    industry: usize,
    year: usize,
    lq: usize,
}

impl QcewColumns {
    /// Locates the required columns, matching names case-insensitively.
    pub fn resolve(header: &[String]) -> Result<Self, IngestError> {
        let find = |name: &'static str| {
            header
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or(IngestError::MissingColumn(name))
        };

        Ok(Self {
            area: find(AREA_COLUMN)?,
            industry: find(INDUSTRY_COLUMN)?,
            year: find(YEAR_COLUMN)?,
            lq: find(LQ_COLUMN)?,
        })
    }
}

/// One source record reduced to the fields validation and classification use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub area_fips: String,
    pub industry_code: String,
    pub year: String,
    pub location_quotient: String,
}

impl RawRow {
    /// Moves the required fields out of a parsed row.
    ///
    /// The reader guarantees every row has as many fields as the header, so
    /// resolved positions are always in range.
    pub fn from_fields(columns: &QcewColumns, mut fields: CsvRow) -> Self {
        let mut take = |idx: usize| fields.get_mut(idx).map(std::mem::take).unwrap_or_default();

        RawRow {
            area_fips: take(columns.area),
            industry_code: take(columns.industry),
            year: take(columns.year),
            location_quotient: take(columns.lq),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_any_order_and_case() {
        let h = header(&["own_code", "LQ_Annual_Avg_Emplvl", "year", "Area_FIPS", "industry_code"]);
        let cols = QcewColumns::resolve(&h).unwrap();

        let row = RawRow::from_fields(&cols, header(&["5", "1.25", "2021", "06000", "445"]));
        assert_eq!(row.area_fips, "06000");
        assert_eq!(row.industry_code, "445");
        assert_eq!(row.year, "2021");
        assert_eq!(row.location_quotient, "1.25");
    }

    #[test]
    fn test_resolve_missing_column() {
        let h = header(&["area_fips", "industry_code", "year"]);
        let err = QcewColumns::resolve(&h).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn(LQ_COLUMN)));
    }
}
