//! State-level record filter.

use crate::ingest::row::RawRow;

/// QCEW marks statewide aggregates with a `000` county part.
pub const STATE_LEVEL_SUFFIX: &str = "000";

/// State-level FIPS area codes and their postal abbreviations.
static STATE_FIPS: &[(&str, &str)] = &[
    ("01000", "AL"),
    ("02000", "AK"),
    ("04000", "AZ"),
    ("05000", "AR"),
    ("06000", "CA"),
    ("08000", "CO"),
    ("09000", "CT"),
    ("10000", "DE"),
    ("11000", "DC"),
    ("12000", "FL"),
    ("13000", "GA"),
    ("15000", "HI"),
    ("16000", "ID"),
    ("17000", "IL"),
    ("18000", "IN"),
    ("19000", "IA"),
    ("20000", "KS"),
    ("21000", "KY"),
    ("22000", "LA"),
    ("23000", "ME"),
    ("24000", "MD"),
    ("25000", "MA"),
    ("26000", "MI"),
    ("27000", "MN"),
    ("28000", "MS"),
    ("29000", "MO"),
    ("30000", "MT"),
    ("31000", "NE"),
    ("32000", "NV"),
    ("33000", "NH"),
    ("34000", "NJ"),
    ("35000", "NM"),
    ("36000", "NY"),
    ("37000", "NC"),
    ("38000", "ND"),
    ("39000", "OH"),
    ("40000", "OK"),
    ("41000", "OR"),
    ("42000", "PA"),
    ("44000", "RI"),
    ("45000", "SC"),
    ("46000", "SD"),
    ("47000", "TN"),
    ("48000", "TX"),
    ("49000", "UT"),
    ("50000", "VT"),
    ("51000", "VA"),
    ("53000", "WA"),
    ("54000", "WV"),
    ("55000", "WI"),
    ("56000", "WY"),
];

/// Outcome of checking one row. Rows that are not state-level or carry no
/// usable LQ are simply not applicable; that is not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateValidation {
    Invalid,
    Valid {
        state_abbr: &'static str,
        retail_lq: f64,
    },
}

/// Looks up the postal abbreviation for a state-level FIPS code.
pub fn state_for_fips(area_fips: &str) -> Option<&'static str> {
    STATE_FIPS
        .iter()
        .find(|(fips, _)| *fips == area_fips)
        .map(|(_, abbr)| *abbr)
}

pub fn validate_state_record(row: &RawRow) -> StateValidation {
    if !row.area_fips.ends_with(STATE_LEVEL_SUFFIX) {
        return StateValidation::Invalid;
    }

    let Some(state_abbr) = state_for_fips(&row.area_fips) else {
        return StateValidation::Invalid;
    };

    match row.location_quotient.parse::<f64>() {
        Ok(retail_lq) if retail_lq.is_finite() && retail_lq > 0.0 => StateValidation::Valid {
            state_abbr,
            retail_lq,
        },
        _ => StateValidation::Invalid,
    }
}
