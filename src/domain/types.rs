//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during aggregation
//! - exported to CSV/JSON
//! - reloaded later for display (`carteira show`)

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Query sent to the DAIR_CARTEIRA endpoint.
///
/// Fixed for the whole run; see `config::resolve_query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameters {
    /// CNPJ of the RPPS entity (`nr_cnpj_entidade`).
    pub entity_id: String,
    /// Two-letter state code (`sg_uf`).
    pub region: String,
    /// Reference year (`dt_ano`).
    pub year: i32,
}

impl QueryParameters {
    /// Query-string pairs in the order the API documents them.
    pub fn as_query(&self) -> [(&'static str, String); 3] {
        [
            ("nr_cnpj_entidade", self.entity_id.clone()),
            ("sg_uf", self.region.clone()),
            ("dt_ano", self.year.to_string()),
        ]
    }
}

/// Calendar month label used for every reporting period.
///
/// Ordering follows the calendar (derive order), never the lexical order of the
/// Portuguese names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    Janeiro,
    Fevereiro,
    Marco,
    Abril,
    Maio,
    Junho,
    Julho,
    Agosto,
    Setembro,
    Outubro,
    Novembro,
    Dezembro,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Janeiro,
        Month::Fevereiro,
        Month::Marco,
        Month::Abril,
        Month::Maio,
        Month::Junho,
        Month::Julho,
        Month::Agosto,
        Month::Setembro,
        Month::Outubro,
        Month::Novembro,
        Month::Dezembro,
    ];

    /// Month for a 1-based calendar number.
    pub fn from_number(n: i64) -> Option<Month> {
        if (1..=12).contains(&n) {
            Some(Self::ALL[(n - 1) as usize])
        } else {
            None
        }
    }

    /// 1-based calendar position.
    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Month::Janeiro => "Janeiro",
            Month::Fevereiro => "Fevereiro",
            Month::Marco => "Março",
            Month::Abril => "Abril",
            Month::Maio => "Maio",
            Month::Junho => "Junho",
            Month::Julho => "Julho",
            Month::Agosto => "Agosto",
            Month::Setembro => "Setembro",
            Month::Outubro => "Outubro",
            Month::Novembro => "Novembro",
            Month::Dezembro => "Dezembro",
        }
    }

    /// Parse a month label as written to the summary artifact.
    ///
    /// Accepts the unaccented `Marco` as well, since some spreadsheet tools
    /// mangle the cedilla on export.
    pub fn from_name(name: &str) -> Option<Month> {
        let trimmed = name.trim();
        if trimmed.eq_ignore_ascii_case("marco") {
            return Some(Month::Marco);
        }
        Self::ALL
            .into_iter()
            .find(|m| m.name().to_lowercase() == trimmed.to_lowercase())
    }

    /// Three-letter label for chart axes.
    pub fn short_name(self) -> &'static str {
        match self {
            Month::Janeiro => "jan",
            Month::Fevereiro => "fev",
            Month::Marco => "mar",
            Month::Abril => "abr",
            Month::Maio => "mai",
            Month::Junho => "jun",
            Month::Julho => "jul",
            Month::Agosto => "ago",
            Month::Setembro => "set",
            Month::Outubro => "out",
            Month::Novembro => "nov",
            Month::Dezembro => "dez",
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How `dt_mes_bimestre` codes are interpreted.
///
/// The API reuses the same field for two incompatible schemas; the run picks
/// one and rejects codes outside its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PeriodScheme {
    /// Codes 1..=12, one per calendar month.
    #[default]
    Monthly,
    /// Codes 1..=6, mapped 1:1 onto the first six month labels.
    Bimester,
}

impl PeriodScheme {
    pub fn max_code(self) -> i64 {
        match self {
            PeriodScheme::Monthly => 12,
            PeriodScheme::Bimester => 6,
        }
    }

    /// Map a period code to its month label, or `None` when out of range.
    pub fn month_for(self, code: i64) -> Option<Month> {
        if code < 1 || code > self.max_code() {
            return None;
        }
        Month::from_number(code)
    }
}

/// Numeric columns coerced from the raw payload, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    TotalValue,
    RppsCount,
    AssetValue,
    Patrimony,
    PctCmn,
    PctRpps,
    PctPatrimony,
}

impl NumericField {
    pub const ALL: [NumericField; 7] = [
        NumericField::TotalValue,
        NumericField::RppsCount,
        NumericField::AssetValue,
        NumericField::Patrimony,
        NumericField::PctCmn,
        NumericField::PctRpps,
        NumericField::PctPatrimony,
    ];

    /// Key of the field in the API payload.
    pub fn key(self) -> &'static str {
        match self {
            NumericField::TotalValue => "vl_total_atual",
            NumericField::RppsCount => "qt_rpps",
            NumericField::AssetValue => "vl_atual_ativo",
            NumericField::Patrimony => "vl_patrimonio",
            NumericField::PctCmn => "pc_cmn",
            NumericField::PctRpps => "pc_rpps",
            NumericField::PctPatrimony => "pc_patrimonio",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One payload row after type coercion.
///
/// Numeric values are `None` when the field was absent, null or unparseable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub segment: Option<String>,
    pub asset_id: Option<String>,
    pub month: Month,
    pub values: [Option<f64>; 7],
}

impl NormalizedRow {
    pub fn new(month: Month) -> Self {
        Self {
            segment: None,
            asset_id: None,
            month,
            values: [None; 7],
        }
    }

    pub fn get(&self, field: NumericField) -> Option<f64> {
        self.values[field.index()]
    }

    pub fn set(&mut self, field: NumericField, value: Option<f64>) {
        self.values[field.index()] = value;
    }

    pub fn total_value(&self) -> Option<f64> {
        self.get(NumericField::TotalValue)
    }
}

/// Total value per month, chronological, months unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub rows: Vec<MonthlyTotal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub month: Month,
    pub total_value: f64,
}

impl MonthlySummary {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, month: Month) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.month == month)
            .map(|r| r.total_value)
    }

    pub fn months(&self) -> Vec<Month> {
        self.rows.iter().map(|r| r.month).collect()
    }

    pub fn grand_total(&self) -> f64 {
        self.rows.iter().map(|r| r.total_value).sum()
    }
}

/// Total per (month, segment) with the previous present month of the same segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTotal {
    pub month: Month,
    pub segment: String,
    pub total_value: f64,
    /// `None` for the first month in which the segment appears.
    pub previous_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub rows: Vec<SegmentTotal>,
}

impl SegmentSummary {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for a single month, largest first.
    pub fn for_month(&self, month: Month) -> Vec<&SegmentTotal> {
        let mut out: Vec<&SegmentTotal> = self.rows.iter().filter(|r| r.month == month).collect();
        out.sort_by(|a, b| {
            b.total_value
                .partial_cmp(&a.total_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }
}

/// Pairwise Pearson correlation of the numeric columns.
///
/// `values[i][j]` is `None` when the pair has fewer than two complete
/// observations or one side has zero variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

/// Number of distinct assets held under one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentAssetCount {
    pub segment: String,
    pub assets: usize,
}
