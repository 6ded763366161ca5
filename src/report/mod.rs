//! Aggregation utilities: monthly totals, segment breakdown, correlation.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{
    CorrelationMatrix, Month, MonthlySummary, MonthlyTotal, NormalizedRow, NumericField, SegmentAssetCount,
    SegmentSummary, SegmentTotal,
};

pub mod format;

pub use format::*;

/// Round to currency precision (2 decimals).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Sum `vl_total_atual` per month, in calendar order.
///
/// Missing totals are skipped. Rounding is applied once, to the per-month sums.
pub fn aggregate(rows: &[NormalizedRow]) -> MonthlySummary {
    let mut sums: BTreeMap<Month, f64> = BTreeMap::new();
    for row in rows {
        let entry = sums.entry(row.month).or_insert(0.0);
        if let Some(v) = row.total_value() {
            *entry += v;
        }
    }

    MonthlySummary {
        rows: sums
            .into_iter()
            .map(|(month, total)| MonthlyTotal {
                month,
                total_value: round2(total),
            })
            .collect(),
    }
}

/// Sum totals per (month, segment) and attach the segment's previous-month value.
///
/// Rows are ordered by segment name, then month. Rows without a segment are
/// not attributable and are left out.
pub fn aggregate_by_segment(rows: &[NormalizedRow]) -> SegmentSummary {
    let mut sums: BTreeMap<(String, Month), f64> = BTreeMap::new();
    for row in rows {
        let Some(segment) = &row.segment else {
            continue;
        };
        let entry = sums.entry((segment.clone(), row.month)).or_insert(0.0);
        if let Some(v) = row.total_value() {
            *entry += v;
        }
    }

    let mut out = Vec::with_capacity(sums.len());
    let mut prev: Option<(String, f64)> = None;
    for ((segment, month), total) in sums {
        let previous_value = match &prev {
            Some((seg, value)) if *seg == segment => Some(*value),
            _ => None,
        };
        prev = Some((segment.clone(), total));
        out.push(SegmentTotal {
            month,
            segment,
            total_value: total,
            previous_value,
        });
    }

    SegmentSummary { rows: out }
}

/// Pearson correlation across the numeric columns that carry any value.
///
/// Returns `None` when fewer than two such columns or fewer than two rows exist.
pub fn correlate(rows: &[NormalizedRow]) -> Option<CorrelationMatrix> {
    if rows.len() < 2 {
        return None;
    }

    let fields: Vec<NumericField> = NumericField::ALL
        .into_iter()
        .filter(|f| rows.iter().any(|r| r.get(*f).is_some()))
        .collect();
    if fields.len() < 2 {
        return None;
    }

    let n = fields.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let pairs: Vec<(f64, f64)> = rows
                .iter()
                .filter_map(|r| Some((r.get(fields[i])?, r.get(fields[j])?)))
                .collect();
            let r = pearson(&pairs);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Some(CorrelationMatrix {
        columns: fields.iter().map(|f| f.key().to_string()).collect(),
        values,
    })
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for &(x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    Some(r.clamp(-1.0, 1.0))
}

/// Distinct `id_ativo` per segment, most diversified segment first.
pub fn count_assets_by_segment(rows: &[NormalizedRow]) -> Vec<SegmentAssetCount> {
    let mut by_segment: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for row in rows {
        let (Some(segment), Some(asset)) = (&row.segment, &row.asset_id) else {
            continue;
        };
        by_segment.entry(segment.as_str()).or_default().insert(asset.as_str());
    }

    let mut out: Vec<SegmentAssetCount> = by_segment
        .into_iter()
        .map(|(segment, assets)| SegmentAssetCount {
            segment: segment.to_string(),
            assets: assets.len(),
        })
        .collect();
    out.sort_by(|a, b| b.assets.cmp(&a.assets).then_with(|| a.segment.cmp(&b.segment)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(month: Month, segment: Option<&str>, total: Option<f64>) -> NormalizedRow {
        let mut r = NormalizedRow::new(month);
        r.segment = segment.map(str::to_string);
        r.set(NumericField::TotalValue, total);
        r
    }

    #[test]
    fn aggregate_orders_chronologically_and_rounds_once() {
        let rows = vec![
            row(Month::Marco, None, Some(0.004)),
            row(Month::Janeiro, None, Some(1.001)),
            row(Month::Marco, None, Some(0.004)),
            row(Month::Janeiro, None, Some(1.001)),
        ];
        let summary = aggregate(&rows);
        assert_eq!(summary.months(), vec![Month::Janeiro, Month::Marco]);
        assert_eq!(summary.get(Month::Janeiro), Some(2.0));
        // 0.004 + 0.004 rounds to 0.01; rounding each row first would give 0.0.
        assert_eq!(summary.get(Month::Marco), Some(0.01));
    }

    #[test]
    fn aggregate_skips_missing_totals_but_keeps_month() {
        let rows = vec![row(Month::Abril, None, None), row(Month::Maio, None, Some(3.0))];
        let summary = aggregate(&rows);
        assert_eq!(summary.get(Month::Abril), Some(0.0));
        assert_eq!(summary.get(Month::Maio), Some(3.0));
    }

    #[test]
    fn segment_lag_is_absent_for_first_period() {
        let rows = vec![
            row(Month::Fevereiro, Some("Renda Fixa"), Some(20.0)),
            row(Month::Janeiro, Some("Renda Fixa"), Some(10.0)),
            row(Month::Janeiro, Some("Renda Fixa"), Some(5.0)),
            row(Month::Fevereiro, Some("Renda Variável"), Some(7.0)),
            row(Month::Fevereiro, None, Some(99.0)),
        ];
        let summary = aggregate_by_segment(&rows);
        assert_eq!(summary.rows.len(), 3);

        let first = &summary.rows[0];
        assert_eq!((first.segment.as_str(), first.month), ("Renda Fixa", Month::Janeiro));
        assert_eq!(first.total_value, 15.0);
        assert_eq!(first.previous_value, None);

        let second = &summary.rows[1];
        assert_eq!(second.month, Month::Fevereiro);
        assert_eq!(second.previous_value, Some(15.0));

        let third = &summary.rows[2];
        assert_eq!(third.segment, "Renda Variável");
        assert_eq!(third.previous_value, None);
    }

    #[test]
    fn correlate_detects_perfect_linear_relation() {
        let mut rows = Vec::new();
        for (i, m) in [Month::Janeiro, Month::Fevereiro, Month::Marco].into_iter().enumerate() {
            let mut r = row(m, None, Some(i as f64 * 10.0));
            r.set(NumericField::Patrimony, Some(100.0 - i as f64));
            rows.push(r);
        }
        let corr = correlate(&rows).unwrap();
        assert_eq!(corr.columns, vec!["vl_total_atual", "vl_patrimonio"]);
        assert!((corr.get("vl_total_atual", "vl_total_atual").unwrap() - 1.0).abs() < 1e-12);
        assert!((corr.get("vl_total_atual", "vl_patrimonio").unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlate_is_undefined_for_tiny_tables() {
        let mut one = row(Month::Janeiro, None, Some(1.0));
        one.set(NumericField::Patrimony, Some(2.0));
        assert!(correlate(&[one]).is_none());

        let only_totals = vec![row(Month::Janeiro, None, Some(1.0)), row(Month::Maio, None, Some(2.0))];
        assert!(correlate(&only_totals).is_none());
    }

    #[test]
    fn constant_column_has_no_correlation() {
        let mut a = row(Month::Janeiro, None, Some(1.0));
        a.set(NumericField::PctCmn, Some(5.0));
        let mut b = row(Month::Fevereiro, None, Some(2.0));
        b.set(NumericField::PctCmn, Some(5.0));
        let corr = correlate(&[a, b]).unwrap();
        assert_eq!(corr.get("vl_total_atual", "pc_cmn"), None);
    }

    #[test]
    fn asset_counts_are_distinct_and_sorted() {
        let mut rows = Vec::new();
        for (seg, asset) in [("RF", "a"), ("RF", "b"), ("RF", "a"), ("RV", "c"), ("Exterior", "d")] {
            let mut r = row(Month::Janeiro, Some(seg), Some(1.0));
            r.asset_id = Some(asset.to_string());
            rows.push(r);
        }
        let counts = count_assets_by_segment(&rows);
        assert_eq!(counts[0], SegmentAssetCount { segment: "RF".to_string(), assets: 2 });
        assert_eq!(counts[1].segment, "Exterior");
        assert_eq!(counts[2].segment, "RV");
    }
}
