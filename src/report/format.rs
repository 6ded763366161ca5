//! Formatted terminal output for run results.
//!
//! Values that cannot be shown (no previous month, undefined correlation)
//! print as [`MISSING`], here and in the dashboard.

use crate::domain::{CorrelationMatrix, MonthlySummary, QueryParameters, SegmentAssetCount, SegmentSummary};

/// Placeholder for an absent value.
pub const MISSING: &str = "-";

/// Format a value as Brazilian currency: `R$ 1.234.567,89`.
pub fn fmt_brl(v: f64) -> String {
    format!("R$ {}", fmt_decimal_br(v))
}

/// Format with 2 decimals, `.` grouping and `,` decimal separator.
pub fn fmt_decimal_br(v: f64) -> String {
    let raw = format!("{:.2}", v.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if v < 0.0 && raw.chars().any(|c| c != '0' && c != '.') { "-" } else { "" };
    format!("{sign}{grouped},{frac_part}")
}

/// Header block with the query used for the run.
pub fn format_run_header(query: &QueryParameters, rows_read: usize) -> String {
    let mut out = String::new();
    out.push_str("=== carteira - RPPS investment portfolio ===\n");
    out.push_str(&format!("CNPJ: {} | UF: {} | Ano: {}\n", query.entity_id, query.region, query.year));
    out.push_str(&format!("Rows: {rows_read}\n"));
    out
}

/// Monthly totals table with a grand total line.
pub fn format_monthly_summary(summary: &MonthlySummary) -> String {
    let mut out = String::new();
    out.push_str("Total value per month:\n");
    if summary.is_empty() {
        out.push_str("  (no data)\n");
        return out;
    }
    for r in &summary.rows {
        out.push_str(&format!("  {:<10} {:>24}\n", r.month.name(), fmt_brl(r.total_value)));
    }
    out.push_str(&format!("  {:<10} {:>24}\n", "Total", fmt_brl(summary.grand_total())));
    out
}

/// Per-segment table with the change against the previous present month.
pub fn format_segment_summary(summary: &SegmentSummary) -> String {
    let mut out = String::new();
    out.push_str("Total value per segment:\n");
    if summary.is_empty() {
        out.push_str("  (no data)\n");
        return out;
    }

    let seg_width = summary
        .rows
        .iter()
        .map(|r| r.segment.chars().count())
        .max()
        .unwrap_or(8)
        .clamp(8, 40);

    out.push_str(&format!(
        "  {:<seg_width$} {:<10} {:>22} {:>22}\n",
        "segment", "month", "total", "change"
    ));
    for r in &summary.rows {
        let change = match r.previous_value {
            Some(prev) => fmt_decimal_br(r.total_value - prev),
            None => MISSING.to_string(),
        };
        out.push_str(&format!(
            "  {:<seg_width$} {:<10} {:>22} {:>22}\n",
            truncate(&r.segment, seg_width),
            r.month.name(),
            fmt_brl(r.total_value),
            change,
        ));
    }
    out
}

pub fn format_correlation(matrix: Option<&CorrelationMatrix>) -> String {
    let mut out = String::new();
    out.push_str("Correlation matrix:\n");
    let Some(m) = matrix else {
        out.push_str("  (needs at least 2 numeric columns and 2 rows)\n");
        return out;
    };

    out.push_str(&format!("  {:<15}", ""));
    for c in &m.columns {
        out.push_str(&format!(" {:>15}", c));
    }
    out.push('\n');
    for (name, row) in m.columns.iter().zip(&m.values) {
        out.push_str(&format!("  {:<15}", name));
        for v in row {
            match v {
                Some(v) => out.push_str(&format!(" {:>15.3}", v)),
                None => out.push_str(&format!(" {:>15}", MISSING)),
            }
        }
        out.push('\n');
    }
    out
}

pub fn format_asset_counts(counts: &[SegmentAssetCount]) -> String {
    let mut out = String::new();
    out.push_str("Distinct assets per segment:\n");
    if counts.is_empty() {
        out.push_str("  (no asset ids)\n");
        return out;
    }
    for c in counts {
        out.push_str(&format!("  {:<40} {:>5}\n", truncate(&c.segment, 40), c.assets));
    }
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Month, MonthlyTotal, SegmentTotal};

    #[test]
    fn brl_grouping_and_decimal_comma() {
        assert_eq!(fmt_brl(0.0), "R$ 0,00");
        assert_eq!(fmt_brl(150.5), "R$ 150,50");
        assert_eq!(fmt_brl(1234.5), "R$ 1.234,50");
        assert_eq!(fmt_brl(1_234_567.891), "R$ 1.234.567,89");
        assert_eq!(fmt_decimal_br(-2500.0), "-2.500,00");
        assert_eq!(fmt_decimal_br(-0.001), "0,00");
    }

    #[test]
    fn monthly_table_lists_months_in_order_with_total() {
        let summary = MonthlySummary {
            rows: vec![
                MonthlyTotal { month: Month::Janeiro, total_value: 150.5 },
                MonthlyTotal { month: Month::Fevereiro, total_value: 25.0 },
            ],
        };
        let txt = format_monthly_summary(&summary);
        let jan = txt.find("Janeiro").unwrap();
        let fev = txt.find("Fevereiro").unwrap();
        assert!(jan < fev);
        assert!(txt.contains("R$ 175,50"));
    }

    #[test]
    fn segment_table_marks_first_period_without_change() {
        let summary = SegmentSummary {
            rows: vec![SegmentTotal {
                month: Month::Janeiro,
                segment: "Renda Fixa".to_string(),
                total_value: 10.0,
                previous_value: None,
            }],
        };
        let txt = format_segment_summary(&summary);
        let line = txt.lines().find(|l| l.contains("Renda Fixa")).unwrap();
        assert!(line.trim_end().ends_with('-'));
    }

    #[test]
    fn undefined_correlation_uses_missing_placeholder() {
        let matrix = CorrelationMatrix {
            columns: vec!["vl_total_atual".to_string(), "pc_cmn".to_string()],
            values: vec![vec![Some(1.0), None], vec![None, Some(1.0)]],
        };
        let txt = format_correlation(Some(&matrix));
        assert!(!txt.contains("nan"));
        let row = txt
            .lines()
            .find(|l| l.trim_start().starts_with("vl_total_atual") && l.contains("1.000"))
            .unwrap();
        assert!(row.trim_end().ends_with(MISSING));
    }

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
