//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - monthly totals: `o`
//! - connecting line: `-`
//! - bottom row: abbreviated month labels

use crate::domain::MonthlySummary;
use crate::report::fmt_decimal_br;

/// Render a line plot of the monthly totals.
pub fn render_monthly_plot(summary: &MonthlySummary, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (Some(first), Some(last)) = (summary.rows.first(), summary.rows.last()) else {
        return "Plot: no data\n".to_string();
    };

    let mut x_min = first.month.number() as f64;
    let mut x_max = last.month.number() as f64;
    if x_max <= x_min {
        x_min -= 1.0;
        x_max += 1.0;
    }

    let points: Vec<(f64, f64)> = summary
        .rows
        .iter()
        .map(|r| (r.month.number() as f64, r.total_value))
        .collect();

    let (y_min, y_max) = y_range(&points).unwrap_or_else(|| {
        let v = points[0].1;
        (v - 1.0, v + 1.0)
    });
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Line first, so the markers overlay it.
    let mut prev = None;
    for &(x, y) in &points {
        let gx = map_x(x, x_min, x_max, width);
        let gy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(&mut grid, x0, y0, gx, gy, '-');
        }
        prev = Some((gx, gy));
    }
    for &(x, y) in &points {
        grid[map_y(y, y_min, y_max, height)][map_x(x, x_min, x_max, width)] = 'o';
    }

    let mut labels = vec![' '; width];
    let mut next_free = 0usize;
    for r in &summary.rows {
        let label: Vec<char> = r.month.short_name().chars().collect();
        let x = map_x(r.month.number() as f64, x_min, x_max, width);
        let start = x.saturating_sub(label.len() / 2).min(width - label.len());
        if start < next_free {
            continue;
        }
        labels[start..start + label.len()].copy_from_slice(&label);
        next_free = start + label.len() + 1;
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: months=[{}, {}] | y=[{}, {}]\n",
        first.month,
        last.month,
        fmt_decimal_br(y_min),
        fmt_decimal_br(y_max),
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out.push_str(&labels.into_iter().collect::<String>());
    out.push('\n');
    out
}

fn y_range(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in points {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Month, MonthlyTotal};

    #[test]
    fn plot_golden_snapshot_small() {
        let summary = MonthlySummary {
            rows: vec![
                MonthlyTotal { month: Month::Janeiro, total_value: 100.0 },
                MonthlyTotal { month: Month::Marco, total_value: 200.0 },
            ],
        };

        let txt = render_monthly_plot(&summary, 11, 5);
        let expected = concat!(
            "Plot: months=[Janeiro, Março] | y=[95,00, 205,00]\n",
            "         -o\n",
            "       --  \n",
            "    ---    \n",
            "  --       \n",
            "o-         \n",
            "jan     mar\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn empty_summary_has_placeholder() {
        assert_eq!(render_monthly_plot(&MonthlySummary::default(), 20, 5), "Plot: no data\n");
    }

    #[test]
    fn single_month_is_centered() {
        let summary = MonthlySummary {
            rows: vec![MonthlyTotal { month: Month::Junho, total_value: 5.0 }],
        };
        let txt = render_monthly_plot(&summary, 11, 5);
        let rows: Vec<&str> = txt.lines().collect();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[3].find('o'), Some(5));
        assert!(rows[6].contains("jun"));
    }
}
