//! Ratatui-based dashboard.
//!
//! Shows the monthly totals chart next to a side panel (segment breakdown,
//! correlation matrix or asset counts) and offers a CSV download of the
//! current summary.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Row, Table},
};
use tracing::{error, info};

use crate::app::pipeline::{self, RunOutput};
use crate::cli::RunArgs;
use crate::data::CadprevClient;
use crate::domain::{Month, MonthlySummary, QueryParameters};
use crate::error::AppError;
use crate::io::export::{render_download, write_download};
use crate::report::{MISSING, fmt_brl, fmt_decimal_br};

mod plotters_chart;

use plotters_chart::MonthlyChart;

/// Start the dashboard.
pub fn run(args: RunArgs) -> Result<(), AppError> {
    // Resolve everything that can fail on configuration before touching the terminal.
    let query = crate::config::resolve_query(&args.query_overrides()).inspect_err(|e| error!("{e}"))?;
    let client = CadprevClient::new(&args.endpoint).inspect_err(|e| error!("{e}"))?;

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(args, query, client);
    app.refresh();
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Segments,
    Correlation,
    Assets,
}

impl Panel {
    fn next(self) -> Panel {
        match self {
            Panel::Segments => Panel::Correlation,
            Panel::Correlation => Panel::Assets,
            Panel::Assets => Panel::Segments,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Panel::Segments => "Segments",
            Panel::Correlation => "Correlation",
            Panel::Assets => "Assets per segment",
        }
    }
}

struct App {
    args: RunArgs,
    query: QueryParameters,
    client: CadprevClient,
    output: PathBuf,
    run: Option<RunOutput>,
    selected_month: usize,
    panel: Panel,
    status: String,
}

impl App {
    fn new(args: RunArgs, query: QueryParameters, client: CadprevClient) -> Self {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| crate::cli::default_output_path(query.year));
        Self {
            args,
            query,
            client,
            output,
            run: None,
            selected_month: 0,
            panel: Panel::Segments,
            status: "Fetching CADPREV data...".to_string(),
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Left => {
                self.selected_month = self.selected_month.saturating_sub(1);
            }
            KeyCode::Right => {
                let n = self.run.as_ref().map(|r| r.monthly.len()).unwrap_or(0);
                if self.selected_month + 1 < n {
                    self.selected_month += 1;
                }
            }
            KeyCode::Tab => {
                self.panel = self.panel.next();
                self.status = format!("panel: {}", self.panel.title());
            }
            KeyCode::Char('e') => {
                let summary = self.run.as_ref().map(|r| &r.monthly);
                self.status = download(summary, &self.download_name(), &self.args.download_dir);
            }
            KeyCode::Char('r') => self.refresh(),
            _ => {}
        }
        false
    }

    fn download_name(&self) -> String {
        self.output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("investimentos_{}_por_mes.csv", self.query.year))
    }

    /// Refetch and persist; failures keep the previous result on screen.
    fn refresh(&mut self) {
        let result = pipeline::run_fetch(&self.client, &self.query, self.args.period_scheme)
            .and_then(|run| pipeline::persist(&run, &self.output).map(|()| run));

        match result {
            Ok(run) => {
                self.status = format!("{} month(s), {} row(s) | saved {}", run.monthly.len(), run.rows.len(), self.output.display());
                self.selected_month = run.monthly.len().saturating_sub(1);
                self.run = Some(run);
            }
            Err(err) => {
                self.status = format!("Fetch failed: {err}");
            }
        }
    }

    fn selected(&self) -> Option<Month> {
        let run = self.run.as_ref()?;
        run.monthly.rows.get(self.selected_month).map(|r| r.month)
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("carteira", Style::default().fg(Color::Cyan)),
            Span::raw(format!(
                " | CNPJ {} | {} | {}",
                self.query.entity_id, self.query.region, self.query.year
            )),
        ]));

        let detail = match &self.run {
            Some(run) => format!(
                "months: {} | total: {} | selected: {}",
                run.monthly.len(),
                fmt_brl(run.monthly.grand_total()),
                self.selected().map(|m| m.name()).unwrap_or(MISSING),
            ),
            None => "no data".to_string(),
        };
        lines.push(Line::from(Span::styled(detail, Style::default().fg(Color::Gray))));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        self.draw_chart(frame, chunks[0]);
        match self.panel {
            Panel::Segments => self.draw_segments(frame, chunks[1]),
            Panel::Correlation => self.draw_correlation(frame, chunks[1]),
            Panel::Assets => self.draw_assets(frame, chunks[1]),
        }
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Total value per month").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(run) = self.run.as_ref().filter(|r| !r.monthly.is_empty()) else {
            let msg = Paragraph::new("Waiting for data...").style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let (line, x_bounds, y_bounds) = chart_series(&run.monthly);
        let selected = run
            .monthly
            .rows
            .get(self.selected_month)
            .map(|r| (r.month.number() as f64, r.total_value));

        let widget = MonthlyChart {
            line: &line,
            selected,
            x_bounds,
            y_bounds,
            x_label: "month",
            y_label: "R$",
            fmt_x: fmt_axis_month,
            fmt_y: fmt_axis_money,
        };
        frame.render_widget(widget, inner);
    }

    fn draw_segments(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let month = self.selected();
        let title = format!(
            "{} | {} (←/→)",
            Panel::Segments.title(),
            month.map(|m| m.name()).unwrap_or(MISSING)
        );
        let block = Block::default().title(title).borders(Borders::ALL);

        let (Some(run), Some(month)) = (&self.run, month) else {
            frame.render_widget(Paragraph::new("No data").block(block), area);
            return;
        };

        let rows = run.segments.for_month(month);
        let month_total: f64 = rows.iter().map(|r| r.total_value).sum();
        let items: Vec<ListItem> = rows
            .iter()
            .map(|r| {
                let share = if month_total.abs() > 0.0 {
                    100.0 * r.total_value / month_total
                } else {
                    0.0
                };
                let change = match r.previous_value {
                    Some(prev) => format!(" ({:+.1}%)", pct_change(prev, r.total_value)),
                    None => String::new(),
                };
                ListItem::new(vec![
                    Line::from(Span::styled(r.segment.clone(), Style::default().add_modifier(Modifier::BOLD))),
                    Line::from(format!("  {} | {share:.1}%{change}", fmt_brl(r.total_value))),
                ])
            })
            .collect();

        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_correlation(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title(Panel::Correlation.title()).borders(Borders::ALL);
        let Some(matrix) = self.run.as_ref().and_then(|r| r.correlation.as_ref()) else {
            let msg = Paragraph::new("Needs at least 2 numeric columns and 2 rows.").block(block);
            frame.render_widget(msg, area);
            return;
        };

        let short = |c: &str| c.trim_start_matches("vl_").trim_start_matches("pc_").chars().take(7).collect::<String>();
        let mut header = vec![String::new()];
        header.extend(matrix.columns.iter().map(|c| short(c)));

        let rows: Vec<Row> = matrix
            .columns
            .iter()
            .zip(&matrix.values)
            .map(|(name, vals)| {
                let mut cells = vec![short(name)];
                cells.extend(vals.iter().map(|v| match v {
                    Some(v) => format!("{v:.2}"),
                    None => MISSING.to_string(),
                }));
                Row::new(cells)
            })
            .collect();

        let widths = vec![Constraint::Length(8); matrix.columns.len() + 1];
        let table = Table::new(rows, widths)
            .header(Row::new(header).style(Style::default().fg(Color::Cyan)))
            .block(block);
        frame.render_widget(table, area);
    }

    fn draw_assets(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title(Panel::Assets.title()).borders(Borders::ALL);
        let items: Vec<ListItem> = self
            .run
            .as_ref()
            .map(|r| {
                r.asset_counts
                    .iter()
                    .map(|c| ListItem::new(format!("{:>4}  {}", c.assets, c.segment)))
                    .collect()
            })
            .unwrap_or_default();
        if items.is_empty() {
            frame.render_widget(Paragraph::new("No asset ids in payload").block(block), area);
        } else {
            frame.render_widget(List::new(items).block(block), area);
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "←/→ month  Tab panel  e download CSV  r refresh  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Download action: the summary is passed in, never read from shared state.
fn download(summary: Option<&MonthlySummary>, file_name: &str, dir: &std::path::Path) -> String {
    let file = render_download(summary, file_name);
    match write_download(dir, &file) {
        Ok(path) => {
            info!("Dashboard download: {}", path.display());
            format!("Downloaded {}", path.display())
        }
        Err(err) => format!("Download failed: {err}"),
    }
}

fn pct_change(prev: f64, cur: f64) -> f64 {
    if prev.abs() > 0.0 { 100.0 * (cur - prev) / prev.abs() } else { 0.0 }
}

/// Build the chart line and bounds from the monthly summary.
fn chart_series(summary: &MonthlySummary) -> (Vec<(f64, f64)>, [f64; 2], [f64; 2]) {
    let line: Vec<(f64, f64)> = summary
        .rows
        .iter()
        .map(|r| (r.month.number() as f64, r.total_value))
        .collect();

    let x_min = line.first().map(|p| p.0).unwrap_or(1.0);
    let x_max = line.last().map(|p| p.0).unwrap_or(12.0);
    let x_bounds = [x_min - 0.5, x_max + 0.5];

    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, y) in &line {
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if !y_min.is_finite() || !y_max.is_finite() {
        y_min = 0.0;
        y_max = 1.0;
    }
    if y_max <= y_min {
        let pad = (y_min.abs() * 0.1).max(1.0);
        y_min -= pad;
        y_max += pad;
    }

    let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);
    (line, x_bounds, [y_min - pad, y_max + pad])
}

fn fmt_axis_month(v: f64) -> String {
    let n = v.round();
    if (v - n).abs() > 0.25 {
        return String::new();
    }
    Month::from_number(n as i64).map(|m| m.short_name().to_string()).unwrap_or_default()
}

/// Compact money label: millions as `12,3M`, thousands as `450,0k`.
fn fmt_axis_money(v: f64) -> String {
    let abs = v.abs();
    if abs >= 1e9 {
        format!("{}B", fmt_short(v / 1e9))
    } else if abs >= 1e6 {
        format!("{}M", fmt_short(v / 1e6))
    } else if abs >= 1e3 {
        format!("{}k", fmt_short(v / 1e3))
    } else {
        fmt_short(v)
    }
}

fn fmt_short(v: f64) -> String {
    let s = fmt_decimal_br(v);
    // one decimal place is enough on an axis
    s[..s.len() - 1].to_string()
}
