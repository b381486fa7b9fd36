use anchorscope_core::analysis::AnalysisResult;
use anchorscope_core::table::{AnchorFilter, AnchorTable, SortDirection, SortKey};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};
use std::io;

pub mod cloud;

use cloud::{CloudCells, layout_cells};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Cloud,
    Table,
}

pub struct App<'a> {
    result: &'a AnalysisResult,
    view: View,
    filter: AnchorFilter,
    sort_key: SortKey,
    sort_direction: SortDirection,
    selected: usize,
    should_quit: bool,
    // Last cloud, keyed on what it was computed from.
    cloud_cache: Option<((AnchorFilter, u16, u16), CloudCells)>,
}

impl<'a> App<'a> {
    pub fn new(result: &'a AnalysisResult, filter: AnchorFilter) -> Self {
        Self {
            result,
            view: View::Cloud,
            filter,
            sort_key: SortKey::default(),
            sort_direction: SortDirection::default(),
            selected: 0,
            should_quit: false,
            cloud_cache: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn filter(&self) -> &AnchorFilter {
        &self.filter
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn table(&self) -> AnchorTable<'a> {
        AnchorTable::new(
            &self.result.anchors,
            &self.filter,
            self.sort_key,
            self.sort_direction,
        )
    }

    /// Cloud for an area, recomputed only when the filter or size changed.
    pub fn cloud(&mut self, cols: u16, rows: u16) -> &CloudCells {
        let key = (self.filter.clone(), cols, rows);
        if self.cloud_cache.as_ref().is_some_and(|(cached, _)| *cached != key) {
            self.cloud_cache = None;
        }
        let result = self.result;
        &self
            .cloud_cache
            .get_or_insert_with(|| {
                let cells = layout_cells(&result.anchors, &key.0, cols, rows);
                (key, cells)
            })
            .1
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => {
                self.view = match self.view {
                    View::Cloud => View::Table,
                    View::Table => View::Cloud,
                };
            }
            KeyCode::Char(c) => {
                self.filter.text.push(c);
                self.selected = 0;
            }
            KeyCode::Backspace => {
                self.filter.text.pop();
                self.selected = 0;
            }
            KeyCode::Right => {
                self.filter.min_count = self.filter.min_count.max(1) + 1;
                self.selected = 0;
            }
            KeyCode::Left => {
                self.filter.min_count = self.filter.min_count.saturating_sub(1).max(1);
                self.selected = 0;
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                let last = self.table().len().saturating_sub(1);
                self.selected = (self.selected + 1).min(last);
            }
            KeyCode::PageUp => self.selected = self.selected.saturating_sub(10),
            KeyCode::PageDown => {
                let last = self.table().len().saturating_sub(1);
                self.selected = (self.selected + 10).min(last);
            }
            KeyCode::F(2) => self.sort_key = self.sort_key.next(),
            KeyCode::F(3) => self.sort_direction = self.sort_direction.toggle(),
            _ => {}
        }
    }
}

/// Open the interactive viewer for a finished analysis.
pub fn run(result: &AnalysisResult, filter: AnchorFilter) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(result, filter);
    let outcome = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        // Resizes arrive as events and simply trigger a redraw.
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            app.handle_key(key);
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Cloud or table
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    match app.view {
        View::Cloud => render_cloud(f, app, chunks[1]),
        View::Table => render_table(f, app, chunks[1]),
    }
    render_status(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let insights = &app.result.insights;
    let filter_text = if app.filter.text.is_empty() {
        "(type to filter)".to_string()
    } else {
        app.filter.text.clone()
    };

    let header = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                app.result.base_url.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(
                "  {} pages | {} anchors | {} links | {:.1} per page",
                app.result.successful_pages(),
                insights.total_unique_anchors,
                insights.total_internal_links,
                insights.average_links_per_page
            )),
        ]),
        Line::from(vec![
            Span::styled("Filter: ", Style::default().fg(Color::DarkGray)),
            Span::styled(filter_text, Style::default().fg(Color::Yellow)),
            Span::styled("   Min count: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                app.filter.min_count.max(1).to_string(),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled("   Sort: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!(
                "{} {}",
                app.sort_key.label(),
                match app.sort_direction {
                    SortDirection::Ascending => "↑",
                    SortDirection::Descending => "↓",
                }
            )),
        ]),
    ])
    .block(Block::default().borders(Borders::BOTTOM));

    f.render_widget(header, area);
}

fn render_cloud(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Word cloud ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let cells = app.cloud(inner.width, inner.height).clone();
    if cells.words.is_empty() {
        let empty = Paragraph::new("No anchors match the current filter.")
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, inner);
        return;
    }

    let top = inner.y + inner.height.saturating_sub(cells.rows) / 2;
    let buffer = f.buffer_mut();
    for word in &cells.words {
        let (r, g, b) = word.color.rgb();
        let mut style = Style::default().fg(Color::Rgb(r, g, b));
        if word.emphasized() {
            style = style.add_modifier(Modifier::BOLD);
        }
        let y = top + word.row;
        if y >= inner.y + inner.height {
            continue;
        }
        buffer.set_stringn(
            inner.x + word.col,
            y,
            &word.text,
            inner.width.saturating_sub(word.col) as usize,
            style,
        );
    }

    if cells.dropped > 0 {
        let note = format!(" {} not shown ", cells.dropped);
        let x = area.x + area.width.saturating_sub(note.len() as u16 + 2);
        buffer.set_string(x, area.y + area.height.saturating_sub(1), note, Style::default().fg(Color::DarkGray));
    }
}

fn render_table(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(6)])
        .split(area);

    let table = app.table();
    let rows: Vec<Row> = table
        .rows()
        .iter()
        .map(|record| {
            Row::new(vec![
                Cell::from(record.text.clone()),
                Cell::from(record.count.to_string()),
                Cell::from(record.page_count().to_string()),
                Cell::from(record.destinations.len().to_string()),
            ])
        })
        .collect();

    let widget = Table::new(
        rows,
        [
            Constraint::Min(20),
            Constraint::Length(7),
            Constraint::Length(7),
            Constraint::Length(13),
        ],
    )
    .header(
        Row::new(vec!["Anchor text", "Count", "Pages", "Destinations"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} anchors, {} links ", table.len(), table.total_links())),
    )
    .row_highlight_style(Style::default().bg(Color::DarkGray));

    let mut state = TableState::default();
    if !table.is_empty() {
        state.select(Some(app.selected.min(table.len() - 1)));
    }
    f.render_stateful_widget(widget, chunks[0], &mut state);

    let detail: Vec<Line> = match state.selected().and_then(|i| table.rows().get(i)) {
        Some(record) => record
            .destinations
            .iter()
            .map(|d| Line::from(format!("{:>4}x {}", d.count, d.href)))
            .collect(),
        None => vec![Line::from("")],
    };
    let details = Paragraph::new(detail)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Destinations "));
    f.render_widget(details, chunks[1]);
}

fn render_status(f: &mut Frame, area: Rect) {
    let status = Paragraph::new(Line::from(vec![
        Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" cloud/table | "),
        Span::styled("←→", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" min count | "),
        Span::styled("↑↓", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" select | "),
        Span::styled("F2/F3", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" sort | "),
        Span::styled("ESC", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" quit"),
    ]))
    .style(Style::default().fg(Color::DarkGray));

    f.render_widget(status, area);
}
