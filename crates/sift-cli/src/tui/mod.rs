//! Interactive TUI (Terminal User Interface) for Sift.
//!
//! Provides a group browser with:
//! - Live filtering as you type
//! - Navigation through groups
//! - Background reload of the library while browsing

use crate::app::{read_library, App};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::*};
use sift_core::{parse_query, Config, ItemSink, NodeRef};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Member titles shown when a group is opened.
const MEMBER_PREVIEW: usize = 5;

/// TUI application state.
struct TuiApp {
    /// The main application
    app: App,

    /// Library file, for reloading
    library: PathBuf,

    /// Current filter string
    query_string: String,

    /// Rows matching the filter
    results: Vec<NodeRef>,

    /// Selected result index
    selected: usize,

    /// Vertical scroll offset
    scroll_offset: usize,

    /// Whether we should quit
    should_quit: bool,

    /// Last filter time
    last_filter_time: Duration,

    /// Status message
    status_message: Option<String>,
}

impl TuiApp {
    fn new(app: App, library: &Path) -> Self {
        TuiApp {
            app,
            library: library.to_path_buf(),
            query_string: String::new(),
            results: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            should_quit: false,
            last_filter_time: Duration::ZERO,
            status_message: None,
        }
    }

    /// Re-run the filter over the current index.
    fn refilter(&mut self) {
        let start = Instant::now();

        let query = match parse_query(&self.query_string) {
            Ok(q) => q,
            Err(e) => {
                self.status_message = Some(format!("Invalid filter: {}", e));
                self.results.clear();
                return;
            }
        };

        let engine = &self.app.engine;
        let mut results = Vec::with_capacity(engine.row_count());

        // The summary row only makes sense over the unfiltered set.
        if query.matches_all() && engine.summary().is_some() {
            results.push(NodeRef::Summary);
        }
        results.extend(
            engine
                .filter(&query)
                .into_iter()
                .map(|node| NodeRef::Group(node.key().clone())),
        );

        self.results = results;
        self.last_filter_time = start.elapsed();
        self.selected = self.selected.min(self.results.len().saturating_sub(1));
        self.ensure_visible();
    }

    /// Handle input character.
    fn on_char(&mut self, c: char) {
        self.query_string.push(c);
        self.selected = 0;
        self.scroll_offset = 0;
        self.status_message = None;
        self.refilter();
    }

    /// Handle backspace.
    fn on_backspace(&mut self) {
        self.query_string.pop();
        self.selected = 0;
        self.scroll_offset = 0;
        self.status_message = None;
        self.refilter();
    }

    /// Move selection up.
    fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.ensure_visible();
        }
    }

    /// Move selection down.
    fn select_next(&mut self) {
        if self.selected + 1 < self.results.len() {
            self.selected += 1;
            self.ensure_visible();
        }
    }

    /// Page up.
    fn page_up(&mut self, page_size: usize) {
        self.selected = self.selected.saturating_sub(page_size);
        self.ensure_visible();
    }

    /// Page down.
    fn page_down(&mut self, page_size: usize) {
        self.selected = (self.selected + page_size).min(self.results.len().saturating_sub(1));
        self.ensure_visible();
    }

    /// Ensure selected item is visible.
    fn ensure_visible(&mut self) {
        // Corrected against the real list height on the next draw
        let visible_height = 20;

        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + visible_height {
            self.scroll_offset = self.selected - visible_height + 1;
        }
    }

    /// Show the members of the selected group.
    fn open_selected(&mut self) {
        let engine = &self.app.engine;

        self.status_message = match self.results.get(self.selected) {
            Some(NodeRef::Group(key)) => engine.items_of_node(key).map(|members| {
                let mut titles: Vec<String> = members
                    .iter()
                    .take(MEMBER_PREVIEW)
                    .map(|id| self.app.describe(*id))
                    .collect();
                if members.len() > MEMBER_PREVIEW {
                    titles.push(format!("+{} more", members.len() - MEMBER_PREVIEW));
                }
                format!("{}: {}", key, titles.join(", "))
            }),
            Some(NodeRef::Summary) => Some(format!(
                "{} items in {} groups",
                engine.item_count(),
                engine.len()
            )),
            None => None,
        };
    }

    /// Drop the selected group's items from the index.
    fn remove_selected(&mut self) {
        if let Some(NodeRef::Group(key)) = self.results.get(self.selected) {
            let members: Vec<_> = self
                .app
                .engine
                .items_of_node(key)
                .map(|members| members.iter().copied().collect())
                .unwrap_or_default();
            let removed = self.app.engine.remove_items(&members);
            self.status_message = Some(format!("Removed {} items", removed));
            self.refilter();
        }
    }

    /// Toggle the summary row.
    fn toggle_summary(&mut self) {
        let enabled = !self.app.engine.summary_enabled();
        self.app.engine.set_summary_enabled(enabled);
        self.refilter();
    }

    /// Hide the last visible column, keeping at least one.
    fn remove_last_column(&mut self) {
        let columns = self.app.engine.columns().len();
        if columns > 1 && self.app.engine.remove_column(columns - 1) {
            self.status_message = Some("Column hidden".to_string());
            self.refilter();
        }
    }

    /// Re-read the library file and regroup it in the background.
    fn reload(&mut self) {
        match read_library(&self.library) {
            Ok(items) => {
                self.app.items = items.iter().map(|item| (item.id, item.clone())).collect();
                self.app.engine.full_reload(items);
                self.status_message = Some("Reloading...".to_string());
            }
            Err(e) => self.status_message = Some(format!("Reload failed: {:#}", e)),
        }
    }

    /// Fold in finished background batches.
    fn tick(&mut self) {
        if self.app.engine.poll() > 0 {
            if self.app.engine.is_idle() && self.status_message.as_deref() == Some("Reloading...") {
                self.status_message = None;
            }
            self.refilter();
        }
    }
}

/// Run the TUI application.
pub fn run(config: Config, library: &Path) -> anyhow::Result<()> {
    let app = App::with_library(config, library)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state
    let mut tui_app = TuiApp::new(app, library);
    tui_app.refilter();

    // Main loop
    let result = run_loop(&mut terminal, &mut tui_app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

/// Main event loop.
fn run_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut TuiApp) -> anyhow::Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Esc => {
                            app.should_quit = true;
                        }
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            app.should_quit = true;
                        }
                        KeyCode::Char(c) => {
                            if key.modifiers.contains(KeyModifiers::CONTROL) {
                                match c {
                                    's' => app.toggle_summary(),
                                    'r' => app.remove_last_column(),
                                    'd' => app.remove_selected(),
                                    _ => {}
                                }
                            } else {
                                app.on_char(c);
                            }
                        }
                        KeyCode::Backspace => {
                            app.on_backspace();
                        }
                        KeyCode::Up => {
                            app.select_previous();
                        }
                        KeyCode::Down => {
                            app.select_next();
                        }
                        KeyCode::PageUp => {
                            app.page_up(10);
                        }
                        KeyCode::PageDown => {
                            app.page_down(10);
                        }
                        KeyCode::Home => {
                            app.selected = 0;
                            app.scroll_offset = 0;
                        }
                        KeyCode::End => {
                            if !app.results.is_empty() {
                                app.selected = app.results.len() - 1;
                                app.ensure_visible();
                            }
                        }
                        KeyCode::Enter => {
                            app.open_selected();
                        }
                        KeyCode::F(5) => {
                            app.reload();
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

mod ui {
    use super::*;
    use sift_core::RowNode;

    /// Draw the UI.
    pub fn draw(f: &mut Frame, app: &mut TuiApp) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Filter box
                Constraint::Min(10),   // Groups
                Constraint::Length(2), // Status bar
            ])
            .split(f.area());

        draw_filter_box(f, app, chunks[0]);
        draw_groups(f, app, chunks[1]);
        draw_status_bar(f, app, chunks[2]);
    }

    /// Draw the filter input box.
    fn draw_filter_box(f: &mut Frame, app: &TuiApp, area: Rect) {
        let input = Paragraph::new(app.query_string.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Filter (type to narrow) "),
            );
        f.render_widget(input, area);

        f.set_cursor_position(Position::new(
            area.x + app.query_string.chars().count() as u16 + 1,
            area.y + 1,
        ));
    }

    /// Draw the group list.
    fn draw_groups(f: &mut Frame, app: &mut TuiApp, area: Rect) {
        let visible_height = area.height.saturating_sub(2) as usize;

        if app.selected >= app.scroll_offset + visible_height {
            app.scroll_offset = app.selected - visible_height + 1;
        }

        let engine = &app.app.engine;
        let items: Vec<ListItem> = app
            .results
            .iter()
            .skip(app.scroll_offset)
            .take(visible_height)
            .enumerate()
            .filter_map(|(i, node)| {
                let row = engine.row_of(node)?;
                let line = crate::commands::group::format_row(engine, engine.node_at_row(row)?);

                let mut style = match engine.node_at_row(row)? {
                    RowNode::Summary(_) => Style::default().add_modifier(Modifier::ITALIC),
                    RowNode::Group(_) => Style::default(),
                };
                if i + app.scroll_offset == app.selected {
                    style = style
                        .bg(Color::Blue)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD);
                }

                Some(ListItem::new(line).style(style))
            })
            .collect();

        let names: Vec<&str> = engine.columns().iter().map(|c| c.name.as_str()).collect();
        let title = format!(
            " {} ({} shown, filtered in {:.1}ms) ",
            names.join(" / "),
            app.results.len(),
            app.last_filter_time.as_secs_f64() * 1000.0
        );

        let groups = List::new(items).block(Block::default().borders(Borders::ALL).title(title));

        f.render_widget(groups, area);
    }

    /// Draw the status bar.
    fn draw_status_bar(f: &mut Frame, app: &TuiApp, area: Rect) {
        let stats = app.app.engine.stats();
        let phase = if app.app.engine.is_idle() { "" } else { " (grouping)" };

        let status = if let Some(ref msg) = app.status_message {
            msg.clone()
        } else {
            format!(
                "Index: {} groups, {} items{} | ↑↓:Navigate Enter:Members F5:Reload Ctrl+S:Summary Ctrl+R:Hide column Ctrl+D:Remove Esc:Quit",
                stats.node_count, stats.item_count, phase
            )
        };

        let status_bar = Paragraph::new(status).style(Style::default().fg(Color::Gray));

        f.render_widget(status_bar, area);
    }
}
