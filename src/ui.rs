use anyhow::Result;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use route_verifier::{Notice, Session, Status, Theme};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const NOTICE_TTL: Duration = Duration::from_millis(1200);
const PAGE_SIZE: usize = 20;
const MAX_FILTER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Navigate and mark rows
    Normal,
    /// Typing digits into the search filter
    Filter,
    /// Typing or pasting text to extract codes from
    Input,
}

pub struct App<'a> {
    session: &'a mut Session,
    report_path: PathBuf,
    pub state: TableState,
    pub mode: Mode,
    pub filter: String,
    pub input: String,
    notice: Option<(Notice, Instant)>,
}

impl<'a> App<'a> {
    pub fn new(session: &'a mut Session, report_path: PathBuf) -> Self {
        let mut state = TableState::default();
        if !session.registry().is_empty() {
            state.select(Some(0));
        }

        Self {
            session,
            report_path,
            state,
            mode: Mode::Normal,
            filter: String::new(),
            input: String::new(),
            notice: None,
        }
    }

    pub fn visible_len(&self) -> usize {
        self.session.view(&self.filter).len()
    }

    pub fn selected_code(&self) -> Option<String> {
        let view = self.session.view(&self.filter);
        self.state
            .selected()
            .and_then(|i| view.get(i))
            .map(|entry| entry.code.clone())
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|(notice, _)| notice.as_str())
    }

    fn notify(&mut self, notice: Notice) {
        self.notice = Some((notice, Instant::now()));
    }

    fn expire_notice(&mut self) {
        if let Some((_, shown_at)) = &self.notice {
            if shown_at.elapsed() >= NOTICE_TTL {
                self.notice = None;
            }
        }
    }

    /// Keep the selection inside the current view after it shrinks or grows
    fn clamp_selection(&mut self) {
        let len = self.visible_len();
        match self.state.selected() {
            _ if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None => self.state.select(Some(0)),
            _ => {}
        }
    }

    pub fn next(&mut self) {
        let len = self.visible_len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i < len - 1 => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible_len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + PAGE_SIZE).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = match self.state.selected() {
            Some(i) => i.saturating_sub(PAGE_SIZE),
            None => 0,
        };
        self.state.select(Some(i));
        self.clamp_selection();
    }

    pub fn cycle_selected(&mut self) {
        if let Some(code) = self.selected_code() {
            let notice = self.session.cycle(&code);
            self.notify(notice);
        }
    }

    pub fn extract_input(&mut self) {
        let notice = self.session.extract_and_merge(&self.input);
        self.input.clear();
        self.mode = Mode::Normal;
        self.notify(notice);
        self.clamp_selection();
    }

    /// Pasted text lands in the input box, after anything already typed
    pub fn paste(&mut self, text: &str) {
        if text.is_empty() {
            self.notify(Notice::new("Clipboard empty"));
            return;
        }
        if !self.input.is_empty() {
            self.input.push('\n');
        }
        self.input.push_str(text);
        self.mode = Mode::Input;
        self.notify(Notice::new("Pasted"));
    }

    pub fn write_report(&mut self) {
        let notice = match std::fs::write(&self.report_path, self.session.report()) {
            Ok(()) => Notice::new(format!("Report saved to {}", self.report_path.display())),
            Err(e) => {
                tracing::warn!("Failed to write report {}: {}", self.report_path.display(), e);
                Notice::new("Copy failed")
            }
        };
        self.notify(notice);
    }

    /// Returns true when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        match self.mode {
            Mode::Normal => return self.handle_normal_key(key),
            Mode::Filter => self.handle_filter_key(key),
            Mode::Input => self.handle_input_key(key),
        }

        false
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Enter | KeyCode::Char(' ') => self.cycle_selected(),
            KeyCode::Char('/') => self.mode = Mode::Filter,
            KeyCode::Char('i') => self.mode = Mode::Input,
            KeyCode::Char('u') => {
                let notice = self.session.unmark_all();
                self.notify(notice);
            }
            KeyCode::Char('x') => {
                let notice = self.session.remove_unmarked();
                self.notify(notice);
                self.clamp_selection();
            }
            KeyCode::Char('R') => {
                self.input.clear();
                self.filter.clear();
                let notice = self.session.reset();
                self.notify(notice);
                self.clamp_selection();
            }
            KeyCode::Char('c') => self.write_report(),
            KeyCode::Char('t') => {
                let notice = self.session.cycle_theme();
                self.notify(notice);
            }
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::Home => {
                self.state.select(Some(0));
                self.clamp_selection();
            }
            KeyCode::End => {
                let len = self.visible_len();
                if len > 0 {
                    self.state.select(Some(len - 1));
                }
            }
            _ => {}
        }
        false
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) if c.is_ascii_digit() && self.filter.len() < MAX_FILTER_LEN => {
                self.filter.push(c);
            }
            KeyCode::Backspace => {
                self.filter.pop();
            }
            KeyCode::Enter => self.mode = Mode::Normal,
            KeyCode::Esc => {
                self.filter.clear();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        self.clamp_selection();
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.extract_input()
            }
            KeyCode::Char(c) if key.modifiers.difference(KeyModifiers::SHIFT).is_empty() => {
                self.input.push(c)
            }
            KeyCode::Enter => self.input.push('\n'),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Esc => {
                self.input.clear();
                self.mode = Mode::Normal;
                self.notify(Notice::new("Cleared"));
            }
            _ => {}
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!("TUI loop failed: {:?}", err);
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        app.expire_notice();
        terminal.draw(|f| ui(f, app))?;

        // Poll so notices disappear without a key press
        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if app.handle_key(key) {
                    return Ok(());
                }
            }
            Event::Paste(text) => app.paste(&text),
            _ => {}
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

struct Palette {
    base: Style,
    accent: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Auto => Palette {
            base: Style::default(),
            accent: Color::Cyan,
        },
        Theme::Dark => Palette {
            base: Style::default().fg(Color::White).bg(Color::Black),
            accent: Color::LightCyan,
        },
        Theme::Light => Palette {
            base: Style::default().fg(Color::Black).bg(Color::White),
            accent: Color::Blue,
        },
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Unmarked => Color::DarkGray,
        Status::Confirmed => Color::Green,
        Status::Missing => Color::Red,
        Status::Extra => Color::Yellow,
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let palette = palette(app.session.theme());
    f.render_widget(Block::default().style(palette.base), f.size());

    let input_height = if app.mode == Mode::Input { 8 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),            // Header with counts
            Constraint::Length(input_height), // Paste box
            Constraint::Min(0),               // Checklist
            Constraint::Length(3),            // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app, &palette);
    if app.mode == Mode::Input {
        render_input(f, chunks[1], app, &palette);
    }
    render_table(f, chunks[2], app, &palette);
    render_status_bar(f, chunks[3], app, &palette);
}

fn render_header(f: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let counts = app.session.counts();

    let mut spans = vec![
        Span::styled(
            " Route Verifier ",
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" Total {} ", counts.total)),
    ];
    for status in [Status::Confirmed, Status::Missing, Status::Extra, Status::Unmarked] {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            format!("{} {}", status.label(), counts.get(status)),
            Style::default().fg(status_color(status)),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).style(palette.base).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent)),
    );

    f.render_widget(header, area);
}

fn render_input(f: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let input = Paragraph::new(format!("{}█", app.input))
        .style(palette.base)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Paste text (Ctrl+S extract, Esc cancel) "),
        );

    f.render_widget(input, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App, palette: &Palette) {
    let view = app.session.view(&app.filter);

    let title = if app.filter.is_empty() {
        format!(" Codes ({}) ", view.len())
    } else {
        format!(" Codes matching \"{}\" ({}) ", app.filter, view.len())
    };

    if view.is_empty() {
        let hint = if app.session.registry().is_empty() {
            "No codes yet. Press i and paste route text."
        } else {
            "No codes match the filter."
        };
        let empty = Paragraph::new(hint)
            .style(palette.base.add_modifier(Modifier::ITALIC))
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(empty, area);
        return;
    }

    let rows: Vec<Row> = view
        .iter()
        .map(|entry| {
            Row::new(vec![
                Cell::from(entry.code.as_str()).style(Style::default().add_modifier(Modifier::BOLD)),
                Cell::from(entry.status.label()).style(Style::default().fg(status_color(entry.status))),
            ])
        })
        .collect();

    let table = Table::new(rows, [Constraint::Length(8), Constraint::Min(10)])
        .header(
            Row::new(vec!["Code", "Status"])
                .style(Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)),
        )
        .style(palette.base)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("▶ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App, palette: &Palette) {
    let line = match (app.notice(), app.mode) {
        (Some(message), _) => Line::from(Span::styled(
            format!(" {message}"),
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        )),
        (None, Mode::Filter) => Line::from(format!(
            " Filter: {}_  (digits, Enter keep, Esc clear)",
            app.filter
        )),
        (None, Mode::Input) => Line::from(" Type or paste, Ctrl+S extract, Esc cancel"),
        (None, Mode::Normal) => Line::from(
            " ↑↓ move │ Enter cycle │ / filter │ i paste │ u unmark all │ x remove unmarked │ R reset │ c report │ t theme │ q quit",
        ),
    };

    let status_bar = Paragraph::new(line).style(palette.base).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_verifier::{setup_database, Extractor};
    use rusqlite::Connection;

    fn session() -> Session {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        Session::open(conn, Extractor::new("TBA").unwrap())
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_paste_then_extract() {
        let mut session = session();
        let mut app = App::new(&mut session, PathBuf::from("unused.txt"));

        app.paste("TBA 1234\nTBA 000000005678");
        assert_eq!(app.mode, Mode::Input);

        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.notice(), Some("Added 2"));
        assert_eq!(app.selected_code().as_deref(), Some("1234"));
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_cycle_selected_row() {
        let mut session = session();
        session.extract_and_merge("TBA 1111 2222");
        let mut app = App::new(&mut session, PathBuf::from("unused.txt"));

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.notice(), Some("2222: Confirmed"));
        drop(app);

        assert_eq!(session.status_of("2222"), Some(Status::Confirmed));
        assert_eq!(session.status_of("1111"), Some(Status::Unmarked));
    }

    #[test]
    fn test_filter_accepts_only_four_digits() {
        let mut session = session();
        session.extract_and_merge("TBA 1099 2099 3301");
        let mut app = App::new(&mut session, PathBuf::from("unused.txt"));

        press(&mut app, KeyCode::Char('/'));
        for c in ['9', 'a', '9', '1', '2', '3'] {
            press(&mut app, KeyCode::Char(c));
        }
        assert_eq!(app.filter, "9912");
        assert_eq!(app.visible_len(), 0);
        assert_eq!(app.state.selected(), None);

        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.visible_len(), 2);
        assert_eq!(app.selected_code().as_deref(), Some("1099"));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.visible_len(), 3);
    }

    #[test]
    fn test_remove_unmarked_clamps_selection() {
        let mut session = session();
        session.extract_and_merge("TBA 1111 2222 3333");
        let mut app = App::new(&mut session, PathBuf::from("unused.txt"));

        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::End);
        press(&mut app, KeyCode::Char('x'));

        assert_eq!(app.notice(), Some("Removed 2"));
        assert_eq!(app.selected_code().as_deref(), Some("1111"));
    }

    #[test]
    fn test_navigation_wraps() {
        let mut session = session();
        session.extract_and_merge("TBA 1111 2222");
        let mut app = App::new(&mut session, PathBuf::from("unused.txt"));

        press(&mut app, KeyCode::Up);
        assert_eq!(app.selected_code().as_deref(), Some("2222"));
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected_code().as_deref(), Some("1111"));
    }

    #[test]
    fn test_write_report_failure_is_a_notice() {
        let mut session = session();
        let mut app = App::new(&mut session, PathBuf::from("/nonexistent/dir/report.txt"));

        press(&mut app, KeyCode::Char('c'));
        assert_eq!(app.notice(), Some("Copy failed"));
    }

    #[test]
    fn test_input_ignores_control_chords() {
        let mut session = session();
        let mut app = App::new(&mut session, PathBuf::from("unused.txt"));

        press(&mut app, KeyCode::Char('i'));
        app.handle_key(KeyEvent::new(KeyCode::Char('v'), KeyModifiers::CONTROL));
        app.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::ALT));
        app.handle_key(KeyEvent::new(KeyCode::Char('T'), KeyModifiers::SHIFT));
        press(&mut app, KeyCode::Char('b'));

        assert_eq!(app.input, "Tb");
        assert_eq!(app.mode, Mode::Input);
    }

    #[test]
    fn test_quit_keys() {
        let mut session = session();
        let mut app = App::new(&mut session, PathBuf::from("unused.txt"));

        assert!(press(&mut app, KeyCode::Char('q')));
        assert!(app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        press(&mut app, KeyCode::Char('i'));
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.input, "q");
    }
}
