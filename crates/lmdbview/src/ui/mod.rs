mod clipboard;
mod input;
mod types;

pub use input::TextInput;
pub use types::View;

use anyhow::Result;
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row as TableRow, Table,
        TableState, Wrap,
    },
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::notice::{Level, Notice};
use crate::session::{Action, Effect, PageTarget, Session};
use crate::settings::{ConnectionConfig, ConnectionDraft, Settings, PAGE_SIZES};
use types::{ConnectionFormMode, Focus, Form, Prompt, ValueEditor};

/// Width of the connection panel, borders included.
const CONNECTIONS_PANEL_WIDTH: u16 = 28;
/// Table borders, highlight symbol and column spacing.
const TABLE_CHROME_WIDTH: u16 = 2 + 3 + 1;

pub struct App {
    session: Session,
    settings: Settings,
    /// Where settings are persisted. `None` keeps them in memory only.
    settings_path: Option<PathBuf>,
    view: View,
    previous_view: View,
    focus: Focus,
    show_connections: bool,
    connection_list_state: ListState,
    table_state: TableState,
    prompt: Option<Prompt>,
    prompt_input: TextInput,
    editor: Option<ValueEditor>,
    row_form: Form,
    connection_form: Form,
    connection_form_mode: ConnectionFormMode,
    pending_delete: Option<Vec<u8>>,
    notice: Option<Notice>,
    g_pressed: bool,
    /// Writes a key to the system clipboard.
    clipboard: fn(&[u8]) -> Result<()>,
    auto_refresh_task: Option<JoinHandle<()>>,
    tick_tx: mpsc::UnboundedSender<u64>,
    tick_rx: mpsc::UnboundedReceiver<u64>,
}

impl App {
    pub fn new(session: Session, settings: Settings, settings_path: Option<PathBuf>) -> Self {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let mut connection_list_state = ListState::default();
        if !settings.connections.is_empty() {
            connection_list_state.select(Some(0));
        }

        Self {
            session,
            settings,
            settings_path,
            view: View::Browser,
            previous_view: View::Browser,
            focus: Focus::Connections,
            show_connections: true,
            connection_list_state,
            table_state: TableState::default(),
            prompt: None,
            prompt_input: TextInput::default(),
            editor: None,
            row_form: new_row_form(),
            connection_form: connection_form(&ConnectionDraft::default()),
            connection_form_mode: ConnectionFormMode::New,
            pending_delete: None,
            notice: None,
            g_pressed: false,
            clipboard: clipboard::copy,
            auto_refresh_task: None,
            tick_tx,
            tick_rx,
        }
    }

    /// Open `config` and move focus to the key table.
    pub fn connect(&mut self, config: ConnectionConfig) {
        if let Some(index) = self
            .settings
            .connections
            .iter()
            .position(|c| c.name == config.name)
        {
            self.connection_list_state.select(Some(index));
        }
        if self.dispatch(Action::Connect(config)) {
            self.focus = Focus::Table;
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_event_loop(&mut terminal).await;

        if let Some(task) = self.auto_refresh_task.take() {
            task.abort();
        }
        self.session.dispatch(Action::Disconnect);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn run_event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ) -> Result<()> {
        loop {
            let size = terminal.size()?;
            self.sync_table_width(size.width);
            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if !self.handle_key(key) {
                            return Ok(());
                        }
                    }
                    Event::Resize(width, _) => self.sync_table_width(width),
                    _ => {}
                }
            }

            while let Ok(generation) = self.tick_rx.try_recv() {
                self.dispatch(Action::AutoRefreshTick { generation });
            }

            if let Some(notice) = &self.notice {
                if notice.is_expired_at(Local::now()) {
                    self.notice = None;
                }
            }
        }
    }

    /// Dispatch `action` and apply its effects. Returns false if it failed.
    fn dispatch(&mut self, action: Action) -> bool {
        let effects = self.session.dispatch(action);
        let ok = !effects
            .iter()
            .any(|e| matches!(e, Effect::Notice(n) if n.level == Level::Error));
        self.apply_effects(effects);
        if let Some(selected) = self.table_state.selected() {
            if selected >= self.session.rows().len() {
                let first = (!self.session.rows().is_empty()).then_some(0);
                self.table_state.select(first);
            }
        }
        ok
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notice(notice) => self.notice = Some(notice),
                Effect::ValueLoaded { key, text } => {
                    self.editor = Some(ValueEditor {
                        key,
                        value: TextInput::new(text),
                    });
                    self.view = View::ValueEditor;
                }
                Effect::ClearSelection => {
                    let first = (!self.session.rows().is_empty()).then_some(0);
                    self.table_state.select(first);
                }
                Effect::ConnectionChanged | Effect::AutoRefreshChanged(_) => {
                    self.restart_auto_refresh();
                }
                Effect::PageSizeChanged(size) => {
                    self.settings.ui.page_size = size;
                    self.persist_settings();
                }
            }
        }
    }

    fn restart_auto_refresh(&mut self) {
        if let Some(task) = self.auto_refresh_task.take() {
            task.abort();
        }
        if !self.session.auto_refresh() || !self.session.is_connected() {
            return;
        }

        let generation = self.session.generation();
        let period = Duration::from_secs(self.settings.ui.auto_refresh_secs.max(1));
        let tx = self.tick_tx.clone();
        self.auto_refresh_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(generation).is_err() {
                    break;
                }
            }
        }));
        log::debug!("auto refresh every {:?} for generation {}", period, generation);
    }

    fn sync_table_width(&mut self, terminal_width: u16) {
        let panel = if self.show_connections {
            CONNECTIONS_PANEL_WIDTH
        } else {
            0
        };
        let width = terminal_width
            .saturating_sub(panel)
            .saturating_sub(TABLE_CHROME_WIDTH);
        self.session.dispatch(Action::Resize(width));
    }

    fn persist_settings(&mut self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(e) = self.settings.save(path) {
            log::error!("{:#}", e);
            self.notice = Some(Notice::error(format!("Failed to save settings: {:#}", e)));
        }
    }

    /// Returns false when the application should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.prompt.is_some() {
            self.handle_prompt_key(key);
            return true;
        }

        match self.view {
            View::Browser => return self.handle_browser_key(key),
            View::Help => self.view = self.previous_view,
            View::ValueEditor => self.handle_editor_key(key),
            View::NewRow => self.handle_row_form_key(key),
            View::ConnectionForm => self.handle_connection_form_key(key),
            View::ConfirmDeleteRow => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    if let Some(key) = self.pending_delete.take() {
                        if self.dispatch(Action::DeleteRow { key }) {
                            self.editor = None;
                        }
                    }
                    self.view = View::Browser;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.pending_delete = None;
                    self.view = self.previous_view;
                }
                _ => {}
            },
            View::ConfirmDeleteConnection => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.delete_selected_connection();
                    self.view = View::Browser;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.view = View::Browser;
                }
                _ => {}
            },
        }
        true
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => {
                let text = self.prompt_input.text().to_string();
                match self.prompt.take() {
                    Some(Prompt::Prefix) => {
                        self.dispatch(Action::SetPrefix(text));
                    }
                    Some(Prompt::Page) => {
                        self.dispatch(Action::GoToPageInput(text));
                    }
                    None => {}
                }
            }
            _ => {
                self.prompt_input.handle_key(key);
            }
        }
    }

    fn open_prompt(&mut self, prompt: Prompt, initial: &str) {
        self.prompt = Some(prompt);
        self.prompt_input.set(initial);
    }

    fn handle_browser_key(&mut self, key: KeyEvent) -> bool {
        let g_pressed = std::mem::take(&mut self.g_pressed);

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Char('?') => {
                self.previous_view = View::Browser;
                self.view = View::Help;
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Connections => Focus::Table,
                    Focus::Table => Focus::Connections,
                };
                if self.focus == Focus::Connections {
                    self.show_connections = true;
                }
            }
            KeyCode::Char('C') => {
                self.show_connections = !self.show_connections;
                self.focus = if self.show_connections {
                    Focus::Connections
                } else {
                    Focus::Table
                };
            }
            KeyCode::Char('/') => {
                let prefix = self.session.prefix().to_string();
                self.open_prompt(Prompt::Prefix, &prefix);
            }
            KeyCode::Char(':') => self.open_prompt(Prompt::Page, ""),
            KeyCode::Char('c') => {
                self.dispatch(Action::ClearPrefix);
            }
            KeyCode::Char('s') => {
                let current = self.session.page_size();
                let next = PAGE_SIZES
                    .iter()
                    .copied()
                    .find(|&size| size > current)
                    .unwrap_or(PAGE_SIZES[0]);
                self.dispatch(Action::SetPageSize(next));
            }
            KeyCode::Char('P') => {
                self.dispatch(Action::ToggleHideKeyPrefix);
            }
            KeyCode::Char('V') => {
                self.dispatch(Action::ToggleHideValues);
            }
            KeyCode::Char('a') => {
                self.dispatch(Action::ToggleAutoRefresh);
            }
            KeyCode::Char('r') => {
                self.dispatch(Action::Refresh);
            }
            _ => match self.focus {
                Focus::Connections => self.handle_connections_key(key, g_pressed),
                Focus::Table => self.handle_table_key(key, g_pressed),
            },
        }
        true
    }

    fn handle_connections_key(&mut self, key: KeyEvent, g_pressed: bool) {
        let len = self.settings.connections.len();
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => select_next(&mut self.connection_list_state, len),
            KeyCode::Up | KeyCode::Char('k') => {
                select_previous(&mut self.connection_list_state, len)
            }
            KeyCode::Char('g') => {
                if g_pressed {
                    select_first(&mut self.connection_list_state, len);
                } else {
                    self.g_pressed = true;
                }
            }
            KeyCode::Char('G') => select_last(&mut self.connection_list_state, len),
            KeyCode::Enter | KeyCode::Char('o') => {
                if let Some(config) = self.selected_connection().cloned() {
                    self.connect(config);
                }
            }
            KeyCode::Char('d') => {
                self.dispatch(Action::Disconnect);
            }
            KeyCode::Char('n') => {
                self.connection_form = connection_form(&ConnectionDraft::default());
                self.connection_form_mode = ConnectionFormMode::New;
                self.view = View::ConnectionForm;
            }
            KeyCode::Char('e') => {
                if let Some(index) = self.connection_list_state.selected() {
                    if let Some(config) = self.settings.connections.get(index) {
                        self.connection_form = connection_form(&ConnectionDraft::from_config(config));
                        self.connection_form_mode = ConnectionFormMode::Edit(index);
                        self.view = View::ConnectionForm;
                    }
                }
            }
            KeyCode::Char('x') => {
                if self.selected_connection().is_some() {
                    self.view = View::ConfirmDeleteConnection;
                }
            }
            _ => {}
        }
    }

    fn handle_table_key(&mut self, key: KeyEvent, g_pressed: bool) {
        let len = self.session.rows().len();
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => select_next(&mut self.table_state, len),
            KeyCode::Up | KeyCode::Char('k') => select_previous(&mut self.table_state, len),
            KeyCode::Char('g') => {
                if g_pressed {
                    select_first(&mut self.table_state, len);
                } else {
                    self.g_pressed = true;
                }
            }
            KeyCode::Char('G') => select_last(&mut self.table_state, len),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('[') => {
                self.dispatch(Action::GoToPage(PageTarget::Previous));
            }
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(']') => {
                self.dispatch(Action::GoToPage(PageTarget::Next));
            }
            KeyCode::Char('H') => {
                self.dispatch(Action::GoToPage(PageTarget::First));
            }
            KeyCode::Char('L') => {
                self.dispatch(Action::GoToPage(PageTarget::Last));
            }
            KeyCode::Enter | KeyCode::Char('o') => {
                if let Some(index) = self.table_state.selected() {
                    self.dispatch(Action::OpenRow(index));
                }
            }
            KeyCode::Char('N') => {
                if self.session.is_connected() {
                    let prefix = self.session.prefix().to_string();
                    self.row_form = new_row_form();
                    if let Some(input) = self.row_form.focused_mut() {
                        input.set(prefix);
                    }
                    self.view = View::NewRow;
                } else {
                    self.notice = Some(Notice::error("No database connected"));
                }
            }
            KeyCode::Char('y') => {
                if let Some(key) = self
                    .table_state
                    .selected()
                    .and_then(|index| self.session.stored_key(index))
                {
                    let key = key.to_vec();
                    self.copy_key(&key);
                }
            }
            KeyCode::Char('x') => {
                if let Some(key) = self
                    .table_state
                    .selected()
                    .and_then(|index| self.session.stored_key(index))
                {
                    self.pending_delete = Some(key.to_vec());
                    self.previous_view = View::Browser;
                    self.view = View::ConfirmDeleteRow;
                }
            }
            _ => {}
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.editor = None;
                self.view = View::Browser;
            }
            KeyCode::Char('s') if ctrl => {
                if let Some(editor) = &self.editor {
                    let action = Action::SaveRow {
                        key: editor.key.clone(),
                        value: editor.value.text().to_string(),
                    };
                    if self.dispatch(action) {
                        self.editor = None;
                        self.view = View::Browser;
                    }
                }
            }
            KeyCode::Char('y') if ctrl => {
                if let Some(key) = self.editor.as_ref().map(|e| e.key.clone()) {
                    self.copy_key(&key);
                }
            }
            KeyCode::Char('d') if ctrl => {
                if let Some(editor) = &self.editor {
                    self.pending_delete = Some(editor.key.clone());
                    self.previous_view = View::ValueEditor;
                    self.view = View::ConfirmDeleteRow;
                }
            }
            KeyCode::Enter => {
                if let Some(editor) = &mut self.editor {
                    editor.value.insert('\n');
                }
            }
            _ => {
                if let Some(editor) = &mut self.editor {
                    editor.value.handle_key(key);
                }
            }
        }
    }

    fn copy_key(&mut self, key: &[u8]) {
        let notice = match (self.clipboard)(key) {
            Ok(()) => Notice::info("Key copied to clipboard!"),
            Err(err) => {
                log::error!("{:#}", err);
                Notice::error(format!("{:#}", err))
            }
        };
        self.notice = Some(notice);
    }

    fn handle_row_form_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.view = View::Browser,
            KeyCode::Tab => self.row_form.next(),
            KeyCode::BackTab => self.row_form.previous(),
            KeyCode::Enter if !self.row_form.is_last() => self.row_form.next(),
            KeyCode::Enter => self.submit_row_form(),
            KeyCode::Char('s') if ctrl => self.submit_row_form(),
            _ => {
                if let Some(input) = self.row_form.focused_mut() {
                    input.handle_key(key);
                }
            }
        }
    }

    fn submit_row_form(&mut self) {
        let action = Action::SaveRow {
            key: self.row_form.value(0).as_bytes().to_vec(),
            value: self.row_form.value(1).to_string(),
        };
        if self.dispatch(action) {
            self.view = View::Browser;
        }
    }

    fn handle_connection_form_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.view = View::Browser,
            KeyCode::Tab => self.connection_form.next(),
            KeyCode::BackTab => self.connection_form.previous(),
            KeyCode::Enter if !self.connection_form.is_last() => self.connection_form.next(),
            KeyCode::Enter => self.submit_connection_form(),
            KeyCode::Char('s') if ctrl => self.submit_connection_form(),
            _ => {
                if let Some(input) = self.connection_form.focused_mut() {
                    input.handle_key(key);
                }
            }
        }
    }

    fn submit_connection_form(&mut self) {
        let draft = ConnectionDraft {
            name: self.connection_form.value(0).to_string(),
            database_path: self.connection_form.value(1).to_string(),
            map_size_gb: self.connection_form.value(2).to_string(),
        };
        let config = match draft
            .validate()
            .and_then(|config| self.session.probe(&config).map(|_| config))
        {
            Ok(config) => config,
            Err(e) => {
                log::error!("{:#}", e);
                self.notice = Some(Notice::error(format!("{:#}", e)));
                return;
            }
        };

        match self.connection_form_mode {
            ConnectionFormMode::New => {
                self.settings.add_connection(config);
                let last = self.settings.connections.len() - 1;
                self.connection_list_state.select(Some(last));
                self.notice = Some(Notice::info("Connection added"));
            }
            ConnectionFormMode::Edit(index) => {
                let was_active = self
                    .settings
                    .connections
                    .get(index)
                    .is_some_and(|old| self.session.connection() == Some(old));
                if let Err(e) = self.settings.update_connection(index, config.clone()) {
                    self.notice = Some(Notice::error(format!("{:#}", e)));
                    return;
                }
                self.notice = Some(Notice::info("Connection updated"));
                if was_active {
                    self.dispatch(Action::Connect(config));
                }
            }
        }
        self.persist_settings();
        self.view = View::Browser;
    }

    fn delete_selected_connection(&mut self) {
        let Some(index) = self.connection_list_state.selected() else {
            return;
        };
        let is_active = self
            .settings
            .connections
            .get(index)
            .is_some_and(|c| self.session.connection() == Some(c));
        if is_active {
            self.dispatch(Action::Disconnect);
        }

        match self.settings.remove_connection(index) {
            Ok(removed) => {
                log::info!("removed connection {}", removed.name);
                self.notice = Some(Notice::info(format!("Connection {} deleted", removed.name)));
                let len = self.settings.connections.len();
                self.connection_list_state
                    .select((len > 0).then(|| index.min(len - 1)));
                self.persist_settings();
            }
            Err(e) => self.notice = Some(Notice::error(format!("{:#}", e))),
        }
    }

    fn selected_connection(&self) -> Option<&ConnectionConfig> {
        self.connection_list_state
            .selected()
            .and_then(|i| self.settings.connections.get(i))
    }

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(f.area());

        match self.view {
            View::Browser => self.render_browser(f, chunks[0]),
            View::Help => self.render_help(f, chunks[0]),
            View::ValueEditor => self.render_editor(f, chunks[0]),
            View::NewRow => render_form(f, chunks[0], &self.row_form, "New Key-Value"),
            View::ConnectionForm => {
                let title = match self.connection_form_mode {
                    ConnectionFormMode::New => "New Connection",
                    ConnectionFormMode::Edit(_) => "Edit Connection",
                };
                render_form(f, chunks[0], &self.connection_form, title);
            }
            View::ConfirmDeleteRow => {
                let key = self.pending_delete.as_deref().unwrap_or_default();
                render_confirm(f, chunks[0], "Delete Key?", &String::from_utf8_lossy(key));
            }
            View::ConfirmDeleteConnection => {
                let name = self
                    .selected_connection()
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                render_confirm(f, chunks[0], "Delete Connection?", &name);
            }
        }

        if let Some(prompt) = self.prompt {
            self.render_prompt(f, chunks[1], prompt);
        } else {
            self.render_status_bar(f, chunks[1]);
        }
    }

    fn render_browser(&mut self, f: &mut Frame, area: Rect) {
        let table_area = if self.show_connections {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Length(CONNECTIONS_PANEL_WIDTH),
                    Constraint::Min(0),
                ])
                .split(area);
            self.render_connections(f, chunks[0]);
            chunks[1]
        } else {
            area
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(table_area);
        self.render_scan_info(f, chunks[0]);
        self.render_table(f, chunks[1]);
    }

    fn render_connections(&mut self, f: &mut Frame, area: Rect) {
        let active = self.session.connection();
        let items: Vec<ListItem> = self
            .settings
            .connections
            .iter()
            .map(|c| {
                if active == Some(c) {
                    ListItem::new(format!("● {}", c.name)).style(Style::default().fg(Color::Green))
                } else {
                    ListItem::new(format!("  {}", c.name))
                }
            })
            .collect();

        let border_style = if self.focus == Focus::Connections {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title("Connections"),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ");

        f.render_stateful_widget(list, area, &mut self.connection_list_state);
    }

    fn render_scan_info(&self, f: &mut Frame, area: Rect) {
        let session = &self.session;
        let title = match session.connection() {
            Some(c) => format!("{} ({})", c.name, c.database_path),
            None => "Not connected".to_string(),
        };
        let prefix = if session.prefix().is_empty() {
            "<none>".to_string()
        } else {
            session.prefix().to_string()
        };
        let flag = |on: bool| if on { "on" } else { "off" };

        let line = Line::from(vec![
            Span::styled("Prefix: ", Style::default().fg(Color::Gray)),
            Span::styled(prefix, Style::default().fg(Color::Yellow)),
            Span::styled("  Page: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{}/{}", session.current_page(), session.total_pages())),
            Span::styled("  Records: ", Style::default().fg(Color::Gray)),
            Span::raw(session.total_records().to_string()),
            Span::styled("  Page size: ", Style::default().fg(Color::Gray)),
            Span::raw(session.page_size().to_string()),
            Span::styled("  Hide prefix: ", Style::default().fg(Color::Gray)),
            Span::raw(flag(session.hide_key_prefix())),
            Span::styled("  Hide values: ", Style::default().fg(Color::Gray)),
            Span::raw(flag(session.hide_values())),
            Span::styled("  Auto refresh: ", Style::default().fg(Color::Gray)),
            Span::raw(flag(session.auto_refresh())),
        ]);

        let paragraph =
            Paragraph::new(line).block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(paragraph, area);
    }

    fn render_table(&mut self, f: &mut Frame, area: Rect) {
        let columns = self.session.columns();
        let header = TableRow::new(vec![Cell::from("Key"), Cell::from("Value")]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let rows: Vec<TableRow> = self
            .session
            .rows()
            .iter()
            .map(|row| TableRow::new(vec![Cell::from(row.key.as_str()), Cell::from(row.value.as_str())]))
            .collect();

        let widths = if self.session.hide_values() {
            [Constraint::Min(0), Constraint::Length(0)]
        } else {
            [Constraint::Length(columns.key as u16), Constraint::Min(0)]
        };

        let border_style = if self.focus == Focus::Table {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };

        let table = Table::new(rows, widths)
            .header(header)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title("Keys | Enter: open | N: new | x: delete | h/l: page | /: prefix"),
            )
            .row_highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn render_editor(&self, f: &mut Frame, area: Rect) {
        let Some(editor) = &self.editor else {
            return;
        };
        let paragraph = Paragraph::new(editor.value.with_cursor())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Value of {}", String::from_utf8_lossy(&editor.key))),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let section = |title: &'static str| {
            Line::from(vec![Span::styled(title, Style::default().fg(Color::Yellow))])
        };
        let help_text = vec![
            Line::from(vec![Span::styled(
                "lmdbview - Keyboard Shortcuts",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            section("Connections:"),
            Line::from("  Enter/o     Connect to selected database"),
            Line::from("  d           Disconnect"),
            Line::from("  n           New connection"),
            Line::from("  e           Edit connection"),
            Line::from("  x           Delete connection"),
            Line::from(""),
            section("Keys:"),
            Line::from("  j/k         Move down / up"),
            Line::from("  gg/G        First / last row"),
            Line::from("  h/l, [/]    Previous / next page"),
            Line::from("  H/L         First / last page"),
            Line::from("  :           Go to page"),
            Line::from("  /           Filter by key prefix"),
            Line::from("  c           Clear prefix filter"),
            Line::from("  s           Cycle page size"),
            Line::from("  P           Toggle hiding the key prefix"),
            Line::from("  V           Toggle hiding values"),
            Line::from("  Enter/o     Open value editor"),
            Line::from("  N           New key-value"),
            Line::from("  x           Delete key-value"),
            Line::from("  y           Copy key"),
            Line::from("  r           Refresh"),
            Line::from("  a           Toggle auto refresh"),
            Line::from(""),
            section("Editor:"),
            Line::from("  Ctrl+S      Save"),
            Line::from("  Ctrl+D      Delete key"),
            Line::from("  Ctrl+Y      Copy key"),
            Line::from("  Esc         Close without saving"),
            Line::from(""),
            section("General:"),
            Line::from("  Tab         Switch panel"),
            Line::from("  C           Show / hide connections"),
            Line::from("  ?           Show this help"),
            Line::from("  q           Quit"),
            Line::from(""),
            Line::from(vec![Span::styled(
                "Press any key to close",
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            )]),
        ];

        let paragraph = Paragraph::new(help_text)
            .block(Block::default().borders(Borders::ALL).title("Help (?)"))
            .wrap(Wrap { trim: true });

        f.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let help_text = match self.view {
            View::Browser => match self.focus {
                Focus::Connections => "Enter: connect | n: new | e: edit | x: delete | Tab: keys | ?: help | q: quit",
                Focus::Table => "j/k: move | h/l: page | /: prefix | s: page size | r: refresh | ?: help | q: quit",
            },
            View::Help => "Press any key to close help",
            View::ValueEditor => "Ctrl+S: save | Ctrl+D: delete | Ctrl+Y: copy key | Esc: close",
            View::NewRow | View::ConnectionForm => "Tab: next field | Enter/Ctrl+S: save | Esc: cancel",
            View::ConfirmDeleteRow | View::ConfirmDeleteConnection => {
                "y: confirm delete | n/Esc: cancel"
            }
        };

        let status_line = match &self.notice {
            Some(notice) => {
                let color = match notice.level {
                    Level::Info => Color::Yellow,
                    Level::Error => Color::Red,
                };
                Line::from(vec![
                    Span::styled(notice.render(), Style::default().fg(color)),
                    Span::raw(" | "),
                    Span::styled(help_text, Style::default().fg(Color::Gray)),
                ])
            }
            None => Line::from(vec![Span::styled(
                help_text,
                Style::default().fg(Color::Gray),
            )]),
        };

        f.render_widget(Paragraph::new(vec![status_line]), area);
    }

    fn render_prompt(&self, f: &mut Frame, area: Rect, prompt: Prompt) {
        let line = Line::from(vec![
            Span::styled(prompt.label(), Style::default().fg(Color::Cyan)),
            Span::styled(
                self.prompt_input.with_cursor(),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled(
                "  (Enter to apply, Esc to cancel)",
                Style::default().fg(Color::Gray),
            ),
        ]);
        f.render_widget(Paragraph::new(vec![line]), area);
    }
}

fn new_row_form() -> Form {
    Form::new(&[("Key", ""), ("Value", "")])
}

fn connection_form(draft: &ConnectionDraft) -> Form {
    Form::new(&[
        ("Name", draft.name.as_str()),
        ("Database path", draft.database_path.as_str()),
        ("Map size (GB)", draft.map_size_gb.as_str()),
    ])
}

fn render_form(f: &mut Frame, area: Rect, form: &Form, title: &str) {
    let mut lines = vec![Line::from("")];
    for (idx, field) in form.fields.iter().enumerate() {
        if idx == form.focus {
            lines.push(Line::from(vec![
                Span::raw(format!("> {}: ", field.label)),
                Span::styled(
                    field.input.with_cursor(),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
            ]));
        } else {
            lines.push(Line::from(format!("  {}: {}", field.label, field.input.text())));
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn render_confirm(f: &mut Frame, area: Rect, question: &str, subject: &str) {
    let lines = vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            question.to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from(vec![Span::styled(
            subject.to_string(),
            Style::default().fg(Color::White),
        )]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press Y to confirm deletion, N/Esc to cancel",
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )]),
    ];

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Confirm Deletion"),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn select_next(state: &mut impl Selectable, len: usize) {
    if len == 0 {
        return;
    }
    let i = match state.selected() {
        Some(i) if i + 1 < len => i + 1,
        Some(_) => 0,
        None => 0,
    };
    state.select(Some(i));
}

fn select_previous(state: &mut impl Selectable, len: usize) {
    if len == 0 {
        return;
    }
    let i = match state.selected() {
        Some(0) | None => len - 1,
        Some(i) => i - 1,
    };
    state.select(Some(i));
}

fn select_first(state: &mut impl Selectable, len: usize) {
    if len > 0 {
        state.select(Some(0));
    }
}

fn select_last(state: &mut impl Selectable, len: usize) {
    if len > 0 {
        state.select(Some(len - 1));
    }
}

/// Selection shared by list and table state.
trait Selectable {
    fn selected(&self) -> Option<usize>;
    fn select(&mut self, index: Option<usize>);
}

impl Selectable for ListState {
    fn selected(&self) -> Option<usize> {
        ListState::selected(self)
    }

    fn select(&mut self, index: Option<usize>) {
        ListState::select(self, index)
    }
}

impl Selectable for TableState {
    fn selected(&self) -> Option<usize> {
        TableState::selected(self)
    }

    fn select(&mut self, index: Option<usize>) {
        TableState::select(self, index)
    }
}
