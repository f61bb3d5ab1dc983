//! Browsing session over one open connection
//!
//! All browsing state lives in [`Session`]. User actions arrive as [`Action`]
//! values through [`Session::dispatch`], which applies them and reports what
//! the front end should do next as a list of [`Effect`]s. Failures never
//! escape `dispatch`: they come back as error notices and leave the rows on
//! screen as they were.

use anyhow::{anyhow, bail, Context, Result};

use crate::layout::{prepare_rows, ColumnWidths, Metrics, RowFormatter};
use crate::notice::Notice;
use crate::scanner::{self, Entry, Row};
use crate::settings::{ConnectionConfig, UiSettings};
use crate::store::{Connector, KvStore};
use crate::value::format_for_editing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTarget {
    First,
    Previous,
    Next,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Connect(ConnectionConfig),
    Disconnect,
    SetPrefix(String),
    ClearPrefix,
    SetPageSize(usize),
    GoToPage(PageTarget),
    /// Page number typed by the user.
    GoToPageInput(String),
    ToggleHideKeyPrefix,
    ToggleHideValues,
    /// Load the full value behind the displayed row at this index.
    OpenRow(usize),
    /// Insert or overwrite a stored key.
    SaveRow { key: Vec<u8>, value: String },
    DeleteRow { key: Vec<u8> },
    Refresh,
    ToggleAutoRefresh,
    AutoRefreshTick { generation: u64 },
    /// Width of the key/value table in characters.
    Resize(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notice(Notice),
    ValueLoaded { key: Vec<u8>, text: String },
    ClearSelection,
    ConnectionChanged,
    PageSizeChanged(usize),
    AutoRefreshChanged(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub page_size: usize,
    pub hide_key_prefix: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&UiSettings::default())
    }
}

impl From<&UiSettings> for SessionOptions {
    fn from(ui: &UiSettings) -> Self {
        Self {
            page_size: ui.page_size.max(1),
            hide_key_prefix: ui.hide_key_prefix,
        }
    }
}

struct ActiveConnection {
    config: ConnectionConfig,
    store: Box<dyn KvStore>,
}

pub struct Session {
    connector: Box<dyn Connector>,
    active: Option<ActiveConnection>,
    formatter: RowFormatter,
    prefix: String,
    page_size: usize,
    current_page: usize,
    total_pages: usize,
    total_records: usize,
    total_records_cached: bool,
    hide_key_prefix: bool,
    hide_values: bool,
    auto_refresh: bool,
    /// Bumped on every connect and disconnect.
    generation: u64,
    view_width: u16,
    /// Stored keys of the current page, parallel to `rows`.
    keys: Vec<Vec<u8>>,
    /// Current page before width fitting.
    page: Vec<Row>,
    rows: Vec<Row>,
    columns: ColumnWidths,
}

impl Session {
    pub fn new(connector: Box<dyn Connector>, options: SessionOptions) -> Result<Self> {
        Ok(Self {
            connector,
            active: None,
            formatter: RowFormatter::new(Metrics::TERMINAL)?,
            prefix: String::new(),
            page_size: options.page_size.max(1),
            current_page: 1,
            total_pages: 1,
            total_records: 0,
            total_records_cached: false,
            hide_key_prefix: options.hide_key_prefix,
            hide_values: false,
            auto_refresh: false,
            generation: 0,
            view_width: 80,
            keys: Vec::new(),
            page: Vec::new(),
            rows: Vec::new(),
            columns: ColumnWidths::default(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    pub fn connection(&self) -> Option<&ConnectionConfig> {
        self.active.as_ref().map(|a| &a.config)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn total_records_cached(&self) -> bool {
        self.total_records_cached
    }

    pub fn hide_key_prefix(&self) -> bool {
        self.hide_key_prefix
    }

    pub fn hide_values(&self) -> bool {
        self.hide_values
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> ColumnWidths {
        self.columns
    }

    /// Stored key behind the displayed row at `index`, exactly as fetched.
    pub fn stored_key(&self, index: usize) -> Option<&[u8]> {
        self.keys.get(index).map(Vec::as_slice)
    }

    /// Check that `config` can be opened, without touching the session.
    pub fn probe(&self, config: &ConnectionConfig) -> Result<()> {
        // The active environment is already open and cannot be opened twice.
        if let Some(active) = &self.active {
            if active.config.expanded_path() == config.expanded_path() {
                return Ok(());
            }
        }
        let store = self
            .connector
            .open(config)
            .context("Error opening LMDB database")?;
        store.close().context("Error closing LMDB environment")?;
        Ok(())
    }

    pub fn dispatch(&mut self, action: Action) -> Vec<Effect> {
        log::debug!("dispatch {:?}", action);
        let generation = self.generation;
        match self.apply(action) {
            Ok(effects) => effects,
            Err(err) => {
                log::error!("{:#}", err);
                let mut effects = Vec::new();
                // A failed connect or reopen can drop the connection.
                if self.generation != generation {
                    effects.push(Effect::ConnectionChanged);
                    effects.push(Effect::ClearSelection);
                }
                effects.push(Effect::Notice(Notice::error(format!("{:#}", err))));
                effects
            }
        }
    }

    fn apply(&mut self, action: Action) -> Result<Vec<Effect>> {
        match action {
            Action::Connect(config) => self.connect(config),
            Action::Disconnect => {
                let was_connected = self.is_connected();
                self.disconnect();
                if was_connected {
                    Ok(vec![
                        Effect::ConnectionChanged,
                        Effect::Notice(Notice::info("Database disconnected")),
                    ])
                } else {
                    Ok(Vec::new())
                }
            }
            Action::SetPrefix(prefix) => self.set_prefix(prefix),
            Action::ClearPrefix => self.set_prefix(String::new()),
            Action::SetPageSize(size) => {
                if size == 0 {
                    bail!("Page size must be positive");
                }
                let (previous, was_cached) = (self.page_size, self.total_records_cached);
                self.page_size = size;
                self.total_records_cached = false;
                if self.is_connected() {
                    if let Err(err) = self.load(true, true) {
                        self.page_size = previous;
                        self.total_records_cached = was_cached && self.is_connected();
                        return Err(err);
                    }
                }
                Ok(vec![Effect::PageSizeChanged(size), Effect::ClearSelection])
            }
            Action::GoToPage(target) => {
                let page = match target {
                    PageTarget::First => 1,
                    PageTarget::Previous => self.current_page.saturating_sub(1),
                    PageTarget::Next => self.current_page + 1,
                    PageTarget::Last => self.total_pages,
                };
                self.turn_page(page)
            }
            Action::GoToPageInput(text) => {
                let page = match text.trim().parse::<usize>() {
                    Ok(page) if (1..=self.total_pages).contains(&page) => page,
                    _ => bail!("Invalid page number"),
                };
                self.turn_page(page)
            }
            Action::ToggleHideKeyPrefix => {
                self.hide_key_prefix = !self.hide_key_prefix;
                if self.is_connected() {
                    self.load(false, false)?;
                }
                Ok(vec![Effect::ClearSelection])
            }
            Action::ToggleHideValues => {
                self.hide_values = !self.hide_values;
                if self.is_connected() {
                    self.load(false, false)?;
                }
                Ok(Vec::new())
            }
            Action::OpenRow(index) => self.open_row(index),
            Action::SaveRow { key, value } => self.save_row(key, value),
            Action::DeleteRow { key } => self.delete_row(key),
            Action::Refresh => {
                self.require_connection()?;
                self.load(true, true)?;
                Ok(vec![
                    Effect::ClearSelection,
                    Effect::Notice(Notice::info("Keys refreshed!")),
                ])
            }
            Action::ToggleAutoRefresh => {
                self.auto_refresh = !self.auto_refresh;
                let state = if self.auto_refresh { "enabled" } else { "disabled" };
                Ok(vec![
                    Effect::AutoRefreshChanged(self.auto_refresh),
                    Effect::Notice(Notice::info(format!("Auto refresh {}", state))),
                ])
            }
            Action::AutoRefreshTick { generation } => {
                if !self.auto_refresh || !self.is_connected() || generation != self.generation {
                    log::debug!("ignoring stale auto refresh tick {}", generation);
                    return Ok(Vec::new());
                }
                self.load(true, true)?;
                Ok(vec![
                    Effect::ClearSelection,
                    Effect::Notice(Notice::info("Auto Refresh success!")),
                ])
            }
            Action::Resize(width) => {
                if width != self.view_width {
                    self.view_width = width;
                    self.refit();
                }
                Ok(Vec::new())
            }
        }
    }

    fn connect(&mut self, config: ConnectionConfig) -> Result<Vec<Effect>> {
        // The previous environment has to be closed before the next one opens.
        self.disconnect();

        let store = self
            .connector
            .open(&config)
            .context("Error opening LMDB database")?;
        log::info!("connected to {} ({})", config.name, config.database_path);

        self.active = Some(ActiveConnection { config, store });
        self.generation += 1;
        self.prefix.clear();
        self.total_records_cached = false;

        let mut effects = vec![
            Effect::ConnectionChanged,
            Effect::ClearSelection,
            Effect::Notice(Notice::info("Database connected")),
        ];
        if let Err(err) = self.load(true, false) {
            log::error!("{:#}", err);
            effects.push(Effect::Notice(Notice::error(format!("{:#}", err))));
        }
        Ok(effects)
    }

    fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            let name = active.config.name.clone();
            if let Err(err) = active.store.close() {
                log::warn!("Error closing LMDB environment for {}: {}", name, err);
            }
            log::info!("disconnected from {}", name);
            self.generation += 1;
        }
        self.keys.clear();
        self.page.clear();
        self.rows.clear();
        self.columns = ColumnWidths::default();
        self.current_page = 1;
        self.total_pages = 1;
        self.total_records = 0;
        self.total_records_cached = false;
    }

    /// Close and reopen the active store handle.
    ///
    /// If the reopen fails the session is left disconnected.
    fn reconnect(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            bail!("No database connected");
        };
        let config = active.config;
        if let Err(err) = active.store.close() {
            log::warn!("Error closing LMDB environment for {}: {}", config.name, err);
        }
        match self.connector.open(&config) {
            Ok(store) => {
                self.active = Some(ActiveConnection { config, store });
                Ok(())
            }
            Err(err) => {
                log::info!("disconnected from {}", config.name);
                self.generation += 1;
                self.disconnect();
                Err(err).context("Error opening LMDB database")
            }
        }
    }

    fn require_connection(&self) -> Result<&dyn KvStore> {
        self.active
            .as_ref()
            .map(|a| a.store.as_ref())
            .ok_or_else(|| anyhow!("No database connected"))
    }

    /// Recount if needed, fetch the current page and fit it to the table.
    ///
    /// Nothing visible changes unless the whole read succeeds.
    fn load(&mut self, force_recount: bool, reconnect: bool) -> Result<()> {
        if reconnect {
            self.reconnect()?;
        }

        let mut page_index = if force_recount { 1 } else { self.current_page };
        let recount = force_recount || !self.total_records_cached;
        let page_size = self.page_size;
        let prefix = self.prefix.as_bytes();

        let mut total = self.total_records;
        let mut entries: Vec<Entry> = Vec::new();
        self.require_connection()?
            .read(&mut |view| {
                if recount {
                    total = scanner::count_matching(view, prefix)?;
                    page_index = page_index.clamp(1, scanner::total_pages(total, page_size));
                }
                entries = scanner::fetch_page(view, prefix, page_index, page_size)?;
                Ok(())
            })
            .context("Error loading keys")?;

        if recount {
            log::info!(
                "counted {} records for prefix {:?}",
                total,
                self.prefix
            );
        }

        self.total_records = total;
        self.total_records_cached = true;
        self.total_pages = scanner::total_pages(total, page_size);
        self.current_page = page_index;
        self.page = prepare_rows(
            &entries,
            &self.prefix,
            self.hide_key_prefix,
            self.hide_values,
        );
        self.keys = entries.into_iter().map(|entry| entry.key).collect();
        self.refit();
        Ok(())
    }

    fn refit(&mut self) {
        let mut rows = self.page.clone();
        self.columns = self
            .formatter
            .fit(&mut rows, f32::from(self.view_width), self.hide_values);
        self.rows = rows;
    }

    fn set_prefix(&mut self, prefix: String) -> Result<Vec<Effect>> {
        self.require_connection()?;
        let previous = std::mem::replace(&mut self.prefix, prefix);
        if let Err(err) = self.load(true, true) {
            self.prefix = previous;
            return Err(err);
        }
        Ok(vec![Effect::ClearSelection])
    }

    fn turn_page(&mut self, page: usize) -> Result<Vec<Effect>> {
        self.require_connection()?;
        if page < 1 || page > self.total_pages || page == self.current_page {
            return Ok(Vec::new());
        }
        let previous = self.current_page;
        self.current_page = page;
        if let Err(err) = self.load(false, false) {
            self.current_page = previous;
            return Err(err);
        }
        Ok(vec![Effect::ClearSelection])
    }

    fn open_row(&mut self, index: usize) -> Result<Vec<Effect>> {
        let key = self
            .stored_key(index)
            .ok_or_else(|| anyhow!("No row at index {}", index))?
            .to_vec();
        let raw = self
            .require_connection()?
            .get(&key)
            .context("Error fetching value")?
            .ok_or_else(|| {
                anyhow!(
                    "Error fetching value: key {} not found",
                    String::from_utf8_lossy(&key)
                )
            })?;
        Ok(vec![Effect::ValueLoaded {
            key,
            text: format_for_editing(&raw),
        }])
    }

    fn save_row(&mut self, key: Vec<u8>, value: String) -> Result<Vec<Effect>> {
        if key.is_empty() {
            bail!("Key cannot be empty");
        }
        self.require_connection()?
            .put(&key, value.as_bytes())
            .context("Error insert/update key-value")?;
        log::info!("wrote key {}", String::from_utf8_lossy(&key));
        self.after_write(Notice::info("Key-Value inserted/updated"))
    }

    fn delete_row(&mut self, key: Vec<u8>) -> Result<Vec<Effect>> {
        let shown = String::from_utf8_lossy(&key).into_owned();
        let deleted = self
            .require_connection()?
            .delete(&key)
            .context("Error deleting key-value")?;
        if !deleted {
            bail!("Error deleting key-value: key {} not found", shown);
        }
        log::info!("deleted key {}", shown);
        self.after_write(Notice::info("Key-Value deleted"))
    }

    /// Reload the current page after a write. The cached count is kept.
    fn after_write(&mut self, notice: Notice) -> Result<Vec<Effect>> {
        let mut effects = vec![Effect::ClearSelection, Effect::Notice(notice)];
        if let Err(err) = self.load(false, false) {
            log::error!("{:#}", err);
            effects.push(Effect::Notice(Notice::error(format!("{:#}", err))));
        }
        Ok(effects)
    }
}
