use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::io::auth::{Identity, IdentityProvider};
use crate::io::catalog::{CatalogStore, Partition, PartitionKey, Selection};
use crate::io::config_io::load_config;
use crate::io::leaderboard::Leaderboard;
use crate::io::ledger::{PersistenceMode, TrackingLedger, TrackingMap};
use crate::io::session::{Session, open_session};
use crate::io::state::{UiState, read_ui_state, update_ui_state};
use crate::logging;
use crate::model::{FilterState, ProblemRecord, SortState, UiConfig};
use crate::ops::identity::identity_key;
use crate::ops::query::{Limit, QueryResult, query};
use crate::ops::stats::{DashboardMetrics, ProgressStage};
use crate::util::collate::same_name;

use super::input;
use super::render;
use super::scheduler::RecomputeScheduler;
use super::theme::Theme;
use super::virtual_list::VirtualList;

/// Longest the event loop blocks before checking background results
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Current interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Navigate,
    Search,
    Picker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKind {
    Company,
    Timeframe,
    Topic,
}

/// A filterable single-column chooser
#[derive(Debug, Clone)]
pub struct Picker {
    pub kind: PickerKind,
    pub items: Vec<String>,
    pub filter: String,
    /// Index into `visible()`
    pub cursor: usize,
}

impl Picker {
    pub fn new(kind: PickerKind, items: Vec<String>, current: Option<&str>) -> Self {
        let cursor = current
            .and_then(|c| items.iter().position(|i| same_name(i, c)))
            .unwrap_or(0);
        Picker {
            kind,
            items,
            filter: String::new(),
            cursor,
        }
    }

    pub fn visible(&self) -> Vec<&String> {
        let needle = self.filter.to_lowercase();
        self.items
            .iter()
            .filter(|item| needle.is_empty() || item.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn selected(&self) -> Option<&String> {
        self.visible().get(self.cursor).copied()
    }

    pub fn move_by(&mut self, delta: isize) {
        let len = self.visible().len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
    }

    pub fn set_filter(&mut self, filter: String) {
        self.filter = filter;
        self.cursor = 0;
    }
}

/// Results delivered from background tasks to the UI thread
#[derive(Debug)]
pub enum AppEvent {
    PartitionLoaded {
        key: PartitionKey,
        selection: Selection,
    },
    Status(String),
}

/// Main application state. The UI thread owns it and is the only writer of
/// the selection and of the ledger.
pub struct App {
    pub theme: Theme,
    pub ui: UiConfig,
    pub catalog: Arc<CatalogStore>,
    pub ledger: Arc<TrackingLedger>,
    pub identity: Arc<dyn IdentityProvider>,
    pub leaderboard: Leaderboard,
    runtime: Option<Handle>,
    state_dir: Option<PathBuf>,
    default_company: Option<String>,
    default_timeframe: Option<String>,

    pub companies: Vec<String>,
    pub company: Option<String>,
    pub timeframe: Option<String>,
    pub show_all: bool,
    pub partition: Option<Arc<Partition>>,
    pub loading: bool,
    pub load_error: Option<String>,

    pub filters: FilterState,
    pub sort: SortState,
    pub limit: Limit,
    pub result: QueryResult,
    pub metrics: DashboardMetrics,
    pub stage: ProgressStage,
    signature: Option<u64>,

    pub tracked: Arc<TrackingMap>,
    tracked_rx: watch::Receiver<Arc<TrackingMap>>,
    pub user: Option<Identity>,
    identity_rx: watch::Receiver<Option<Identity>>,

    pub list: VirtualList,
    /// Index into `result.results`
    pub cursor: usize,
    pub mode: Mode,
    pub picker: Option<Picker>,
    pub scheduler: RecomputeScheduler,
    pub show_help: bool,
    pub show_leaderboard: bool,
    /// Scrolled far enough that "back to top" is offered
    pub back_to_top: bool,
    pub status: Option<String>,
    pub should_quit: bool,

    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl App {
    pub fn new(session: &Session, runtime: Option<Handle>) -> Self {
        let ui = session.config.ui.clone();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let tracked_rx = session.ledger.subscribe();
        let tracked = tracked_rx.borrow().clone();
        let identity_rx = session.identity.subscribe();
        let user = identity_rx.borrow().clone();

        App {
            theme: Theme::from_config(&ui),
            catalog: Arc::clone(&session.catalog),
            ledger: Arc::clone(&session.ledger),
            identity: Arc::clone(&session.identity),
            leaderboard: Leaderboard::new(session.remote.clone()),
            runtime,
            state_dir: Some(session.state_dir.clone()),
            default_company: session.config.data.default_company.clone(),
            default_timeframe: session.config.data.default_timeframe.clone(),
            companies: session.catalog.companies(),
            company: None,
            timeframe: None,
            show_all: false,
            partition: None,
            loading: false,
            load_error: None,
            filters: FilterState::default(),
            sort: SortState::default(),
            limit: Limit::from(ui.page_size),
            result: QueryResult::default(),
            metrics: DashboardMetrics::default(),
            stage: ProgressStage::from_total(tracked.len()),
            signature: None,
            tracked,
            tracked_rx,
            user,
            identity_rx,
            list: VirtualList::new(ui.estimated_row_height, ui.overscan),
            cursor: 0,
            mode: Mode::Navigate,
            picker: None,
            scheduler: RecomputeScheduler::new(Duration::from_millis(ui.debounce_ms)),
            show_help: false,
            show_leaderboard: false,
            back_to_top: false,
            status: None,
            should_quit: false,
            events_tx,
            events_rx,
            ui,
        }
    }

    /// Skip writing .state.json (tests).
    pub fn without_state_dir(mut self) -> Self {
        self.state_dir = None;
        self
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Apply saved state, resolve the initial selection and start loading it.
    pub fn restore(&mut self, state: Option<UiState>) {
        let state = state.unwrap_or_default();
        self.filters = state.filters;
        self.sort = state.sort;
        self.show_all = state.show_all_companies;
        let (company, timeframe) = match state.company {
            Some(company) => (Some(company), state.timeframe),
            None => (self.default_company.clone(), self.default_timeframe.clone()),
        };
        if let Some((company, timeframe)) = self
            .catalog
            .default_selection(company.as_deref(), timeframe.as_deref())
        {
            self.company = Some(company);
            self.timeframe = Some(timeframe);
        }
        self.select_current();
    }

    pub fn current_key(&self) -> Option<PartitionKey> {
        if self.show_all {
            return Some(PartitionKey::All);
        }
        Some(PartitionKey::company(
            self.company.as_deref()?,
            self.timeframe.as_deref()?,
        ))
    }

    /// Make the current company/timeframe (or the aggregate) active. A cached
    /// partition commits immediately; anything else loads in the background
    /// and is discarded if another selection becomes active first.
    pub fn select_current(&mut self) {
        let Some(key) = self.current_key() else {
            self.load_error = Some("no problem data found".into());
            return;
        };
        self.catalog.set_active(key.clone());
        if let Some(partition) = self.catalog.cached(&key) {
            self.apply_partition(partition);
            return;
        }
        let Some(runtime) = &self.runtime else {
            warn!(partition = %key, "no async runtime; cannot load partition");
            self.load_error = Some("partition loading unavailable".into());
            return;
        };
        self.loading = true;
        self.load_error = None;
        let catalog = Arc::clone(&self.catalog);
        let tx = self.events_tx.clone();
        runtime.spawn(async move {
            let selection = catalog.load_selected(&key).await;
            let _ = tx.send(AppEvent::PartitionLoaded { key, selection });
        });
    }

    pub fn apply_partition(&mut self, partition: Arc<Partition>) {
        self.loading = false;
        self.load_error = None;
        self.filters.retain_topics(&partition.topics);
        self.partition = Some(partition);
        self.limit = Limit::from(self.ui.page_size);
        self.recompute();
    }

    pub fn choose_company(&mut self, company: String) {
        let timeframes = self.catalog.timeframes_for(&company);
        let timeframe = self
            .timeframe
            .as_ref()
            .and_then(|current| timeframes.iter().find(|t| same_name(t, current)))
            .or_else(|| timeframes.first())
            .cloned();
        self.company = Some(company);
        self.timeframe = timeframe;
        self.show_all = false;
        self.select_current();
    }

    pub fn choose_timeframe(&mut self, timeframe: String) {
        self.timeframe = Some(timeframe);
        self.show_all = false;
        self.select_current();
    }

    pub fn toggle_all_companies(&mut self) {
        self.show_all = !self.show_all;
        self.select_current();
    }

    // -----------------------------------------------------------------------
    // Query
    // -----------------------------------------------------------------------

    fn query_signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.partition.as_ref().map(|p| &p.key).hash(&mut hasher);
        self.filters.hash(&mut hasher);
        self.sort.hash(&mut hasher);
        hasher.finish()
    }

    /// Re-run the query now. A changed signature (partition, filters, sort)
    /// returns the cursor and the scroll position to the top.
    pub fn recompute(&mut self) {
        self.scheduler.cancel();
        let records: &[Arc<ProblemRecord>] = match &self.partition {
            Some(partition) => &partition.records[..],
            None => &[],
        };
        self.result = query(records, &self.filters, &self.sort, self.limit);

        let signature = self.query_signature();
        if self.signature != Some(signature) {
            self.cursor = 0;
            self.signature = Some(signature);
        }
        let keys = self.result.results.iter().map(|r| identity_key(r)).collect();
        self.list.set_items(keys, signature);
        self.cursor = self.cursor.min(self.result.results.len().saturating_sub(1));
        self.refresh_metrics();
    }

    /// Filters or sort changed: reset the page and recompute, either now or
    /// after the debounce delay.
    pub fn query_changed(&mut self, debounce: bool) {
        self.limit = Limit::from(self.ui.page_size);
        if debounce {
            self.scheduler.request(Instant::now());
        } else {
            self.recompute();
        }
    }

    fn refresh_metrics(&mut self) {
        self.metrics = DashboardMetrics::compute(&self.result.results, &self.tracked);
        self.stage = ProgressStage::from_total(self.tracked.len());
    }

    pub fn load_more(&mut self) {
        if !self.result.truncated {
            return;
        }
        self.limit = self.limit.grow(self.ui.page_increment);
        self.recompute();
        debug!(rows = self.result.results.len(), total = self.result.total_matches, "loaded more rows");
    }

    pub fn show_everything(&mut self) {
        if self.limit == Limit::Unbounded {
            return;
        }
        self.limit = Limit::Unbounded;
        self.recompute();
    }

    // -----------------------------------------------------------------------
    // Cursor
    // -----------------------------------------------------------------------

    /// Move the cursor; running past the end of a truncated list loads more.
    pub fn move_cursor(&mut self, delta: isize) {
        if self.result.results.is_empty() {
            return;
        }
        let target = self.cursor.saturating_add_signed(delta);
        if target >= self.result.results.len() && self.result.truncated {
            self.load_more();
        }
        self.cursor = target.min(self.result.results.len() - 1);
        self.list.ensure_visible(self.cursor);
    }

    pub fn jump_top(&mut self) {
        self.cursor = 0;
        self.list.scroll_to_top();
    }

    pub fn jump_bottom(&mut self) {
        if self.result.results.is_empty() {
            return;
        }
        self.cursor = self.result.results.len() - 1;
        self.list.ensure_visible(self.cursor);
    }

    pub fn page(&mut self, direction: isize) {
        let rows = (self.list.viewport() / self.ui.estimated_row_height.max(1)).max(1);
        self.move_cursor(direction * rows as isize);
    }

    pub fn selected_record(&self) -> Option<&Arc<ProblemRecord>> {
        self.result.results.get(self.cursor)
    }

    // -----------------------------------------------------------------------
    // Tracking and identity
    // -----------------------------------------------------------------------

    pub fn toggle_selected(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        let key = identity_key(record);
        let title = record.title.clone();
        let done = self.ledger.toggle(&key);
        self.sync_tracked();
        self.status = Some(if done {
            format!("Tracked \u{201c}{title}\u{201d}")
        } else {
            format!("Untracked \u{201c}{title}\u{201d}")
        });
    }

    fn sync_tracked(&mut self) {
        self.tracked = self.tracked_rx.borrow_and_update().clone();
        self.refresh_metrics();
    }

    pub fn is_tracked(&self, record: &ProblemRecord) -> bool {
        self.tracked.get(&identity_key(record)).copied().unwrap_or(false)
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        self.ledger.mode()
    }

    pub fn sign_in(&mut self) {
        self.spawn_identity_change(true);
    }

    pub fn sign_out(&mut self) {
        self.spawn_identity_change(false);
    }

    fn spawn_identity_change(&mut self, sign_in: bool) {
        let Some(runtime) = &self.runtime else {
            self.status = Some("sign-in unavailable".into());
            return;
        };
        let identity = Arc::clone(&self.identity);
        let tx = self.events_tx.clone();
        runtime.spawn(async move {
            let message = if sign_in {
                match identity.sign_in().await {
                    Ok(user) => format!("Signed in as {}", user.normalized_name()),
                    Err(e) => format!("Sign-in failed: {e}"),
                }
            } else {
                match identity.sign_out().await {
                    Ok(()) => "Signed out".to_string(),
                    Err(e) => format!("Sign-out failed: {e}"),
                }
            };
            let _ = tx.send(AppEvent::Status(message));
        });
    }

    pub fn toggle_leaderboard(&mut self) {
        if self.show_leaderboard {
            self.leaderboard.dispose();
            self.show_leaderboard = false;
        } else {
            self.leaderboard.init();
            self.show_leaderboard = true;
        }
    }

    // -----------------------------------------------------------------------
    // Pickers
    // -----------------------------------------------------------------------

    pub fn open_picker(&mut self, kind: PickerKind) {
        let (items, current) = match kind {
            PickerKind::Company => (self.companies.clone(), self.company.clone()),
            PickerKind::Timeframe => match &self.company {
                Some(company) => (self.catalog.timeframes_for(company), self.timeframe.clone()),
                None => (Vec::new(), None),
            },
            PickerKind::Topic => (
                self.partition
                    .as_ref()
                    .map(|p| p.topics.clone())
                    .unwrap_or_default(),
                None,
            ),
        };
        if items.is_empty() {
            self.status = Some("Nothing to choose from".into());
            return;
        }
        self.picker = Some(Picker::new(kind, items, current.as_deref()));
        self.mode = Mode::Picker;
    }

    pub fn close_picker(&mut self) {
        self.picker = None;
        self.mode = Mode::Navigate;
    }

    // -----------------------------------------------------------------------
    // Background results
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::PartitionLoaded { key, selection } => {
                if !self.catalog.is_active(&key) {
                    debug!(partition = %key, "ignoring load for inactive partition");
                    return;
                }
                match selection {
                    Selection::Committed(partition) => self.apply_partition(partition),
                    Selection::Failed(e) => {
                        self.loading = false;
                        self.partition = None;
                        self.load_error = Some(e.to_string());
                        self.recompute();
                    }
                    Selection::Superseded => {}
                }
            }
            AppEvent::Status(message) => self.status = Some(message),
        }
    }

    /// Drain background results and run a due recompute. Called once per
    /// loop iteration, before drawing.
    pub fn tick(&mut self, now: Instant) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
        if self.tracked_rx.has_changed().unwrap_or(false) {
            self.sync_tracked();
        }
        if self.identity_rx.has_changed().unwrap_or(false) {
            self.user = self.identity_rx.borrow_and_update().clone();
        }
        if self.show_leaderboard {
            self.leaderboard.poll();
        }
        if self.scheduler.due(now) {
            self.recompute();
        }
    }

    /// Called by the renderer with the coalesced scroll offset of the frame.
    pub fn on_scroll(&mut self, offset: usize) {
        self.back_to_top = offset > self.ui.scroll_top_threshold;
    }

    pub fn save_ui_state(&self) {
        let Some(dir) = &self.state_dir else {
            return;
        };
        let result = update_ui_state(dir, |state| {
            state.company = self.company.clone();
            state.timeframe = self.timeframe.clone();
            state.show_all_companies = self.show_all;
            state.filters = self.filters.clone();
            state.sort = self.sort;
        });
        if let Err(e) = result {
            warn!(error = %e, "could not save UI state");
        }
    }
}

/// Run the dashboard until the user quits.
pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_config(config_path)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let _log_guard = logging::init_file(&loaded.state_dir());

    let (session, result) = {
        let _entered = runtime.enter();
        let session = open_session(loaded)?;
        info!(companies = session.catalog.companies().len(), "starting dashboard");
        let _sync = Arc::clone(&session.sync).spawn(session.identity.subscribe());

        let mut app = App::new(&session, Some(runtime.handle().clone()));
        app.restore(read_ui_state(&session.state_dir));
        let result = run_terminal(&mut app);
        app.save_ui_state();
        app.leaderboard.dispose();
        (session, result)
    };

    runtime.block_on(session.ledger.flush());
    result
}

fn run_terminal(app: &mut App) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Restore the terminal if anything panics
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_event_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        app.tick(Instant::now());
        terminal.draw(|frame| render::render(frame, app))?;

        let timeout = app.scheduler.poll_timeout(Instant::now(), IDLE_POLL);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            input::handle_key(app, key);
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
