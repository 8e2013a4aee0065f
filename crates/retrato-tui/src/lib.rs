// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use retrato_app::{
    AppCommand, AppEvent, AppState, BoxId, Hit, ImageFetch, ImageInfo, ItemContext, RequestId,
    SearchPhase, ViewTab,
};
use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);
const CURSOR_MARK: &str = "> ";

/// Key of the item view's single search box. Catalog boxes use their
/// entry's QID instead.
pub const ITEM_BOX_KEY: &str = "item";

pub fn item_box() -> BoxId {
    BoxId::new(ITEM_BOX_KEY)
}

/// Seam between the views and the lookup service. The synchronous methods
/// are the contract; the `spawn_*` hooks exist so a runtime can move the
/// HTTP round-trip off the render thread, delivering the outcome as an
/// [`InternalEvent`]. The defaults run inline, which is what tests want.
pub trait LookupRuntime {
    fn search(&mut self, terms: &str) -> Result<Vec<Hit>>;
    fn item_images(&mut self, lookup_url: &str) -> Result<Vec<ImageInfo>>;

    fn spawn_search(
        &mut self,
        box_id: BoxId,
        request: RequestId,
        terms: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let outcome = self.search(terms).map_err(|error| error.to_string());
        tx.send(InternalEvent::Lookup {
            box_id,
            request,
            outcome,
        })
        .map_err(|_| anyhow::anyhow!("lookup event channel closed"))?;
        Ok(())
    }

    fn spawn_item_images(
        &mut self,
        index: usize,
        lookup_url: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let outcome = self
            .item_images(lookup_url)
            .map_err(|error| error.to_string());
        tx.send(InternalEvent::PropImages { index, outcome })
            .map_err(|_| anyhow::anyhow!("image event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Lookup {
        box_id: BoxId,
        request: RequestId,
        outcome: Result<Vec<Hit>, String>,
    },
    PropImages {
        index: usize,
        outcome: Result<Vec<ImageInfo>, String>,
    },
}

/// Per-session view state: the page-injected data, the per-box quiet-window
/// deadlines, and the cursors. Deadlines are the debounce mechanism -- each
/// edit replaces the box's deadline, so at most one settle is pending per
/// box at any time.
#[derive(Debug)]
pub struct ViewData {
    pub context: ItemContext,
    quiet_window: Duration,
    deadlines: HashMap<BoxId, Instant>,
    hit_cursor: usize,
    depicts_cursor: usize,
    catalog_cursor: usize,
    prop_cursor: usize,
    status_token: u64,
}

impl ViewData {
    pub fn new(context: ItemContext, quiet_window: Duration) -> Self {
        Self {
            context,
            quiet_window,
            deadlines: HashMap::new(),
            hit_cursor: 0,
            depicts_cursor: 0,
            catalog_cursor: 0,
            prop_cursor: 0,
            status_token: 0,
        }
    }

    pub fn pending_deadline(&self, box_id: &BoxId) -> Option<Instant> {
        self.deadlines.get(box_id).copied()
    }
}

pub fn run_app<R: LookupRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    context: ItemContext,
    quiet_window: Duration,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(context, quiet_window);
    let (internal_tx, internal_rx) = mpsc::channel();

    init_prop_image_fetches(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);
        fire_due_deadlines(state, runtime, &mut view_data, &internal_tx, Instant::now());

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(POLL_INTERVAL).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

/// One image fetch per property card, fired unconditionally at startup.
/// Cards resolve independently; arrival order does not matter because each
/// event carries its card index.
pub fn init_prop_image_fetches<R: LookupRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let lookups: Vec<(usize, String)> = view_data
        .context
        .other_props
        .iter()
        .enumerate()
        .map(|(index, prop)| (index, prop.image_lookup.clone()))
        .collect();

    for (index, lookup_url) in lookups {
        if let Err(error) = runtime.spawn_item_images(index, &lookup_url, internal_tx.clone()) {
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("image fetch failed to start: {error}"),
            );
        }
    }
}

pub fn process_internal_events<R: LookupRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Lookup {
                box_id,
                request,
                outcome,
            } => {
                let events = state.dispatch(AppCommand::ApplyLookup {
                    box_id,
                    request,
                    outcome,
                });
                react_to_events(state, runtime, view_data, tx, events);
            }
            InternalEvent::PropImages { index, outcome } => {
                apply_prop_images(state, view_data, tx, index, outcome);
            }
        }
    }
}

fn apply_prop_images(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    index: usize,
    outcome: Result<Vec<ImageInfo>, String>,
) {
    let Some(prop) = view_data.context.other_props.get_mut(index) else {
        return;
    };
    match outcome {
        Ok(items) => {
            prop.images = ImageFetch::Loaded(items);
        }
        Err(message) => {
            let pid = prop.pid.clone();
            prop.images = ImageFetch::Failed(message.clone());
            emit_status(
                state,
                view_data,
                tx,
                format!("images failed for {pid}: {message}"),
            );
        }
    }
}

/// Settle every box whose quiet window has elapsed. `now` is injected so
/// debounce behavior is testable without sleeping.
pub fn fire_due_deadlines<R: LookupRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    now: Instant,
) {
    let due: Vec<BoxId> = view_data
        .deadlines
        .iter()
        .filter(|(_, deadline)| **deadline <= now)
        .map(|(box_id, _)| box_id.clone())
        .collect();

    for box_id in due {
        view_data.deadlines.remove(&box_id);
        let events = state.dispatch(AppCommand::Settle { box_id });
        react_to_events(state, runtime, view_data, tx, events);
    }
}

fn react_to_events<R: LookupRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    events: Vec<AppEvent>,
) {
    for event in events {
        match event {
            AppEvent::LookupDispatched {
                box_id,
                request,
                terms,
            } => {
                if let Err(error) = runtime.spawn_search(box_id, request, &terms, tx.clone()) {
                    emit_status(
                        state,
                        view_data,
                        tx,
                        format!("lookup failed to start: {error}"),
                    );
                }
            }
            AppEvent::LookupFailed { message, .. } => {
                view_data.hit_cursor = 0;
                emit_status(state, view_data, tx, format!("lookup failed: {message}"));
            }
            AppEvent::HitsReplaced { .. } | AppEvent::HitsCleared { .. } => {
                view_data.hit_cursor = 0;
            }
            AppEvent::DepictsAdded { hit } => {
                view_data.hit_cursor = 0;
                emit_status(state, view_data, tx, format!("added {}", hit.label));
            }
            AppEvent::DepictsRemoved { hit } => {
                let len = state.new_depicts.len();
                view_data.depicts_cursor = view_data.depicts_cursor.min(len.saturating_sub(1));
                emit_status(state, view_data, tx, format!("removed {}", hit.label));
            }
            AppEvent::StaleLookupDiscarded { .. }
            | AppEvent::DuplicateTermsSkipped { .. }
            | AppEvent::TermsEdited { .. }
            | AppEvent::TabChanged(_)
            | AppEvent::StatusUpdated(_)
            | AppEvent::StatusCleared => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Apply a new field value to a box and restart its quiet-window deadline.
/// Any not-yet-fired settle for the box is superseded by the new deadline.
pub fn apply_edit(
    state: &mut AppState,
    view_data: &mut ViewData,
    box_id: &BoxId,
    terms: String,
    now: Instant,
) {
    state.dispatch(AppCommand::EditTerms {
        box_id: box_id.clone(),
        terms,
    });
    view_data
        .deadlines
        .insert(box_id.clone(), now + view_data.quiet_window);
}

fn active_box_id(state: &AppState, view_data: &ViewData) -> Option<BoxId> {
    match state.active_tab {
        ViewTab::Item => Some(item_box()),
        ViewTab::Catalog => view_data
            .context
            .catalog
            .get(view_data.catalog_cursor)
            .map(|entry| BoxId::new(entry.qid.clone())),
        ViewTab::Properties => None,
    }
}

fn edit_active_box(
    state: &mut AppState,
    view_data: &mut ViewData,
    mutate: impl FnOnce(&mut String),
) {
    let Some(box_id) = active_box_id(state, view_data) else {
        return;
    };
    let mut terms = state
        .search_box(&box_id)
        .map(|search| search.terms().to_owned())
        .unwrap_or_default();
    mutate(&mut terms);
    apply_edit(state, view_data, &box_id, terms, Instant::now());
}

pub fn handle_key_event<R: LookupRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Tab, KeyModifiers::NONE) => {
            state.dispatch(AppCommand::NextTab);
            return false;
        }
        (KeyCode::BackTab, _) => {
            state.dispatch(AppCommand::PrevTab);
            return false;
        }
        _ => {}
    }

    match state.active_tab {
        ViewTab::Item => handle_item_key(state, runtime, view_data, internal_tx, key),
        ViewTab::Catalog => handle_catalog_key(state, view_data, key),
        ViewTab::Properties => handle_properties_key(view_data, key),
    }
    false
}

fn handle_item_key<R: LookupRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let box_id = item_box();
    match (key.code, key.modifiers) {
        (KeyCode::Up, KeyModifiers::NONE) => {
            view_data.hit_cursor = view_data.hit_cursor.saturating_sub(1);
        }
        (KeyCode::Down, KeyModifiers::NONE) => {
            let max = state
                .search_box(&box_id)
                .map(|search| search.hits().len().saturating_sub(1))
                .unwrap_or(0);
            view_data.hit_cursor = (view_data.hit_cursor + 1).min(max);
        }
        (KeyCode::Enter, _) => {
            let events = state.dispatch(AppCommand::PickHit {
                box_id,
                index: view_data.hit_cursor,
            });
            react_to_events(state, runtime, view_data, internal_tx, events);
        }
        (KeyCode::Char('k'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.depicts_cursor = view_data.depicts_cursor.saturating_sub(1);
        }
        (KeyCode::Char('j'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            let max = state.new_depicts.len().saturating_sub(1);
            view_data.depicts_cursor = (view_data.depicts_cursor + 1).min(max);
        }
        (KeyCode::Char('x'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            let events = state.dispatch(AppCommand::RemoveDepicts {
                index: view_data.depicts_cursor,
            });
            react_to_events(state, runtime, view_data, internal_tx, events);
        }
        (KeyCode::Backspace, _) => {
            edit_active_box(state, view_data, |terms| {
                terms.pop();
            });
        }
        (KeyCode::Char(ch), modifiers) => {
            if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT {
                edit_active_box(state, view_data, |terms| terms.push(ch));
            }
        }
        _ => {}
    }
}

fn handle_catalog_key(state: &mut AppState, view_data: &mut ViewData, key: KeyEvent) {
    match (key.code, key.modifiers) {
        (KeyCode::Up, KeyModifiers::NONE) => {
            view_data.catalog_cursor = view_data.catalog_cursor.saturating_sub(1);
        }
        (KeyCode::Down, KeyModifiers::NONE) => {
            let max = view_data.context.catalog.len().saturating_sub(1);
            view_data.catalog_cursor = (view_data.catalog_cursor + 1).min(max);
        }
        (KeyCode::Backspace, _) => {
            edit_active_box(state, view_data, |terms| {
                terms.pop();
            });
        }
        (KeyCode::Char(ch), modifiers) => {
            if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT {
                edit_active_box(state, view_data, |terms| terms.push(ch));
            }
        }
        _ => {}
    }
}

fn handle_properties_key(view_data: &mut ViewData, key: KeyEvent) {
    match (key.code, key.modifiers) {
        (KeyCode::Up, KeyModifiers::NONE) => {
            view_data.prop_cursor = view_data.prop_cursor.saturating_sub(1);
        }
        (KeyCode::Down, KeyModifiers::NONE) => {
            let max = view_data.context.other_props.len().saturating_sub(1);
            view_data.prop_cursor = (view_data.prop_cursor + 1).min(max);
        }
        _ => {}
    }
}

fn phase_line(search: &retrato_app::SearchBox) -> Option<String> {
    match search.phase() {
        SearchPhase::Idle => None,
        SearchPhase::Pending => Some("searching...".to_owned()),
        SearchPhase::Loaded if search.hits().is_empty() => Some("no results".to_owned()),
        SearchPhase::Loaded => None,
        SearchPhase::Failed(message) => Some(format!("lookup failed: {message}")),
    }
}

pub fn search_panel_text(state: &AppState, view_data: &ViewData) -> String {
    let box_id = item_box();
    let mut out = String::new();

    let (terms, hits, phase) = match state.search_box(&box_id) {
        Some(search) => (
            search.terms().to_owned(),
            search.hits().to_vec(),
            phase_line(search),
        ),
        None => (String::new(), Vec::new(), None),
    };

    out.push_str(&format!("search: {terms}_\n"));
    if let Some(line) = phase {
        out.push_str(&line);
        out.push('\n');
    }
    for (index, hit) in hits.iter().enumerate() {
        let marker = if index == view_data.hit_cursor {
            CURSOR_MARK
        } else {
            "  "
        };
        out.push_str(&format!("{marker}{}\n", hit_line(hit)));
    }
    out
}

fn hit_line(hit: &Hit) -> String {
    let mut line = format!("{} ({})", hit.label, hit.qid);
    if let Some(description) = &hit.description {
        line.push_str(&format!(" -- {description}"));
    }
    if let Some(count) = hit.count {
        line.push_str(&format!(" [{count}]"));
    }
    line
}

pub fn item_side_text(state: &AppState, view_data: &ViewData) -> String {
    let mut out = String::new();

    out.push_str("existing depicts:\n");
    if view_data.context.existing_depicts.is_empty() {
        out.push_str("  (none)\n");
    }
    for hit in &view_data.context.existing_depicts {
        out.push_str(&format!("  {}\n", hit_line(hit)));
    }

    if !view_data.context.people.is_empty() {
        out.push_str("people:\n");
        for person in &view_data.context.people {
            out.push_str(&format!("  {} ({})\n", person.label, person.qid));
        }
    }

    out.push_str("new depicts:\n");
    if state.new_depicts.is_empty() {
        out.push_str("  (none)\n");
    }
    for (index, hit) in state.new_depicts.iter().enumerate() {
        let marker = if index == view_data.depicts_cursor {
            CURSOR_MARK
        } else {
            "  "
        };
        out.push_str(&format!("{marker}{}\n", hit_line(hit)));
    }
    out
}

pub fn catalog_text(state: &AppState, view_data: &ViewData) -> String {
    let mut out = String::new();
    if view_data.context.catalog.is_empty() {
        out.push_str("(catalog empty)\n");
        return out;
    }

    for (index, entry) in view_data.context.catalog.iter().enumerate() {
        let marker = if index == view_data.catalog_cursor {
            CURSOR_MARK
        } else {
            "  "
        };
        let box_id = BoxId::new(entry.qid.clone());
        let search = state.search_box(&box_id);
        let terms = search.map(|s| s.terms()).unwrap_or_default();
        let mut line = format!("{marker}{} ({})", entry.label, entry.qid);
        if let Some(artist) = &entry.artist_name {
            line.push_str(&format!(" by {artist}"));
        }
        if let Some(date) = &entry.date {
            line.push_str(&format!(", {date}"));
        }
        line.push_str(&format!("  search: {terms}_"));
        out.push_str(&line);
        out.push('\n');

        if index == view_data.catalog_cursor {
            if let Some(search) = search {
                if let Some(status) = phase_line(search) {
                    out.push_str(&format!("    {status}\n"));
                }
                for hit in search.hits() {
                    out.push_str(&format!("    {}\n", hit_line(hit)));
                }
            }
        }
    }
    out
}

pub fn properties_text(view_data: &ViewData) -> String {
    let mut out = String::new();
    if view_data.context.other_props.is_empty() {
        out.push_str("(no properties)\n");
        return out;
    }

    for (index, prop) in view_data.context.other_props.iter().enumerate() {
        let marker = if index == view_data.prop_cursor {
            CURSOR_MARK
        } else {
            "  "
        };
        let summary = match &prop.images {
            ImageFetch::Pending => "fetching images...".to_owned(),
            ImageFetch::Loaded(items) if items.is_empty() => "no images".to_owned(),
            ImageFetch::Loaded(items) => format!("{} images", items.len()),
            ImageFetch::Failed(message) => format!("images failed: {message}"),
        };
        out.push_str(&format!("{marker}{} {} -- {summary}\n", prop.pid, prop.label));

        if index == view_data.prop_cursor
            && let ImageFetch::Loaded(items) = &prop.images
        {
            for item in items {
                out.push_str(&format!("    {}\n", item.title));
            }
        }
    }
    out
}

pub fn status_text(state: &AppState) -> String {
    state.status_line.clone().unwrap_or_default()
}

fn render(frame: &mut Frame, state: &AppState, view_data: &ViewData) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_tabs_bar(frame, state, chunks[0]);
    match state.active_tab {
        ViewTab::Item => render_item_view(frame, state, view_data, chunks[1]),
        ViewTab::Catalog => render_text_panel(
            frame,
            chunks[1],
            "catalog",
            catalog_text(state, view_data),
        ),
        ViewTab::Properties => {
            render_text_panel(frame, chunks[1], "properties", properties_text(view_data));
        }
    }
    render_status_bar(frame, state, chunks[2]);
}

fn render_tabs_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let titles: Vec<&str> = ViewTab::ALL.iter().map(|tab| tab.title()).collect();
    let selected = ViewTab::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn render_item_view(frame: &mut Frame, state: &AppState, view_data: &ViewData, area: Rect) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let title = format!(
        "{} ({})",
        view_data.context.label, view_data.context.qid
    );
    render_text_panel(frame, halves[0], &title, search_panel_text(state, view_data));
    render_text_panel(frame, halves[1], "depicts", item_side_text(state, view_data));
}

fn render_text_panel(frame: &mut Frame, area: Rect, title: &str, text: String) {
    let panel = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title.to_owned()),
    );
    frame.render_widget(panel, area);
}

fn render_status_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let line = match &state.status_line {
        Some(message) => message.clone(),
        None => "tab: switch view  enter: add  ctrl-x: remove  ctrl-q: quit".to_owned(),
    };
    let bar = Paragraph::new(line).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(bar, area);
}

#[cfg(test)]
mod tests {
    use super::{
        InternalEvent, LookupRuntime, ViewData, apply_edit, catalog_text, fire_due_deadlines,
        handle_key_event, init_prop_image_fetches, item_box, item_side_text,
        process_internal_events, properties_text, search_panel_text, status_text,
    };
    use anyhow::{Result, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use retrato_app::{
        AppState, BoxId, CatalogEntry, Hit, ImageFetch, ImageInfo, ItemContext, PropCard,
        RequestId, ViewTab,
    };
    use std::collections::HashMap;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::{Duration, Instant};

    const QUIET: Duration = Duration::from_millis(500);

    #[derive(Debug, Default)]
    struct TestRuntime {
        search_calls: Vec<String>,
        canned_hits: HashMap<String, Vec<Hit>>,
        search_error: Option<String>,
        image_calls: Vec<String>,
        images_by_url: HashMap<String, Vec<ImageInfo>>,
        image_error: Option<String>,
        defer: bool,
        pending_searches: Vec<(BoxId, RequestId, String)>,
        pending_images: Vec<(usize, String)>,
    }

    impl LookupRuntime for TestRuntime {
        fn search(&mut self, terms: &str) -> Result<Vec<Hit>> {
            self.search_calls.push(terms.to_owned());
            if let Some(message) = &self.search_error {
                bail!("{message}");
            }
            Ok(self.canned_hits.get(terms).cloned().unwrap_or_default())
        }

        fn item_images(&mut self, lookup_url: &str) -> Result<Vec<ImageInfo>> {
            self.image_calls.push(lookup_url.to_owned());
            if let Some(message) = &self.image_error {
                bail!("{message}");
            }
            Ok(self
                .images_by_url
                .get(lookup_url)
                .cloned()
                .unwrap_or_default())
        }

        fn spawn_search(
            &mut self,
            box_id: BoxId,
            request: RequestId,
            terms: &str,
            tx: Sender<InternalEvent>,
        ) -> Result<()> {
            if self.defer {
                self.pending_searches
                    .push((box_id, request, terms.to_owned()));
                return Ok(());
            }
            let outcome = self.search(terms).map_err(|error| error.to_string());
            tx.send(InternalEvent::Lookup {
                box_id,
                request,
                outcome,
            })?;
            Ok(())
        }

        fn spawn_item_images(
            &mut self,
            index: usize,
            lookup_url: &str,
            tx: Sender<InternalEvent>,
        ) -> Result<()> {
            if self.defer {
                self.pending_images.push((index, lookup_url.to_owned()));
                return Ok(());
            }
            let outcome = self
                .item_images(lookup_url)
                .map_err(|error| error.to_string());
            tx.send(InternalEvent::PropImages { index, outcome })?;
            Ok(())
        }
    }

    struct Fixture {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Fixture {
        fn new(context: ItemContext) -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                state: AppState::default(),
                runtime: TestRuntime::default(),
                view_data: ViewData::new(context, QUIET),
                tx,
                rx,
            }
        }

        fn edit(&mut self, box_id: &BoxId, terms: &str, now: Instant) {
            apply_edit(
                &mut self.state,
                &mut self.view_data,
                box_id,
                terms.to_owned(),
                now,
            );
        }

        fn fire(&mut self, now: Instant) {
            fire_due_deadlines(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                now,
            );
        }

        fn drain(&mut self) {
            process_internal_events(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, modifiers),
            )
        }

        fn type_str(&mut self, text: &str) {
            for ch in text.chars() {
                self.key(KeyCode::Char(ch), KeyModifiers::NONE);
            }
        }
    }

    fn context_with_catalog() -> ItemContext {
        ItemContext {
            qid: "Q1231009".to_owned(),
            label: "The Night Watch".to_owned(),
            catalog: vec![
                CatalogEntry {
                    qid: "Q154469".to_owned(),
                    label: "The Syndics".to_owned(),
                    artist_name: Some("Rembrandt".to_owned()),
                    date: Some("1662".to_owned()),
                },
                CatalogEntry {
                    qid: "Q2068492".to_owned(),
                    label: "The Milkmaid".to_owned(),
                    artist_name: Some("Vermeer".to_owned()),
                    date: None,
                },
            ],
            ..ItemContext::default()
        }
    }

    fn context_with_props() -> ItemContext {
        ItemContext {
            qid: "Q1231009".to_owned(),
            label: "The Night Watch".to_owned(),
            other_props: vec![
                PropCard {
                    pid: "P180".to_owned(),
                    label: "depicts".to_owned(),
                    image_lookup: "/img/1".to_owned(),
                    images: ImageFetch::Pending,
                },
                PropCard {
                    pid: "P276".to_owned(),
                    label: "location".to_owned(),
                    image_lookup: "/img/2".to_owned(),
                    images: ImageFetch::Pending,
                },
            ],
            ..ItemContext::default()
        }
    }

    fn image(title: &str) -> ImageInfo {
        ImageInfo::new(title)
    }

    #[test]
    fn short_input_clears_without_network_call() {
        let mut fixture = Fixture::new(ItemContext::default());
        let box_id = item_box();
        let t0 = Instant::now();

        fixture.edit(&box_id, "ca", t0);
        fixture.fire(t0 + QUIET);

        assert!(fixture.runtime.search_calls.is_empty());
        let search = fixture.state.search_box(&box_id).expect("box exists");
        assert!(search.hits().is_empty());
    }

    #[test]
    fn rapid_edits_coalesce_into_one_lookup() {
        let mut fixture = Fixture::new(ItemContext::default());
        let box_id = item_box();
        let t0 = Instant::now();

        fixture.edit(&box_id, "cat", t0);
        fixture.edit(&box_id, "catal", t0 + Duration::from_millis(200));

        // The first deadline was superseded; nothing fires at its old time.
        fixture.fire(t0 + Duration::from_millis(550));
        assert!(fixture.runtime.search_calls.is_empty());

        fixture.fire(t0 + Duration::from_millis(700));
        assert_eq!(fixture.runtime.search_calls, vec!["catal".to_owned()]);
    }

    #[test]
    fn settled_value_dispatches_exactly_once() {
        let mut fixture = Fixture::new(ItemContext::default());
        let box_id = item_box();
        let t0 = Instant::now();

        fixture.edit(&box_id, "castle", t0);
        fixture.fire(t0 + QUIET);
        fixture.fire(t0 + QUIET * 3);

        assert_eq!(fixture.runtime.search_calls, vec!["castle".to_owned()]);
    }

    #[test]
    fn identical_successive_values_dispatch_once() {
        let mut fixture = Fixture::new(ItemContext::default());
        let box_id = item_box();
        let t0 = Instant::now();

        fixture.edit(&box_id, "castle", t0);
        fixture.fire(t0 + QUIET);
        fixture.edit(&box_id, "castle", t0 + QUIET * 2);
        fixture.fire(t0 + QUIET * 3);

        assert_eq!(fixture.runtime.search_calls, vec!["castle".to_owned()]);
    }

    #[test]
    fn enter_picks_hit_and_clears_box() {
        let mut fixture = Fixture::new(ItemContext::default());
        fixture.runtime.canned_hits.insert(
            "saint".to_owned(),
            vec![Hit::new("Q42", "X"), Hit::new("Q43", "Y")],
        );
        let box_id = item_box();
        let t0 = Instant::now();

        fixture.edit(&box_id, "saint", t0);
        fixture.fire(t0 + QUIET);
        fixture.drain();

        let search = fixture.state.search_box(&box_id).expect("box exists");
        assert_eq!(search.hits().len(), 2);

        fixture.key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(fixture.state.new_depicts.len(), 1);
        assert_eq!(fixture.state.new_depicts[0].qid, "Q42");

        let search = fixture.state.search_box(&box_id).expect("box exists");
        assert!(search.hits().is_empty());
        assert_eq!(search.terms(), "");
        assert!(status_text(&fixture.state).contains("added X"));
    }

    #[test]
    fn hit_cursor_moves_before_picking() {
        let mut fixture = Fixture::new(ItemContext::default());
        fixture.runtime.canned_hits.insert(
            "saint".to_owned(),
            vec![Hit::new("Q42", "X"), Hit::new("Q43", "Y")],
        );
        let box_id = item_box();
        let t0 = Instant::now();

        fixture.edit(&box_id, "saint", t0);
        fixture.fire(t0 + QUIET);
        fixture.drain();

        fixture.key(KeyCode::Down, KeyModifiers::NONE);
        fixture.key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(fixture.state.new_depicts[0].qid, "Q43");
    }

    #[test]
    fn ctrl_x_removes_selected_new_depict() {
        let mut fixture = Fixture::new(ItemContext::default());
        fixture.state.new_depicts = vec![
            Hit::new("Q1", "A"),
            Hit::new("Q2", "B"),
            Hit::new("Q3", "C"),
        ];
        fixture.view_data.depicts_cursor = 1;

        fixture.key(KeyCode::Char('x'), KeyModifiers::CONTROL);
        let labels: Vec<&str> = fixture
            .state
            .new_depicts
            .iter()
            .map(|hit| hit.label.as_str())
            .collect();
        assert_eq!(labels, vec!["A", "C"]);
        assert!(status_text(&fixture.state).contains("removed B"));
    }

    #[test]
    fn stale_lookup_response_is_discarded() {
        let mut fixture = Fixture::new(ItemContext::default());
        fixture.runtime.defer = true;
        let box_id = item_box();
        let t0 = Instant::now();

        fixture.edit(&box_id, "wind", t0);
        fixture.fire(t0 + QUIET);
        fixture.edit(&box_id, "windmill", t0 + QUIET * 2);
        fixture.fire(t0 + QUIET * 3);

        let pending = std::mem::take(&mut fixture.runtime.pending_searches);
        assert_eq!(pending.len(), 2);

        // Newest response lands first; the older one must not overwrite it.
        let (newer_box, newer_request, _) = pending[1].clone();
        fixture
            .tx
            .send(InternalEvent::Lookup {
                box_id: newer_box,
                request: newer_request,
                outcome: Ok(vec![Hit::new("Q2", "windmill")]),
            })
            .expect("send should succeed");
        let (older_box, older_request, _) = pending[0].clone();
        fixture
            .tx
            .send(InternalEvent::Lookup {
                box_id: older_box,
                request: older_request,
                outcome: Ok(vec![Hit::new("Q1", "wind")]),
            })
            .expect("send should succeed");
        fixture.drain();

        let search = fixture.state.search_box(&box_id).expect("box exists");
        assert_eq!(search.hits().len(), 1);
        assert_eq!(search.hits()[0].label, "windmill");
    }

    #[test]
    fn failed_lookup_is_visible_in_panel_and_status() {
        let mut fixture = Fixture::new(ItemContext::default());
        fixture.runtime.search_error = Some("connection refused".to_owned());
        let box_id = item_box();
        let t0 = Instant::now();

        fixture.edit(&box_id, "castle", t0);
        fixture.fire(t0 + QUIET);
        fixture.drain();

        let panel = search_panel_text(&fixture.state, &fixture.view_data);
        assert!(panel.contains("lookup failed"), "panel: {panel}");
        assert!(status_text(&fixture.state).contains("lookup failed"));
    }

    #[test]
    fn catalog_boxes_search_independently() {
        let mut fixture = Fixture::new(context_with_catalog());
        fixture.runtime.canned_hits.insert(
            "militia".to_owned(),
            vec![Hit::new("Q1", "militia company")],
        );
        fixture.state.active_tab = ViewTab::Catalog;
        let t0 = Instant::now();

        let first = BoxId::new("Q154469");
        let second = BoxId::new("Q2068492");

        fixture.edit(&first, "militia", t0);
        fixture.fire(t0 + QUIET);
        fixture.drain();

        assert_eq!(
            fixture
                .state
                .search_box(&first)
                .map(|search| search.hits().len()),
            Some(1),
        );
        assert!(fixture.state.search_box(&second).is_none());
    }

    #[test]
    fn catalog_typing_targets_focused_entry() {
        let mut fixture = Fixture::new(context_with_catalog());
        fixture.state.active_tab = ViewTab::Catalog;

        fixture.key(KeyCode::Down, KeyModifiers::NONE);
        fixture.type_str("maid");

        let focused = BoxId::new("Q2068492");
        assert_eq!(
            fixture
                .state
                .search_box(&focused)
                .map(|search| search.terms().to_owned()),
            Some("maid".to_owned()),
        );
        assert!(fixture.state.search_box(&BoxId::new("Q154469")).is_none());

        let rendered = catalog_text(&fixture.state, &fixture.view_data);
        assert!(rendered.contains("maid_"), "rendered: {rendered}");
    }

    #[test]
    fn prop_images_fetch_for_every_card_at_init() {
        let mut fixture = Fixture::new(context_with_props());
        fixture
            .runtime
            .images_by_url
            .insert("/img/1".to_owned(), vec![image("File:A.jpg")]);
        fixture
            .runtime
            .images_by_url
            .insert("/img/2".to_owned(), vec![image("File:B.jpg"), image("File:C.jpg")]);

        init_prop_image_fetches(
            &mut fixture.state,
            &mut fixture.runtime,
            &mut fixture.view_data,
            &fixture.tx,
        );
        fixture.drain();

        assert_eq!(
            fixture.runtime.image_calls,
            vec!["/img/1".to_owned(), "/img/2".to_owned()],
        );
        match &fixture.view_data.context.other_props[0].images {
            ImageFetch::Loaded(items) => assert_eq!(items.len(), 1),
            other => panic!("first card should be loaded, got {other:?}"),
        }
        match &fixture.view_data.context.other_props[1].images {
            ImageFetch::Loaded(items) => assert_eq!(items.len(), 2),
            other => panic!("second card should be loaded, got {other:?}"),
        }
    }

    #[test]
    fn prop_images_attach_regardless_of_arrival_order() {
        let mut fixture = Fixture::new(context_with_props());
        fixture.runtime.defer = true;

        init_prop_image_fetches(
            &mut fixture.state,
            &mut fixture.runtime,
            &mut fixture.view_data,
            &fixture.tx,
        );
        assert_eq!(fixture.runtime.pending_images.len(), 2);

        // Second card's response arrives before the first card's.
        fixture
            .tx
            .send(InternalEvent::PropImages {
                index: 1,
                outcome: Ok(vec![image("File:B.jpg")]),
            })
            .expect("send should succeed");
        fixture
            .tx
            .send(InternalEvent::PropImages {
                index: 0,
                outcome: Ok(vec![image("File:A.jpg")]),
            })
            .expect("send should succeed");
        fixture.drain();

        match &fixture.view_data.context.other_props[0].images {
            ImageFetch::Loaded(items) => assert_eq!(items[0].title, "File:A.jpg"),
            other => panic!("first card should be loaded, got {other:?}"),
        }
        match &fixture.view_data.context.other_props[1].images {
            ImageFetch::Loaded(items) => assert_eq!(items[0].title, "File:B.jpg"),
            other => panic!("second card should be loaded, got {other:?}"),
        }
    }

    #[test]
    fn failed_image_fetch_is_visible() {
        let mut fixture = Fixture::new(context_with_props());
        fixture.runtime.image_error = Some("504 gateway timeout".to_owned());

        init_prop_image_fetches(
            &mut fixture.state,
            &mut fixture.runtime,
            &mut fixture.view_data,
            &fixture.tx,
        );
        fixture.drain();

        let rendered = properties_text(&fixture.view_data);
        assert!(rendered.contains("images failed"), "rendered: {rendered}");
        assert!(status_text(&fixture.state).contains("images failed"));
    }

    #[test]
    fn tab_key_rotates_views() {
        let mut fixture = Fixture::new(ItemContext::default());
        assert_eq!(fixture.state.active_tab, ViewTab::Item);

        fixture.key(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(fixture.state.active_tab, ViewTab::Catalog);

        fixture.key(KeyCode::BackTab, KeyModifiers::SHIFT);
        assert_eq!(fixture.state.active_tab, ViewTab::Item);
    }

    #[test]
    fn ctrl_q_quits() {
        let mut fixture = Fixture::new(ItemContext::default());
        assert!(fixture.key(KeyCode::Char('q'), KeyModifiers::CONTROL));
    }

    #[test]
    fn typing_restarts_the_deadline() {
        let mut fixture = Fixture::new(ItemContext::default());
        let box_id = item_box();

        fixture.type_str("cat");
        let first = fixture
            .view_data
            .pending_deadline(&box_id)
            .expect("deadline scheduled");

        fixture.type_str("a");
        let second = fixture
            .view_data
            .pending_deadline(&box_id)
            .expect("deadline rescheduled");
        assert!(second >= first);
    }

    #[test]
    fn side_panel_lists_existing_depicts_and_people() {
        let context = ItemContext::from_json(
            r#"{
                "qid": "Q1231009",
                "label": "The Night Watch",
                "existing_depicts": [{"qid": "Q1505892", "label": "militia"}],
                "people": [{"qid": "Q5598", "label": "Rembrandt"}]
            }"#,
        )
        .expect("context should decode");
        let fixture = Fixture::new(context);

        let rendered = item_side_text(&fixture.state, &fixture.view_data);
        assert!(rendered.contains("militia (Q1505892)"));
        assert!(rendered.contains("Rembrandt (Q5598)"));
        assert!(rendered.contains("new depicts"));
    }
}
