// Main TUI application using ratatui
// Draws the player state, turns key presses into engine operations, and
// runs searches and playlist fetches in the background.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::SearchError;
use crate::player::queue::Track;
use crate::player::state::PlayerState;
use crate::player::PlayerEngine;
use crate::playlist::{Playlist, PlaylistClient};
use crate::storage::{LocalStore, SearchHistory};
use crate::youtube::types::{SearchFilters, SearchItem, SearchParams};
use crate::youtube::SearchService;

const SEEK_STEP: f64 = 10.0;
const VOLUME_STEP: f32 = 0.05;

enum AppMode {
    Normal,
    Searching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Results,
    Queue,
}

// What the left panel shows
enum Listing {
    Tracks(Vec<Track>),
    Playlists(Vec<Playlist>),
}

impl Listing {
    fn len(&self) -> usize {
        match self {
            Listing::Tracks(tracks) => tracks.len(),
            Listing::Playlists(playlists) => playlists.len(),
        }
    }
}

// Results of background work, picked up by the draw loop
enum AppEvent {
    SearchDone(Result<Vec<Track>, SearchError>),
    PlaylistsLoaded(Result<Vec<Playlist>, String>),
    PlaylistUpdated(Result<Playlist, String>),
}

pub struct MusicPlayerApp {
    engine: PlayerEngine,
    search: Arc<SearchService>,
    playlists: Option<Arc<PlaylistClient>>,
    // Last playlist queued with Enter: target of [P]/[X]
    active_playlist: Option<(String, String)>,
    store: Option<LocalStore>,
    search_history: SearchHistory,
    // Position while browsing history with Up/Down in search mode
    history_cursor: Option<usize>,
    filters: SearchFilters,
    listing: Listing,
    selected_result: usize,
    selected_queue_item: usize,
    focus: Focus,
    search_query: String,
    mode: AppMode,
    should_quit: bool,
    is_searching: bool,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    status_message: String,
}

impl MusicPlayerApp {
    pub fn new(
        engine: PlayerEngine,
        search: Arc<SearchService>,
        playlists: Option<Arc<PlaylistClient>>,
        store: Option<LocalStore>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let search_history = store
            .as_ref()
            .map(LocalStore::load_search_history)
            .unwrap_or_default();

        MusicPlayerApp {
            engine,
            search,
            playlists,
            active_playlist: None,
            store,
            search_history,
            history_cursor: None,
            filters: SearchFilters::default(),
            listing: Listing::Tracks(Vec::new()),
            selected_result: 0,
            selected_queue_item: 0,
            focus: Focus::Results,
            search_query: String::new(),
            mode: AppMode::Normal,
            should_quit: false,
            is_searching: false,
            events_rx,
            events_tx,
            status_message: String::new(),
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> anyhow::Result<()> {
        loop {
            let state = self.engine.snapshot();
            terminal.draw(|f| self.draw_ui(f, &state))?;

            while let Ok(event) = self.events_rx.try_recv() {
                self.handle_app_event(event);
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                    }
                }
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SearchDone(Ok(tracks)) => {
                self.is_searching = false;
                self.status_message = format!("Found {} results", tracks.len());
                self.listing = Listing::Tracks(tracks);
                self.selected_result = 0;
                self.focus = Focus::Results;
            }
            AppEvent::SearchDone(Err(e)) => {
                self.is_searching = false;
                self.status_message = e.to_string();
            }
            AppEvent::PlaylistsLoaded(Ok(playlists)) => {
                self.status_message = format!("{} playlists, [Enter] to queue one", playlists.len());
                self.listing = Listing::Playlists(playlists);
                self.selected_result = 0;
                self.focus = Focus::Results;
            }
            AppEvent::PlaylistsLoaded(Err(e)) => {
                self.status_message = format!("Could not load playlists: {e}");
            }
            AppEvent::PlaylistUpdated(Ok(playlist)) => {
                self.status_message = format!("'{}' now has {} tracks", playlist.name, playlist.tracks.len());
                if let Listing::Playlists(playlists) = &mut self.listing {
                    if let Some(entry) = playlists.iter_mut().find(|p| p.id == playlist.id) {
                        *entry = playlist;
                    }
                }
            }
            AppEvent::PlaylistUpdated(Err(e)) => {
                self.status_message = format!("Could not update playlist: {e}");
            }
        }
    }

    // ==========================================
    // DRAWING
    // ==========================================

    fn draw_ui(&self, frame: &mut Frame, state: &PlayerState) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(5),
                Constraint::Length(3),
            ])
            .split(frame.size());

        let title = if self.is_searching {
            "Searching... please wait".to_string()
        } else {
            match self.mode {
                AppMode::Searching => format!(
                    "Search: {}_   [{} | {}]",
                    self.search_query,
                    self.filters.duration.as_str(),
                    self.filters.sort_by.as_str()
                ),
                AppMode::Normal if !self.status_message.is_empty() => self.status_message.clone(),
                AppMode::Normal => "[/]Search [Enter]Queue [o]Play now [Tab]Switch panel [n/p]Next/Prev \
                                    [Space]Play/Pause [s/r/a]Shuffle/Repeat/Autoplay [q]Quit"
                    .to_string(),
            }
        };
        let header = Paragraph::new(title).block(Block::default().borders(Borders::ALL).title("ytqueue"));
        frame.render_widget(header, chunks[0]);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        let results: Vec<ListItem> = match &self.listing {
            Listing::Tracks(tracks) => tracks
                .iter()
                .enumerate()
                .map(|(i, track)| {
                    let style = self.highlight(Focus::Results, i == self.selected_result, Color::Yellow);
                    ListItem::new(format!("{} - {}", track.title, track.artist)).style(style)
                })
                .collect(),
            Listing::Playlists(playlists) => playlists
                .iter()
                .enumerate()
                .map(|(i, playlist)| {
                    let style = self.highlight(Focus::Results, i == self.selected_result, Color::Yellow);
                    ListItem::new(format!("{} ({} tracks)", playlist.name, playlist.tracks.len())).style(style)
                })
                .collect(),
        };
        let results_title = match self.listing {
            Listing::Tracks(_) => "Search Results",
            Listing::Playlists(_) => "Playlists",
        };
        let results_list = List::new(results).block(Block::default().borders(Borders::ALL).title(results_title));
        frame.render_widget(results_list, main_chunks[0]);

        let queue_items: Vec<ListItem> = state
            .queue()
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let style = self.highlight(Focus::Queue, i == self.selected_queue_item, Color::Green);
                ListItem::new(format!("{:>2}. {} - {}", i + 1, track.title, track.artist)).style(style)
            })
            .collect();
        let queue_title = if state.is_loading_recommendations() {
            format!("Queue ({}) - finding recommendations...", state.queue().len())
        } else {
            format!("Queue ({})", state.queue().len())
        };
        let queue_list = List::new(queue_items).block(Block::default().borders(Borders::ALL).title(queue_title));
        frame.render_widget(queue_list, main_chunks[1]);

        let now_playing = match state.current_track() {
            Some(track) => format!("Now Playing: {} - {}", track.title, track.artist),
            None => "No track playing".to_string(),
        };
        let transport = state.transport();
        let state_str = if transport.is_playing { "▶ Playing" } else { "⏸ Paused" };
        let flag = |on: bool| if on { "on" } else { "off" };
        let mut player_info = format!(
            "{}\nState: {} | Volume: {}% | Shuffle: {} | Repeat: {} | Autoplay: {}",
            now_playing,
            state_str,
            (transport.volume * 100.0).round() as u32,
            flag(state.is_shuffling()),
            flag(state.is_repeating()),
            flag(state.is_autoplay_enabled()),
        );
        if let Some(error) = state.recommendations_error() {
            player_info.push('\n');
            player_info.push_str(error);
        }
        let player_widget = Paragraph::new(player_info).block(Block::default().borders(Borders::ALL).title("Player"));
        frame.render_widget(player_widget, chunks[2]);

        let ratio = if transport.duration > 0.0 {
            (transport.progress / transport.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let progress = Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(ratio)
            .label(format!(
                "{} / {}",
                format_time(transport.progress),
                format_time(transport.duration)
            ));
        frame.render_widget(progress, chunks[3]);
    }

    fn highlight(&self, panel: Focus, selected: bool, color: Color) -> Style {
        if selected && self.focus == panel {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else if selected {
            Style::default().fg(color)
        } else {
            Style::default()
        }
    }

    // ==========================================
    // INPUT
    // ==========================================

    fn handle_input(&mut self, key: KeyCode) {
        match self.mode {
            AppMode::Searching => self.handle_search_input(key),
            AppMode::Normal => {
                self.status_message.clear();
                self.handle_normal_input(key);
            }
        }
    }

    fn handle_search_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char(c) => {
                self.search_query.push(c);
                self.history_cursor = None;
            }
            KeyCode::Backspace => {
                self.search_query.pop();
            }
            KeyCode::Up => self.recall_history(true),
            KeyCode::Down => self.recall_history(false),
            KeyCode::Tab => self.filters.duration = self.filters.duration.next(),
            KeyCode::BackTab => self.filters.sort_by = self.filters.sort_by.next(),
            KeyCode::Enter => {
                let query = std::mem::take(&mut self.search_query);
                self.perform_search(query);
                self.mode = AppMode::Normal;
                self.history_cursor = None;
            }
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                self.search_query.clear();
                self.history_cursor = None;
            }
            _ => {}
        }
    }

    fn handle_normal_input(&mut self, key: KeyCode) {
        let engine = self.engine.clone();
        match key {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.mode = AppMode::Searching,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Results => Focus::Queue,
                    Focus::Queue => Focus::Results,
                }
            }
            KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Enter => self.activate_selected(),
            KeyCode::Char('o') => self.play_selected_now(),
            KeyCode::Char(' ') => engine.toggle_playback(),
            KeyCode::Char('n') => engine.play_next(),
            KeyCode::Char('p') => engine.play_previous(),
            KeyCode::Up => self.change_volume(VOLUME_STEP),
            KeyCode::Down => self.change_volume(-VOLUME_STEP),
            KeyCode::Right => self.seek_relative(SEEK_STEP),
            KeyCode::Left => self.seek_relative(-SEEK_STEP),
            KeyCode::Char('s') => {
                let on = engine.toggle_shuffle();
                self.status_message = format!("Shuffle {}", if on { "on" } else { "off" });
            }
            KeyCode::Char('r') => {
                let on = engine.toggle_repeat();
                self.status_message = format!("Repeat {}", if on { "on" } else { "off" });
            }
            KeyCode::Char('a') => {
                let on = !engine.snapshot().is_autoplay_enabled();
                engine.set_autoplay_enabled(on);
                self.status_message = format!("Autoplay {}", if on { "on" } else { "off" });
            }
            KeyCode::Char('R') => {
                self.status_message = "Loading recommendations...".to_string();
                tokio::spawn(async move { engine.load_recommendations().await });
            }
            KeyCode::Char('d') => self.remove_selected_from_queue(),
            KeyCode::Char('J') => self.move_queue_item(1),
            KeyCode::Char('K') => self.move_queue_item(-1),
            KeyCode::Char('c') => {
                engine.clear_queue();
                self.selected_queue_item = 0;
                self.status_message = "Queue cleared".to_string();
            }
            KeyCode::Char('H') => {
                engine.clear_recently_played();
                self.status_message = "Recently played cleared".to_string();
            }
            KeyCode::Char('l') => self.load_playlists(),
            KeyCode::Char('P') => self.edit_active_playlist(true),
            KeyCode::Char('X') => self.edit_active_playlist(false),
            _ => {}
        }
    }

    // Up walks back through older searches, Down towards newer ones
    fn recall_history(&mut self, older: bool) {
        if self.search_history.is_empty() {
            return;
        }
        let last = self.search_history.len() - 1;
        let cursor = match (self.history_cursor, older) {
            (None, true) => Some(0),
            (None, false) => None,
            (Some(i), true) => Some((i + 1).min(last)),
            (Some(0), false) => None,
            (Some(i), false) => Some(i - 1),
        };
        self.history_cursor = cursor;
        match cursor.and_then(|i| self.search_history.get(i)) {
            Some(entry) => {
                self.search_query = entry.query.clone();
                self.filters = entry.filters;
            }
            None => self.search_query.clear(),
        }
    }

    fn perform_search(&mut self, query: String) {
        let query = query.trim().to_string();
        if query.is_empty() {
            return;
        }

        self.search_history.record(&query, self.filters);
        if let Some(store) = &self.store {
            if let Err(e) = store.save_search_history(&self.search_history) {
                warn!(error = %e, "failed to save search history");
            }
        }

        self.is_searching = true;
        let search = self.search.clone();
        let params = SearchParams::new(query, self.filters);
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            info!(query = %params.query, "searching");
            let result: Result<Vec<Track>, SearchError> = search
                .search(&params)
                .await
                .map(|items| items.iter().filter_map(SearchItem::to_track).collect());
            let _ = tx.send(AppEvent::SearchDone(result));
        });
    }

    fn load_playlists(&mut self) {
        let Some(client) = self.playlists.clone() else {
            self.status_message = "No playlist store configured (PLAYLIST_API_URL)".to_string();
            return;
        };
        self.status_message = "Loading playlists...".to_string();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.list().await.map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::PlaylistsLoaded(result));
        });
    }

    // Adds the playing track to the active playlist, or removes it.
    fn edit_active_playlist(&mut self, add: bool) {
        let (Some(client), Some((id, name))) = (self.playlists.clone(), self.active_playlist.clone()) else {
            self.status_message = "Queue a playlist first ([l] then [Enter])".to_string();
            return;
        };
        let Some(track) = self.engine.snapshot().current_track().cloned() else {
            self.status_message = "Nothing is playing".to_string();
            return;
        };

        self.status_message = if add {
            format!("Adding '{}' to '{}'...", track.title, name)
        } else {
            format!("Removing '{}' from '{}'...", track.title, name)
        };
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = if add {
                client.add_track(&id, &track).await
            } else {
                client.remove_track(&id, &track.video_id).await
            };
            let _ = tx.send(AppEvent::PlaylistUpdated(result.map_err(|e| e.to_string())));
        });
    }

    fn move_selection(&mut self, delta: isize) {
        match self.focus {
            Focus::Results => {
                self.selected_result = step(self.selected_result, delta, self.listing.len());
            }
            Focus::Queue => {
                let len = self.engine.snapshot().queue().len();
                self.selected_queue_item = step(self.selected_queue_item, delta, len);
            }
        }
    }

    fn selected_track(&self) -> Option<Track> {
        match &self.listing {
            Listing::Tracks(tracks) => tracks.get(self.selected_result).cloned(),
            Listing::Playlists(_) => None,
        }
    }

    // Results panel: queue the track, or load the whole playlist.
    // Queue panel: play that entry.
    fn activate_selected(&mut self) {
        if self.focus == Focus::Queue {
            self.engine.set_current_track_index(self.selected_queue_item);
            return;
        }

        match &self.listing {
            Listing::Tracks(tracks) => {
                let Some(track) = tracks.get(self.selected_result).cloned() else {
                    return;
                };
                let title = track.title.clone();
                self.engine.add_to_queue(track);
                let state = self.engine.snapshot();
                self.status_message = format!("Added '{}' to queue ({} total)", title, state.queue().len());
                if state.current_track().is_none() {
                    self.status_message.push_str(", press 'n' to play");
                }
            }
            Listing::Playlists(playlists) => {
                let Some(playlist) = playlists.get(self.selected_result) else {
                    return;
                };
                self.engine.set_queue(playlist.tracks.clone());
                self.active_playlist = Some((playlist.id.clone(), playlist.name.clone()));
                self.status_message = format!("Queued playlist '{}', [P]/[X] add/remove the playing track", playlist.name);
            }
        }
    }

    fn play_selected_now(&mut self) {
        if let Some(track) = self.selected_track() {
            self.status_message = format!("Loading: {}...", track.title);
            self.engine.set_current_track(Some(track), false);
        }
    }

    fn remove_selected_from_queue(&mut self) {
        let state = self.engine.snapshot();
        if let Some(track) = state.queue().get(self.selected_queue_item) {
            self.engine.remove_from_queue(&track.video_id);
            self.selected_queue_item = self.selected_queue_item.min(state.queue().len().saturating_sub(2));
        }
    }

    fn move_queue_item(&mut self, delta: isize) {
        let len = self.engine.snapshot().queue().len();
        let to = step(self.selected_queue_item, delta, len);
        if to != self.selected_queue_item {
            self.engine.move_queue_item(self.selected_queue_item, to);
            self.selected_queue_item = to;
        }
    }

    fn change_volume(&mut self, delta: f32) {
        let volume = self.engine.snapshot().transport().volume;
        self.engine.set_volume(volume + delta);
    }

    fn seek_relative(&mut self, delta: f64) {
        let transport = self.engine.snapshot().transport();
        let mut target = (transport.progress + delta).max(0.0);
        if transport.duration > 0.0 {
            target = target.min(transport.duration);
        }
        self.engine.seek_to(target);
    }
}

// Moves a selection within 0..len without wrapping
fn step(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    current.saturating_add_signed(delta).min(len - 1)
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
