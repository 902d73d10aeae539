use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};

use crate::logging;
use crate::menu::{MenuError, MenuState};
use crate::model::Candidate;
use crate::search::SearchOptions;
use crate::selection::{
    self, ExitCode, Resolution, SelectionController, SelectionError, SelectionOutcome,
};
use crate::session_lock::SessionLockGuard;

/// Keystroke bursts beyond this are coalesced; a full channel drops the
/// update since only the latest query matters for a search box.
const QUERY_BUFFER: usize = 8;

/// Presentation collaborator. Invoked after every state change that
/// affects the display, always outside the session's own locks.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        filtered: &[Candidate],
        selected: Option<usize>,
        numeric_selection_disabled: bool,
    );
}

pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&self, _filtered: &[Candidate], _selected: Option<usize>, _numeric: bool) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFrame {
    pub titles: Vec<String>,
    pub selected: Option<usize>,
    pub numeric_selection_disabled: bool,
}

/// Test double that records every frame it is asked to draw.
#[derive(Default)]
pub struct RecordingRenderer {
    frames: Mutex<Vec<RenderFrame>>,
}

impl RecordingRenderer {
    pub fn frames(&self) -> Vec<RenderFrame> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, filtered: &[Candidate], selected: Option<usize>, numeric: bool) {
        let frame = RenderFrame {
            titles: filtered
                .iter()
                .map(|c| c.computed_title().to_string())
                .collect(),
            selected,
            numeric_selection_disabled: numeric,
        };
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame);
    }
}

/// Asynchronous item updates from background loaders.
#[derive(Debug)]
pub enum ItemBatch {
    Replace(Vec<Candidate>),
    Append(Vec<Candidate>),
    Prepend(Vec<Candidate>),
}

#[derive(Debug)]
pub enum SessionError {
    /// `run_forever` re-entry while a run is already blocking.
    AlreadyRunning,
    Menu(MenuError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "session loop is already running"),
            Self::Menu(error) => write!(f, "menu error: {error}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<MenuError> for SessionError {
    fn from(value: MenuError) -> Self {
        Self::Menu(value)
    }
}

/// Copy-on-read view of the live menu for callers outside the consumer
/// loop.
#[derive(Debug, Clone)]
pub struct MenuSnapshot {
    pub filtered: Vec<Candidate>,
    pub selected: Option<usize>,
    pub match_count: usize,
    pub query: String,
}

/// Everything owned by one menu generation. Superseded generations
/// keep their own menu/fuse/channels, so a stale consumer loop can
/// never touch the state of the generation that replaced it.
struct Generation {
    menu: Arc<Mutex<MenuState>>,
    controller: Arc<SelectionController>,
    input_enabled: Arc<AtomicBool>,
    query_tx: Sender<String>,
    items_tx: Sender<ItemBatch>,
    // held only so dropping the generation closes the loop's cancel leg
    _cancel_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

/// Coordinates show/hide/reset cycles over menu generations and owns
/// the single-instance lock for the duration of a run. One session per
/// process; visibility has its own mutex so toggles never wait on
/// search processing.
pub struct Session {
    options: SearchOptions,
    custom_entry: bool,
    renderer: Arc<dyn Renderer>,
    visible: Mutex<bool>,
    generation: Mutex<Generation>,
    running: AtomicBool,
    quit_tx: Sender<()>,
    quit_rx: Receiver<()>,
    lock_guard: Mutex<Option<SessionLockGuard>>,
}

impl Session {
    pub fn new(
        candidates: Vec<Candidate>,
        initial_query: &str,
        options: SearchOptions,
        custom_entry: bool,
        renderer: Arc<dyn Renderer>,
        lock_guard: Option<SessionLockGuard>,
    ) -> Result<Self, SessionError> {
        let generation = new_generation(candidates, initial_query, options, Arc::clone(&renderer))?;
        let (quit_tx, quit_rx) = bounded(1);

        let session = Self {
            options,
            custom_entry,
            renderer,
            visible: Mutex::new(false),
            generation: Mutex::new(generation),
            running: AtomicBool::new(false),
            quit_tx,
            quit_rx,
            lock_guard: Mutex::new(lock_guard),
        };
        session.render_current();
        Ok(session)
    }

    /// Non-blocking query update. A full buffer drops the send
    /// (latest-wins); disabled input after a commit drops it too.
    pub fn push_query(&self, query: &str) -> bool {
        let generation = self.generation();
        if !generation.input_enabled.load(Ordering::Acquire) {
            return false;
        }
        match generation.query_tx.try_send(query.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Item updates are low-frequency; the channel is unbounded so
    /// loaders never block either.
    pub fn push_items(&self, batch: ItemBatch) -> bool {
        self.generation().items_tx.send(batch).is_ok()
    }

    pub fn move_selection(&self, delta: i64) {
        let generation = self.generation();
        if !generation.input_enabled.load(Ordering::Acquire) {
            return;
        }
        let menu = Arc::clone(&generation.menu);
        drop(generation);
        mutate_and_render(&menu, &self.renderer, |m| m.move_selection(delta));
    }

    pub fn select_by_ordinal(&self, ordinal: usize) {
        let generation = self.generation();
        if !generation.input_enabled.load(Ordering::Acquire) {
            return;
        }
        let menu = Arc::clone(&generation.menu);
        drop(generation);
        mutate_and_render(&menu, &self.renderer, |m| m.select_by_ordinal(ordinal));
    }

    pub fn snapshot(&self) -> MenuSnapshot {
        let generation = self.generation();
        let menu = generation
            .menu
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        MenuSnapshot {
            filtered: menu.filtered().to_vec(),
            selected: menu.selected(),
            match_count: menu.match_count(),
            query: menu.query().to_string(),
        }
    }

    pub fn set_exit_code(&self, code: ExitCode) -> Result<(), SelectionError> {
        self.generation().controller.set_exit_code(code)
    }

    /// Commit key: records a successful selection and breaks the fuse.
    /// Only the winning caller disables further input.
    pub fn commit_selection(&self) -> bool {
        self.finish(ExitCode::Success, true)
    }

    /// Cancel key or focus loss.
    pub fn cancel_selection(&self) -> bool {
        self.finish(ExitCode::UserCanceled, false)
    }

    /// Internal failure path; resolves the session with an error code.
    pub fn fail_selection(&self) -> bool {
        self.finish(ExitCode::UnknownError, false)
    }

    fn finish(&self, code: ExitCode, take_selection: bool) -> bool {
        let (controller, input_enabled, chosen, raw_query) = {
            let generation = self.generation();
            let menu = generation
                .menu
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let chosen = if take_selection {
                menu.selected_candidate().cloned()
            } else {
                None
            };
            (
                Arc::clone(&generation.controller),
                Arc::clone(&generation.input_enabled),
                chosen,
                menu.query().to_string(),
            )
        };

        if let Err(error) = controller.set_exit_code(code) {
            // first assignment stands; this commit attempt still races
            // for the fuse with the code that won
            logging::warn(&format!("exit code not updated: {error}"));
        }
        let won = controller.commit(chosen, &raw_query);
        if won {
            input_enabled.store(false, Ordering::Release);
        }
        won
    }

    /// Blocks until the generation's fuse breaks. One primary waiter
    /// per generation.
    pub fn wait_for_outcome(&self) -> SelectionOutcome {
        let controller = Arc::clone(&self.generation().controller);
        controller.wait_for_outcome()
    }

    pub fn resolve_outcome(
        &self,
        outcome: &SelectionOutcome,
    ) -> Result<Resolution, SelectionError> {
        selection::resolve(outcome, self.custom_entry)
    }

    /// Starts a new generation: the previous consumer loop is
    /// cancelled and joined, the fuse and exit-code register start
    /// fresh, input is re-enabled, and the query is optionally cleared.
    pub fn reset(&self, reset_input: bool) -> Result<(), SessionError> {
        let mut old = {
            let mut generation = self
                .generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let (items, query) = {
                let menu = generation
                    .menu
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let query = if reset_input {
                    String::new()
                } else {
                    menu.query().to_string()
                };
                (menu.items().to_vec(), query)
            };
            let fresh = new_generation(items, &query, self.options, Arc::clone(&self.renderer))?;
            std::mem::replace(&mut *generation, fresh)
        };

        // Dropping the old generation's senders closes its channels;
        // the superseded loop observes the disconnect and exits before
        // it can deliver anything stale.
        let worker = old.worker.take();
        drop(old);
        if let Some(worker) = worker {
            let _ = worker.join();
        }

        self.render_current();
        Ok(())
    }

    pub fn show(&self) {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn hide(&self) {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn toggle_visibility(&self) -> bool {
        let mut visible = self.visible.lock().unwrap_or_else(PoisonError::into_inner);
        *visible = !*visible;
        *visible
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks the calling thread until `quit` fires. Rejects re-entry
    /// and releases the single-instance lock on the way out.
    pub fn run_forever(&self) -> Result<(), SessionError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(SessionError::AlreadyRunning);
        }

        let _ = self.quit_rx.recv();
        self.release_lock();
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    pub fn quit(&self) {
        let _ = self.quit_tx.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Releases the single-instance lock if this session still holds
    /// it. Safe to call more than once.
    pub fn release_lock(&self) {
        let guard = self
            .lock_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(guard) = guard {
            if let Err(error) = guard.release() {
                logging::warn(&format!("session lock release failed: {error}"));
            }
        }
    }

    fn generation(&self) -> std::sync::MutexGuard<'_, Generation> {
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn render_current(&self) {
        let menu = Arc::clone(&self.generation().menu);
        mutate_and_render(&menu, &self.renderer, |_| {});
    }
}

fn new_generation(
    candidates: Vec<Candidate>,
    initial_query: &str,
    options: SearchOptions,
    renderer: Arc<dyn Renderer>,
) -> Result<Generation, MenuError> {
    let menu = Arc::new(Mutex::new(MenuState::new(
        candidates,
        initial_query,
        options,
    )?));
    let controller = Arc::new(SelectionController::new());
    let input_enabled = Arc::new(AtomicBool::new(true));
    let (query_tx, query_rx) = bounded(QUERY_BUFFER);
    let (items_tx, items_rx) = unbounded();
    let (cancel_tx, cancel_rx) = bounded(1);

    let worker = spawn_consumer_loop(
        Arc::clone(&menu),
        renderer,
        Arc::clone(&input_enabled),
        query_rx,
        items_rx,
        cancel_rx,
    );

    Ok(Generation {
        menu,
        controller,
        input_enabled,
        query_tx,
        items_tx,
        _cancel_tx: cancel_tx,
        worker: Some(worker),
    })
}

/// One long-lived consumer per generation serializes all menu
/// mutation. FIFO per channel; no ordering is promised across the
/// query and item channels.
fn spawn_consumer_loop(
    menu: Arc<Mutex<MenuState>>,
    renderer: Arc<dyn Renderer>,
    input_enabled: Arc<AtomicBool>,
    query_rx: Receiver<String>,
    items_rx: Receiver<ItemBatch>,
    cancel_rx: Receiver<()>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("quickmenu-generation".to_string())
        .spawn(move || loop {
            select! {
                recv(cancel_rx) -> _ => return,
                recv(query_rx) -> msg => {
                    let Ok(mut query) = msg else { return };
                    // coalesce keystroke bursts down to the newest query
                    while let Ok(newer) = query_rx.try_recv() {
                        query = newer;
                    }
                    if !input_enabled.load(Ordering::Acquire) {
                        continue;
                    }
                    mutate_and_render(&menu, &renderer, |m| {
                        m.search(&query);
                    });
                }
                recv(items_rx) -> msg => {
                    let Ok(batch) = msg else { return };
                    mutate_and_render(&menu, &renderer, |m| apply_batch(m, batch));
                }
            }
        })
        .expect("consumer loop thread should spawn")
}

fn apply_batch(menu: &mut MenuState, batch: ItemBatch) {
    match batch {
        ItemBatch::Replace(items) => menu.replace_items(items),
        ItemBatch::Append(mut items) => {
            let mut merged = menu.items().to_vec();
            merged.append(&mut items);
            menu.replace_items(merged);
        }
        ItemBatch::Prepend(items) => {
            let mut merged = items;
            merged.extend_from_slice(menu.items());
            menu.replace_items(merged);
        }
    }
}

/// Applies a mutation under the menu lock, then renders from a
/// snapshot with the lock released, so the renderer can never re-enter
/// a locked section.
fn mutate_and_render(
    menu: &Arc<Mutex<MenuState>>,
    renderer: &Arc<dyn Renderer>,
    mutate: impl FnOnce(&mut MenuState),
) {
    let (filtered, selected, numeric_disabled) = {
        let mut state = menu.lock().unwrap_or_else(PoisonError::into_inner);
        mutate(&mut state);
        // digits in the query belong to the filter, not ordinal jumps
        let numeric_disabled = state.query().chars().any(|c| c.is_ascii_digit());
        (state.filtered().to_vec(), state.selected(), numeric_disabled)
    };
    renderer.render(&filtered, selected, numeric_disabled);
}
