//=========================================================================
// Game — State Machine and Frame Loop
//=========================================================================
//
// Owns the state stack and the per-frame tick, and couples them to the
// resource loader: a pushed state is held in the pending slot until its
// preload batch settles, while the active state keeps updating and
// drawing every frame.
//
// Tick pipeline:
//
// ```text
//   tick(now_ms)
//     ├─ 0. pump loader (drain signals, sweeps, timeouts)
//     ├─ 1. resolve outgoing pop  (on_exit ── pop ── on_enter)
//     ├─ 2. on_update(dt)
//     ├─ 3. draw (clear ── pre ── [scene slot] ── post ── bar ── present)
//     └─ 4. resolve incoming push, if its gate is loaded
// ```
//
// Exactly one incoming and one outgoing transition may be in flight at
// a time; cross-fades and queued transitions are out of scope.
//
//=========================================================================

//=== Standard Library Imports ============================================

use std::fmt;
use std::sync::Arc;

//=== External Dependencies ===============================================

use log::{debug, info, warn};

//=== Internal Dependencies ===============================================

use crate::core::input::{KeyInput, Keyboard};
use crate::core::loader::{LoaderError, LoaderOptions, ResourceLoader};
use crate::core::resource::{Fetcher, ResourceFactory};
use crate::core::surface::{Color, Surface};

//=== Module Declarations =================================================

mod state;

//=== Public API ==========================================================

pub use state::{ResourceSet, State, StateContext};

use state::{StackCell, TransitionRequests};

//=== Frame Constants =====================================================

/// Delta times at or above this are a stall (debugger pause, dragged
/// window), not a frame; the frame's work is skipped instead of running
/// one giant catch-up step.
const STALL_FRAME_MS: f64 = 250.0;

/// Loading bar geometry: inset from the surface edges and bar height,
/// both in pixels.
const LOADING_BAR_INSET: u32 = 4;
const LOADING_BAR_HEIGHT: u32 = 16;

/// Translucent white, drawn over whatever the state rendered.
const LOADING_BAR_COLOR: Color = Color::rgba(255, 255, 255, 128);

//=== GameError ===========================================================

/// Synchronous rejection of a misused game method.
#[derive(Debug)]
pub enum GameError {
    /// A push was requested while one is already pending.
    IncomingPending,
    /// A pop was requested while one is already pending.
    OutgoingPending,
    /// A preload manifest was rejected by the loader.
    Loader(LoaderError),
}

//--- Trait Implementations -----------------------------------------------

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncomingPending => {
                f.write_str("an incoming state transition is already pending")
            }
            Self::OutgoingPending => {
                f.write_str("an outgoing state transition is already pending")
            }
            Self::Loader(e) => write!(f, "preload rejected: {}", e),
        }
    }
}

impl std::error::Error for GameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Loader(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LoaderError> for GameError {
    fn from(e: LoaderError) -> Self {
        Self::Loader(e)
    }
}

//=== Hook Dispatch =======================================================

/// Which lifecycle hook to invoke.
#[derive(Clone, Copy)]
enum Hook {
    Enter,
    Exit,
    Update(f64),
    PreDraw,
    PostDraw,
}

fn dispatch(state: &mut dyn State, context: &mut StateContext<'_>, hook: Hook) {
    match hook {
        Hook::Enter => state.on_enter(context),
        Hook::Exit => state.on_exit(context),
        Hook::Update(dt) => state.on_update(context, dt),
        Hook::PreDraw => state.on_pre_draw(context),
        Hook::PostDraw => state.on_post_draw(context),
    }
}

//=== GameBuilder =========================================================

/// Builder for configuring and constructing a [`Game`].
///
/// The surface is the one required ingredient; everything else has a
/// default. `build` pushes the initial state, if one was configured,
/// exactly as [`Game::push_state`] would.
///
/// # Default Values
///
/// - **Clear color**: black
/// - **Loader options**: [`LoaderOptions`] defaults
/// - **Fetcher**: filesystem, relative to the current directory
/// - **Initial state**: none (the implicit no-op state is active)
pub struct GameBuilder {
    surface: Box<dyn Surface>,
    clear_color: Color,
    options: LoaderOptions,
    fetcher: Option<Arc<dyn Fetcher>>,
    factories: Vec<Box<dyn ResourceFactory>>,
    initial_state: Option<Box<dyn State>>,
}

impl GameBuilder {
    /// Creates a builder drawing to the given surface.
    pub fn new(surface: impl Surface + 'static) -> Self {
        Self {
            surface: Box::new(surface),
            clear_color: Color::BLACK,
            options: LoaderOptions::new(),
            fetcher: None,
            factories: Vec::new(),
            initial_state: None,
        }
    }

    /// The color each frame starts from.
    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    /// Prefix joined onto relative resource URLs.
    pub fn with_resource_root(mut self, root: impl Into<String>) -> Self {
        self.options = self.options.with_resource_root(root);
        self
    }

    /// Replaces the loader tuning wholesale. Call before
    /// [`GameBuilder::with_resource_root`] if both are used.
    pub fn with_loader_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// The byte fetcher resources load through.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Registers an extra resource factory. Later registrations win
    /// ties on extension, the bundled image/JSON factories included.
    pub fn with_factory(mut self, factory: Box<dyn ResourceFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// The state pushed when the game is built.
    pub fn with_initial_state(mut self, state: impl State + 'static) -> Self {
        self.initial_state = Some(Box::new(state));
        self
    }

    /// Builds the game and pushes the initial state.
    ///
    /// # Errors
    ///
    /// [`GameError::Loader`] if the initial state's preload manifest is
    /// rejected.
    pub fn build(self) -> Result<Game, GameError> {
        let mut loader = match self.fetcher {
            Some(fetcher) => ResourceLoader::with_fetcher(self.options, fetcher),
            None => ResourceLoader::new(self.options),
        };
        for factory in self.factories {
            loader.register_factory(factory);
        }

        let mut game = Game {
            surface: self.surface,
            keyboard: Keyboard::new(),
            loader,
            stack: Vec::new(),
            incoming: None,
            outgoing: false,
            clear_color: self.clear_color,
            last_tick: None,
        };

        if let Some(state) = self.initial_state {
            game.push_boxed(state)?;
        }
        info!(target: "game", "game built ({}x{})", game.surface.size().0, game.surface.size().1);
        Ok(game)
    }
}

//=== Game ================================================================

/// The engine: state stack, frame loop, and the loader that gates
/// transitions.
///
/// Externally clocked: a host calls [`Game::tick`] once per display
/// frame with a monotonic millisecond timestamp and feeds keyboard
/// transitions through [`Game::apply_input`]. With an empty stack an
/// implicit default state is active; all of its hooks are no-ops.
pub struct Game {
    surface: Box<dyn Surface>,
    keyboard: Keyboard,
    loader: ResourceLoader,
    stack: Vec<StackCell>,
    /// The single pending-push slot.
    incoming: Option<StackCell>,
    /// The single pending-pop slot: whatever is top at the next tick
    /// boundary goes.
    outgoing: bool,
    clear_color: Color,
    last_tick: Option<f64>,
}

impl Game {
    //--- Transitions ------------------------------------------------------

    /// Requests a push. The state activates at the first tick after its
    /// preload manifest (if any) has fully settled.
    ///
    /// States without a manifest pass their load gate synchronously and
    /// activate on the next tick. Manifests whose entries are all
    /// already cached do the same.
    ///
    /// # Errors
    ///
    /// [`GameError::IncomingPending`] if a push is already pending, and
    /// [`GameError::Loader`] if the manifest is rejected.
    pub fn push_state<S>(&mut self, state: S) -> Result<(), GameError>
    where
        S: State + 'static,
    {
        self.push_boxed(Box::new(state))
    }

    /// Requests a pop of the state active at the next tick boundary.
    /// Popping an empty stack is a recorded no-op.
    ///
    /// # Errors
    ///
    /// [`GameError::OutgoingPending`] if a pop is already pending.
    pub fn pop_state(&mut self) -> Result<(), GameError> {
        if self.outgoing {
            return Err(GameError::OutgoingPending);
        }
        self.outgoing = true;
        Ok(())
    }

    fn push_boxed(&mut self, state: Box<dyn State>) -> Result<(), GameError> {
        if self.incoming.is_some() {
            return Err(GameError::IncomingPending);
        }

        let mut cell = StackCell::new(state);
        match cell.state.preload() {
            Some(manifest) => {
                debug!(
                    target: "game",
                    "pending state preloads {} resource(s)",
                    manifest.len()
                );
                let handles = self.loader.preload(&manifest)?;
                cell.resources = ResourceSet::new(handles);

                let gate = cell.gate.clone();
                cell.progress_listener = Some(self.loader.add_progress_listener(move |event| {
                    gate.set_progress(event.fraction());
                }));
                let gate = cell.gate.clone();
                let completion = self.loader.add_completion_listener(move |_| gate.mark_loaded());

                self.loader.start();

                // A fully-cached or empty manifest produces no further
                // events; settle the gate from the current counts.
                let (finished, total) = self.loader.counts();
                if finished == total {
                    debug!(target: "game", "manifest already settled ({}/{})", finished, total);
                    cell.gate.set_progress(1.0);
                    cell.gate.mark_loaded();
                    if let Some(id) = cell.progress_listener.take() {
                        self.loader.remove_listener(id);
                    }
                    self.loader.remove_listener(completion);
                }
            }
            // Synchronous fast path: nothing to load.
            None => cell.gate.mark_loaded(),
        }

        self.incoming = Some(cell);
        Ok(())
    }

    //--- Frame Tick -------------------------------------------------------

    /// Runs one frame. `now_ms` comes from the host's monotonic clock;
    /// all engine timing derives from it.
    pub fn tick(&mut self, now_ms: f64) {
        let dt = match self.last_tick {
            Some(last) => now_ms - last,
            None => 0.0,
        };
        self.last_tick = Some(now_ms);

        if dt >= STALL_FRAME_MS {
            debug!(target: "game", "skipping stalled frame ({:.0} ms)", dt);
            return;
        }

        self.loader.update(now_ms);
        self.resolve_outgoing();
        self.run_top_hook(Hook::Update(dt));
        self.draw();
        self.resolve_incoming();
    }

    //--- Input ------------------------------------------------------------

    /// Feeds one keyboard transition from the host.
    pub fn apply_input(&mut self, input: KeyInput) {
        self.keyboard.apply(input);
    }

    /// Releases all held keys, for focus loss.
    pub fn clear_input(&mut self) {
        self.keyboard.clear();
    }

    //--- Observation ------------------------------------------------------

    /// Surface dimensions in pixels (width, height).
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface.size()
    }

    /// States on the stack, the pending slots excluded.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// True while a pushed state waits for its loads.
    pub fn incoming_pending(&self) -> bool {
        self.incoming.is_some()
    }

    /// True while a pop waits for the next tick boundary.
    pub fn outgoing_pending(&self) -> bool {
        self.outgoing
    }

    /// The resource loader, for factory registration and lazy loads
    /// outside state hooks.
    pub fn loader_mut(&mut self) -> &mut ResourceLoader {
        &mut self.loader
    }

    //--- Transition Resolution --------------------------------------------

    /// Pops the pending outgoing state: its `on_exit` runs, then the
    /// uncovered state's `on_enter`.
    fn resolve_outgoing(&mut self) {
        if !self.outgoing {
            return;
        }
        self.outgoing = false;

        match self.stack.pop() {
            Some(mut cell) => {
                debug!(target: "game", "popping state ({} below)", self.stack.len());
                self.run_cell_hook(&mut cell, Hook::Exit);
            }
            None => debug!(target: "game", "pop on an empty stack, nothing to do"),
        }
        self.run_top_hook(Hook::Enter);
    }

    /// Activates the pending incoming state once its gate is loaded.
    /// The covered state receives no lifecycle call.
    fn resolve_incoming(&mut self) {
        let ready = self.incoming.as_ref().is_some_and(|cell| cell.gate.is_loaded());
        if !ready {
            return;
        }
        let Some(mut cell) = self.incoming.take() else {
            return;
        };
        if let Some(id) = cell.progress_listener.take() {
            self.loader.remove_listener(id);
        }

        info!(
            target: "game",
            "activating state ({} resource(s), depth {})",
            cell.resources.len(),
            self.stack.len() + 1
        );
        self.stack.push(cell);
        self.run_top_hook(Hook::Enter);
    }

    //--- Drawing ----------------------------------------------------------

    fn draw(&mut self) {
        self.surface.clear(self.clear_color);
        self.run_top_hook(Hook::PreDraw);
        // Reserved slot: retained-mode scene content would draw here.
        self.run_top_hook(Hook::PostDraw);
        self.draw_loading_bar();
        self.surface.present();
    }

    /// Overlays the incoming state's load progress along the bottom
    /// edge. Nothing is drawn before the first progress report.
    fn draw_loading_bar(&mut self) {
        let Some(progress) = self.incoming.as_ref().and_then(|cell| cell.gate.progress()) else {
            return;
        };
        let (width, height) = self.surface.size();
        let inner = width.saturating_sub(2 * LOADING_BAR_INSET);
        let fill = (inner as f32 * progress) as u32;
        let y = height.saturating_sub(LOADING_BAR_HEIGHT + LOADING_BAR_INSET);
        self.surface.fill_rect(
            LOADING_BAR_INSET as i32,
            y as i32,
            fill,
            LOADING_BAR_HEIGHT,
            LOADING_BAR_COLOR,
        );
    }

    //--- Hook Plumbing ----------------------------------------------------

    fn request_snapshot(&self) -> TransitionRequests {
        TransitionRequests {
            incoming_busy: self.incoming.is_some(),
            outgoing_busy: self.outgoing,
            ..Default::default()
        }
    }

    /// Invokes one hook on the top state, or on the implicit default
    /// state (a no-op) when the stack is empty.
    fn run_top_hook(&mut self, hook: Hook) {
        let mut requests = self.request_snapshot();
        if let Some(cell) = self.stack.last_mut() {
            let mut context = StateContext {
                surface: self.surface.as_mut(),
                keyboard: &self.keyboard,
                loader: &mut self.loader,
                resources: &cell.resources,
                requests: &mut requests,
            };
            dispatch(cell.state.as_mut(), &mut context, hook);
        }
        self.apply_requests(requests);
    }

    /// Invokes one hook on a state that is off the stack (the popped
    /// outgoing cell).
    fn run_cell_hook(&mut self, cell: &mut StackCell, hook: Hook) {
        let mut requests = self.request_snapshot();
        {
            let mut context = StateContext {
                surface: self.surface.as_mut(),
                keyboard: &self.keyboard,
                loader: &mut self.loader,
                resources: &cell.resources,
                requests: &mut requests,
            };
            dispatch(cell.state.as_mut(), &mut context, hook);
        }
        self.apply_requests(requests);
    }

    /// Applies transitions a hook requested. The context already
    /// rejected conflicting requests against its snapshot, so failures
    /// here mean the snapshot went stale mid-hook; they are logged and
    /// dropped, matching the synchronous-rejection contract.
    fn apply_requests(&mut self, requests: TransitionRequests) {
        if let Some(state) = requests.push {
            if let Err(e) = self.push_boxed(state) {
                warn!(target: "game", "push requested from a hook was dropped: {}", e);
            }
        }
        if requests.pop {
            if let Err(e) = self.pop_state() {
                warn!(target: "game", "pop requested from a hook was dropped: {}", e);
            }
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::Manifest;
    use crate::core::resource::{
        LoadSignal, LoaderContext, MemoryFetcher, Resource, ResourceData, ResourceSignal,
        SignalSender,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    //--- Test Doubles -----------------------------------------------------

    /// Everything drawn on the surface, in order.
    #[derive(Debug, Clone, PartialEq)]
    enum DrawOp {
        Clear(Color),
        FillRect { x: i32, y: i32, width: u32, height: u32, color: Color },
        Present,
    }

    type DrawLog = Arc<Mutex<Vec<DrawOp>>>;

    struct RecordingSurface {
        size: (u32, u32),
        log: DrawLog,
    }

    impl RecordingSurface {
        fn new(width: u32, height: u32) -> (Self, DrawLog) {
            let log = DrawLog::default();
            (Self { size: (width, height), log: log.clone() }, log)
        }
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            self.size
        }
        fn clear(&mut self, color: Color) {
            self.log.lock().unwrap().push(DrawOp::Clear(color));
        }
        fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Color) {
            self.log.lock().unwrap().push(DrawOp::FillRect { x, y, width, height, color });
        }
        fn blit(&mut self, _image: &image::RgbaImage, _x: i32, _y: i32) {}
        fn present(&mut self) {
            self.log.lock().unwrap().push(DrawOp::Present);
        }
    }

    type HookLog = Arc<Mutex<Vec<String>>>;

    /// State that logs every hook under its label.
    struct Probe {
        label: &'static str,
        log: HookLog,
        manifest: Option<Manifest>,
    }

    impl Probe {
        fn new(label: &'static str, log: &HookLog) -> Self {
            Self { label, log: log.clone(), manifest: None }
        }

        fn with_manifest(label: &'static str, log: &HookLog, manifest: Manifest) -> Self {
            Self { label, log: log.clone(), manifest: Some(manifest) }
        }

        fn note(&self, hook: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.label, hook));
        }
    }

    impl State for Probe {
        fn preload(&self) -> Option<Manifest> {
            self.manifest.clone()
        }
        fn on_enter(&mut self, _context: &mut StateContext<'_>) {
            self.note("enter");
        }
        fn on_exit(&mut self, _context: &mut StateContext<'_>) {
            self.note("exit");
        }
        fn on_update(&mut self, _context: &mut StateContext<'_>, _dt_ms: f64) {
            self.note("update");
        }
        fn on_pre_draw(&mut self, _context: &mut StateContext<'_>) {
            self.note("pre_draw");
        }
        fn on_post_draw(&mut self, _context: &mut StateContext<'_>) {
            self.note("post_draw");
        }
    }

    /// Resource that never finishes until the test fires its signal.
    struct HeldResource {
        url: String,
        data: ResourceData,
        senders: Senders,
    }

    type Senders = Arc<Mutex<HashMap<String, SignalSender>>>;

    impl Resource for HeldResource {
        fn url(&self) -> &str {
            &self.url
        }
        fn data(&self) -> ResourceData {
            self.data.clone()
        }
        fn start(&mut self, signals: SignalSender) {
            self.senders.lock().unwrap().insert(self.url.clone(), signals);
        }
    }

    struct HeldFactory {
        senders: Senders,
    }

    impl ResourceFactory for HeldFactory {
        fn extensions(&self) -> &[&str] {
            &["dat"]
        }
        fn create(&self, url: &str, _context: &LoaderContext) -> Box<dyn Resource> {
            Box::new(HeldResource {
                url: url.to_string(),
                data: ResourceData::new(),
                senders: self.senders.clone(),
            })
        }
    }

    //--- Test Helpers -----------------------------------------------------

    fn game() -> (Game, DrawLog, Senders) {
        let (surface, draw_log) = RecordingSurface::new(320, 240);
        let senders = Senders::default();
        let game = GameBuilder::new(surface)
            .with_fetcher(Arc::new(MemoryFetcher::new()))
            .with_factory(Box::new(HeldFactory { senders: senders.clone() }))
            .build()
            .unwrap();
        (game, draw_log, senders)
    }

    fn fire(senders: &Senders, url: &str, signal: LoadSignal) {
        let guard = senders.lock().unwrap();
        let sender = guard.get(url).expect("resource was never started");
        sender.send(ResourceSignal { url: url.to_string(), signal }).unwrap();
    }

    fn hooks(log: &HookLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    //--- Builder ----------------------------------------------------------

    #[test]
    fn builder_defaults_are_black_and_stateless() {
        let (surface, _log) = RecordingSurface::new(64, 48);
        let game = GameBuilder::new(surface).build().unwrap();
        assert_eq!(game.clear_color, Color::BLACK);
        assert_eq!(game.stack_depth(), 0);
        assert!(!game.incoming_pending());
        assert!(!game.outgoing_pending());
    }

    #[test]
    fn builder_initial_state_is_pending_until_the_first_tick() {
        let (surface, _log) = RecordingSurface::new(64, 48);
        let hook_log = HookLog::default();
        let mut game = GameBuilder::new(surface)
            .with_initial_state(Probe::new("a", &hook_log))
            .build()
            .unwrap();

        assert!(game.incoming_pending());
        assert!(hooks(&hook_log).is_empty());

        game.tick(0.0);
        assert!(!game.incoming_pending());
        assert_eq!(game.stack_depth(), 1);
        assert_eq!(hooks(&hook_log).last().map(String::as_str), Some("a:enter"));
    }

    #[test]
    fn builder_clear_color_is_used_every_frame() {
        let (surface, draw_log) = RecordingSurface::new(64, 48);
        let teal = Color::rgb(0, 128, 128);
        let mut game = GameBuilder::new(surface).with_clear_color(teal).build().unwrap();

        game.tick(0.0);
        assert_eq!(draw_log.lock().unwrap().first(), Some(&DrawOp::Clear(teal)));
    }

    //--- Transition Slots -------------------------------------------------

    #[test]
    fn second_push_without_a_tick_is_rejected() {
        let (mut game, _draw, _senders) = game();
        let log = HookLog::default();

        assert!(game.push_state(Probe::new("a", &log)).is_ok());
        assert!(matches!(
            game.push_state(Probe::new("b", &log)),
            Err(GameError::IncomingPending)
        ));

        game.tick(0.0);
        assert!(game.push_state(Probe::new("b", &log)).is_ok());
    }

    #[test]
    fn second_pop_without_a_tick_is_rejected() {
        let (mut game, _draw, _senders) = game();

        assert!(game.pop_state().is_ok());
        assert!(matches!(game.pop_state(), Err(GameError::OutgoingPending)));

        game.tick(0.0);
        assert!(game.pop_state().is_ok());
    }

    #[test]
    fn pop_on_an_empty_stack_is_a_noop() {
        let (mut game, _draw, _senders) = game();
        game.pop_state().unwrap();
        game.tick(0.0);
        assert_eq!(game.stack_depth(), 0);
        assert!(!game.outgoing_pending());
    }

    //--- Load-Gated Activation --------------------------------------------

    #[test]
    fn push_without_a_manifest_activates_on_the_next_tick() {
        let (mut game, _draw, _senders) = game();
        let log = HookLog::default();

        game.push_state(Probe::new("a", &log)).unwrap();
        assert!(game.incoming_pending());

        game.tick(0.0);
        assert!(!game.incoming_pending());
        assert_eq!(game.stack_depth(), 1);
        assert_eq!(hooks(&log), vec!["a:enter"]);
    }

    #[test]
    fn push_with_a_manifest_waits_for_the_batch() {
        let (mut game, _draw, senders) = game();
        let log = HookLog::default();
        let manifest = Manifest::new().with("bg", "bg.dat").with("cfg", "cfg.dat");

        game.push_state(Probe::with_manifest("a", &log, manifest)).unwrap();
        game.tick(0.0);
        game.tick(16.0);
        assert!(game.incoming_pending());
        assert_eq!(game.stack_depth(), 0);
        assert!(hooks(&log).is_empty());

        fire(&senders, "bg.dat", LoadSignal::Loaded);
        game.tick(32.0);
        assert!(game.incoming_pending());

        fire(&senders, "cfg.dat", LoadSignal::Loaded);
        game.tick(48.0);
        assert!(!game.incoming_pending());
        assert_eq!(game.stack_depth(), 1);
        assert_eq!(hooks(&log), vec!["a:enter"]);
    }

    #[test]
    fn active_state_keeps_running_while_a_push_loads() {
        let (mut game, _draw, _senders) = game();
        let log = HookLog::default();

        game.push_state(Probe::new("a", &log)).unwrap();
        game.tick(0.0);
        log.lock().unwrap().clear();

        let manifest = Manifest::new().with("bg", "bg.dat");
        game.push_state(Probe::with_manifest("b", &log, manifest)).unwrap();
        game.tick(16.0);
        game.tick(32.0);

        // The stack top stays live through the whole load.
        let seen = hooks(&log);
        assert_eq!(seen.iter().filter(|h| *h == "a:update").count(), 2);
        assert!(!seen.iter().any(|h| h.starts_with("b:")));
    }

    #[test]
    fn failed_loads_still_open_the_gate() {
        let (mut game, _draw, senders) = game();
        let log = HookLog::default();
        let manifest = Manifest::new().with("bg", "bg.dat");

        game.push_state(Probe::with_manifest("a", &log, manifest)).unwrap();
        game.tick(0.0);

        fire(&senders, "bg.dat", LoadSignal::Failed("404".into()));
        game.tick(16.0);

        // The batch is finished, error or not; the state activates and
        // finds its handle unpopulated.
        assert_eq!(game.stack_depth(), 1);
        assert_eq!(hooks(&log).last().map(String::as_str), Some("a:enter"));
    }

    #[test]
    fn fully_cached_manifest_activates_without_new_events() {
        let (mut game, _draw, senders) = game();
        let log = HookLog::default();

        game.push_state(Probe::with_manifest(
            "a",
            &log,
            Manifest::new().with("bg", "bg.dat"),
        ))
        .unwrap();
        game.tick(0.0);
        fire(&senders, "bg.dat", LoadSignal::Loaded);
        game.tick(16.0);
        assert_eq!(game.stack_depth(), 1);

        // Same URL again: everything is already terminal, so the gate
        // settles synchronously and the push lands on the next tick.
        game.push_state(Probe::with_manifest(
            "b",
            &log,
            Manifest::new().with("bg", "bg.dat"),
        ))
        .unwrap();
        game.tick(32.0);
        assert_eq!(game.stack_depth(), 2);
        assert_eq!(hooks(&log).last().map(String::as_str), Some("b:enter"));
    }

    #[test]
    fn covered_state_gets_no_lifecycle_call() {
        let (mut game, _draw, _senders) = game();
        let log = HookLog::default();

        game.push_state(Probe::new("a", &log)).unwrap();
        game.tick(0.0);
        game.push_state(Probe::new("b", &log)).unwrap();
        game.tick(16.0);

        let seen = hooks(&log);
        assert_eq!(seen.iter().filter(|h| *h == "a:enter").count(), 1);
        assert!(!seen.contains(&"a:exit".to_string()));
        assert_eq!(seen.last().map(String::as_str), Some("b:enter"));
    }

    #[test]
    fn pop_runs_exit_then_uncovered_enter() {
        let (mut game, _draw, _senders) = game();
        let log = HookLog::default();

        game.push_state(Probe::new("a", &log)).unwrap();
        game.tick(0.0);
        game.push_state(Probe::new("b", &log)).unwrap();
        game.tick(16.0);
        log.lock().unwrap().clear();

        game.pop_state().unwrap();
        game.tick(32.0);

        let seen = hooks(&log);
        assert_eq!(&seen[..2], &["b:exit".to_string(), "a:enter".to_string()]);
        assert_eq!(game.stack_depth(), 1);
    }

    //--- Frame Pacing -----------------------------------------------------

    #[test]
    fn stalled_frames_are_skipped() {
        let (mut game, _draw, _senders) = game();
        let log = HookLog::default();
        game.push_state(Probe::new("a", &log)).unwrap();
        game.tick(0.0);
        log.lock().unwrap().clear();

        game.tick(16.0);
        assert_eq!(hooks(&log).iter().filter(|h| *h == "a:update").count(), 1);

        // A 1 s gap is a stall, not a frame.
        game.tick(1_016.0);
        assert_eq!(hooks(&log).iter().filter(|h| *h == "a:update").count(), 1);

        // The clock advanced, so the next frame is normal again.
        game.tick(1_032.0);
        assert_eq!(hooks(&log).iter().filter(|h| *h == "a:update").count(), 2);
    }

    //--- Drawing ----------------------------------------------------------

    #[test]
    fn frame_draw_order_is_clear_hooks_present() {
        let (mut game, draw_log, _senders) = game();
        let log = HookLog::default();
        game.push_state(Probe::new("a", &log)).unwrap();
        game.tick(0.0);
        draw_log.lock().unwrap().clear();
        log.lock().unwrap().clear();

        game.tick(16.0);
        assert_eq!(
            *draw_log.lock().unwrap(),
            vec![DrawOp::Clear(Color::BLACK), DrawOp::Present]
        );
        assert_eq!(hooks(&log), vec!["a:update", "a:pre_draw", "a:post_draw"]);
    }

    #[test]
    fn loading_bar_tracks_incoming_progress() {
        let (mut game, draw_log, senders) = game();
        let log = HookLog::default();
        let manifest = Manifest::new().with("bg", "bg.dat").with("cfg", "cfg.dat");

        game.push_state(Probe::with_manifest("a", &log, manifest)).unwrap();
        game.tick(0.0);

        fire(&senders, "bg.dat", LoadSignal::Loaded);
        draw_log.lock().unwrap().clear();
        game.tick(16.0);

        // 320 wide, 4 px inset: half of the 312 px interior.
        let bar = DrawOp::FillRect {
            x: 4,
            y: (240 - 16 - 4) as i32,
            width: 156,
            height: 16,
            color: Color::rgba(255, 255, 255, 128),
        };
        assert_eq!(
            *draw_log.lock().unwrap(),
            vec![DrawOp::Clear(Color::BLACK), bar, DrawOp::Present]
        );
    }

    #[test]
    fn no_bar_before_the_first_progress_report() {
        let (mut game, draw_log, _senders) = game();
        let log = HookLog::default();
        let manifest = Manifest::new().with("bg", "bg.dat");

        game.push_state(Probe::with_manifest("a", &log, manifest)).unwrap();
        game.tick(0.0);

        assert_eq!(
            *draw_log.lock().unwrap(),
            vec![DrawOp::Clear(Color::BLACK), DrawOp::Present]
        );
    }

    //--- Hook-Requested Transitions ---------------------------------------

    /// Pushes a plain probe once, from inside `on_update`.
    struct PushOnce {
        log: HookLog,
        pushed: bool,
    }

    impl State for PushOnce {
        fn on_update(&mut self, context: &mut StateContext<'_>, _dt_ms: f64) {
            if !self.pushed {
                self.pushed = true;
                context.push_state(Probe::new("inner", &self.log)).unwrap();
            }
        }
    }

    #[test]
    fn hooks_can_request_transitions() {
        let (mut game, _draw, _senders) = game();
        let log = HookLog::default();

        game.push_state(PushOnce { log: log.clone(), pushed: false }).unwrap();
        game.tick(0.0);

        // The request from on_update landed in the incoming slot...
        game.tick(16.0);
        assert_eq!(game.stack_depth(), 2);
        assert_eq!(hooks(&log).last().map(String::as_str), Some("inner:enter"));
    }

    //--- End To End -------------------------------------------------------

    /// Asserts its preloaded payloads are populated when it enters.
    struct ChecksResources {
        log: HookLog,
    }

    impl State for ChecksResources {
        fn preload(&self) -> Option<Manifest> {
            Some(Manifest::new().with("level", "level.json").with("cfg", "cfg.json"))
        }
        fn on_enter(&mut self, context: &mut StateContext<'_>) {
            let level = context.resources().get("level").expect("level handle");
            assert_eq!(level.read().as_json().expect("json payload")["width"], 8);
            let cfg = context.resources().get("cfg").expect("cfg handle");
            assert_eq!(cfg.read().as_json().expect("json payload")["lives"], 3);
            self.log.lock().unwrap().push("checked".into());
        }
    }

    #[test]
    fn real_resources_flow_through_the_gate() {
        let (surface, _draw) = RecordingSurface::new(320, 240);
        let fetcher = MemoryFetcher::new()
            .with("level.json", br#"{"width":8}"#.to_vec())
            .with("cfg.json", br#"{"lives":3}"#.to_vec());
        let log = HookLog::default();
        let mut game = GameBuilder::new(surface)
            .with_fetcher(Arc::new(fetcher))
            .with_initial_state(ChecksResources { log: log.clone() })
            .build()
            .unwrap();

        // Real worker threads: pump frames until the batch settles.
        for frame in 0..500 {
            game.tick(frame as f64 * 16.0);
            if game.stack_depth() == 1 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        assert_eq!(game.stack_depth(), 1);
        assert_eq!(hooks(&log), vec!["checked"]);
    }

    //--- Errors -----------------------------------------------------------

    #[test]
    fn error_messages_name_the_slot() {
        assert_eq!(
            GameError::IncomingPending.to_string(),
            "an incoming state transition is already pending"
        );
        assert_eq!(
            GameError::OutgoingPending.to_string(),
            "an outgoing state transition is already pending"
        );
    }

    #[test]
    fn unknown_extension_surfaces_as_a_loader_error() {
        let (mut game, _draw, _senders) = game();
        let log = HookLog::default();
        let manifest = Manifest::new().with("bg", "bg.zzz");

        let result = game.push_state(Probe::with_manifest("a", &log, manifest));
        assert!(matches!(result, Err(GameError::Loader(_))));
        // The rejected push leaves the slot free.
        assert!(!game.incoming_pending());
    }
}
