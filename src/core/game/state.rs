//=========================================================================
// Game States
//=========================================================================
//
// A state is a bundle of lifecycle hooks plus an optional preload
// manifest. The engine owns all load bookkeeping: each pushed state
// rides in a stack cell that pairs it with its named resources and a
// load gate the loader's listeners flip from the outside.
//
//=========================================================================

//=== Standard Library Imports ============================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

//=== Internal Dependencies ===============================================

use crate::core::input::Keyboard;
use crate::core::loader::{ListenerId, Manifest, ResourceLoader};
use crate::core::resource::ResourceData;
use crate::core::surface::Surface;

use super::GameError;

//=== State Trait =========================================================

/// One game state: a menu, a level, a pause overlay.
///
/// Every hook is defaulted to a no-op, so a state implements only what
/// it cares about. [`State::preload`] names the resources the state
/// needs before it may become active; the engine loads them and holds
/// the state in the pending slot until they settle.
///
/// Hooks run on the driving thread during [`Game::tick`] and receive a
/// [`StateContext`] for drawing, input queries, resource access, and
/// transition requests.
///
/// [`Game::tick`]: super::Game::tick
pub trait State {
    /// Resources to load before this state activates. `None` activates
    /// on the next tick without touching the loader.
    fn preload(&self) -> Option<Manifest> {
        None
    }

    /// Runs once when the state becomes the top of the stack.
    fn on_enter(&mut self, context: &mut StateContext<'_>) {
        let _ = context;
    }

    /// Runs once when the state is popped, before it is discarded.
    fn on_exit(&mut self, context: &mut StateContext<'_>) {
        let _ = context;
    }

    /// Runs every frame with the delta time in milliseconds.
    fn on_update(&mut self, context: &mut StateContext<'_>, dt_ms: f64) {
        let _ = (context, dt_ms);
    }

    /// Draws beneath the reserved scene slot.
    fn on_pre_draw(&mut self, context: &mut StateContext<'_>) {
        let _ = context;
    }

    /// Draws above the reserved scene slot.
    fn on_post_draw(&mut self, context: &mut StateContext<'_>) {
        let _ = context;
    }
}

//=== ResourceSet =========================================================

/// A state's preloaded resources, keyed by manifest name.
///
/// Handles are live: a name requested while its load is in flight
/// resolves to a handle whose payload fills in later.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    handles: HashMap<String, ResourceData>,
}

impl ResourceSet {
    pub(crate) fn new(handles: HashMap<String, ResourceData>) -> Self {
        Self { handles }
    }

    /// The live data handle registered under a manifest name.
    pub fn get(&self, name: &str) -> Option<&ResourceData> {
        self.handles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

//=== LoadGate ============================================================

/// Load bookkeeping for one pending state.
///
/// The gate is a shared cell: loader listeners write progress and the
/// loaded flag from dispatch, the frame loop reads them at the tick
/// boundary. Cloning yields a handle onto the same cell.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadGate {
    inner: Arc<Mutex<GateInner>>,
}

#[derive(Debug, Default)]
struct GateInner {
    loaded: bool,
    progress: Option<f32>,
}

impl LoadGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks the gate passable. Sticky; progress snaps to 1.
    pub(crate) fn mark_loaded(&self) {
        let mut inner = self.lock();
        inner.loaded = true;
        if inner.progress.is_some() {
            inner.progress = Some(1.0);
        }
    }

    pub(crate) fn set_progress(&self, fraction: f32) {
        self.lock().progress = Some(fraction.clamp(0.0, 1.0));
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    /// Finished fraction, `None` until the first progress report.
    pub(crate) fn progress(&self) -> Option<f32> {
        self.lock().progress
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

//=== StackCell ===========================================================

/// One slot on (or bound for) the state stack: the state itself plus
/// the engine-side bookkeeping the original kept as fields on the
/// state object.
pub(crate) struct StackCell {
    pub(crate) state: Box<dyn State>,
    pub(crate) resources: ResourceSet,
    pub(crate) gate: LoadGate,
    /// Progress listener to detach when the state leaves the pending
    /// slot. The completion listener detaches itself.
    pub(crate) progress_listener: Option<ListenerId>,
}

impl StackCell {
    pub(crate) fn new(state: Box<dyn State>) -> Self {
        Self {
            state,
            resources: ResourceSet::default(),
            gate: LoadGate::new(),
            progress_listener: None,
        }
    }
}

//=== Transition Requests =================================================

/// Transition slots requested from inside a state hook.
///
/// A hook cannot reach back into the game that is borrowing it, so the
/// context collects requests here and the frame loop applies them when
/// the hook returns. Rejection happens up front, against the slot
/// occupancy the game snapshotted, so a hook sees the same one-slot
/// errors as a direct caller.
#[derive(Default)]
pub(crate) struct TransitionRequests {
    pub(crate) incoming_busy: bool,
    pub(crate) outgoing_busy: bool,
    pub(crate) push: Option<Box<dyn State>>,
    pub(crate) pop: bool,
}

//=== StateContext ========================================================

/// What a state hook gets to touch.
///
/// Borrowed views of the engine's collaborators, handed to every hook
/// invocation: the drawing surface, the keyboard, the loader, and the
/// state's own preloaded resources.
pub struct StateContext<'a> {
    pub(crate) surface: &'a mut dyn Surface,
    pub(crate) keyboard: &'a Keyboard,
    pub(crate) loader: &'a mut ResourceLoader,
    pub(crate) resources: &'a ResourceSet,
    pub(crate) requests: &'a mut TransitionRequests,
}

impl StateContext<'_> {
    //--- Collaborators ----------------------------------------------------

    /// The drawing surface for this frame.
    pub fn surface(&mut self) -> &mut dyn Surface {
        self.surface
    }

    /// Surface dimensions in pixels (width, height).
    pub fn screen_size(&self) -> (u32, u32) {
        self.surface.size()
    }

    /// The keyboard tracker.
    pub fn keyboard(&self) -> &Keyboard {
        self.keyboard
    }

    /// The engine's resource loader, for lazy loads outside the
    /// preload manifest.
    pub fn loader(&mut self) -> &mut ResourceLoader {
        self.loader
    }

    /// This state's preloaded resources.
    pub fn resources(&self) -> &ResourceSet {
        self.resources
    }

    //--- Transition Requests ----------------------------------------------

    /// Requests a push, applied when the current hook returns.
    ///
    /// # Errors
    ///
    /// [`GameError::IncomingPending`] if an incoming transition is
    /// already in flight (or was requested earlier this hook).
    pub fn push_state<S>(&mut self, state: S) -> Result<(), GameError>
    where
        S: State + 'static,
    {
        if self.requests.incoming_busy || self.requests.push.is_some() {
            return Err(GameError::IncomingPending);
        }
        self.requests.push = Some(Box::new(state));
        Ok(())
    }

    /// Requests a pop, applied when the current hook returns.
    ///
    /// # Errors
    ///
    /// [`GameError::OutgoingPending`] if an outgoing transition is
    /// already in flight (or was requested earlier this hook).
    pub fn pop_state(&mut self) -> Result<(), GameError> {
        if self.requests.outgoing_busy || self.requests.pop {
            return Err(GameError::OutgoingPending);
        }
        self.requests.pop = true;
        Ok(())
    }
}

//=== Tests ===============================================================
