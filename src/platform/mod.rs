//=========================================================================
// Platform Host
//=========================================================================
//
// Winit-backed frame scheduler: creates the window, converts OS keyboard
// events into engine `KeyInput`s, and drives `Game::tick` once per
// `RedrawRequested` with a monotonic millisecond clock — the moral
// equivalent of a requestAnimationFrame driver.
//
// Architecture:
// ```text
//   Winit Event Loop (main thread)
//     ├─ KeyboardInput ──convert──> Game::apply_input
//     ├─ Focused(false) ──────────> Game::clear_input
//     └─ RedrawRequested ─────────> Game::tick(now_ms)
//                                      └─ request_redraw (next frame)
// ```
//
// The host never blocks inside a frame. Presenting the game's pixels to
// the OS window is the integrator's concern behind `Surface::present`;
// this module only keeps the loop turning.
//
//=========================================================================

//=== Standard Library Imports ============================================

use std::time::Instant;

//=== External Dependencies ===============================================

use log::{debug, error, info, trace};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode as WinitKeyCode, ModifiersState, PhysicalKey},
    window::{Window, WindowAttributes},
};

//=== Internal Dependencies ===============================================

use crate::core::game::Game;
use crate::core::input::{KeyCode, KeyInput, Modifiers};

//=== PlatformError =======================================================

/// Platform initialization and runtime errors.
///
/// These are fatal: if the event loop cannot be created or run, the
/// engine has no scheduler.
#[derive(Debug)]
pub enum PlatformError {
    /// Failed to create the event loop.
    EventLoopCreation(winit::error::EventLoopError),

    /// Event loop execution error.
    EventLoopExecution(winit::error::EventLoopError),
}

//--- Trait Implementations -----------------------------------------------

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventLoopCreation(e) => write!(f, "event loop creation failed: {}", e),
            Self::EventLoopExecution(e) => write!(f, "event loop error: {}", e),
        }
    }
}

impl std::error::Error for PlatformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::EventLoopCreation(e) | Self::EventLoopExecution(e) => Some(e),
        }
    }
}

//=== Platform ============================================================

/// Runs a [`Game`] on a winit event loop.
///
/// Must stay on the main thread (a winit requirement on macOS/iOS).
/// Closing the window is the only way to stop the schedule; an
/// individual frame cannot be cancelled.
pub struct Platform {
    game: Game,
    title: String,
    /// OS window handle, created lazily in `resumed`.
    window: Option<Window>,
    /// Origin of the millisecond clock handed to `Game::tick`.
    epoch: Instant,
    /// Modifier state cached from the most recent `ModifiersChanged`.
    modifiers: Modifiers,
}

impl Platform {
    //--- Construction -----------------------------------------------------

    /// Wraps a game for hosting. The window is created when the event
    /// loop starts.
    pub fn new(game: Game) -> Self {
        Self {
            game,
            title: String::from("vellum"),
            window: None,
            epoch: Instant::now(),
            modifiers: Modifiers::NONE,
        }
    }

    /// The window title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    //--- Execution --------------------------------------------------------

    /// Starts the event loop and blocks until the window closes.
    ///
    /// # Errors
    ///
    /// [`PlatformError`] if the event loop cannot be created or fails
    /// while running.
    ///
    /// # Panics
    ///
    /// Panics if called off the main thread (winit requirement).
    pub fn run(mut self) -> Result<(), PlatformError> {
        info!(target: "platform", "starting event loop");
        let event_loop = EventLoop::new().map_err(PlatformError::EventLoopCreation)?;
        event_loop.run_app(&mut self).map_err(PlatformError::EventLoopExecution)
    }

    //--- Internal Helpers -------------------------------------------------

    /// Milliseconds since the host was created.
    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1_000.0
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            trace!(target: "platform", "non-code key ignored");
            return;
        };
        let key = convert_key(code);
        self.game.apply_input(KeyInput {
            key,
            pressed: event.state.is_pressed(),
            modifiers: self.modifiers,
        });
    }

    //--- Test Accessors ---------------------------------------------------

    #[cfg(test)]
    fn window(&self) -> Option<&Window> {
        self.window.as_ref()
    }
}

//=== Winit Integration ===================================================

impl ApplicationHandler for Platform {
    /// Creates the window on startup (and skips mobile resumes that
    /// already have one).
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            debug!(target: "platform", "window already exists (mobile resume?)");
            return;
        }

        let (width, height) = self.game.surface_size();
        let attrs = WindowAttributes::default()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(width, height));

        match event_loop.create_window(attrs) {
            Ok(window) => {
                info!(
                    target: "platform",
                    "window created: {}x{} @ {}x DPI",
                    window.inner_size().width,
                    window.inner_size().height,
                    window.scale_factor()
                );
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => {
                error!(target: "platform", "window creation failed: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match &event {
            WindowEvent::CloseRequested => {
                info!(target: "platform", "window close requested");
                event_loop.exit();
            }

            WindowEvent::ModifiersChanged(state) => {
                self.modifiers = convert_modifiers(state.state());
            }

            WindowEvent::KeyboardInput { event: key_event, .. } => {
                self.handle_key(key_event);
            }

            // Key-up events are lost across a focus change; release
            // everything rather than leave keys stuck down.
            WindowEvent::Focused(false) => {
                debug!(target: "platform", "focus lost, clearing input");
                self.game.clear_input();
            }

            WindowEvent::RedrawRequested => {
                self.game.tick(self.now_ms());
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}

//=== Key Conversion ======================================================

/// Maps a winit physical key onto the engine's [`KeyCode`]. Anything
/// outside the engine's set becomes `Unidentified`.
fn convert_key(code: WinitKeyCode) -> KeyCode {
    use WinitKeyCode as W;
    match code {
        W::Digit0 => KeyCode::Digit0,
        W::Digit1 => KeyCode::Digit1,
        W::Digit2 => KeyCode::Digit2,
        W::Digit3 => KeyCode::Digit3,
        W::Digit4 => KeyCode::Digit4,
        W::Digit5 => KeyCode::Digit5,
        W::Digit6 => KeyCode::Digit6,
        W::Digit7 => KeyCode::Digit7,
        W::Digit8 => KeyCode::Digit8,
        W::Digit9 => KeyCode::Digit9,

        W::KeyA => KeyCode::KeyA,
        W::KeyB => KeyCode::KeyB,
        W::KeyC => KeyCode::KeyC,
        W::KeyD => KeyCode::KeyD,
        W::KeyE => KeyCode::KeyE,
        W::KeyF => KeyCode::KeyF,
        W::KeyG => KeyCode::KeyG,
        W::KeyH => KeyCode::KeyH,
        W::KeyI => KeyCode::KeyI,
        W::KeyJ => KeyCode::KeyJ,
        W::KeyK => KeyCode::KeyK,
        W::KeyL => KeyCode::KeyL,
        W::KeyM => KeyCode::KeyM,
        W::KeyN => KeyCode::KeyN,
        W::KeyO => KeyCode::KeyO,
        W::KeyP => KeyCode::KeyP,
        W::KeyQ => KeyCode::KeyQ,
        W::KeyR => KeyCode::KeyR,
        W::KeyS => KeyCode::KeyS,
        W::KeyT => KeyCode::KeyT,
        W::KeyU => KeyCode::KeyU,
        W::KeyV => KeyCode::KeyV,
        W::KeyW => KeyCode::KeyW,
        W::KeyX => KeyCode::KeyX,
        W::KeyY => KeyCode::KeyY,
        W::KeyZ => KeyCode::KeyZ,

        W::ArrowDown => KeyCode::ArrowDown,
        W::ArrowLeft => KeyCode::ArrowLeft,
        W::ArrowRight => KeyCode::ArrowRight,
        W::ArrowUp => KeyCode::ArrowUp,

        W::Space => KeyCode::Space,
        W::Enter => KeyCode::Enter,
        W::Escape => KeyCode::Escape,
        W::Tab => KeyCode::Tab,
        W::Backspace => KeyCode::Backspace,
        W::Delete => KeyCode::Delete,

        _ => KeyCode::Unidentified,
    }
}

/// Maps winit modifier state onto the engine's [`Modifiers`]. Winit
/// already normalizes platform keys (macOS Cmd, Option).
fn convert_modifiers(state: ModifiersState) -> Modifiers {
    Modifiers {
        shift: state.shift_key(),
        ctrl: state.control_key(),
        alt: state.alt_key(),
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
