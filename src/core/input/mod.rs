//=========================================================================
// Keyboard Input
//=========================================================================
//
// Engine-side keyboard tracking, decoupled from any windowing library.
//
// Hosts translate native events into `KeyInput`s and feed them through
// `Keyboard::apply`; states query the tracker during their hooks. The
// tracker is deliberately dumb: no buffering, no action mapping, just
// the currently held keys and the modifier state.
//
//=========================================================================

//=== Standard Library Imports ============================================

use std::collections::HashSet;

//=== KeyCode =============================================================

/// Physical keyboard key identifier.
///
/// Represents the physical key location, not the character produced.
/// A-Z, 0-9, arrows, and the common special keys are covered; anything
/// else maps to `Unidentified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    //--- Numeric Keys -----------------------------------------------------

    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    //--- Alphabetic Keys --------------------------------------------------

    KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG,
    KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN,
    KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU,
    KeyV, KeyW, KeyX, KeyY, KeyZ,

    //--- Arrow Keys -------------------------------------------------------

    ArrowDown,
    ArrowLeft,
    ArrowRight,
    ArrowUp,

    //--- Special Keys -----------------------------------------------------

    /// Space bar.
    Space,
    /// Enter / Return.
    Enter,
    /// Escape.
    Escape,
    /// Tab.
    Tab,
    /// Backspace.
    Backspace,
    /// Delete.
    Delete,

    /// Fallback for keys the host does not map.
    Unidentified,
}

//=== Modifiers ===========================================================

/// Modifier key state (Shift, Ctrl, Alt).
///
/// Left and right variants are not distinguished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    /// No modifiers held.
    pub const NONE: Self = Self { shift: false, ctrl: false, alt: false };

    /// Shift only.
    pub const SHIFT: Self = Self { shift: true, ctrl: false, alt: false };

    /// Ctrl only.
    pub const CTRL: Self = Self { shift: false, ctrl: true, alt: false };

    /// Alt only.
    pub const ALT: Self = Self { shift: false, ctrl: false, alt: true };
}

//=== KeyInput ============================================================

/// One keyboard transition delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: KeyCode,
    /// True for press, false for release.
    pub pressed: bool,
    /// Modifier state at the time of the event.
    pub modifiers: Modifiers,
}

//=== Keyboard ============================================================

/// Tracks which keys are currently held.
///
/// Repeated presses of a held key are absorbed, so `apply` can be fed a
/// raw auto-repeat stream without further filtering.
#[derive(Debug, Default)]
pub struct Keyboard {
    down: HashSet<KeyCode>,
    modifiers: Modifiers,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    //--- Event Intake -----------------------------------------------------

    /// Records one key transition.
    pub fn apply(&mut self, input: KeyInput) {
        if input.pressed {
            self.down.insert(input.key);
        } else {
            self.down.remove(&input.key);
        }
        self.modifiers = input.modifiers;
    }

    /// Releases every held key. Hosts call this on focus loss, where
    /// key-up events would otherwise be lost.
    pub fn clear(&mut self) {
        self.down.clear();
        self.modifiers = Modifiers::NONE;
    }

    //--- Queries ----------------------------------------------------------

    /// True while `key` is held.
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.down.contains(&key)
    }

    /// True while `key` is not held.
    pub fn is_key_up(&self, key: KeyCode) -> bool {
        !self.is_key_down(key)
    }

    /// Modifier state as of the most recent event.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

//=== Tests ===============================================================
