//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use vellum_engine::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Game loop and states
pub use crate::core::game::{Game, GameBuilder, GameError, ResourceSet, State, StateContext};

// Resource loading
pub use crate::core::loader::{
    ListenerId, LoaderError, LoaderOptions, Manifest, ProgressEvent, ResourceLoader,
    ResourceStatus,
};
pub use crate::core::resource::{
    FetchError, Fetcher, FsFetcher, LoadSignal, LoaderContext, MemoryFetcher, Payload, Resource,
    ResourceData, ResourceFactory, ResourceSignal, SignalSender,
};

// Drawing
pub use crate::core::surface::{Color, Framebuffer, Surface};

// Input
pub use crate::core::input::{KeyCode, KeyInput, Keyboard, Modifiers};

// Host
pub use crate::platform::{Platform, PlatformError};
