//=========================================================================
// Engine Core
//=========================================================================
//
// Everything platform-independent: the resource loader and its resource
// capability, the game state machine and frame loop, and the narrow
// collaborator seams (surface, keyboard).
//
// Layering, leaves first:
//
// ```text
//   resource ──> loader ──> game
//   surface ─────────────────┘
//   input ──────────────────┘
// ```
//
// Nothing in here touches the OS; the core is externally clocked and
// draws through the `Surface` trait, which is what makes it testable
// with synthetic timestamps and recording doubles.
//
//=========================================================================

pub mod game;
pub mod input;
pub mod loader;
pub mod resource;
pub mod surface;
