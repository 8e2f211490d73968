//=========================================================================
// Vellum Engine — Library Root
//
// A minimal 2D game engine around one coupling: an asynchronous
// resource-loading pipeline and a game-state stack whose transitions
// are gated on load completion, driven by a continuous frame loop that
// never blocks on either.
//
// Typical usage:
// ```no_run
// use vellum_engine::prelude::*;
//
// struct Title;
//
// impl State for Title {
//     fn preload(&self) -> Option<Manifest> {
//         Some(Manifest::new().with("bg", "title.png"))
//     }
// }
//
// fn main() -> Result<(), Box<dyn std::error::Error>> {
//     let game = GameBuilder::new(Framebuffer::new(800, 600))
//         .with_resource_root("assets")
//         .with_initial_state(Title)
//         .build()?;
//     Platform::new(game).with_title("my game").run()?;
//     Ok(())
// }
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` holds the engine itself (loader, game loop, collaborator
// seams); `platform` is the winit host that schedules it; `util` the
// path helpers shared by both. All public: integrators embedding the
// core under their own scheduler skip `platform` entirely.
//
pub mod core;
pub mod platform;
pub mod util;

pub mod prelude;

//--- Public Exports ------------------------------------------------------

pub use crate::core::game::{Game, GameBuilder};
pub use crate::platform::Platform;
