//! Session controller.
//!
//! A single task owns the game, room, and connection, and processes UI
//! commands, network events, and the AI's delayed reply one at a time. The UI
//! drives it through [`SessionHandle`] and renders [`SessionSnapshot`]s.

mod controller;
mod error;
mod handle;
mod phase;

pub use error::SessionError;
pub use handle::{DEFAULT_THINK_DELAY, SessionHandle, SessionSettings, SessionTask};
pub use phase::{ActiveGame, Role, SessionPhase, SessionSnapshot, Versus};
