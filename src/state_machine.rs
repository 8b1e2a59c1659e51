//! Game state machine
//!
//! Pure transitions over [`GameState`]: every state change is produced by
//! [`transition`] together with the effects (log appends, persistence,
//! notifications) the session must carry out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{GameContext, GamePhase, GameState};
pub use transition::{transition, TransitionError, TransitionResult};
