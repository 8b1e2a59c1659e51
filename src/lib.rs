//! Guess Who arena - orchestration core for Guess Who games played against
//! (or between) language models.
//!
//! A model's side of the game is a conversation log sent to an
//! `OpenAI`-compatible streaming endpoint. Tool calls in the streamed reply
//! are accumulated, dispatched against the game state machine, answered
//! with tool results, and the model is queried again until its turn ends.

// Public library surface; errors are documented on the error enums
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod config;
pub mod conversation;
pub mod db;
pub mod game;
pub mod llm;
pub mod runtime;
pub mod state_machine;
pub mod telemetry;
