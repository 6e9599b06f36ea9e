//! Client-side phase synchronization and timing controller for a multiplayer
//! trivia game, exposing modules for the binary and integration tests.

/// Client configuration and its validated loader.
pub mod config;
/// Wire types exchanged with the server and the presentation layer.
pub mod dto;
/// Error, advisory and outcome types.
pub mod error;
/// Async runtime and stdio transport.
pub mod services;
/// The synchronous synchronization core.
pub mod state;
