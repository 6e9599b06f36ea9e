/// Tokio event loop that drives the synchronizer.
pub mod runtime;
/// Newline-delimited stdio transport and console commands.
pub mod transport;
