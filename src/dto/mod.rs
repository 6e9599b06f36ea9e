/// Outbound player actions.
pub mod action;
/// Inbound envelope decoding and status classification.
pub mod envelope;
/// Authoritative game and player snapshots.
pub mod snapshot;
/// Read model for the presentation layer.
pub mod view;
