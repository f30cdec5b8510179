//! Music catalog relay.
//!
//! Wraps a YouTube Music catalog behind a small HTTP API (categorized search,
//! playlist lookup) and a WebSocket hub that relays playback commands between
//! connected clients.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod hub;
pub mod normalize;
pub mod playlist;
pub mod search;
pub mod server;
pub mod service;
