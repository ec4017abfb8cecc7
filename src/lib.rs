//! Push notification dispatch core
//!
//! Arrivals from a push delivery channel are announced to a client, which has
//! a bounded window to decide how each one is presented before a fallback
//! fires. See [`notifications`] for the dispatch machinery.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod notifications;
