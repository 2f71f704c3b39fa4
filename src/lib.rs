//! Resilient control layer for a Music Player Daemon.
//!
//! One shared [`player::Daemon`] owns the daemon connection and recovers from
//! dropped sessions with a single reconnect-and-retry. Queue, stored playlist
//! and browsing operations are built on top of it; [`library`] covers the
//! local music directory.

pub mod app;
pub mod error;
pub mod jobs;
pub mod library;
pub mod logging;
pub mod player;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{Error, Result, TransportError};
