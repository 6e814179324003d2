//! Launcher-style Spotify control.
//!
//! Typing a query produces menu entries ([`router`]); selecting one runs the
//! deferred action it carries ([`executor`]). [`launcher::Launcher`] ties both
//! to the preference store for a host to drive.

pub mod artwork;
pub mod auth;
pub mod config;
pub mod executor;
pub mod launcher;
pub mod menu;
pub mod remote;
pub mod router;
